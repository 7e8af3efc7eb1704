use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nginx_viewer_exporter::metrics::ViewerMetrics;
use nginx_viewer_exporter::presence::{
    FIELD_AGENT, FIELD_FORWARDED_FOR, FIELD_PATH, FIELD_REMOTE, Observation, PresenceTracker,
};
use tokio::time::sleep;

const TTL: Duration = Duration::from_secs(1);

fn request(remote: &str, path: &str, agent: &str, forwarded_for: &str) -> Observation {
    Observation::new()
        .with(FIELD_REMOTE, remote)
        .with(FIELD_PATH, path)
        .with(FIELD_AGENT, agent)
        .with(FIELD_FORWARDED_FOR, forwarded_for)
}

fn r1() -> Observation {
    request("::1", "/live/foo_720p/index.m3u8", "libmpv", "")
}

fn r2() -> Observation {
    request("::2", "/live/foo_720p/index.m3u8", "libmpv", "")
}

/// Sweeps run on whole seconds from tracker creation; moving the test half a
/// tick off keeps observations and assertions from racing a sweep.
async fn offset_from_ticks() {
    sleep(Duration::from_millis(500)).await;
}

#[tokio::test(start_paused = true)]
async fn identical_requests_count_once() {
    let tracker = PresenceTracker::new(TTL, |_| {});

    tracker.observe(&r1());
    tracker.observe(&r1().with("time", "19/Oct/2026:10:15:33 +0000").with("size", "999"));

    assert_eq!(tracker.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn differing_requests_count_separately() {
    let tracker = PresenceTracker::new(TTL, |_| {});

    tracker.observe(&r1());
    tracker.observe(&r2());
    tracker.observe(&request("::1", "/live/foo_480p/index.m3u8", "libmpv", ""));
    tracker.observe(&request("::1", "/live/foo_720p/index.m3u8", "VLC", ""));
    tracker.observe(&request("::1", "/live/foo_720p/index.m3u8", "libmpv", "198.51.100.4"));

    assert_eq!(tracker.count(), 5);
}

#[tokio::test(start_paused = true)]
async fn idle_viewer_expires_on_next_sweep() {
    let tracker = PresenceTracker::new(TTL, |_| {});
    offset_from_ticks().await;

    tracker.observe(&r1());
    assert_eq!(tracker.count(), 1);

    sleep(TTL * 2).await;
    assert_eq!(tracker.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn refresh_resets_ttl() {
    let ttl = Duration::from_secs(2);
    let tracker = PresenceTracker::new(ttl, |_| {});
    offset_from_ticks().await;

    tracker.observe(&r1());
    sleep(ttl.mul_f64(0.9)).await;
    tracker.observe(&r1());

    // 1.5 * ttl after the first observation, which alone would have expired
    sleep(ttl.mul_f64(0.6)).await;
    assert_eq!(tracker.count(), 1);

    // past the refresh's own ttl plus one sweep
    sleep(ttl + Duration::from_secs(1)).await;
    assert_eq!(tracker.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn callback_fires_on_every_observe_and_sweep() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let tracker = PresenceTracker::new(TTL, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    offset_from_ticks().await;

    for _ in 0..3 {
        tracker.observe(&r1());
    }
    // ticks at 0s, 1s, 2s and 3s
    sleep(Duration::from_secs(3)).await;

    assert!(calls.load(Ordering::SeqCst) >= 3 + 4);
}

#[tokio::test(start_paused = true)]
async fn untouched_tracker_stays_at_zero() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let tracker = PresenceTracker::new(TTL, move |count| sink.lock().unwrap().push(count));

    for _ in 0..5 {
        assert_eq!(tracker.count(), 0);
        sleep(Duration::from_millis(700)).await;
    }

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|&count| count == 0));
}

#[tokio::test(start_paused = true)]
async fn viewers_come_and_go() {
    let tracker = PresenceTracker::new(TTL, |_| {});
    offset_from_ticks().await;
    assert_eq!(tracker.count(), 0);

    tracker.observe(&r1());
    assert_eq!(tracker.count(), 1);

    sleep(TTL * 2).await;
    assert_eq!(tracker.count(), 0);

    tracker.observe(&r1());
    assert_eq!(tracker.count(), 1);

    tracker.observe(&r2());
    assert_eq!(tracker.count(), 2);

    sleep(TTL).await;
    tracker.observe(&r2());
    sleep(TTL).await;
    assert_eq!(tracker.count(), 1);

    sleep(TTL * 2).await;
    assert_eq!(tracker.count(), 0);

    tracker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn gauge_follows_tracker() {
    let metrics = ViewerMetrics::new("nginx_hls_viewer", "Number of HLS viewers for all streams.")
        .unwrap();
    let tracker = PresenceTracker::new(TTL, metrics.reporter());
    offset_from_ticks().await;

    tracker.observe(&r1());
    tracker.observe(&r2());
    assert_eq!(metrics.get(), 2);

    sleep(TTL * 2).await;
    assert_eq!(metrics.get(), 0);
    assert!(metrics.render().unwrap().contains("nginx_hls_viewer 0"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_observers_are_serialized() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let tracker = Arc::new(PresenceTracker::new(Duration::from_secs(60), move |count| {
        sink.lock().unwrap().push(count)
    }));

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let tracker = tracker.clone();
            tokio::task::spawn_blocking(move || {
                for viewer in 0..50 {
                    let remote = format!("10.0.{worker}.{viewer}");
                    tracker.observe(&request(&remote, "/live/foo/index.m3u8", "ua", ""));
                    tracker.observe(&request(&remote, "/live/foo/index.m3u8", "ua", ""));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(tracker.count(), 400);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.iter().copied().max(), Some(400));
    // Observations never shrink the map, and callbacks run under the lock
    let observe_counts: Vec<_> = seen.iter().copied().filter(|&c| c > 0).collect();
    assert!(observe_counts.windows(2).all(|pair| pair[0] <= pair[1]));
}
