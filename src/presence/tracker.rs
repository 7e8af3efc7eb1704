//! Viewer presence tracking
//!
//! Collapses repeated observations of the same viewer into one entry, drops
//! entries that were not refreshed within the TTL, and reports the live
//! count through a callback on every change.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::observation::{Fingerprint, Observation};
use crate::config::defaults::DEFAULT_SWEEP_INTERVAL;

/// Receives the number of tracked viewers after every change
pub type ChangeCallback = Box<dyn Fn(usize) + Send + Sync + 'static>;

struct Shared {
    entries: Mutex<HashMap<Fingerprint, Instant>>,
    ttl: Duration,
    on_change: ChangeCallback,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, Instant>> {
        // A panicking callback poisons the lock; the map itself is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self, fingerprint: Fingerprint, now: Instant) -> usize {
        let mut entries = self.lock();
        let refreshed = entries.insert(fingerprint, now).is_some();
        let count = entries.len();
        trace!(?fingerprint, refreshed, count, "Viewer observed");
        (self.on_change)(count);
        count
    }

    /// Remove entries idle for strictly longer than the TTL, then report.
    /// Returns the number of removed entries.
    fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, last_seen| now.saturating_duration_since(*last_seen) <= self.ttl);
        let count = entries.len();
        (self.on_change)(count);
        before - count
    }
}

/// Tracks active viewers by fingerprint with TTL expiry.
///
/// All access to the entry map, including the `on_change` invocation, happens
/// under one mutex, so callbacks are delivered one at a time and always carry
/// the count of the map at that moment. A slow callback therefore stalls both
/// [`observe`](Self::observe) and the background sweep; keep it cheap (setting
/// a gauge is the intended use).
///
/// A background task sweeps expired entries once per sweep interval and calls
/// `on_change` after every sweep, even when nothing expired. The task stops on
/// [`shutdown`](Self::shutdown) or when the tracker is dropped.
pub struct PresenceTracker {
    shared: Arc<Shared>,
    sweep_interval: Duration,
    cancellation_token: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
}

impl PresenceTracker {
    /// Create a tracker sweeping once per second.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<F>(ttl: Duration, on_change: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        Self::with_sweep_interval(ttl, DEFAULT_SWEEP_INTERVAL, on_change)
    }

    /// Create a tracker sweeping once per `sweep_interval`.
    ///
    /// A zero interval falls back to the one second default.
    pub fn with_sweep_interval<F>(ttl: Duration, sweep_interval: Duration, on_change: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let sweep_interval = if sweep_interval.is_zero() {
            warn!("Zero sweep interval, using {:?}", DEFAULT_SWEEP_INTERVAL);
            DEFAULT_SWEEP_INTERVAL
        } else {
            sweep_interval
        };

        let shared = Arc::new(Shared {
            entries: Mutex::new(HashMap::new()),
            ttl,
            on_change: Box::new(on_change),
        });

        let mut interval = tokio::time::interval(sweep_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let cancellation_token = CancellationToken::new();
        let sweeper = tokio::spawn(run_sweeper(
            shared.clone(),
            interval,
            cancellation_token.clone(),
        ));

        debug!(
            ttl = %humantime::format_duration(ttl),
            sweep_interval = %humantime::format_duration(sweep_interval),
            "Presence tracker started"
        );

        Self {
            shared,
            sweep_interval,
            cancellation_token,
            sweeper: Some(sweeper),
        }
    }

    /// Record that the viewer behind `observation` is active now.
    ///
    /// Attributes outside the fingerprint are ignored; missing ones count as
    /// empty strings.
    pub fn observe(&self, observation: &Observation) {
        self.shared.touch(observation.fingerprint(), Instant::now());
    }

    /// Number of viewers tracked as of the last sweep and later observations
    pub fn count(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Stop the background sweep and wait for it to finish
    pub async fn shutdown(mut self) {
        self.cancellation_token.cancel();
        if let Some(sweeper) = self.sweeper.take() {
            if let Err(e) = sweeper.await {
                warn!("Presence sweeper ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

impl fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("ttl", &self.shared.ttl)
            .field("sweep_interval", &self.sweep_interval)
            .field("count", &self.count())
            .finish()
    }
}

async fn run_sweeper(
    shared: Arc<Shared>,
    mut interval: Interval,
    cancellation_token: CancellationToken,
) {
    loop {
        tokio::select! {
            now = interval.tick() => {
                let removed = shared.sweep(now);
                if removed > 0 {
                    debug!(removed, remaining = shared.lock().len(), "Expired viewers swept");
                }
            }
            _ = cancellation_token.cancelled() => {
                debug!("Presence sweeper received cancellation signal, shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::observation::{FIELD_AGENT, FIELD_FORWARDED_FOR, FIELD_PATH, FIELD_REMOTE};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn viewer(remote: &str) -> Observation {
        Observation::new()
            .with(FIELD_REMOTE, remote)
            .with(FIELD_PATH, "/live/foo_720p/index.m3u8")
            .with(FIELD_AGENT, "libmpv")
            .with(FIELD_FORWARDED_FOR, "")
    }

    fn recording_tracker(ttl: Duration) -> (PresenceTracker, Arc<Mutex<Vec<usize>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let tracker = PresenceTracker::new(ttl, move |count| sink.lock().unwrap().push(count));
        (tracker, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_tracker_counts_zero() {
        let (tracker, seen) = recording_tracker(Duration::from_secs(1));
        assert_eq!(tracker.count(), 0);

        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(tracker.count(), 0);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|&count| count == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_sees_post_update_counts() {
        let (tracker, seen) = recording_tracker(Duration::from_secs(60));

        tracker.observe(&viewer("::1"));
        tracker.observe(&viewer("::2"));
        tracker.observe(&viewer("::1"));

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 2]);
        assert_eq!(tracker.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_at_ttl_boundary_is_retained() {
        let ttl = Duration::from_secs(1);
        let (tracker, _seen) = recording_tracker(ttl);
        let observed_at = Instant::now();
        tracker.observe(&viewer("::1"));

        assert_eq!(tracker.shared.sweep(observed_at + ttl), 0);
        assert_eq!(tracker.count(), 1);

        assert_eq!(tracker.shared.sweep(observed_at + ttl + Duration::from_nanos(1)), 1);
        assert_eq!(tracker.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_waits_for_sweep() {
        let (tracker, _seen) = recording_tracker(Duration::from_secs(1));

        // Stay off the tick instants so sweep and test never race
        tokio::time::sleep(Duration::from_millis(500)).await;
        tracker.observe(&viewer("::1"));

        tokio::time::sleep(Duration::from_millis(1400)).await;
        // idle for 1.4s, but the last sweep saw only 0.5s
        assert_eq!(tracker.count(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(tracker.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_sweeping() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let tracker = PresenceTracker::new(Duration::from_secs(1), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        tracker.shutdown().await;
        let after_shutdown = calls.load(Ordering::SeqCst);
        assert_eq!(after_shutdown, 3);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_sweeper() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let tracker = PresenceTracker::new(Duration::from_secs(1), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(tracker);
        let after_drop = calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_drop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_sweep_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let tracker = PresenceTracker::with_sweep_interval(
            Duration::from_secs(10),
            Duration::from_millis(250),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(tracker.sweep_interval(), Duration::from_millis(250));
        assert_eq!(tracker.ttl(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        // ticks at 0, 250, 500, 750, 1000
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_sweep_interval_uses_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let tracker = PresenceTracker::with_sweep_interval(
            Duration::from_secs(1),
            Duration::ZERO,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(tracker.sweep_interval(), DEFAULT_SWEEP_INTERVAL);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        // ticks at 0s, 1s and 2s
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
