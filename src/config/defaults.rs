/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
use std::time::Duration;

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_HLS_PORT: u16 = 9101;
pub const DEFAULT_RTMP_PORT: u16 = 9102;

// HLS tracker defaults
/// One `hls_fragment` of nginx-rtmp: a viewer refreshes its playlist at least this often
pub const DEFAULT_HLS_FRAGMENT: Duration = Duration::from_secs(5);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
/// An HLS playlist request indicates a viewer
pub const DEFAULT_PATH_PATTERN: &str = r"^/live/.+/.+\.m3u8$";
pub const HLS_GAUGE_NAME: &str = "nginx_hls_viewer";
pub const HLS_GAUGE_HELP: &str = "Number of HLS viewers for all streams.";

// RTMP poller defaults
pub const DEFAULT_STAT_URL: &str = "http://nginx/stat";
pub const DEFAULT_APPLICATION: &str = "stream";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const RTMP_GAUGE_NAME: &str = "nginx_rtmp_viewer";
pub const RTMP_GAUGE_HELP: &str = "Number of RTMP viewers for all streams.";
