//! Live stream viewer counts for Prometheus.
//!
//! Two sources are supported:
//! - an nginx access log, where HLS playlist requests are deduplicated into
//!   viewers by a [`presence::PresenceTracker`] with TTL expiry
//! - the nginx-rtmp `stat` endpoint, whose client count is reported as is

pub mod access_log;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod presence;
pub mod rtmp;
pub mod web;
