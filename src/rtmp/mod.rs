//! nginx-rtmp viewer count from the module's `stat` endpoint

pub mod poller;
pub mod stat;

pub use poller::StatPoller;
pub use stat::parse_nclients;
