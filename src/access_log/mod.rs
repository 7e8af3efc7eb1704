//! Access log adapter: turns nginx log lines into presence observations

pub mod parser;
pub mod tailer;

pub use parser::{AccessLogParser, NGINX_LOG_PATTERN, ParsedLine};
pub use tailer::{LogTailer, TailStats};
