//! Centralized error handling for the viewer exporter
//!
//! # Error Categories
//!
//! - **Configuration Errors**: unreadable config files, bad patterns, bad values
//! - **Upstream Errors**: stat endpoint connectivity, status codes, HTTP failures
//! - **Stat Errors**: malformed or unexpected nginx-rtmp stat documents
//! - **Metrics Errors**: gauge registration and text encoding
//!
//! # Usage
//!
//! ```rust
//! use nginx_viewer_exporter::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<u64> {
//!     "42".parse::<u64>()
//!         .map_err(|e| AppError::internal(e.to_string()))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for stat document parsing
pub type StatResult<T> = Result<T, StatError>;
