//! Error type definitions for the viewer exporter
//!
//! The presence tracker itself never fails; everything here belongs to the
//! adapters around it (configuration, stat polling, metrics exposition).

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Invalid regular expression in configuration
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Filesystem and stream I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream error: {url} returned {status}")]
    UpstreamStatus { url: String, status: u16 },

    /// Stat document could not be interpreted
    #[error("Stat error: {0}")]
    Stat(#[from] StatError),

    /// Metrics registry errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised while reading an nginx-rtmp stat document
#[derive(Error, Debug)]
pub enum StatError {
    /// Malformed XML
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Element or text content is not valid UTF-8
    #[error("Invalid UTF-8 in stat document: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// No application with the requested name carried a usable client count
    #[error("No matching application: {application}")]
    ApplicationNotFound { application: String },

    /// The `nclients` value is not an integer
    #[error("Invalid nclients '{value}' for application {application}")]
    InvalidClientCount { application: String, value: String },
}

impl AppError {
    /// Create a configuration error with a custom message
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl StatError {
    pub fn application_not_found<S: Into<String>>(application: S) -> Self {
        Self::ApplicationNotFound {
            application: application.into(),
        }
    }
}
