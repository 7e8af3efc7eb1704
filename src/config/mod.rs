use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::errors::{AppError, AppResult};

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hls: HlsConfig,
    #[serde(default)]
    pub rtmp: RtmpConfig,
}

/// Address the `/metrics` endpoint listens on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

/// Access-log tailing mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlsConfig {
    #[serde(default = "default_hls_web")]
    pub web: WebConfig,
    /// Time after which an unrefreshed viewer is dropped
    #[serde(default = "default_ttl", with = "duration_serde::duration")]
    pub ttl: Duration,
    /// How often expired viewers are swept, independent of `ttl`
    #[serde(default = "default_sweep_interval", with = "duration_serde::duration")]
    pub sweep_interval: Duration,
    /// Request paths that count as a viewer
    #[serde(default = "default_path_pattern")]
    pub path_pattern: String,
}

/// nginx-rtmp stat polling mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtmpConfig {
    #[serde(default = "default_rtmp_web")]
    pub web: WebConfig,
    #[serde(default = "default_stat_url")]
    pub stat_url: String,
    /// Name of the `<application>` whose live clients are counted
    #[serde(default = "default_application")]
    pub application: String,
    #[serde(default = "default_poll_interval", with = "duration_serde::duration")]
    pub poll_interval: Duration,
    #[serde(default = "default_request_timeout", with = "duration_serde::duration")]
    pub request_timeout: Duration,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_hls_web() -> WebConfig {
    WebConfig {
        host: default_host(),
        port: DEFAULT_HLS_PORT,
    }
}

fn default_rtmp_web() -> WebConfig {
    WebConfig {
        host: default_host(),
        port: DEFAULT_RTMP_PORT,
    }
}

fn default_ttl() -> Duration {
    DEFAULT_HLS_FRAGMENT
}

fn default_sweep_interval() -> Duration {
    DEFAULT_SWEEP_INTERVAL
}

fn default_path_pattern() -> String {
    DEFAULT_PATH_PATTERN.to_string()
}

fn default_stat_url() -> String {
    DEFAULT_STAT_URL.to_string()
}

fn default_application() -> String {
    DEFAULT_APPLICATION.to_string()
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            web: default_hls_web(),
            ttl: default_ttl(),
            sweep_interval: default_sweep_interval(),
            path_pattern: default_path_pattern(),
        }
    }
}

impl Default for RtmpConfig {
    fn default() -> Self {
        Self {
            web: default_rtmp_web(),
            stat_url: default_stat_url(),
            application: default_application(),
            poll_interval: default_poll_interval(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl WebConfig {
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let ip: IpAddr = self.host.parse().map_err(|e| {
            AppError::configuration(format!("Invalid listen host '{}': {e}", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when it does not exist
    pub fn load_from_file(config_file: &str) -> AppResult<Self> {
        if Path::new(config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            info!("Config file {} not found, using defaults", config_file);
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.hls.ttl.is_zero() {
            return Err(AppError::configuration("hls.ttl must be greater than zero"));
        }
        if self.hls.sweep_interval.is_zero() {
            return Err(AppError::configuration(
                "hls.sweep_interval must be greater than zero",
            ));
        }
        if self.rtmp.poll_interval.is_zero() {
            return Err(AppError::configuration(
                "rtmp.poll_interval must be greater than zero",
            ));
        }
        regex::Regex::new(&self.hls.path_pattern)?;
        Ok(())
    }
}
