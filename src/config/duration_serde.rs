//! Serde helpers for human-readable durations in configuration.

use serde::{Deserialize, Deserializer, Serializer, de};
use std::time::Duration;

/// `#[serde(with = "duration_serde::duration")]` for `Duration` fields written
/// as `"5s"` / `"1m30s"` strings or as whole seconds.
pub mod duration {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer).map_err(|_| {
            de::Error::custom("expected whole seconds or a duration such as '5s' or '1m30s'")
        })? {
            Raw::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
            Raw::Text(text) => humantime::parse_duration(&text)
                .map_err(|e| de::Error::custom(format!("Invalid duration '{text}': {e}"))),
        }
    }
}
