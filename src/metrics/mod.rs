//! Viewer gauge and its Prometheus exposition

use prometheus::{Encoder, IntGauge, Registry, TextEncoder};
use tracing::trace;

use crate::errors::{AppError, AppResult};

/// A single viewer-count gauge in its own registry.
///
/// Cloning is cheap; clones share the gauge and registry.
#[derive(Clone)]
pub struct ViewerMetrics {
    registry: Registry,
    viewers: IntGauge,
}

impl ViewerMetrics {
    pub fn new(name: &str, help: &str) -> AppResult<Self> {
        let registry = Registry::new();
        let viewers = IntGauge::new(name, help)?;
        registry.register(Box::new(viewers.clone()))?;

        Ok(Self { registry, viewers })
    }

    pub fn set(&self, count: u64) {
        let value = i64::try_from(count).unwrap_or(i64::MAX);
        trace!(count = value, "Viewer gauge updated");
        self.viewers.set(value);
    }

    pub fn get(&self) -> i64 {
        self.viewers.get()
    }

    /// Callback that mirrors a tracker's count into the gauge
    pub fn reporter(&self) -> impl Fn(usize) + Send + Sync + use<> {
        let metrics = self.clone();
        move |count| metrics.set(count as u64)
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> AppResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer)
            .map_err(|e| AppError::internal(format!("Metrics output is not UTF-8: {e}")))
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}
