//! Periodic nginx-rtmp stat polling
//!
//! nginx-rtmp already deduplicates its clients, so the reported `nclients`
//! goes straight into the gauge without a presence tracker.

use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::stat::parse_nclients;
use crate::config::RtmpConfig;
use crate::errors::{AppError, AppResult};
use crate::metrics::ViewerMetrics;

pub struct StatPoller {
    // Reused so that keep-alive connections survive between polls
    client: Client,
    stat_url: String,
    application: String,
    poll_interval: Duration,
    metrics: ViewerMetrics,
}

impl StatPoller {
    pub fn new(config: &RtmpConfig, metrics: ViewerMetrics) -> AppResult<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            stat_url: config.stat_url.clone(),
            application: config.application.clone(),
            poll_interval: config.poll_interval,
            metrics,
        })
    }

    /// Fetch and parse the stat document without touching the gauge
    pub async fn fetch_count(&self) -> AppResult<u64> {
        let response = self.client.get(&self.stat_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                url: self.stat_url.clone(),
                status: status.as_u16(),
            });
        }

        // Read the complete body so the connection can go back to the pool
        let body = response.text().await?;
        Ok(parse_nclients(&body, &self.application)?)
    }

    /// One fetch cycle; the gauge is only updated on success
    pub async fn poll_once(&self) -> AppResult<u64> {
        let nclients = self.fetch_count().await?;
        debug!(nclients, "fetched clients");
        self.metrics.set(nclients);
        Ok(nclients)
    }

    /// Poll until cancelled. A failed attempt is logged and leaves the
    /// previous gauge value in place.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!(
            stat_url = %self.stat_url,
            application = %self.application,
            interval = %humantime::format_duration(self.poll_interval),
            "Starting nginx-rtmp stat poller"
        );

        loop {
            tokio::select! {
                result = self.poll_once() => {
                    if let Err(e) = result {
                        error!("Cannot fetch nginx-rtmp's stats: {}", e);
                    }
                }
                _ = cancellation_token.cancelled() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancellation_token.cancelled() => break,
            }
        }

        info!("Stat poller received cancellation signal, shutting down");
    }
}
