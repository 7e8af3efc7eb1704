use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::metrics::ViewerMetrics;

/// Prometheus scrape endpoint
pub async fn metrics(State(metrics): State<ViewerMetrics>) -> Response {
    match metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, metrics.content_type())], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Encoding error: {e}")).into_response()
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}
