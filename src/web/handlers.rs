//! HTTP handlers for the metrics listener.

use crate::metrics::MetricRegistry;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricRegistry>,
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, state.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let identity = state.metrics.identity();
    Json(json!({
        "status": "ok",
        "service": "dht_exporter",
        "version": env!("CARGO_PKG_VERSION"),
        "location": identity.location,
        "sensor_type": identity.sensor_type,
        "hostname": identity.hostname,
        "read_errors": state.metrics.error_count(),
        "last_successful_read": state.metrics.last_success_timestamp(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Landing page pointing at the scrape endpoint.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>DHT Exporter</title></head>
<body>
<h1>DHT Exporter</h1>
<p><a href="/metrics">Metrics</a> &middot; <a href="/health">Health</a></p>
</body>
</html>
"#;
