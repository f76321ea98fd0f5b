//! Web application router and middleware setup.

use crate::metrics::MetricRegistry;
use crate::web::handlers::{self, AppState};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the axum application serving `/metrics`, `/health` and `/`.
pub fn create_app(metrics: Arc<MetricRegistry>) -> Router {
    let state = AppState { metrics };

    Router::new()
        .route("/", get(handlers::index))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::SensorIdentity;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<MetricRegistry>) {
        let metrics = Arc::new(
            MetricRegistry::new(SensorIdentity::new("office", "DHT22", "pi")).unwrap(),
        );
        (create_app(metrics.clone()), metrics)
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, metrics) = app();
        metrics.set_error_count(4);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response.headers()[axum::http::header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/plain"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("sensor_read_errors_total"));
        assert!(text.contains(" 4"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["location"], "office");
        assert_eq!(json["read_errors"], 0);
        assert!(json["last_successful_read"].is_null());
    }
}
