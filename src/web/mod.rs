//! Metrics HTTP listener.
//!
//! Serves the registry in the Prometheus text format on `GET /metrics`.
//! The listener runs on its own task and only ever reads the registry.

pub mod config;
pub mod handlers;
pub mod router;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;

use crate::error::{MonitorError, Result};
use crate::metrics::MetricRegistry;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Bind the listener socket. Separate from serving so that a bind failure
/// is reported before the monitor loop starts.
pub async fn bind_metrics_listener(config: &WebConfig) -> Result<TcpListener> {
    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| MonitorError::config_error(format!("Invalid bind address: {}", e)))?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| MonitorError::web_server_error(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Prometheus metrics server started on port {}", config.port);
    Ok(listener)
}

/// Serve the registry on an already bound listener until the task is dropped.
pub async fn serve_metrics(listener: TcpListener, metrics: Arc<MetricRegistry>) -> Result<()> {
    let app = create_app(metrics);
    axum::serve(listener, app)
        .await
        .map_err(|e| MonitorError::web_server_error(format!("Server error: {}", e)))
}

/// Bind and serve in one step.
pub async fn start_metrics_server(config: WebConfig, metrics: Arc<MetricRegistry>) -> Result<()> {
    let listener = bind_metrics_listener(&config).await?;
    serve_metrics(listener, metrics).await
}

/// Run `server` on its own task while `work` runs on this one.
///
/// Returns `work`'s output once it finishes and stops the server. If the
/// server ends first, for any reason, `work` is dropped and the server's
/// failure is returned.
pub async fn supervise<S, F>(server: S, work: F) -> Result<F::Output>
where
    S: Future<Output = Result<()>> + Send + 'static,
    F: Future,
{
    let mut server = tokio::spawn(server);

    let output = tokio::select! {
        output = work => output,
        served = &mut server => {
            return Err(match served {
                Ok(Ok(())) => MonitorError::web_server_error("Metrics server stopped unexpectedly"),
                Ok(Err(e)) => e,
                Err(e) => {
                    MonitorError::web_server_error(format!("Metrics server task failed: {}", e))
                }
            });
        }
    };

    server.abort();
    Ok(output)
}
