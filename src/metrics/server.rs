//! Prometheus exporter.

use super::StreamMetrics;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Failures of the HTTP listeners (exporter and handshake).
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("cannot listen: {0}")]
    Bind(#[from] std::io::Error),

    /// The server stopped with an error.
    #[error("listener stopped: {0}")]
    Server(String),
}

/// Where the exporter listens. All interfaces, port 9090 by default.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Listening address.
    pub bind_addr: SocketAddr,
}

impl MetricsServerConfig {
    /// All interfaces on `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

/// Serves `/metrics` in Prometheus text format and a `/health` probe
/// that reports whether the streaming loop is running.
pub struct MetricsServer {
    bind_addr: SocketAddr,
    metrics: Arc<StreamMetrics>,
}

impl MetricsServer {
    /// Exporter for `metrics` at `config.bind_addr`.
    pub fn new(config: MetricsServerConfig, metrics: Arc<StreamMetrics>) -> Self {
        Self {
            bind_addr: config.bind_addr,
            metrics,
        }
    }

    /// Router serving `/metrics` and `/health`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(scrape))
            .route("/health", get(health))
            .with_state(Arc::clone(&self.metrics))
    }

    /// Serves until `shutdown` resolves, then drains open connections.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "Metrics exporter listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}

async fn scrape(State(metrics): State<Arc<StreamMetrics>>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(text) => (StatusCode::OK, [(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], text),
        Err(e) => {
            tracing::error!("Metrics encoding failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                e.to_string(),
            )
        }
    }
}

async fn health(State(metrics): State<Arc<StreamMetrics>>) -> &'static str {
    if metrics.is_streaming() {
        "streaming"
    } else {
        "idle"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_text(router: Router, path: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_bind_addresses() {
        assert_eq!(MetricsServerConfig::default().bind_addr.port(), 9090);
        let config = MetricsServerConfig::with_port(9100);
        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 9100)));
    }

    #[tokio::test]
    async fn test_scrape_reports_counters() {
        let metrics = Arc::new(StreamMetrics::new().unwrap());
        metrics.record_drop(4);
        let server = MetricsServer::new(MetricsServerConfig::default(), metrics);

        let (status, text) = get_text(server.router(), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("parkind_frames_dropped_total 4"));
    }

    #[tokio::test]
    async fn test_health_follows_streaming_gauge() {
        let metrics = Arc::new(StreamMetrics::new().unwrap());
        let server = MetricsServer::new(MetricsServerConfig::default(), Arc::clone(&metrics));

        assert_eq!(get_text(server.router(), "/health").await.1, "idle");
        metrics.set_streaming(true);
        assert_eq!(get_text(server.router(), "/health").await.1, "streaming");
    }
}
