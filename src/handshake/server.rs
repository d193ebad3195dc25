//! Local HTTP server exposing the connectivity check.

use super::HandshakeToken;
use crate::metrics::{ServerError, StreamMetrics};
use axum::{
    body::Body,
    extract::{rejection::FormRejection, State},
    http::{Method, Request, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::post,
    Form, Router,
};
use serde::Deserialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Span;

/// Path of the connectivity check.
pub const CHECK_ROUTE: &str = "/check/";

const FORBIDDEN_BODY: &str = "<h1>Error 403: Forbidden</h1>";
const BAD_REQUEST_BODY: &str = "<h1>Error 400: Bad request</h1>";

/// Configuration for the handshake server.
#[derive(Debug, Clone)]
pub struct HandshakeServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
    /// Requests still unanswered after this long get `408`.
    pub request_timeout: Duration,
}

impl Default for HandshakeServerConfig {
    fn default() -> Self {
        Self::with_port(8080)
    }
}

impl HandshakeServerConfig {
    /// All interfaces on `port`, ten second request timeout.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// State shared by the request handlers.
#[derive(Clone)]
pub struct HandshakeState {
    token: HandshakeToken,
    metrics: Option<Arc<StreamMetrics>>,
}

impl HandshakeState {
    /// State accepting `token`, without metrics.
    pub fn new(token: HandshakeToken) -> Self {
        Self {
            token,
            metrics: None,
        }
    }

    /// Counts rejected checks in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<StreamMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[derive(Debug, Deserialize)]
struct CheckForm {
    #[serde(default)]
    token: Option<String>,
}

/// Builds the handshake router.
///
/// `POST /check/` with a form field `token` equal to the server's token
/// answers `200`. Any other method on that path, an unreadable form, or
/// a missing or wrong token answers `403` with no hint of which check
/// failed. Every other path answers `400`.
pub fn router(state: HandshakeState, request_timeout: Duration) -> Router {
    Router::new()
        .route(CHECK_ROUTE, post(check_handler).fallback(forbidden_handler))
        .fallback(bad_request_handler)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            TraceLayer::new_for_http().on_request(|request: &Request<Body>, _span: &Span| {
                tracing::info!("Received a {} request at {}", request.method(), request.uri());
            }),
        )
}

/// HTTP server answering connectivity checks for one token.
pub struct HandshakeServer {
    config: HandshakeServerConfig,
    state: HandshakeState,
}

impl HandshakeServer {
    /// Creates a server with a freshly generated token.
    pub fn new(config: HandshakeServerConfig) -> Self {
        let token = HandshakeToken::generate();
        tracing::info!(%token, "Successfully generated a new connection token");
        Self::with_token(config, token)
    }

    /// Creates a server that accepts `token`.
    pub fn with_token(config: HandshakeServerConfig, token: HandshakeToken) -> Self {
        Self {
            config,
            state: HandshakeState::new(token),
        }
    }

    /// Counts rejected checks in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<StreamMetrics>) -> Self {
        self.state = self.state.with_metrics(metrics);
        self
    }

    /// Token a collector must present.
    pub fn token(&self) -> HandshakeToken {
        self.state.token
    }

    /// Router for this server's token and timeout.
    pub fn router(&self) -> Router {
        router(self.state.clone(), self.config.request_timeout)
    }

    /// Runs the server until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(addr = %self.config.bind_addr, "Server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        Ok(())
    }
}

async fn check_handler(
    State(state): State<HandshakeState>,
    form: Result<Form<CheckForm>, FormRejection>,
) -> Response {
    let token = match form {
        Ok(Form(form)) => form.token,
        Err(_) => None,
    };

    match token {
        Some(token) if state.token.matches(&token) => StatusCode::OK.into_response(),
        _ => forbidden(&state),
    }
}

async fn forbidden_handler(State(state): State<HandshakeState>) -> Response {
    forbidden(&state)
}

fn forbidden(state: &HandshakeState) -> Response {
    tracing::info!("A connection test request failed");
    if let Some(metrics) = &state.metrics {
        metrics.record_handshake_rejection();
    }
    (StatusCode::FORBIDDEN, Html(FORBIDDEN_BODY)).into_response()
}

async fn bad_request_handler(method: Method, uri: Uri) -> Response {
    tracing::warn!("invalid {} request for URL: {}", method, uri);
    (StatusCode::BAD_REQUEST, Html(BAD_REQUEST_BODY)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header::CONTENT_TYPE;
    use tower::ServiceExt;

    struct Fixture {
        token: HandshakeToken,
        metrics: Arc<StreamMetrics>,
        app: Router,
    }

    fn fixture() -> Fixture {
        let token = HandshakeToken::generate();
        let metrics = Arc::new(StreamMetrics::new().unwrap());
        let server = HandshakeServer::with_token(HandshakeServerConfig::default(), token)
            .with_metrics(Arc::clone(&metrics));
        Fixture {
            token,
            metrics,
            app: server.router(),
        }
    }

    fn form_post(uri: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_correct_token_accepted() {
        let f = fixture();
        let (status, body) = call(&f.app, form_post(CHECK_ROUTE, format!("token={}", f.token))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(f.metrics.handshake_rejections(), 0);
    }

    #[tokio::test]
    async fn test_bad_tokens_forbidden() {
        let f = fixture();
        let other = HandshakeToken::generate();

        for body in [
            format!("token={}", other),
            "token=".to_string(),
            "user=parkind".to_string(),
            String::new(),
        ] {
            let (status, text) = call(&f.app, form_post(CHECK_ROUTE, body)).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(text, FORBIDDEN_BODY);
        }
        assert_eq!(f.metrics.handshake_rejections(), 4);
    }

    #[tokio::test]
    async fn test_unparsable_form_forbidden() {
        let f = fixture();
        let request = Request::post(CHECK_ROUTE)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(format!("{{\"token\":\"{}\"}}", f.token)))
            .unwrap();

        let (status, text) = call(&f.app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(text, FORBIDDEN_BODY);
    }

    #[tokio::test]
    async fn test_wrong_method_forbidden() {
        let f = fixture();
        let request = Request::get(format!("{}?token={}", CHECK_ROUTE, f.token))
            .body(Body::empty())
            .unwrap();

        let (status, text) = call(&f.app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(text, FORBIDDEN_BODY);
    }

    #[tokio::test]
    async fn test_unknown_routes_bad_request() {
        let f = fixture();

        let get = Request::get("/metrics").body(Body::empty()).unwrap();
        let (status, text) = call(&f.app, get).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text, BAD_REQUEST_BODY);

        let post = form_post("/check", format!("token={}", f.token));
        let (status, _) = call(&f.app, post).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(f.metrics.handshake_rejections(), 0);
    }

    #[tokio::test]
    async fn test_query_string_ignored_for_routing() {
        let f = fixture();
        let route = format!("{}?source=collector", CHECK_ROUTE);

        let (status, _) = call(&f.app, form_post(&route, format!("token={}", f.token))).await;
        assert_eq!(status, StatusCode::OK);

        // The token is only read from the form body.
        let in_query = format!("{}?token={}", CHECK_ROUTE, f.token);
        let (status, text) = call(&f.app, form_post(&in_query, String::new())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(text, FORBIDDEN_BODY);
    }

    #[tokio::test]
    async fn test_repeated_checks_are_independent() {
        let f = fixture();
        for _ in 0..3 {
            let (status, _) = call(&f.app, form_post(CHECK_ROUTE, "token=nope".into())).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            let (status, _) =
                call(&f.app, form_post(CHECK_ROUTE, format!("token={}", f.token))).await;
            assert_eq!(status, StatusCode::OK);
        }
    }
}
