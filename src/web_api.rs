//! Web API Server
//!
//! HTTP surface for the generation pipeline.
//!
//! ## Endpoints
//!
//! - `POST /api/generate`: Generate one level (always `200`, body is a level)
//! - `GET  /health`: Health check
//! - `GET  /metrics`: Prometheus metrics

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ServerSection;
use crate::level::Level;
use crate::orchestrator::GenerationOrchestrator;
use crate::params::GenerateRequest;

/// Identifier shared by every client without a forwarded address.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Shared application state available to all handlers.
struct AppState {
    orchestrator: Arc<GenerationOrchestrator>,
}

// ============================================================================
// Server
// ============================================================================

/// Build the router with all routes and middleware.
pub fn build_router(orchestrator: Arc<GenerationOrchestrator>, max_request_size: usize) -> Router {
    let state = Arc::new(AppState { orchestrator });

    Router::new()
        .route("/api/generate", post(generate_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn_with_state(
            max_request_size,
            body_size_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web API server.
///
/// Binds to `config.host:config.port` and serves until shutdown.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn start_server(
    config: ServerSection,
    orchestrator: Arc<GenerationOrchestrator>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(orchestrator, config.max_request_size);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Web API ready on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Middleware
// ============================================================================

/// Adds an `X-Request-ID` header to every response.
///
/// A client-supplied `X-Request-ID` is preserved; otherwise a new UUID v4
/// is generated.
async fn request_id_middleware(req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Rejects requests whose `Content-Length` exceeds `max_size` with 413.
async fn body_size_middleware(
    State(max_size): State<usize>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(content_length) = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        if content_length > max_size {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(serde_json::json!({"error": "Request body too large"})),
            )
                .into_response();
        }
    }

    next.run(req).await
}

// ============================================================================
// Handlers
// ============================================================================

/// Client identifier: first `X-Forwarded-For` entry, else [`UNKNOWN_CLIENT`].
///
/// All unidentified clients share one throttle bucket.
pub fn client_id(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// `POST /api/generate`
///
/// The body is read raw so malformed JSON degrades to defaults instead of
/// a rejection.
async fn generate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Level> {
    let client = client_id(&headers);
    let request = GenerateRequest::from_body(&body);
    debug!(client_id = %client, "generate request");
    Json(state.orchestrator.handle(&client, &request).await)
}

/// `GET /health`: Health check endpoint.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /metrics`: Prometheus metrics endpoint.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackGenerator;
    use tower::ServiceExt;

    fn router() -> Router {
        let orchestrator = GenerationOrchestrator::builder()
            .fallback(FallbackGenerator::seeded(3))
            .build();
        build_router(Arc::new(orchestrator), 1024)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("test: read body");
        serde_json::from_slice(&bytes).expect("test: json body")
    }

    #[test]
    fn test_client_id_takes_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"),
        );
        assert_eq!(client_id(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_id_defaults_to_unknown() {
        assert_eq!(client_id(&HeaderMap::new()), UNKNOWN_CLIENT);

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(client_id(&headers), UNKNOWN_CLIENT);
    }

    #[tokio::test]
    async fn test_generate_returns_level_json() {
        let response = router()
            .oneshot(
                Request::post("/api/generate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"lang":"en","speakerMode":"duel"}"#))
                    .expect("test: request"),
            )
            .await
            .expect("test: response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let json = body_json(response).await;
        assert!(json["type"].is_string());
        assert_eq!(json["speaker"], "gigetta");
        assert_eq!(json["banter"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["_note"], "Missing GEMINI_API_KEY, fallback used.");
    }

    #[tokio::test]
    async fn test_malformed_body_still_returns_200() {
        let response = router()
            .oneshot(
                Request::post("/api/generate")
                    .body(Body::from("{not json"))
                    .expect("test: request"),
            )
            .await
            .expect("test: response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["speaker"], "gigetto");
    }

    #[tokio::test]
    async fn test_oversized_body_returns_413() {
        let response = router()
            .oneshot(
                Request::post("/api/generate")
                    .header("content-length", "4096")
                    .body(Body::from(vec![b' '; 4096]))
                    .expect("test: request"),
            )
            .await
            .expect("test: response");
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let response = router()
            .oneshot(
                Request::get("/health")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .expect("test: request"),
            )
            .await
            .expect("test: response");
        assert_eq!(
            response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
            Some("abc-123")
        );
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
    }
}
