// HTTP server (Axum)
//
// Serves the drift handler locally so the phone app and the probe can run
// without API Gateway in front of them.

use crate::core::config::Config;
use crate::handler::{handle_event, DriftService, VERSION};
use crate::models::response::{LambdaProxyResponse, ResponseMode};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Request body cap. A frame sequence of full phone photos runs to several
/// MB once base64 encoded, well past axum's 2 MB default.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// State shared across all HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DriftService>,
    pub mode: ResponseMode,
}

pub fn create_router(service: DriftService, mode: ResponseMode, max_body_bytes: usize) -> Router {
    let state = AppState {
        service: Arc::new(service),
        mode,
    };

    Router::new()
        .route("/drifttest", post(drift))
        .route("/v1/drift", post(drift))
        .route("/health", get(health))
        .fallback(|| async {
            warn!("Unmatched request - 404 Not Found");
            (StatusCode::NOT_FOUND, "404 Not Found")
        })
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: &Config) -> Result<()> {
    let router = create_router(
        DriftService::from_config(config),
        config.response_mode,
        config.max_body_bytes,
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    info!(
        address = %config.bind_address,
        mode = config.response_mode.to_string(),
        max_body_bytes = config.max_body_bytes,
        preset = config.threshold_preset.to_string(),
        "Drift server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Drift server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
}

// ==============================================================================
// Handlers
// ==============================================================================

async fn drift(State(state): State<AppState>, body: Bytes) -> Response {
    let event = request_event(&body);
    let envelope = handle_event(&event, &state.service);
    into_http_response(envelope, state.mode)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": VERSION }))
}

/// Raw request bytes as a handler event. Anything that isn't JSON is passed
/// on as a string body so the handler answers it with its own 400.
fn request_event(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return json!({});
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(event) => event,
        Err(_) => json!({ "body": String::from_utf8_lossy(body) }),
    }
}

fn into_http_response(envelope: LambdaProxyResponse, mode: ResponseMode) -> Response {
    match mode {
        ResponseMode::Envelope => (StatusCode::OK, Json(envelope)).into_response(),
        ResponseMode::Direct => {
            let status = StatusCode::from_u16(envelope.status_code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                [(header::CONTENT_TYPE, "application/json")],
                envelope.body,
            )
                .into_response()
        }
    }
}

fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
