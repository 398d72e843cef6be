//! Axum router and HTTP handlers for tally-daemon.
//!
//! `build_router` is the single entry point; `main.rs` attaches middleware
//! layers after the call so the scenario tests can drive the bare router.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::info;

use crate::{
    api_types::{ErrorResponse, HealthResponse},
    state::{uptime_secs, AppState, Invocation},
};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/invoke", post(invoke))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let mut snap = st.status.read().await.clone();
    snap.daemon_uptime_secs = uptime_secs();
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/invoke
// ---------------------------------------------------------------------------

/// Body is the trigger event. An empty body counts as `{}`.
pub(crate) async fn invoke(State(st): State<Arc<AppState>>, body: Bytes) -> Response {
    let event: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new(format!("invalid trigger event: {e}"))),
                )
                    .into_response();
            }
        }
    };

    match st.invoke(&event).await {
        Invocation::Busy => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new("a reconciliation pass is already running")),
        )
            .into_response(),
        Invocation::Completed(resp) => {
            info!(status = resp.status_code, "invoke finished");
            let code = StatusCode::from_u16(resp.status_code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (code, Json(resp.body)).into_response()
        }
    }
}
