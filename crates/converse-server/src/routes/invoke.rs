use crate::state::AppState;
use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use converse::envelope::ResponseEnvelope;
use converse::errors::BridgeError;
use serde_json::Value;
use std::sync::Arc;

pub const INVOKE_PATH: &str = "/invoke";
/// Path used by local function runtime emulators
pub const RUNTIME_INVOKE_PATH: &str = "/2015-03-31/functions/function/invocations";

// One payload in, one envelope out. The envelope's own statusCode carries the outcome;
// even an unparseable body gets an envelope.
async fn handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ResponseEnvelope>, StatusCode> {
    let event: Value = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            let error = BridgeError::MalformedInvocation(format!("invalid JSON payload: {}", e));
            tracing::error!("Rejected invocation: {}", error);
            return Ok(Json(ResponseEnvelope::failure(&error, false)));
        }
    };
    let router = Arc::clone(&state.router);

    // the handler blocks until the upstream answer is fully collected
    let envelope = tokio::task::spawn_blocking(move || router.handle(&event))
        .await
        .map_err(|e| {
            tracing::error!("Invocation worker failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(envelope))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(INVOKE_PATH, post(handler))
        .route(RUNTIME_INVOKE_PATH, post(handler))
        .with_state(state)
}
