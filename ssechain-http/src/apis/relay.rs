use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use ssechain_core::origin::{CHAT, SEARCH};
use ssechain_core::{relay, SourceRequest};
use tracing::info;
use uuid::Uuid;

use super::types::{HealthResponse, PropertyChatRequest, SearchQuery};
use crate::http::RelayState;
use crate::streaming::sse_response;
use crate::{ApiJson, ApiQuery, ErrorResponse};

/// GET /search/stream?query=... - relay the origin's search stream
pub async fn handle_search_stream(
    State(state): State<RelayState>,
    ApiQuery(params): ApiQuery<SearchQuery>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4().to_string();
    info!("[{}] GET /search/stream query={}", request_id, params.query);

    let request = SourceRequest::new(SEARCH, json!({ "question": params.query }));
    relay_stream(&state, &request_id, request).await
}

/// POST /chat/stream - relay the origin's chat stream
pub async fn handle_chat_stream(
    State(state): State<RelayState>,
    ApiJson(payload): ApiJson<PropertyChatRequest>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4().to_string();
    info!("[{}] POST /chat/stream question={}", request_id, payload.user_question);

    let params = serde_json::to_value(&payload)
        .map_err(|e| ErrorResponse::internal_error(format!("Failed to encode request: {}", e)))?;
    relay_stream(&state, &request_id, SourceRequest::new(CHAT, params)).await
}

/// GET /health
pub async fn handle_health(State(state): State<RelayState>) -> Response {
    Json(HealthResponse::healthy("relay", state.sessions.session_count())).into_response()
}

/// Open the upstream stream and hand it to the relay.
/// Connection failures surface later, as the stream's terminal error event.
/// Opening is lazy, so a rejected session never touches the origin.
async fn relay_stream(
    state: &RelayState,
    request_id: &str,
    request: SourceRequest,
) -> Result<Response, ErrorResponse> {
    let operation = request.operation.clone();
    let upstream = state.upstream.open(request).await?;
    let session = state.sessions.open(request_id, &operation)?;

    info!(
        "[{}] - [{}] Relaying from {}",
        request_id, session.session_id, state.upstream_url
    );
    let events = relay(upstream, state.relay.clone(), session.session_id.clone());
    Ok(sse_response(events, session))
}
