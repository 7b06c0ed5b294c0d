use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use ssechain_core::origin::{CHAT, SEARCH};
use ssechain_core::SourceRequest;
use tracing::info;
use uuid::Uuid;

use super::types::{HealthResponse, PropertyChatRequest, QueryRequest};
use crate::http::OriginState;
use crate::streaming::sse_response;
use crate::{ApiJson, ErrorResponse};

/// POST /query/stream - stream search progress followed by results
pub async fn handle_search_stream(
    State(state): State<OriginState>,
    ApiJson(payload): ApiJson<QueryRequest>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4().to_string();
    info!("[{}] POST /query/stream question={}", request_id, payload.question);

    let request = SourceRequest::new(SEARCH, json!({ "question": payload.question }));
    open_stream(&state, &request_id, request).await
}

/// POST /property_chat/stream - stream a chat answer token by token
pub async fn handle_chat_stream(
    State(state): State<OriginState>,
    ApiJson(payload): ApiJson<PropertyChatRequest>,
) -> Result<Response, ErrorResponse> {
    let request_id = Uuid::new_v4().to_string();
    info!("[{}] POST /property_chat/stream question={}", request_id, payload.user_question);

    let params = serde_json::to_value(&payload)
        .map_err(|e| ErrorResponse::internal_error(format!("Failed to encode request: {}", e)))?;
    open_stream(&state, &request_id, SourceRequest::new(CHAT, params)).await
}

/// GET /health
pub async fn handle_health(State(state): State<OriginState>) -> Response {
    Json(HealthResponse::healthy("origin", state.sessions.session_count())).into_response()
}

/// A session is only admitted once the source accepted the request.
async fn open_stream(
    state: &OriginState,
    request_id: &str,
    request: SourceRequest,
) -> Result<Response, ErrorResponse> {
    let operation = request.operation.clone();
    let events = state.source.open(request).await?;
    let session = state.sessions.open(request_id, &operation)?;
    Ok(sse_response(events, session))
}
