use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of the origin search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

/// Query string of the relay search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

/// Body of both chat endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyChatRequest {
    pub property_details: Map<String, Value>,
    pub user_question: String,
    #[serde(default)]
    pub chat_history: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub active_sessions: usize,
}

impl HealthResponse {
    pub fn healthy(service: &str, active_sessions: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            service: service.to_string(),
            active_sessions,
        }
    }
}
