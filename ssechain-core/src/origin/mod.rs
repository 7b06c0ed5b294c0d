//! Simulated business logic served by the origin role.
//!
//! `search` types out keyword-driven progress stages before a final result;
//! `chat` emits a canned answer word by word.

mod chat;
mod search;

pub use chat::{chat_answer, chat_stream, ChatParams};
pub use search::{sample_result, search_stages, search_stream, SearchParams};

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::error::{RelayError, RelayResult};
use crate::source::{EventSource, EventStream, SourceRequest};

pub const SEARCH: &str = "search";
pub const CHAT: &str = "chat";

/// Artificial latency of the simulated producers
#[derive(Clone, Debug, PartialEq)]
pub struct Pacing {
    /// Delay between typed characters of a progress stage
    pub char_delay: Duration,
    /// Total time spent on one stage, typing included
    pub stage_duration: Duration,
    /// Delay before each chat token
    pub token_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            char_delay: Duration::from_millis(30),
            stage_duration: Duration::from_secs(3),
            token_delay: Duration::from_millis(50),
        }
    }
}

impl Pacing {
    /// No delays at all
    pub fn none() -> Self {
        Self {
            char_delay: Duration::ZERO,
            stage_duration: Duration::ZERO,
            token_delay: Duration::ZERO,
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Event source for the `search` and `chat` operations
#[derive(Clone, Debug, Default)]
pub struct OriginSource {
    pacing: Pacing,
}

impl OriginSource {
    pub fn new(pacing: Pacing) -> Self {
        Self { pacing }
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }
}

#[async_trait]
impl EventSource for OriginSource {
    async fn open(&self, request: SourceRequest) -> RelayResult<EventStream> {
        match request.operation.as_str() {
            SEARCH => {
                let params: SearchParams = request.params_as()?;
                info!("Starting search for: {}", params.question);
                Ok(search_stream(params, self.pacing.clone()))
            }
            CHAT => {
                let params: ChatParams = request.params_as()?;
                info!("Generating chat response for: {}", params.user_question);
                Ok(chat_stream(params, self.pacing.clone()))
            }
            other => Err(RelayError::UnknownOperation(other.to_string())),
        }
    }
}
