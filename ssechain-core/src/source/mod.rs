mod http;

pub use http::{Endpoint, HttpSource};

use async_trait::async_trait;
use futures::stream::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::pin::Pin;

use crate::error::{RelayError, RelayResult};
use crate::event::StreamEvent;

/// Lazy, ordered, non-restartable sequence of events
pub type EventStream = Pin<Box<dyn Stream<Item = RelayResult<StreamEvent>> + Send>>;

/// Description of one logical operation to stream (a search, a chat completion, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRequest {
    pub operation: String,
    pub params: Value,
}

impl SourceRequest {
    pub fn new(operation: impl Into<String>, params: Value) -> Self {
        Self {
            operation: operation.into(),
            params,
        }
    }

    /// Deserialize the free-form params into the shape an operation expects
    pub fn params_as<T: DeserializeOwned>(&self) -> RelayResult<T> {
        serde_json::from_value(self.params.clone())
            .map_err(|e| RelayError::InvalidRequest(format!("{}: {}", self.operation, e)))
    }
}

/// Anything that can start a fresh event stream for a request.
///
/// `open` must return as soon as the stream is ready to yield its first
/// event; it never waits for the whole result.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn open(&self, request: SourceRequest) -> RelayResult<EventStream>;
}
