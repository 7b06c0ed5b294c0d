use std::time::Duration;
use thiserror::Error;

/// Failures a stream can run into between a source and its consumer
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("upstream closed the stream before a terminal event")]
    UpstreamClosed,

    #[error("no event received from upstream within {0:?}")]
    IdleTimeout(Duration),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RelayError {
    /// Stable identifier placed in synthesized error events
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::UpstreamUnavailable(_) => "upstream_unavailable",
            RelayError::UpstreamStatus { .. } => "upstream_status",
            RelayError::UpstreamClosed => "upstream_closed",
            RelayError::IdleTimeout(_) => "idle_timeout",
            RelayError::MalformedEvent(_) => "malformed_event",
            RelayError::UnknownOperation(_) => "unknown_operation",
            RelayError::InvalidRequest(_) => "invalid_request",
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
