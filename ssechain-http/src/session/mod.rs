mod lifecycle;
mod manager;

pub use lifecycle::SessionLifecycle;
pub use manager::{SessionError, SessionManager, SessionManagerConfig};

/// One streaming request paired with one upstream stream.
/// Owned by the response body; dropped when the stream ends or the client leaves.
pub struct Session {
    pub session_id: String,
    pub request_id: String,
    pub operation: String,
    pub lifecycle: SessionLifecycle,
}

impl Session {
    /// Record that the terminal event went out
    pub fn finish(&mut self) {
        self.lifecycle.finish();
    }

    pub fn is_finished(&self) -> bool {
        self.lifecycle.is_finished()
    }
}
