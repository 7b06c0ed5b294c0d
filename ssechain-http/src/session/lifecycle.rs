use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Releases the session slot when dropped.
/// A drop before `finish` means the client disconnected mid-stream.
pub struct SessionLifecycle {
    active: Arc<AtomicUsize>,
    request_id: String,
    session_id: String,
    finished: bool,
}

impl SessionLifecycle {
    pub(crate) fn new(active: Arc<AtomicUsize>, request_id: String, session_id: String) -> Self {
        Self {
            active,
            request_id,
            session_id,
            finished: false,
        }
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for SessionLifecycle {
    fn drop(&mut self) {
        let remaining = self.active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        if self.finished {
            debug!(
                "[{}] - [{}] Stream completed, session closed ({} active)",
                self.request_id, self.session_id, remaining
            );
        } else {
            info!(
                "[{}] - [{}] Client disconnected before the terminal event, session closed ({} active)",
                self.request_id, self.session_id, remaining
            );
        }
    }
}
