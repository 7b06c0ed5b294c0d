use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Session, SessionLifecycle};

/// Configuration for the session manager
#[derive(Clone, Debug)]
pub struct SessionManagerConfig {
    /// Maximum number of concurrent sessions (None = unlimited)
    pub max_sessions: Option<usize>,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_sessions: Some(100),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("maximum number of sessions reached: {0}")]
    LimitReached(usize),
}

/// Admits streaming requests and counts the ones in flight.
/// Sessions share nothing else: each owns its stream end to end.
pub struct SessionManager {
    active: Arc<AtomicUsize>,
    max_sessions: Option<usize>,
}

impl SessionManager {
    pub fn new(config: SessionManagerConfig) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            max_sessions: config.max_sessions,
        }
    }

    /// Admit a new session for `operation`, or refuse it when the limit is reached
    pub fn open(&self, request_id: &str, operation: &str) -> Result<Session, SessionError> {
        let max = self.max_sessions;
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match max {
                Some(max) if n >= max => None,
                _ => Some(n + 1),
            })
            .map_err(|n| {
                warn!("[{}] Refusing {} session, {} already active", request_id, operation, n);
                SessionError::LimitReached(n)
            })?;

        let session_id = Uuid::new_v4().to_string();
        info!("[{}] - [{}] Opening {} session", request_id, session_id, operation);

        Ok(Session {
            lifecycle: SessionLifecycle::new(
                self.active.clone(),
                request_id.to_string(),
                session_id.clone(),
            ),
            session_id,
            request_id: request_id.to_string(),
            operation: operation.to_string(),
        })
    }

    /// Get the number of active sessions
    pub fn session_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_sessions(&self) -> Option<usize> {
        self.max_sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_released_on_drop() {
        let manager = SessionManager::new(SessionManagerConfig {
            max_sessions: Some(2),
        });

        let first = manager.open("r1", "search").unwrap();
        let mut second = manager.open("r2", "chat").unwrap();
        assert_eq!(manager.session_count(), 2);
        assert_ne!(first.session_id, second.session_id);

        assert!(matches!(manager.open("r3", "chat"), Err(SessionError::LimitReached(2))));

        second.finish();
        assert!(second.is_finished());
        drop(second);
        assert_eq!(manager.session_count(), 1);

        drop(first);
        assert_eq!(manager.session_count(), 0);
        assert!(manager.open("r4", "search").is_ok());
    }

    #[test]
    fn unlimited_when_no_max() {
        let manager = SessionManager::new(SessionManagerConfig { max_sessions: None });
        let sessions: Vec<_> = (0..250).map(|i| manager.open(&i.to_string(), "search").unwrap()).collect();
        assert_eq!(manager.session_count(), 250);
        drop(sessions);
        assert_eq!(manager.session_count(), 0);
    }
}
