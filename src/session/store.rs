//! Session sink trait and in-memory implementation

use crate::error::{MatchmakingError, Result};
use crate::types::{Session, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for the downstream consumer of created sessions
///
/// The gameplay service reads sessions out of this sink and drives the match
/// from there; matchmaking only ever inserts and re-reads.
#[async_trait]
pub trait SessionSink: Send + Sync {
    /// Store a freshly created session
    async fn insert_session(&self, session: Session) -> Result<()>;

    /// Fetch a session by id
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>>;

    /// Number of sessions currently held
    async fn session_count(&self) -> Result<usize>;
}

/// In-memory session store backed by a hash map
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionSink for InMemorySessionStore {
    async fn insert_session(&self, session: Session) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire sessions lock".to_string(),
            })?;

        if sessions.contains_key(&session.id) {
            return Err(MatchmakingError::SessionCreationFailed {
                reason: format!("Session {} already exists", session.id),
            }
            .into());
        }

        sessions.insert(session.id, session);
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire sessions lock".to_string(),
            })?;

        Ok(sessions.get(&id).cloned())
    }

    async fn session_count(&self) -> Result<usize> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire sessions lock".to_string(),
            })?;

        Ok(sessions.len())
    }
}
