//! Session persistence contract and in-memory backend
//!
//! The core reads and writes sessions through this narrow key-value
//! contract and never assumes a particular persistence technology.

use super::model::Session;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Session persistence contract
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session by id; `None` if never saved
    async fn load(&self, session_id: &str) -> Result<Option<Session>>;

    /// Persist or replace a session
    async fn save(&self, session_id: &str, session: &Session) -> Result<()>;
}

/// In-process session store backed by a map
///
/// Data is lost on restart; production deployments plug a durable backend
/// into the [`SessionStore`] trait instead.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, session: &Session) -> Result<()> {
        if session.id != session_id {
            return Err(Error::Internal(format!(
                "session id mismatch: key '{}' vs session '{}'",
                session_id, session.id
            )));
        }
        debug!(session_id = %session_id, turns = session.turn_count(), "Session saved");
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), session.clone());
        Ok(())
    }
}
