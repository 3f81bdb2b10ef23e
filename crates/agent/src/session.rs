use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cadence_core::ConversationState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed, ephemeral conversation storage. Last writer wins; the turn
/// controller is the only writer per session id and holds that session's
/// lock for the duration of a turn.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<ConversationState>, SessionStoreError>;
    async fn put(&self, state: ConversationState) -> Result<(), SessionStoreError>;
    async fn delete(&self, session_id: &str) -> Result<(), SessionStoreError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: tokio::sync::RwLock<HashMap<String, ConversationState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<ConversationState>, SessionStoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn put(&self, state: ConversationState) -> Result<(), SessionStoreError> {
        self.sessions.write().await.insert(state.session_id.clone(), state);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionStoreError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

/// Per-session mutual exclusion. Turns for one session id are strictly
/// sequential; different session ids never contend. Entries are created on
/// first use and kept for the life of the process.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(session_id.to_string()).or_default().clone()
    }
}
