use crate::connection::PeerConnection;
use crate::error::{SessionError, SessionResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// A registered session: its connection plus the token that serializes
/// negotiations against it
#[derive(Clone)]
pub struct SessionEntry {
    pub connection: Arc<dyn PeerConnection>,
    pub created_at: DateTime<Utc>,
    negotiation: Arc<Mutex<()>>,
}

impl SessionEntry {
    pub fn new(connection: Arc<dyn PeerConnection>) -> Self {
        Self {
            connection,
            created_at: Utc::now(),
            negotiation: Arc::new(Mutex::new(())),
        }
    }

    /// Claim the session for one negotiation. `None` if another is in flight.
    pub fn try_begin_negotiation(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.negotiation).try_lock_owned().ok()
    }
}

/// Session id → live connection.
///
/// Entries are added by the signaling path and dropped either when the
/// connection reports `closed` or during shutdown.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Fails if the id is already present.
    pub async fn insert(&self, session_id: String, entry: SessionEntry) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return Err(SessionError::DuplicateSession(session_id));
        }
        sessions.insert(session_id, entry);
        Ok(())
    }

    pub async fn lookup(&self, session_id: &str) -> SessionResult<SessionEntry> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Drop a session. Absent ids are ignored, since close and shutdown race.
    pub async fn remove(&self, session_id: &str) -> Option<SessionEntry> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id)
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Stable copy of every entry, for iteration without holding the lock
    pub async fn snapshot(&self) -> Vec<(String, SessionEntry)> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    /// Remove everything, returning how many entries were dropped
    pub async fn clear(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        count
    }
}
