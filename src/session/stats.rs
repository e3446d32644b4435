use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one registered session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,

    /// When the session was registered
    pub created_at: DateTime<Utc>,

    /// Whether a pipeline task is still running for this session
    pub has_task: bool,
}

/// Overview of everything the session manager currently tracks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsOverview {
    /// Registered sessions
    pub count: usize,

    /// Outstanding supervised tasks
    pub tasks: usize,

    pub sessions: Vec<SessionInfo>,
}
