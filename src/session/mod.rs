//! Session lifecycle management
//!
//! This module provides the `SessionManager` that owns:
//! - The session registry (session id → connection)
//! - The task supervisor (one pipeline task per session)
//! - Signaling: new sessions and renegotiation of existing ones
//! - Bounded shutdown of all tasks and connections

mod manager;
mod offer;
mod registry;
mod shutdown;
mod stats;
mod supervisor;

pub use manager::SessionManager;
pub use offer::Offer;
pub use registry::{SessionEntry, SessionRegistry};
pub use shutdown::{ShutdownOrchestrator, ShutdownReport, DEFAULT_SHUTDOWN_TIMEOUT};
pub use stats::{SessionInfo, SessionsOverview};
pub use supervisor::{TaskHandle, TaskId, TaskSupervisor};
