use crate::pipeline::Event;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// ICE server used for NAT traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn new(urls: impl Into<String>) -> Self {
        Self {
            urls: urls.into(),
            username: None,
            credential: None,
        }
    }
}

/// Answer produced by a connection after (re)negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpAnswer {
    pub sdp: String,

    #[serde(rename = "type")]
    pub sdp_type: String,

    /// Session identifier assigned by the connection layer
    pub session_id: String,
}

/// Notification that a connection has closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedEvent {
    pub session_id: String,
}

/// Sending half of the `closed` channel handed to every new connection.
///
/// Connections report their own closure here; the session manager consumes
/// the other end from its reaper loop.
#[derive(Debug, Clone)]
pub struct ClosedNotifier {
    tx: mpsc::UnboundedSender<ClosedEvent>,
}

impl ClosedNotifier {
    pub fn new(tx: mpsc::UnboundedSender<ClosedEvent>) -> Self {
        Self { tx }
    }

    /// Report that `session_id` has closed. A no-op once the manager is gone.
    pub fn notify(&self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        if self.tx.send(ClosedEvent { session_id }).is_err() {
            debug!("Closed notification dropped, session manager has stopped");
        }
    }
}

/// Connection handle for one client session.
///
/// Implementations own the media transport and negotiation protocol; the
/// session core only drives their lifecycle.
#[async_trait::async_trait]
pub trait PeerConnection: Send + Sync {
    /// Apply the client's initial offer
    async fn initialize(&self, sdp: &str, sdp_type: &str) -> Result<()>;

    /// Re-apply connection parameters on an established session
    async fn renegotiate(&self, sdp: &str, sdp_type: &str, restart: bool) -> Result<()>;

    /// Current answer, keyed by the connection's session id
    fn answer(&self) -> Result<SdpAnswer>;

    /// Close the connection. Must report `closed` through the notifier.
    async fn disconnect(&self) -> Result<()>;

    /// Take the inbound event stream. Returns `None` after the first call.
    fn take_events(&self) -> Option<mpsc::Receiver<Event>>;
}

/// Creates connection handles for new sessions
pub trait ConnectionFactory: Send + Sync {
    fn create(&self, closed: ClosedNotifier) -> Arc<dyn PeerConnection>;
}
