use super::peer::{ClosedNotifier, ConnectionFactory, IceServer, PeerConnection, SdpAnswer};
use crate::pipeline::Event;
use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Buffered events between the connection and its pipeline
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// In-process connection that answers offers without a media transport.
///
/// Frames are fed in through [`LocalConnection::injector`]; the pipeline reads
/// them from [`PeerConnection::take_events`].
pub struct LocalConnection {
    closed: ClosedNotifier,
    ice_servers: Vec<IceServer>,
    state: Mutex<LocalState>,
    renegotiations: AtomicUsize,
}

#[derive(Default)]
struct LocalState {
    session_id: Option<String>,
    local_sdp: Option<String>,
    closed: bool,
    event_tx: Option<mpsc::Sender<Event>>,
    event_rx: Option<mpsc::Receiver<Event>>,
}

impl LocalConnection {
    pub fn new(ice_servers: Vec<IceServer>, closed: ClosedNotifier) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            closed,
            ice_servers,
            state: Mutex::new(LocalState {
                event_tx: Some(event_tx),
                event_rx: Some(event_rx),
                ..LocalState::default()
            }),
            renegotiations: AtomicUsize::new(0),
        }
    }

    /// Sender for pushing frames into this session's stream. `None` once closed.
    pub fn injector(&self) -> Option<mpsc::Sender<Event>> {
        self.state.lock().event_tx.clone()
    }

    pub fn ice_servers(&self) -> &[IceServer] {
        &self.ice_servers
    }

    pub fn renegotiation_count(&self) -> usize {
        self.renegotiations.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait::async_trait]
impl PeerConnection for LocalConnection {
    async fn initialize(&self, sdp: &str, sdp_type: &str) -> Result<()> {
        if sdp_type != "offer" {
            bail!("Expected an offer, got '{}'", sdp_type);
        }

        let mut state = self.state.lock();
        if state.session_id.is_some() {
            bail!("Connection already initialized");
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        debug!(
            "Initializing local connection {} ({} ICE servers)",
            session_id,
            self.ice_servers.len()
        );

        state.local_sdp = Some(mirror_sdp(sdp));
        state.session_id = Some(session_id);
        Ok(())
    }

    async fn renegotiate(&self, sdp: &str, sdp_type: &str, restart: bool) -> Result<()> {
        if sdp_type != "offer" {
            bail!("Expected an offer, got '{}'", sdp_type);
        }

        let mut state = self.state.lock();
        if state.closed {
            bail!("Connection is closed");
        }
        let Some(session_id) = state.session_id.as_deref() else {
            bail!("Connection not initialized");
        };

        info!("Renegotiating {} (restart={})", session_id, restart);
        state.local_sdp = Some(mirror_sdp(sdp));
        self.renegotiations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn answer(&self) -> Result<SdpAnswer> {
        let state = self.state.lock();
        match (&state.session_id, &state.local_sdp) {
            (Some(session_id), Some(sdp)) => Ok(SdpAnswer {
                sdp: sdp.clone(),
                sdp_type: "answer".to_string(),
                session_id: session_id.clone(),
            }),
            _ => bail!("Connection not initialized"),
        }
    }

    async fn disconnect(&self) -> Result<()> {
        let session_id = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            // Dropping the sender ends the pipeline's stream
            state.event_tx = None;
            state.session_id.clone()
        };

        if let Some(session_id) = session_id {
            info!("Local connection {} closed", session_id);
            self.closed.notify(session_id);
        }
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::Receiver<Event>> {
        self.state.lock().event_rx.take()
    }
}

/// Creates [`LocalConnection`]s that share one ICE server list
pub struct LocalConnectionFactory {
    ice_servers: Vec<IceServer>,
}

impl LocalConnectionFactory {
    pub fn new(ice_servers: Vec<IceServer>) -> Self {
        Self { ice_servers }
    }
}

impl ConnectionFactory for LocalConnectionFactory {
    fn create(&self, closed: ClosedNotifier) -> Arc<dyn PeerConnection> {
        Arc::new(LocalConnection::new(self.ice_servers.clone(), closed))
    }
}

/// Build an answer SDP from an offer: receive-only media, active DTLS role
fn mirror_sdp(offer: &str) -> String {
    let mut answer = String::with_capacity(offer.len());
    for line in offer.lines() {
        let line = match line.trim_end() {
            "a=sendrecv" | "a=sendonly" => "a=recvonly",
            "a=recvonly" => "a=inactive",
            "a=setup:actpass" => "a=setup:active",
            other => other,
        };
        answer.push_str(line);
        answer.push_str("\r\n");
    }
    answer
}
