use super::offer::Offer;
use super::registry::{SessionEntry, SessionRegistry};
use super::shutdown::{ShutdownOrchestrator, ShutdownReport};
use super::stats::{SessionInfo, SessionsOverview};
use super::supervisor::TaskSupervisor;
use crate::connection::{ClosedEvent, ClosedNotifier, ConnectionFactory, PeerConnection, SdpAnswer};
use crate::error::{SessionError, SessionResult};
use crate::pipeline::Pipeline;
use anyhow::anyhow;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Ids whose `closed` arrived before they were registered.
///
/// The reaper writes it and `create_session` drains it, each while holding
/// the lock across its registry update.
type UnregisteredClosures = Arc<Mutex<HashSet<String>>>;

/// Owns every live session: the registry, the pipeline tasks bound to them,
/// and the reaper that drops sessions whose connection has closed.
pub struct SessionManager {
    registry: Arc<SessionRegistry>,
    supervisor: TaskSupervisor,
    factory: Arc<dyn ConnectionFactory>,
    pipeline: Arc<dyn Pipeline>,
    closed_tx: mpsc::UnboundedSender<ClosedEvent>,
    closed_early: UnregisteredClosures,
    orchestrator: ShutdownOrchestrator,
    shutting_down: AtomicBool,
    reaper: CancellationToken,
}

impl SessionManager {
    /// Create a manager and start its reaper loop. Requires a Tokio runtime.
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        pipeline: Arc<dyn Pipeline>,
        shutdown_timeout: Duration,
    ) -> Arc<Self> {
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();

        let manager = Arc::new(Self {
            registry: Arc::new(SessionRegistry::new()),
            supervisor: TaskSupervisor::new(),
            factory,
            pipeline,
            closed_tx,
            closed_early: UnregisteredClosures::default(),
            orchestrator: ShutdownOrchestrator::new(shutdown_timeout),
            shutting_down: AtomicBool::new(false),
            reaper: CancellationToken::new(),
        });

        tokio::spawn(reap_closed_sessions(
            Arc::clone(&manager.registry),
            manager.supervisor.clone(),
            Arc::clone(&manager.closed_early),
            closed_rx,
            manager.reaper.clone(),
        ));

        manager
    }

    /// Handle a signaling request.
    ///
    /// An offer naming a registered session renegotiates it; anything else
    /// creates a new session with its own pipeline task.
    pub async fn handle_offer(&self, offer: Offer) -> SessionResult<SdpAnswer> {
        let (sdp, sdp_type) = offer.validate()?;

        if self.is_shutting_down() {
            return Err(SessionError::ShuttingDown);
        }

        if let Some(session_id) = offer.existing_session() {
            match self.registry.lookup(session_id).await {
                Ok(entry) => {
                    return self
                        .renegotiate(session_id, entry, sdp, sdp_type, offer.restart)
                        .await
                }
                Err(_) => info!("Unknown session {}, creating a new one", session_id),
            }
        }

        self.create_session(sdp, sdp_type).await
    }

    async fn renegotiate(
        &self,
        session_id: &str,
        entry: SessionEntry,
        sdp: &str,
        sdp_type: &str,
        restart: bool,
    ) -> SessionResult<SdpAnswer> {
        let Some(_negotiation) = entry.try_begin_negotiation() else {
            warn!("Rejecting concurrent renegotiation for session {}", session_id);
            return Err(SessionError::RenegotiationConflict(session_id.to_string()));
        };

        info!("Reusing existing connection for session {}", session_id);
        entry.connection.renegotiate(sdp, sdp_type, restart).await?;

        let answer = entry.connection.answer()?;
        if answer.session_id != session_id {
            warn!(
                "Connection reported id {} while renegotiating session {}",
                answer.session_id, session_id
            );
        }

        Ok(SdpAnswer {
            session_id: session_id.to_string(),
            ..answer
        })
    }

    async fn create_session(&self, sdp: &str, sdp_type: &str) -> SessionResult<SdpAnswer> {
        let connection = self
            .factory
            .create(ClosedNotifier::new(self.closed_tx.clone()));
        connection.initialize(sdp, sdp_type).await?;

        let answer = connection.answer()?;
        let session_id = answer.session_id.clone();

        {
            let mut closed_early = self.closed_early.lock().await;

            if let Err(e) = self
                .registry
                .insert(session_id.clone(), SessionEntry::new(Arc::clone(&connection)))
                .await
            {
                // Not disconnected: its closed notification would evict the
                // session that legitimately owns this id.
                error!("Session registry invariant violated: {}", e);
                return Err(e);
            }

            if closed_early.remove(&session_id) {
                self.registry.remove(&session_id).await;
                warn!("Session {} closed during negotiation", session_id);
                return Err(closed_during_negotiation(&session_id));
            }
        }

        if self.is_shutting_down() {
            self.registry.remove(&session_id).await;
            if let Err(e) = connection.disconnect().await {
                warn!("Failed to disconnect session {}: {:#}", session_id, e);
            }
            return Err(SessionError::ShuttingDown);
        }

        let pipeline = Arc::clone(&self.pipeline);
        let task_connection: Arc<dyn PeerConnection> = Arc::clone(&connection);
        let task = self.supervisor.spawn(session_id.clone(), move |cancel| async move {
            pipeline.run(task_connection, cancel).await
        });

        // Shutdown may have snapshotted the tasks before this one was added
        if self.is_shutting_down() {
            task.cancel();
            return Err(SessionError::ShuttingDown);
        }

        // The reaper may have dropped the entry before the task existed
        if !self.registry.contains(&session_id).await {
            task.cancel();
            warn!("Session {} closed during negotiation", session_id);
            return Err(closed_during_negotiation(&session_id));
        }

        info!("Created session {}", session_id);
        Ok(answer)
    }

    /// Tear down every session. Only the first call does any work.
    pub async fn shutdown(&self) -> Option<ShutdownReport> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            warn!("Shutdown already performed");
            return None;
        }

        info!(
            "Shutting down {} sessions and {} pipeline tasks",
            self.registry.len().await,
            self.supervisor.len()
        );

        let report = self
            .orchestrator
            .run(&self.supervisor, &self.registry)
            .await;
        self.reaper.cancel();
        self.closed_early.lock().await.clear();

        if report.is_clean() {
            info!("Shutdown complete");
        } else {
            warn!("Shutdown forced: {:?}", report);
        }
        Some(report)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn supervisor(&self) -> &TaskSupervisor {
        &self.supervisor
    }

    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    pub fn task_count(&self) -> usize {
        self.supervisor.len()
    }

    pub async fn overview(&self) -> SessionsOverview {
        let mut sessions: Vec<SessionInfo> = self
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(|(session_id, entry)| SessionInfo {
                has_task: self.supervisor.has_session(&session_id),
                session_id,
                created_at: entry.created_at,
            })
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        SessionsOverview {
            count: sessions.len(),
            tasks: self.supervisor.len(),
            sessions,
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.reaper.cancel();
    }
}

/// Drop sessions whose connection reported `closed` and stop their pipelines
async fn reap_closed_sessions(
    registry: Arc<SessionRegistry>,
    supervisor: TaskSupervisor,
    closed_early: UnregisteredClosures,
    mut closed_rx: mpsc::UnboundedReceiver<ClosedEvent>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            event = closed_rx.recv() => {
                let Some(ClosedEvent { session_id }) = event else {
                    break;
                };
                {
                    let mut closed_early = closed_early.lock().await;
                    if registry.remove(&session_id).await.is_some() {
                        info!("Discarding peer connection for session {}", session_id);
                    } else {
                        debug!("Session {} closed while unregistered", session_id);
                        closed_early.insert(session_id.clone());
                    }
                }
                supervisor.cancel_session(&session_id);
            }
        }
    }
}

fn closed_during_negotiation(session_id: &str) -> SessionError {
    SessionError::Connection(anyhow!(
        "connection for session {} closed during negotiation",
        session_id
    ))
}
