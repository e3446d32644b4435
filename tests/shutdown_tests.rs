// Integration tests for bounded shutdown
//
// Shutdown must cancel tasks before disconnecting sessions, finish within
// its timeout even when a task or connection never cooperates, and leave
// the manager empty.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tambourine_server::connection::{
    ClosedNotifier, ConnectionFactory, LocalConnectionFactory, PeerConnection, SdpAnswer,
};
use tambourine_server::pipeline::{Event, Pipeline};
use tambourine_server::{Offer, SessionError, SessionManager};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_millis(200);

/// Pipeline that finishes promptly once cancelled
struct CooperativePipeline;

#[async_trait::async_trait]
impl Pipeline for CooperativePipeline {
    async fn run(&self, _connection: Arc<dyn PeerConnection>, cancel: CancellationToken) -> Result<()> {
        cancel.cancelled().await;
        Ok(())
    }
}

/// Pipeline that ignores cancellation entirely
struct StubbornPipeline;

#[async_trait::async_trait]
impl Pipeline for StubbornPipeline {
    async fn run(&self, _connection: Arc<dyn PeerConnection>, _cancel: CancellationToken) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        Ok(())
    }
}

/// Records the order in which tasks finished and connections were closed
#[derive(Default)]
struct Timeline {
    step: AtomicUsize,
    task_finished_at: AtomicUsize,
    disconnected_at: AtomicUsize,
    disconnected: AtomicBool,
}

impl Timeline {
    fn mark(&self, slot: &AtomicUsize) {
        slot.store(self.step.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst);
    }
}

struct TimelinePipeline(Arc<Timeline>);

#[async_trait::async_trait]
impl Pipeline for TimelinePipeline {
    async fn run(&self, _connection: Arc<dyn PeerConnection>, cancel: CancellationToken) -> Result<()> {
        cancel.cancelled().await;
        assert!(
            !self.0.disconnected.load(Ordering::SeqCst),
            "connection closed while its task was still running"
        );
        self.0.mark(&self.0.task_finished_at);
        Ok(())
    }
}

/// Connection whose disconnect either records itself or never returns
struct TestConnection {
    id: String,
    timeline: Arc<Timeline>,
    hang_on_disconnect: bool,
}

#[async_trait::async_trait]
impl PeerConnection for TestConnection {
    async fn initialize(&self, _sdp: &str, _sdp_type: &str) -> Result<()> {
        Ok(())
    }

    async fn renegotiate(&self, _sdp: &str, _sdp_type: &str, _restart: bool) -> Result<()> {
        Ok(())
    }

    fn answer(&self) -> Result<SdpAnswer> {
        Ok(SdpAnswer {
            sdp: "v=0\r\n".to_string(),
            sdp_type: "answer".to_string(),
            session_id: self.id.clone(),
        })
    }

    async fn disconnect(&self) -> Result<()> {
        if self.hang_on_disconnect {
            std::future::pending::<()>().await;
        }
        self.timeline.disconnected.store(true, Ordering::SeqCst);
        self.timeline.mark(&self.timeline.disconnected_at);
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::Receiver<Event>> {
        None
    }
}

struct TestFactory {
    timeline: Arc<Timeline>,
    hang_on_disconnect: bool,
    next: AtomicUsize,
}

impl ConnectionFactory for TestFactory {
    fn create(&self, _closed: ClosedNotifier) -> Arc<dyn PeerConnection> {
        Arc::new(TestConnection {
            id: format!("session-{}", self.next.fetch_add(1, Ordering::SeqCst)),
            timeline: Arc::clone(&self.timeline),
            hang_on_disconnect: self.hang_on_disconnect,
        })
    }
}

fn offer() -> Offer {
    Offer::new("v=0\r\n", "offer")
}

#[tokio::test]
async fn test_clean_shutdown_drains_everything() -> Result<()> {
    let manager = SessionManager::new(
        Arc::new(LocalConnectionFactory::new(Vec::new())),
        Arc::new(CooperativePipeline),
        TIMEOUT,
    );
    for _ in 0..3 {
        manager.handle_offer(offer()).await?;
    }

    let report = manager.shutdown().await.expect("first shutdown runs");

    assert!(report.is_clean());
    assert_eq!(report.tasks_cancelled, 3);
    assert_eq!(report.sessions_disconnected, 3);
    assert_eq!(manager.session_count().await, 0);
    assert_eq!(manager.task_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_tasks_cancelled_before_disconnect() -> Result<()> {
    let timeline = Arc::new(Timeline::default());
    let manager = SessionManager::new(
        Arc::new(TestFactory {
            timeline: Arc::clone(&timeline),
            hang_on_disconnect: false,
            next: AtomicUsize::new(0),
        }),
        Arc::new(TimelinePipeline(Arc::clone(&timeline))),
        TIMEOUT,
    );
    manager.handle_offer(offer()).await?;

    let report = manager.shutdown().await.expect("first shutdown runs");

    assert!(report.is_clean());
    let task_finished = timeline.task_finished_at.load(Ordering::SeqCst);
    let disconnected = timeline.disconnected_at.load(Ordering::SeqCst);
    assert!(task_finished > 0 && disconnected > 0);
    assert!(task_finished < disconnected);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_task_forces_shutdown() -> Result<()> {
    let manager = SessionManager::new(
        Arc::new(LocalConnectionFactory::new(Vec::new())),
        Arc::new(StubbornPipeline),
        TIMEOUT,
    );
    manager.handle_offer(offer()).await?;
    assert_eq!(manager.task_count(), 1);

    let started = tokio::time::Instant::now();
    let report = manager.shutdown().await.expect("first shutdown runs");

    assert!(report.tasks_forced);
    assert!(!report.sessions_forced);
    assert!(started.elapsed() <= TIMEOUT * 2 + Duration::from_millis(50));
    assert_eq!(manager.session_count().await, 0);
    assert_eq!(manager.task_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_hanging_disconnect_forces_shutdown() -> Result<()> {
    let timeline = Arc::new(Timeline::default());
    let manager = SessionManager::new(
        Arc::new(TestFactory {
            timeline,
            hang_on_disconnect: true,
            next: AtomicUsize::new(0),
        }),
        Arc::new(CooperativePipeline),
        TIMEOUT,
    );
    manager.handle_offer(offer()).await?;
    manager.handle_offer(offer()).await?;

    let started = tokio::time::Instant::now();
    let report = manager.shutdown().await.expect("first shutdown runs");

    assert!(!report.tasks_forced);
    assert!(report.sessions_forced);
    assert_eq!(report.sessions_disconnected, 2);
    assert!(started.elapsed() <= TIMEOUT * 2 + Duration::from_millis(50));
    assert_eq!(manager.session_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_runs_once() -> Result<()> {
    let manager = SessionManager::new(
        Arc::new(LocalConnectionFactory::new(Vec::new())),
        Arc::new(CooperativePipeline),
        TIMEOUT,
    );

    assert!(manager.shutdown().await.is_some());
    assert!(manager.shutdown().await.is_none());
    Ok(())
}

/// Counts pipelines that have started and not yet returned
struct CountingPipeline(Arc<AtomicUsize>);

#[async_trait::async_trait]
impl Pipeline for CountingPipeline {
    async fn run(&self, _connection: Arc<dyn PeerConnection>, cancel: CancellationToken) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        cancel.cancelled().await;
        self.0.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_offers_racing_shutdown_leave_no_running_tasks() -> Result<()> {
    for _ in 0..20 {
        let running = Arc::new(AtomicUsize::new(0));
        // Connections that never report closed, so only shutdown can stop tasks
        let manager = SessionManager::new(
            Arc::new(TestFactory {
                timeline: Arc::new(Timeline::default()),
                hang_on_disconnect: false,
                next: AtomicUsize::new(0),
            }),
            Arc::new(CountingPipeline(Arc::clone(&running))),
            TIMEOUT,
        );

        let offers: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.handle_offer(offer()).await })
            })
            .collect();
        tokio::task::yield_now().await;
        manager.shutdown().await.expect("first shutdown runs");

        for joined in futures::future::join_all(offers).await {
            if let Err(e) = joined? {
                assert!(matches!(e, SessionError::ShuttingDown));
            }
        }

        tokio::time::timeout(Duration::from_secs(2), async {
            while running.load(Ordering::SeqCst) > 0 || manager.task_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;
        assert_eq!(manager.session_count().await, 0);
    }
    Ok(())
}
