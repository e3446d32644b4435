use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Stable identifier of a supervised task
pub type TaskId = u64;

/// Handle to one supervised task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    session_id: String,
    cancel: CancellationToken,
    done: CancellationToken,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Request cooperative cancellation. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Resolves once the task has finished and left the supervisor
    pub async fn finished(&self) {
        self.done.cancelled().await;
    }
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<TaskId, TaskHandle>>,
}

/// Tracks one background task per session.
///
/// A finished task removes itself from the table through a guard dropped
/// inside the task, so completion, failure, panic and cancellation are all
/// handled the same way. Readers only ever see copies of the table.
#[derive(Clone, Default)]
pub struct TaskSupervisor {
    inner: Arc<Inner>,
}

/// Unregisters a task and fires its completion signal when dropped
struct CompletionGuard {
    inner: Arc<Inner>,
    id: TaskId,
    done: CancellationToken,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.inner.tasks.lock().remove(&self.id);
        self.done.cancel();
    }
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` for `session_id` and track it until it finishes.
    ///
    /// `work` receives the task's cancellation token and should return
    /// promptly once it fires. Errors and panics are logged, never propagated.
    pub fn spawn<F, Fut>(&self, session_id: impl Into<String>, work: F) -> TaskHandle
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handle = TaskHandle {
            id: self.inner.next_id.fetch_add(1, Ordering::SeqCst),
            session_id: session_id.into(),
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
        };

        // Registered before the task starts so its guard always finds the entry
        self.inner.tasks.lock().insert(handle.id, handle.clone());

        let guard = CompletionGuard {
            inner: Arc::clone(&self.inner),
            id: handle.id,
            done: handle.done.clone(),
        };
        let work = work(handle.cancel.clone());
        let session_id = handle.session_id.clone();

        tokio::spawn(async move {
            let _guard = guard;
            match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(())) => debug!("Task for session {} completed", session_id),
                Ok(Err(e)) => warn!("Task for session {} failed: {:#}", session_id, e),
                Err(_) => error!("Task for session {} panicked", session_id),
            }
        });

        handle
    }

    pub fn len(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tasks.lock().is_empty()
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.inner
            .tasks
            .lock()
            .values()
            .any(|task| task.session_id == session_id)
    }

    /// Copy of all outstanding task handles
    pub fn snapshot(&self) -> Vec<TaskHandle> {
        self.inner.tasks.lock().values().cloned().collect()
    }

    /// Request cancellation of every tracked task; returns how many were signalled
    pub fn cancel_all(&self) -> usize {
        let tasks = self.snapshot();
        for task in &tasks {
            task.cancel();
        }
        tasks.len()
    }

    /// Cancel the task bound to `session_id`, if any
    pub fn cancel_session(&self, session_id: &str) -> bool {
        let tasks: Vec<TaskHandle> = self
            .snapshot()
            .into_iter()
            .filter(|task| task.session_id == session_id)
            .collect();
        for task in &tasks {
            task.cancel();
        }
        !tasks.is_empty()
    }

    /// Stop tracking every task without waiting for them
    pub fn clear(&self) -> usize {
        let mut tasks = self.inner.tasks.lock();
        let count = tasks.len();
        tasks.clear();
        count
    }
}
