//! Scoped background tasks.
//!
//! Work spawned here may outlive the response that scheduled it, but the
//! owner must call [`BackgroundTasks::drain`] before shutting down so every
//! task either finishes or is explicitly aborted.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        // A panic while holding the guard cannot leave the set inconsistent
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn a task tracked until [`drain`](Self::drain).
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        // Reap finished tasks so the set does not grow without bound
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
        debug!(task = name, pending = tasks.len(), "Spawned background task");
    }

    /// Number of tasks not yet reaped.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait up to `timeout` for every task, then abort the rest.
    ///
    /// Returns the number of tasks that were aborted.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.lock());
        if tasks.is_empty() {
            return 0;
        }

        let waiting = tasks.len();
        let finished = tokio::time::timeout(timeout, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!("Background task failed: {}", e);
                }
            }
        })
        .await;

        match finished {
            Ok(()) => {
                debug!(tasks = waiting, "Background tasks drained");
                0
            }
            Err(_) => {
                let aborted = tasks.len();
                warn!(aborted, "Background tasks did not finish in time, aborting");
                tasks.shutdown().await;
                aborted
            }
        }
    }
}
