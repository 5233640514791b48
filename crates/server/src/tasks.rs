//! Tracked background work.
//!
//! Work that outlives its request (activation delivery) is spawned through
//! [`BackgroundTasks`] so graceful shutdown can wait for it to finish.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio_util::task::TaskTracker;

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` on the runtime under the tracker.
    ///
    /// A panic inside `fut` is logged with `name` and does not take the
    /// process down.
    pub fn spawn<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            tracing::warn!(task = name, "Background task spawned after shutdown began");
        }
        self.tracker.spawn(async move {
            if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
                tracing::error!(task = name, "Background task panicked");
            }
        });
    }

    /// Stop counting on new work. Tasks spawned afterwards still run.
    pub fn close(&self) {
        self.tracker.close();
    }

    /// Resolves once the tracker is closed and every task has finished.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }
}
