//! Registry of running upload actor tasks
//!
//! The supervisor spawns every actor through this registry so it can release
//! an actor explicitly once it is removed from the session, and abort all of
//! them on shutdown.

use crate::model::upload_file::ItemId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

/// Tracks actor tasks by the item they own
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<ItemId, AbortHandle>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistry::default()
    }

    /// Spawn a tracked task for `item`; the entry is dropped when the task ends
    pub async fn spawn_tracked<F>(&self, item: ItemId, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tasks_cleanup = self.tasks.clone();

        // Hold the lock across the spawn so a task that finishes immediately
        // cannot remove its entry before it has been inserted.
        let mut tasks = self.tasks.lock().await;
        let join_handle = tokio::spawn(async move {
            future.await;
            tasks_cleanup.lock().await.remove(&item);
        });

        if let Some(previous) = tasks.insert(item, join_handle.abort_handle()) {
            tracing::warn!("Replacing task still registered for {}", item);
            previous.abort();
        }
    }

    /// Abort the task of `item`
    ///
    /// Returns true if the task was still registered.
    pub async fn stop(&self, item: ItemId) -> bool {
        match self.tasks.lock().await.remove(&item) {
            Some(abort_handle) => {
                abort_handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every running task, returning how many were still registered
    pub async fn stop_all(&self) -> usize {
        let mut tasks = self.tasks.lock().await;
        let count = tasks.len();
        for (_, abort_handle) in tasks.drain() {
            abort_handle.abort();
        }
        count
    }
}
