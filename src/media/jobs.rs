use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

/// Tracks in-flight analysis tasks so they can be cancelled by id.
/// An entry removes itself as soon as its task settles.
#[derive(Clone, Default)]
pub struct JobController {
    jobs: Arc<Mutex<HashMap<Uuid, AbortHandle>>>,
}

impl JobController {
    pub fn new() -> Self {
        JobController::default()
    }

    /// Spawns the work and registers it under a fresh job id. The table lock
    /// is held across the spawn so the task cannot observe a missing entry.
    pub async fn submit<F, T>(&self, work: F) -> (Uuid, JoinHandle<T>)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let id = Uuid::new_v4();
        let jobs = Arc::clone(&self.jobs);

        let mut table = self.jobs.lock().await;
        let handle = tokio::spawn(async move {
            // Removal must run even when the work panics.
            let result = AssertUnwindSafe(work).catch_unwind().await;
            jobs.lock().await.remove(&id);
            match result {
                Ok(result) => result,
                Err(panic) => resume_unwind(panic),
            }
        });
        table.insert(id, handle.abort_handle());
        drop(table);

        (id, handle)
    }

    /// Cancels a still-running job, reporting whether an abort was issued.
    /// An aborted task never reaches its own removal step, so the entry is
    /// taken out here. Not exposed over HTTP yet.
    #[allow(dead_code)]
    pub async fn cancel(&self, id: &Uuid) -> bool {
        match self.jobs.lock().await.remove(id) {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    #[allow(dead_code)]
    pub async fn active(&self) -> usize {
        self.jobs.lock().await.len()
    }
}
