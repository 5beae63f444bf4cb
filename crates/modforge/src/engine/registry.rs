use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::job::JobId;

/// Join handles of spawned runs, keyed by job.
///
/// A trigger only succeeds for a pending job, so each job has at most one
/// run over its lifetime.
#[derive(Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<JobId, JoinHandle<()>>>,
}

impl RunRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, JoinHandle<()>>> {
        // A panic while holding the lock cannot leave the map inconsistent.
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tracks a run, dropping handles of runs that already finished.
    pub fn insert(&self, job_id: JobId, handle: JoinHandle<()>) {
        let mut runs = self.lock();
        runs.retain(|_, h| !h.is_finished());
        runs.insert(job_id, handle);
    }

    pub fn take(&self, job_id: &JobId) -> Option<JoinHandle<()>> {
        self.lock().remove(job_id)
    }

    pub fn take_all(&self) -> Vec<(JobId, JoinHandle<()>)> {
        self.lock().drain().collect()
    }

    /// Number of tracked runs still executing.
    pub fn in_flight(&self) -> usize {
        self.lock().values().filter(|h| !h.is_finished()).count()
    }
}
