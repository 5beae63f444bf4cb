use std::collections::HashMap;
use std::sync::RwLock;

use super::{JobPage, JobRepository, ListQuery, RepositoryError};
use crate::job::{self, Job, JobId, JobStatus};

struct Entry {
    seq: u64,
    job: Job,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    jobs: HashMap<JobId, Entry>,
}

/// Process-local [`JobRepository`]. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryJobRepository {
    inner: RwLock<Inner>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobRepository for MemoryJobRepository {
    fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        if inner.jobs.contains_key(job.id()) {
            return Err(RepositoryError::AlreadyExists(job.id().clone()));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.jobs.insert(
            job.id().clone(),
            Entry {
                seq,
                job: job.clone(),
            },
        );
        Ok(())
    }

    fn get(&self, id: &JobId) -> Result<Job, RepositoryError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        inner
            .jobs
            .get(id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))
    }

    fn update(&self, job: &mut Job) -> Result<(), RepositoryError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let entry = inner
            .jobs
            .get_mut(job.id())
            .ok_or_else(|| RepositoryError::NotFound(job.id().clone()))?;
        job.mark_updated(job::now());
        entry.job = job.clone();
        Ok(())
    }

    fn claim_pending(&self, id: &JobId, directive: &str) -> Result<Option<Job>, RepositoryError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let entry = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))?;
        if entry.job.status() != JobStatus::Pending {
            return Ok(None);
        }
        let mut job = entry.job.clone();
        if job.begin_processing(directive).is_err() {
            return Ok(None);
        }
        job.mark_updated(job::now());
        entry.job = job.clone();
        Ok(Some(job))
    }

    fn list(&self, query: &ListQuery) -> Result<JobPage, RepositoryError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let mut matching: Vec<&Entry> = inner
            .jobs
            .values()
            .filter(|e| e.job.owner_id() == query.owner_id)
            .filter(|e| query.status.map_or(true, |s| e.job.status() == s))
            .collect();
        matching.sort_by(|a, b| {
            b.job
                .created_at()
                .cmp(&a.job.created_at())
                .then(b.seq.cmp(&a.seq))
        });

        let total = matching.len() as u64;
        let jobs = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.page_size as usize)
            .map(|e| e.job.clone())
            .collect();
        Ok(JobPage { jobs, total })
    }
}
