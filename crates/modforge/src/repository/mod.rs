//! Durable storage for [`Job`] records.
//!
//! The engine only talks to the [`JobRepository`] trait. The SQLite
//! implementation backs the CLI; the in-memory one backs tests and
//! throwaway runs.

use thiserror::Error;

use crate::db::DatabaseError;
use crate::job::{Job, JobId, JobStatus};

mod memory;
mod sqlite;

pub use memory::MemoryJobRepository;
pub use sqlite::SqliteJobRepository;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {0} already exists")]
    AlreadyExists(JobId),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("stored job {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("job {id} cannot be stored: {reason}")]
    Unstorable { id: JobId, reason: String },

    #[error("repository lock poisoned")]
    LockPoisoned,
}

/// One page of an owner's jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub owner_id: String,
    pub status: Option<JobStatus>,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl ListQuery {
    pub fn new(owner_id: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self {
            owner_id: owner_id.into(),
            status: None,
            page,
            page_size,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Result of [`JobRepository::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPage {
    /// Jobs on this page, newest first.
    pub jobs: Vec<Job>,
    /// Number of jobs matching the query across all pages.
    pub total: u64,
}

/// Storage contract for jobs.
///
/// Every call is atomic with respect to a single job. Concurrent callers
/// see each other's committed writes.
pub trait JobRepository: Send + Sync {
    /// Persists a new job. Fails with `AlreadyExists` on an id collision.
    fn create(&self, job: &Job) -> Result<(), RepositoryError>;

    fn get(&self, id: &JobId) -> Result<Job, RepositoryError>;

    /// Writes every mutable field of `job` and refreshes its last-updated
    /// timestamp (on `job` as well as in storage).
    fn update(&self, job: &mut Job) -> Result<(), RepositoryError>;

    /// Atomically moves a `pending` job to `processing` with `directive`.
    ///
    /// Returns the updated job, or `None` when the job exists but is no
    /// longer pending.
    fn claim_pending(&self, id: &JobId, directive: &str) -> Result<Option<Job>, RepositoryError>;

    fn list(&self, query: &ListQuery) -> Result<JobPage, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_offset() {
        assert_eq!(ListQuery::new("u", 1, 20).offset(), 0);
        assert_eq!(ListQuery::new("u", 3, 20).offset(), 40);
        assert_eq!(ListQuery::new("u", 0, 20).offset(), 0);
    }

    #[test]
    fn test_list_query_status_builder() {
        let query = ListQuery::new("u", 1, 5).with_status(JobStatus::Failed);
        assert_eq!(query.status, Some(JobStatus::Failed));
    }
}
