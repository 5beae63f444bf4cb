//! Job entity and its lifecycle rules.
//!
//! A job moves `pending → processing → completed | failed` and never back.
//! The terminal outcome lives in [`JobState`], so a processed handle and an
//! error detail can never be present at the same time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod record;

pub use record::{InvalidRecord, JobRecord};

/// Current time truncated to microseconds, the precision the database keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Opaque job identifier (UUID v4 text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generates a fresh identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Position in the lifecycle; both terminal states share the last rank.
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    /// Whether `self → next` is one of the lifecycle edges.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() == self.rank() + 1
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Fields produced by a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedOutput {
    /// Blob handle of the transformed artifact.
    pub processed_handle: String,
    /// Human-readable summary returned by the provider.
    pub changelog: String,
    /// Usage metric reported by the provider.
    pub tokens_used: u32,
    /// Credits charged for the run.
    pub credits_used: u32,
}

/// Where a job is in its lifecycle, together with the outcome data that is
/// only meaningful in that state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Processing,
    Completed(CompletedOutput),
    Failed { error: String },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Processing => JobStatus::Processing,
            JobState::Completed(_) => JobStatus::Completed,
            JobState::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move job {job_id} from {from} to {to}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A submitted artifact and everything known about its transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "JobRecord", try_from = "JobRecord")]
pub struct Job {
    id: JobId,
    owner_id: String,
    artifact_type: String,
    original_filename: String,
    original_size: u64,
    original_handle: String,
    directive: Option<String>,
    state: JobState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a new `pending` job for an artifact already stored under
    /// `original_handle`.
    pub fn new(
        owner_id: impl Into<String>,
        artifact_type: impl Into<String>,
        original_filename: impl Into<String>,
        original_size: u64,
        original_handle: impl Into<String>,
    ) -> Self {
        let created_at = now();
        Self {
            id: JobId::generate(),
            owner_id: owner_id.into(),
            artifact_type: artifact_type.into(),
            original_filename: original_filename.into(),
            original_size,
            original_handle: original_handle.into(),
            directive: None,
            state: JobState::Pending,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    pub fn original_handle(&self) -> &str {
        &self.original_handle
    }

    pub fn directive(&self) -> Option<&str> {
        self.directive.as_deref()
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn processed_handle(&self) -> Option<&str> {
        match &self.state {
            JobState::Completed(output) => Some(&output.processed_handle),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn output(&self) -> Option<&CompletedOutput> {
        match &self.state {
            JobState::Completed(output) => Some(output),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// `pending → processing`, recording the directive.
    pub fn begin_processing(&mut self, directive: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(JobState::Processing)?;
        self.directive = Some(directive.into());
        Ok(())
    }

    /// `processing → completed`.
    pub fn complete(&mut self, output: CompletedOutput) -> Result<(), TransitionError> {
        self.advance(JobState::Completed(output))
    }

    /// `processing → failed`.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(JobState::Failed {
            error: error.into(),
        })
    }

    fn advance(&mut self, next: JobState) -> Result<(), TransitionError> {
        let from = self.status();
        let to = next.status();
        if !from.can_advance_to(to) {
            return Err(TransitionError {
                job_id: self.id.clone(),
                from,
                to,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Advances the last-updated timestamp. Never moves it backwards.
    pub fn mark_updated(&mut self, at: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job::new("u1", "minecraft", "mod.json", 120, "mem://abc/mod.json")
    }

    fn sample_output() -> CompletedOutput {
        CompletedOutput {
            processed_handle: "mem://def/processed_mod.json".to_string(),
            changelog: "upgraded materials".to_string(),
            tokens_used: 100,
            credits_used: 2,
        }
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = sample_job();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.original_filename(), "mod.json");
        assert_eq!(job.original_size(), 120);
        assert!(job.directive().is_none());
        assert!(job.processed_handle().is_none());
        assert!(job.error_message().is_none());
        assert_eq!(job.created_at(), job.updated_at());
        assert!(!job.id().as_str().is_empty());
    }

    #[test]
    fn test_job_ids_are_unique() {
        assert_ne!(sample_job().id(), sample_job().id());
    }

    #[test]
    fn test_full_success_lifecycle() {
        let mut job = sample_job();
        job.begin_processing("make it legendary").unwrap();
        assert_eq!(job.status(), JobStatus::Processing);
        assert_eq!(job.directive(), Some("make it legendary"));
        assert!(job.processed_handle().is_none());

        job.complete(sample_output()).unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.processed_handle(), Some("mem://def/processed_mod.json"));
        assert!(job.error_message().is_none());
        assert!(job.is_finished());
    }

    #[test]
    fn test_failure_lifecycle() {
        let mut job = sample_job();
        job.begin_processing("x").unwrap();
        job.fail("transform failed").unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error_message(), Some("transform failed"));
        assert!(job.processed_handle().is_none());
    }

    #[test]
    fn test_cannot_skip_processing() {
        let mut job = sample_job();
        let err = job.complete(sample_output()).unwrap_err();
        assert_eq!(err.from, JobStatus::Pending);
        assert_eq!(err.to, JobStatus::Completed);
        assert!(job.fail("nope").is_err());
        assert_eq!(job.status(), JobStatus::Pending);
    }

    #[test]
    fn test_terminal_status_is_immutable() {
        let mut job = sample_job();
        job.begin_processing("x").unwrap();
        job.complete(sample_output()).unwrap();

        assert!(job.fail("late failure").is_err());
        assert!(job.begin_processing("again").is_err());
        assert!(job.complete(sample_output()).is_err());
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.directive(), Some("x"));
    }

    #[test]
    fn test_processing_cannot_restart() {
        let mut job = sample_job();
        job.begin_processing("first").unwrap();
        assert!(job.begin_processing("second").is_err());
        assert_eq!(job.directive(), Some("first"));
    }

    #[test]
    fn test_status_edges() {
        use JobStatus::*;
        assert!(Pending.can_advance_to(Processing));
        assert!(Processing.can_advance_to(Completed));
        assert!(Processing.can_advance_to(Failed));
        assert!(!Pending.can_advance_to(Completed));
        assert!(!Processing.can_advance_to(Pending));
        assert!(!Completed.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Completed));
    }

    #[test]
    fn test_status_parse() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert_eq!(
            "superseded".parse::<JobStatus>(),
            Err(UnknownStatus("superseded".to_string()))
        );
    }

    #[test]
    fn test_mark_updated_is_monotonic() {
        let mut job = sample_job();
        let before = job.updated_at();
        job.mark_updated(before - chrono::Duration::seconds(10));
        assert_eq!(job.updated_at(), before);

        let later = before + chrono::Duration::seconds(5);
        job.mark_updated(later);
        assert_eq!(job.updated_at(), later);
    }
}
