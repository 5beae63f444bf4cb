use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::blob::BlobError;
use crate::classify::SubmissionError;
use crate::engine::cost::CostError;
use crate::job::{JobId, JobStatus};
use crate::repository::RepositoryError;
use crate::transform::TransformError;

/// The collaborator call a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStep {
    StoreOriginal,
    FetchOriginal,
    Transform,
    StoreProcessed,
    ComputeCost,
    SignDownload,
}

impl RunStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStep::StoreOriginal => "store original",
            RunStep::FetchOriginal => "fetch original",
            RunStep::Transform => "transform",
            RunStep::StoreProcessed => "store processed",
            RunStep::ComputeCost => "compute cost",
            RunStep::SignDownload => "sign download",
        }
    }
}

impl fmt::Display for RunStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Cost(#[from] CostError),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{step} failed: {source}")]
    Collaborator {
        step: RunStep,
        #[source]
        source: CollaboratorError,
    },

    #[error("persistence failure: {0}")]
    Persistence(#[source] RepositoryError),

    #[error("cannot {operation} job {job_id} while it is {status}")]
    InvalidState {
        job_id: JobId,
        status: JobStatus,
        operation: &'static str,
    },
}

impl EngineError {
    pub(crate) fn collaborator(step: RunStep, source: impl Into<CollaboratorError>) -> Self {
        EngineError::Collaborator {
            step,
            source: source.into(),
        }
    }

    /// Stable category name, suitable for API responses and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::Collaborator { .. } => "collaborator_failure",
            EngineError::Persistence(_) => "persistence_failure",
            EngineError::InvalidState { .. } => "invalid_state",
        }
    }
}

impl From<SubmissionError> for EngineError {
    fn from(err: SubmissionError) -> Self {
        EngineError::InvalidInput(err.to_string())
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::Persistence(other),
        }
    }
}
