//! Job lifecycle engine.
//!
//! The engine owns the submit/trigger/status/download operations. A
//! trigger flips a pending job to `processing` and hands the rest of the
//! work to a spawned run (see [`run`]); callers observe progress by
//! polling [`JobEngine::status`].

mod cost;
mod error;
mod registry;
mod run;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, info_span, warn, Instrument};

use crate::blob::{content_type_for, BlobStore, FileBlobStore, SignedReference};
use crate::classify::{ArtifactClassifier, ExtensionClassifier, Submission};
use crate::config::Config;
use crate::db::{default_database_path, Database};
use crate::error::ConfigError;
use crate::job::{Job, JobId, JobStatus};
use crate::repository::{
    JobPage, JobRepository, ListQuery, MemoryJobRepository, SqliteJobRepository,
};
use crate::transform::{build_transformer, Transformer};

pub use cost::{CostError, CostPolicy, FixedCost, DEFAULT_CREDIT_COST};
pub use error::{CollaboratorError, EngineError, RunStep};
pub use registry::RunRegistry;

/// Limits applied by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_concurrent_runs: usize,
    /// Upper bound for one provider call; `None` waits indefinitely.
    pub transform_timeout: Option<Duration>,
    pub max_upload_bytes: u64,
    pub max_page_size: u32,
    pub download_ttl: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent_runs: config.engine.max_concurrent_runs.max(1),
            transform_timeout: Some(Duration::from_secs(config.engine.transform_timeout_secs)),
            max_upload_bytes: config.engine.max_upload_bytes,
            max_page_size: config.engine.max_page_size,
            download_ttl: Duration::from_secs(config.storage.sign_ttl_secs),
        }
    }
}

/// Immediate answer to a trigger. The run itself continues in the
/// background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerReceipt {
    pub job_id: JobId,
    pub status: JobStatus,
}

pub(crate) struct EngineInner {
    repository: Arc<dyn JobRepository>,
    blobs: Arc<dyn BlobStore>,
    transformer: Arc<dyn Transformer>,
    cost: Arc<dyn CostPolicy>,
    classifier: Arc<dyn ArtifactClassifier>,
    settings: EngineSettings,
    permits: Arc<Semaphore>,
    registry: RunRegistry,
}

/// Cheap to clone; clones share collaborators and the run registry.
#[derive(Clone)]
pub struct JobEngine {
    inner: Arc<EngineInner>,
}

pub struct JobEngineBuilder {
    repository: Arc<dyn JobRepository>,
    blobs: Arc<dyn BlobStore>,
    transformer: Arc<dyn Transformer>,
    cost: Arc<dyn CostPolicy>,
    classifier: Arc<dyn ArtifactClassifier>,
    settings: EngineSettings,
}

impl JobEngineBuilder {
    pub fn cost_policy(mut self, cost: Arc<dyn CostPolicy>) -> Self {
        self.cost = cost;
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn ArtifactClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> JobEngine {
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_runs.max(1)));
        JobEngine {
            inner: Arc::new(EngineInner {
                repository: self.repository,
                blobs: self.blobs,
                transformer: self.transformer,
                cost: self.cost,
                classifier: self.classifier,
                settings: self.settings,
                permits,
                registry: RunRegistry::default(),
            }),
        }
    }
}

impl JobEngine {
    pub fn builder(
        repository: Arc<dyn JobRepository>,
        blobs: Arc<dyn BlobStore>,
        transformer: Arc<dyn Transformer>,
    ) -> JobEngineBuilder {
        JobEngineBuilder {
            repository,
            blobs,
            transformer,
            cost: Arc::new(FixedCost::default()),
            classifier: Arc::new(ExtensionClassifier),
            settings: EngineSettings::default(),
        }
    }

    /// Wires the engine from configuration: SQLite (or in-memory) jobs,
    /// on-disk blobs and the configured provider.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let repository: Arc<dyn JobRepository> = if config.database.in_memory {
            Arc::new(MemoryJobRepository::new())
        } else {
            let path = match &config.database.path {
                Some(path) => path.clone(),
                None => default_database_path().ok_or_else(|| ConfigError::Validation {
                    message: "database.path is not set and no home directory was found"
                        .to_string(),
                })?,
            };
            Arc::new(SqliteJobRepository::new(Database::open(&path)?))
        };

        let blobs = Arc::new(FileBlobStore::new(
            &config.storage.root,
            config.storage.public_base_url.clone(),
        ));
        let transformer = build_transformer(&config.provider)?;

        info!(
            provider = transformer.name(),
            max_concurrent_runs = config.engine.max_concurrent_runs,
            "Job engine configured"
        );

        Ok(Self::builder(repository, blobs, transformer)
            .cost_policy(Arc::new(FixedCost(config.engine.credit_cost)))
            .settings(EngineSettings::from(config))
            .build())
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Stores the artifact and records a `pending` job for it.
    pub async fn submit(&self, submission: Submission) -> Result<Job, EngineError> {
        submission.validate(self.inner.settings.max_upload_bytes)?;

        let Submission {
            owner_id,
            filename,
            size,
            content,
            artifact_type,
        } = submission;

        let handle = self
            .inner
            .blobs
            .upload(&content, &filename, &content_type_for(&filename))
            .await
            .map_err(|e| EngineError::collaborator(RunStep::StoreOriginal, e))?;

        let job = Job::new(owner_id, artifact_type, filename, size, handle);
        if let Err(e) = self.inner.repository.create(&job) {
            if let Err(cleanup) = self.inner.blobs.delete(job.original_handle()).await {
                warn!(
                    handle = job.original_handle(),
                    error = %cleanup,
                    "Failed to remove orphaned upload"
                );
            }
            return Err(EngineError::Persistence(e));
        }

        info!(
            job_id = %job.id(),
            owner_id = job.owner_id(),
            artifact_type = job.artifact_type(),
            size = job.original_size(),
            "Job submitted"
        );
        Ok(job)
    }

    /// Classifies the artifact, then submits it.
    pub async fn submit_detected(
        &self,
        owner_id: impl Into<String>,
        filename: impl Into<String>,
        content: Vec<u8>,
    ) -> Result<Job, EngineError> {
        let filename = filename.into();
        let artifact_type = self.inner.classifier.classify(&filename, &content);
        self.submit(Submission::new(owner_id, filename, content, artifact_type))
            .await
    }

    pub fn status(&self, job_id: &JobId) -> Result<Job, EngineError> {
        Ok(self.inner.repository.get(job_id)?)
    }

    /// Moves a pending job to `processing` and starts its run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger(
        &self,
        job_id: &JobId,
        directive: impl Into<String>,
    ) -> Result<TriggerReceipt, EngineError> {
        let directive = directive.into();

        let job = match self.inner.repository.claim_pending(job_id, &directive)? {
            Some(job) => job,
            None => {
                let current = self.inner.repository.get(job_id)?;
                return Err(EngineError::InvalidState {
                    job_id: job_id.clone(),
                    status: current.status(),
                    operation: "trigger",
                });
            }
        };

        info!(job_id = %job_id, "Job triggered");

        let span = info_span!("run", job_id = %job_id);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(inner.execute(job, directive).instrument(span));
        self.inner.registry.insert(job_id.clone(), handle);

        Ok(TriggerReceipt {
            job_id: job_id.clone(),
            status: JobStatus::Processing,
        })
    }

    /// Time-limited reference to the processed artifact.
    pub async fn download_reference(&self, job_id: &JobId) -> Result<SignedReference, EngineError> {
        let job = self.status(job_id)?;
        let handle = match (job.status(), job.processed_handle()) {
            (JobStatus::Completed, Some(handle)) => handle,
            (status, _) => {
                return Err(EngineError::InvalidState {
                    job_id: job_id.clone(),
                    status,
                    operation: "download",
                })
            }
        };

        self.inner
            .blobs
            .sign(handle, self.inner.settings.download_ttl)
            .await
            .map_err(|e| EngineError::collaborator(RunStep::SignDownload, e))
    }

    /// An owner's jobs, newest first. `page` is 1-based.
    pub fn list_jobs(
        &self,
        owner_id: &str,
        page: u32,
        page_size: u32,
        status: Option<JobStatus>,
    ) -> Result<JobPage, EngineError> {
        if owner_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("owner id must not be empty".to_string()));
        }
        if page == 0 {
            return Err(EngineError::InvalidInput("page starts at 1".to_string()));
        }
        let max = self.inner.settings.max_page_size;
        if page_size == 0 || page_size > max {
            return Err(EngineError::InvalidInput(format!(
                "page size must be between 1 and {}",
                max
            )));
        }

        let mut query = ListQuery::new(owner_id, page, page_size);
        query.status = status;
        self.inner
            .repository
            .list(&query)
            .map_err(EngineError::Persistence)
    }

    /// Waits for the run of `job_id`. Returns `false` when no run is
    /// tracked for it.
    pub async fn wait_for(&self, job_id: &JobId) -> bool {
        match self.inner.registry.take(job_id) {
            Some(handle) => {
                if let Err(e) = handle.await {
                    warn!(job_id = %job_id, error = %e, "Run task ended abnormally");
                }
                true
            }
            None => false,
        }
    }

    /// Waits for every tracked run and returns how many were awaited.
    pub async fn drain(&self) -> usize {
        let runs = self.inner.registry.take_all();
        let count = runs.len();
        let results =
            futures_util::future::join_all(runs.into_iter().map(|(id, handle)| async move {
                (id, handle.await)
            }))
            .await;
        for (job_id, result) in results {
            if let Err(e) = result {
                warn!(job_id = %job_id, error = %e, "Run task ended abnormally");
            }
        }
        count
    }

    /// Runs currently executing or waiting for a slot.
    pub fn in_flight(&self) -> usize {
        self.inner.registry.in_flight()
    }
}
