#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use modforge::engine::EngineSettings;
use modforge::{
    Job, JobEngine, JobId, JobRepository, MemoryBlobStore, MemoryJobRepository, Submission,
    Transformer,
};

pub const MOD_JSON: &[u8] = br#"{"minecraft:diamond":1}"#;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const POLL_LIMIT: Duration = Duration::from_secs(10);

pub struct Harness {
    pub engine: JobEngine,
    pub repository: Arc<MemoryJobRepository>,
    pub blobs: Arc<MemoryBlobStore>,
}

pub fn harness(transformer: impl Transformer + 'static) -> Harness {
    harness_with(transformer, EngineSettings::default())
}

pub fn harness_with(transformer: impl Transformer + 'static, settings: EngineSettings) -> Harness {
    let repository = Arc::new(MemoryJobRepository::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let engine = JobEngine::builder(repository.clone(), blobs.clone(), Arc::new(transformer))
        .settings(settings)
        .build();
    Harness {
        engine,
        repository,
        blobs,
    }
}

/// Engine over a caller-supplied repository.
pub fn engine_over(
    repository: Arc<dyn JobRepository>,
    blobs: Arc<MemoryBlobStore>,
    transformer: impl Transformer + 'static,
) -> JobEngine {
    JobEngine::builder(repository, blobs, Arc::new(transformer)).build()
}

/// The upload used throughout: a small Minecraft JSON with a declared size
/// that differs from its byte length.
pub fn mod_submission(owner: &str) -> Submission {
    Submission::new(owner, "mod.json", MOD_JSON.to_vec(), "minecraft").with_declared_size(120)
}

/// Polls until the job is terminal, as a client would.
pub async fn wait_terminal(engine: &JobEngine, job_id: &JobId) -> Job {
    let deadline = tokio::time::Instant::now() + POLL_LIMIT;
    loop {
        let job = engine.status(job_id).expect("job should exist");
        if job.is_finished() {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {} still {} after {:?}",
            job_id,
            job.status(),
            POLL_LIMIT
        );
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
