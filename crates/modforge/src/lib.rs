pub mod blob;
pub mod classify;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod job;
pub mod repository;
pub mod secrets;
pub mod telemetry;
pub mod transform;

pub use blob::{BlobError, BlobStore, FileBlobStore, MemoryBlobStore, SignedReference};
pub use classify::{ArtifactClassifier, ExtensionClassifier, Submission, SubmissionError};
pub use config::{load_config, load_config_from_str, Config};
pub use engine::{
    CostError, CostPolicy, EngineError, EngineSettings, FixedCost, JobEngine, RunStep,
    TriggerReceipt,
};
pub use error::{ConfigError, ForgeError, Result};
pub use job::{CompletedOutput, Job, JobId, JobState, JobStatus};
pub use repository::{
    JobPage, JobRepository, ListQuery, MemoryJobRepository, RepositoryError, SqliteJobRepository,
};
pub use secrets::{resolve_secret, SecretError};
pub use transform::{
    build_transformer, OpenAiTransformer, StubTransformer, TransformError, TransformOutput,
    TransformRequest, Transformer,
};
