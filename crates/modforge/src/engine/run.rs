//! Background part of a trigger: fetch, transform, store, charge, record.

use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};

use super::{CollaboratorError, EngineError, EngineInner, RunStep};
use crate::blob::content_type_for;
use crate::job::{CompletedOutput, Job, JobId};
use crate::transform::TransformRequest;

/// Name under which the processed artifact is uploaded.
fn processed_name(job: &Job) -> String {
    let base = job
        .original_handle()
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(job.original_filename());
    format!("processed_{}_{}", job.id(), base)
}

impl EngineInner {
    /// Runs one job to a terminal state. Runs inside the `run` span set up
    /// by the trigger.
    pub(super) async fn execute(self: Arc<Self>, job: Job, directive: String) {
        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.record_failure(job.id(), "run aborted: engine is shutting down".to_string());
                return;
            }
        };
        debug!(provider = self.transformer.name(), "Run started");

        match self.perform(&job, directive).await {
            Ok(output) => self.record_success(job.id(), output),
            Err(e) => {
                warn!(error = %e, "Run failed");
                self.record_failure(job.id(), e.to_string());
            }
        }
    }

    async fn perform(&self, job: &Job, directive: String) -> Result<CompletedOutput, EngineError> {
        let content = self
            .blobs
            .download(job.original_handle())
            .instrument(info_span!("fetch_original"))
            .await
            .map_err(|e| EngineError::collaborator(RunStep::FetchOriginal, e))?;

        let request = TransformRequest::new(content, directive, job.artifact_type())
            .with_substitution("filename", job.original_filename())
            .with_substitution("artifact_type", job.artifact_type());

        let call = self
            .transformer
            .transform(&request)
            .instrument(info_span!("transform", provider = self.transformer.name()));
        let transformed = match self.settings.transform_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(EngineError::collaborator(
                        RunStep::Transform,
                        CollaboratorError::Timeout(limit),
                    ))
                }
            },
            None => call.await,
        };
        let output = transformed.map_err(|e| EngineError::collaborator(RunStep::Transform, e))?;

        let name = processed_name(job);
        let processed_handle = self
            .blobs
            .upload(&output.content, &name, &content_type_for(job.original_filename()))
            .instrument(info_span!("store_processed"))
            .await
            .map_err(|e| EngineError::collaborator(RunStep::StoreProcessed, e))?;

        let credits_used = {
            let _span = info_span!("compute_cost").entered();
            self.cost
                .credits_for(job.artifact_type(), &output)
                .map_err(|e| EngineError::collaborator(RunStep::ComputeCost, e))?
        };

        Ok(CompletedOutput {
            processed_handle,
            changelog: output.changelog,
            tokens_used: output.tokens_used,
            credits_used,
        })
    }

    /// Re-reads the job so concurrent writes are not clobbered, then
    /// completes it. On a persistence error the job stays `processing`.
    fn record_success(&self, job_id: &JobId, output: CompletedOutput) {
        let _span = info_span!("record_success").entered();

        let mut job = match self.repository.get(job_id) {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "Failed to load job after a successful run; it stays processing");
                return;
            }
        };
        let (tokens_used, credits_used) = (output.tokens_used, output.credits_used);
        if let Err(e) = job.complete(output) {
            warn!(error = %e, "Job changed state during its run; result discarded");
            return;
        }
        match self.repository.update(&mut job) {
            Ok(()) => info!(tokens_used, credits_used, "Job completed"),
            Err(e) => {
                error!(error = %e, "Failed to persist completed job; it stays processing")
            }
        }
    }

    /// Marks the job failed. Errors here are logged and dropped.
    fn record_failure(&self, job_id: &JobId, message: String) {
        let _span = info_span!("record_failure").entered();

        let mut job = match self.repository.get(job_id) {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, failure = %message, "Failed to load job to record its failure");
                return;
            }
        };
        if let Err(e) = job.fail(message) {
            warn!(error = %e, "Job changed state during its run; failure not recorded");
            return;
        }
        if let Err(e) = self.repository.update(&mut job) {
            error!(error = %e, "Failed to persist job failure");
        }
    }
}
