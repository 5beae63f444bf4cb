use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CompletedOutput, Job, JobId, JobState, JobStatus};

/// Flat, field-per-attribute view of a [`Job`].
///
/// This is the shape written to JSON and to storage rows. Converting back
/// into a `Job` checks that the optional fields agree with the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub owner_id: String,
    pub status: JobStatus,
    pub artifact_type: String,
    pub original_filename: String,
    pub original_size: u64,
    pub original_handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A record whose fields contradict its status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid record for job {id}: {reason}")]
pub struct InvalidRecord {
    pub id: JobId,
    pub reason: String,
}

impl From<Job> for JobRecord {
    fn from(job: Job) -> Self {
        let status = job.status();
        let (processed_handle, changelog, tokens_used, credits_used, error_message) =
            match job.state {
                JobState::Pending | JobState::Processing => (None, None, None, None, None),
                JobState::Completed(output) => (
                    Some(output.processed_handle),
                    Some(output.changelog),
                    Some(output.tokens_used),
                    Some(output.credits_used),
                    None,
                ),
                JobState::Failed { error } => (None, None, None, None, Some(error)),
            };

        Self {
            id: job.id,
            owner_id: job.owner_id,
            status,
            artifact_type: job.artifact_type,
            original_filename: job.original_filename,
            original_size: job.original_size,
            original_handle: job.original_handle,
            processed_handle,
            directive: job.directive,
            changelog,
            tokens_used,
            credits_used,
            error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

impl TryFrom<JobRecord> for Job {
    type Error = InvalidRecord;

    fn try_from(record: JobRecord) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| InvalidRecord {
            id: record.id.clone(),
            reason: reason.to_string(),
        };

        if record.updated_at < record.created_at {
            return Err(invalid("updated_at precedes created_at"));
        }

        let has_outcome = record.processed_handle.is_some()
            || record.changelog.is_some()
            || record.tokens_used.is_some()
            || record.credits_used.is_some();

        let state = match record.status {
            JobStatus::Pending | JobStatus::Processing => {
                if has_outcome || record.error_message.is_some() {
                    return Err(invalid("unfinished job carries outcome fields"));
                }
                if record.status == JobStatus::Pending {
                    JobState::Pending
                } else {
                    JobState::Processing
                }
            }
            JobStatus::Completed => {
                if record.error_message.is_some() {
                    return Err(invalid("completed job carries an error message"));
                }
                match (
                    record.processed_handle.clone(),
                    record.changelog.clone(),
                    record.tokens_used,
                    record.credits_used,
                ) {
                    (Some(processed_handle), Some(changelog), Some(tokens_used), Some(credits_used)) => {
                        JobState::Completed(CompletedOutput {
                            processed_handle,
                            changelog,
                            tokens_used,
                            credits_used,
                        })
                    }
                    _ => return Err(invalid("completed job is missing outcome fields")),
                }
            }
            JobStatus::Failed => {
                if has_outcome {
                    return Err(invalid("failed job carries outcome fields"));
                }
                match record.error_message.clone() {
                    Some(error) => JobState::Failed { error },
                    None => return Err(invalid("failed job has no error message")),
                }
            }
        };

        Ok(Job {
            id: record.id,
            owner_id: record.owner_id,
            artifact_type: record.artifact_type,
            original_filename: record.original_filename,
            original_size: record.original_size,
            original_handle: record.original_handle,
            directive: record.directive,
            state,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_job() -> Job {
        let mut job = Job::new("u1", "minecraft", "mod.json", 120, "mem://a/mod.json");
        job.begin_processing("make it legendary").unwrap();
        job.complete(CompletedOutput {
            processed_handle: "mem://b/processed.json".to_string(),
            changelog: "netherite everywhere".to_string(),
            tokens_used: 100,
            credits_used: 2,
        })
        .unwrap();
        job
    }

    #[test]
    fn test_pending_json_omits_outcome_fields() {
        let job = Job::new("u1", "minecraft", "mod.json", 120, "mem://a/mod.json");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["originalFilename"], "mod.json");
        assert!(json.get("processedHandle").is_none());
        assert!(json.get("errorMessage").is_none());
        assert!(json.get("directive").is_none());

        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn test_completed_json_round_trip() {
        let job = completed_job();
        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
        assert_eq!(back.output().unwrap().tokens_used, 100);
    }

    #[test]
    fn test_failed_record_requires_error() {
        let mut record = JobRecord::from(Job::new("u1", "lua", "init.lua", 3, "h"));
        record.status = JobStatus::Failed;
        let err = Job::try_from(record.clone()).unwrap_err();
        assert!(err.reason.contains("no error message"));

        record.error_message = Some("boom".to_string());
        let job = Job::try_from(record).unwrap();
        assert_eq!(job.error_message(), Some("boom"));
    }

    #[test]
    fn test_completed_record_requires_all_outcome_fields() {
        let mut record = JobRecord::from(completed_job());
        record.tokens_used = None;
        assert!(Job::try_from(record).is_err());
    }

    #[test]
    fn test_handle_and_error_are_exclusive() {
        let mut record = JobRecord::from(completed_job());
        record.error_message = Some("also failed?".to_string());
        assert!(Job::try_from(record).is_err());

        let mut record = JobRecord::from(Job::new("u1", "lua", "init.lua", 3, "h"));
        record.status = JobStatus::Processing;
        record.processed_handle = Some("early".to_string());
        assert!(Job::try_from(record).is_err());
    }

    #[test]
    fn test_timestamps_must_be_ordered() {
        let mut record = JobRecord::from(Job::new("u1", "lua", "init.lua", 3, "h"));
        record.updated_at = record.created_at - chrono::Duration::seconds(1);
        assert!(Job::try_from(record).is_err());
    }
}
