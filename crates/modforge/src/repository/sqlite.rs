use chrono::{DateTime, SecondsFormat, Utc};

use super::{JobPage, JobRepository, ListQuery, RepositoryError};
use crate::db::job_repo::{self, JobFilter, JobRow};
use crate::db::{Database, DatabaseError};
use crate::job::{self, Job, JobId, JobRecord};

/// [`JobRepository`] backed by the `jobs` table.
#[derive(Clone)]
pub struct SqliteJobRepository {
    db: Database,
}

impl SqliteJobRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

// Fixed-width micros keep lexical order equal to chronological order.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidTimestamp {
            column,
            value: value.to_string(),
        })
}

fn to_row(job: &Job) -> Result<JobRow, RepositoryError> {
    let record = JobRecord::from(job.clone());
    let original_size =
        i64::try_from(record.original_size).map_err(|_| RepositoryError::Unstorable {
            id: job.id().clone(),
            reason: format!(
                "original size {} exceeds the SQLite integer range",
                record.original_size
            ),
        })?;
    Ok(JobRow {
        id: record.id.to_string(),
        owner_id: record.owner_id,
        status: record.status.as_str().to_string(),
        artifact_type: record.artifact_type,
        original_filename: record.original_filename,
        original_size,
        original_handle: record.original_handle,
        processed_handle: record.processed_handle,
        directive: record.directive,
        changelog: record.changelog,
        tokens_used: record.tokens_used.map(i64::from),
        credits_used: record.credits_used.map(i64::from),
        error_message: record.error_message,
        created_at: format_timestamp(record.created_at),
        updated_at: format_timestamp(record.updated_at),
    })
}

fn from_row(row: JobRow) -> Result<Job, RepositoryError> {
    let corrupt = |reason: String| RepositoryError::Corrupt {
        id: row.id.clone(),
        reason,
    };

    let status = row.status.parse().map_err(|e| corrupt(format!("{}", e)))?;
    let original_size = u64::try_from(row.original_size)
        .map_err(|_| corrupt(format!("negative size {}", row.original_size)))?;
    let tokens_used = row
        .tokens_used
        .map(u32::try_from)
        .transpose()
        .map_err(|_| corrupt("tokens_used out of range".to_string()))?;
    let credits_used = row
        .credits_used
        .map(u32::try_from)
        .transpose()
        .map_err(|_| corrupt("credits_used out of range".to_string()))?;
    let created_at = parse_timestamp("created_at", &row.created_at)?;
    let updated_at = parse_timestamp("updated_at", &row.updated_at)?;

    let record = JobRecord {
        id: JobId::from(row.id.clone()),
        owner_id: row.owner_id,
        status,
        artifact_type: row.artifact_type,
        original_filename: row.original_filename,
        original_size,
        original_handle: row.original_handle,
        processed_handle: row.processed_handle,
        directive: row.directive,
        changelog: row.changelog,
        tokens_used,
        credits_used,
        error_message: row.error_message,
        created_at,
        updated_at,
    };

    Job::try_from(record).map_err(|e| RepositoryError::Corrupt {
        id: e.id.to_string(),
        reason: e.reason,
    })
}

impl JobRepository for SqliteJobRepository {
    fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        job_repo::insert(&self.db, &to_row(job)?).map_err(|e| {
            if e.is_constraint_violation() {
                RepositoryError::AlreadyExists(job.id().clone())
            } else {
                RepositoryError::Database(e)
            }
        })?;
        log::debug!("Inserted job {} for owner {}", job.id(), job.owner_id());
        Ok(())
    }

    fn get(&self, id: &JobId) -> Result<Job, RepositoryError> {
        match job_repo::find_by_id(&self.db, id.as_str())? {
            Some(row) => from_row(row),
            None => Err(RepositoryError::NotFound(id.clone())),
        }
    }

    fn update(&self, job: &mut Job) -> Result<(), RepositoryError> {
        let mut next = job.clone();
        next.mark_updated(job::now());
        if job_repo::update(&self.db, &to_row(&next)?)? == 0 {
            return Err(RepositoryError::NotFound(job.id().clone()));
        }
        *job = next;
        Ok(())
    }

    fn claim_pending(&self, id: &JobId, directive: &str) -> Result<Option<Job>, RepositoryError> {
        let current = self.get(id)?;
        let at = current.updated_at().max(job::now());
        let changed =
            job_repo::claim_pending(&self.db, id.as_str(), directive, &format_timestamp(at))?;
        if changed == 0 {
            return Ok(None);
        }
        self.get(id).map(Some)
    }

    fn list(&self, query: &ListQuery) -> Result<JobPage, RepositoryError> {
        let filter = JobFilter {
            owner_id: Some(query.owner_id.clone()),
            status: query.status.map(|s| s.as_str().to_string()),
            limit: Some(u64::from(query.page_size)),
            offset: Some(query.offset()),
        };
        let (rows, total) = job_repo::query(&self.db, &filter)?;
        let jobs = rows
            .into_iter()
            .map(from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JobPage { jobs, total })
    }
}
