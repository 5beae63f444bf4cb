//! Job repository: row-level operations on the `jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub id: String,
    pub owner_id: String,
    pub status: String,
    pub artifact_type: String,
    pub original_filename: String,
    pub original_size: i64,
    pub original_handle: String,
    pub processed_handle: Option<String>,
    pub directive: Option<String>,
    pub changelog: Option<String>,
    pub tokens_used: Option<i64>,
    pub credits_used: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            status: row.get("status")?,
            artifact_type: row.get("artifact_type")?,
            original_filename: row.get("original_filename")?,
            original_size: row.get("original_size")?,
            original_handle: row.get("original_handle")?,
            processed_handle: row.get("processed_handle")?,
            directive: row.get("directive")?,
            changelog: row.get("changelog")?,
            tokens_used: row.get("tokens_used")?,
            credits_used: row.get("credits_used")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub owner_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, owner_id, status, artifact_type, original_filename,
             original_size, original_handle, processed_handle, directive, changelog,
             tokens_used, credits_used, error_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                job.id,
                job.owner_id,
                job.status,
                job.artifact_type,
                job.original_filename,
                job.original_size,
                job.original_handle,
                job.processed_handle,
                job.directive,
                job.changelog,
                job.tokens_used,
                job.credits_used,
                job.error_message,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Overwrites every mutable column of an existing row. Returns the number of
/// rows touched (0 when the id is unknown).
pub fn update(db: &Database, job: &JobRow) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET owner_id=?2, status=?3, artifact_type=?4, original_filename=?5,
             original_size=?6, original_handle=?7, processed_handle=?8, directive=?9,
             changelog=?10, tokens_used=?11, credits_used=?12, error_message=?13,
             updated_at=?14
             WHERE id=?1",
            params![
                job.id,
                job.owner_id,
                job.status,
                job.artifact_type,
                job.original_filename,
                job.original_size,
                job.original_handle,
                job.processed_handle,
                job.directive,
                job.changelog,
                job.tokens_used,
                job.credits_used,
                job.error_message,
                job.updated_at,
            ],
        )?;
        Ok(changed)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Queries jobs with filters, newest first, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref owner_id) = filter.owner_id {
            conditions.push(format!("owner_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(owner_id.clone()));
        }
        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        // rowid breaks ties between jobs created in the same microsecond.
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC, rowid DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Moves a job from `pending` to `processing` in one statement.
///
/// Returns the number of rows changed: 1 if this call won, 0 if the job is
/// missing or has already left `pending`.
pub fn claim_pending(
    db: &Database,
    id: &str,
    directive: &str,
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'processing', directive = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'pending'",
            params![id, directive, updated_at],
        )?;
        Ok(changed)
    })
}
