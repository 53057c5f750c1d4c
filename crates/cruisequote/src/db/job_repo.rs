//! Job repository: row-level operations for the `import_jobs` table.
//!
//! Every status mutation is a single conditional UPDATE keyed on the
//! expected current status; callers read the affected-row count to learn
//! whether they won.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: i64,
    pub kind: String,
    pub status: String,
    pub original_filename: String,
    pub content_digest: Option<String>,
    pub byte_count: i64,
    pub stored_path: Option<String>,
    pub raw_text: Option<String>,
    pub idempotency_key: Option<String>,
    pub supplier_id: i64,
    pub model_id: String,
    pub prompt_id: String,
    pub result_summary: Option<String>,
    pub error_message: Option<String>,
    pub created_by: i64,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            kind: row.get("kind")?,
            status: row.get("status")?,
            original_filename: row.get("original_filename")?,
            content_digest: row.get("content_digest")?,
            byte_count: row.get("byte_count")?,
            stored_path: row.get("stored_path")?,
            raw_text: row.get("raw_text")?,
            idempotency_key: row.get("idempotency_key")?,
            supplier_id: row.get("supplier_id")?,
            model_id: row.get("model_id")?,
            prompt_id: row.get("prompt_id")?,
            result_summary: row.get("result_summary")?,
            error_message: row.get("error_message")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Columns supplied at submission time. Status starts as `pending`.
#[derive(Debug, Clone)]
pub struct NewJobRow {
    pub kind: String,
    pub original_filename: String,
    pub content_digest: Option<String>,
    pub byte_count: i64,
    pub stored_path: Option<String>,
    pub raw_text: Option<String>,
    pub idempotency_key: Option<String>,
    pub supplier_id: i64,
    pub model_id: String,
    pub prompt_id: String,
    pub created_by: i64,
    pub created_at: String,
}

/// Inserts a pending job and returns its id. A duplicate idempotency key
/// surfaces as `DatabaseError::UniqueViolation`.
pub fn insert(db: &Database, job: &NewJobRow) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO import_jobs (kind, status, original_filename, content_digest, byte_count,
             stored_path, raw_text, idempotency_key, supplier_id, model_id, prompt_id,
             created_by, created_at)
             VALUES (?1, 'pending', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                job.kind,
                job.original_filename,
                job.content_digest,
                job.byte_count,
                job.stored_path,
                job.raw_text,
                job.idempotency_key,
                job.supplier_id,
                job.model_id,
                job.prompt_id,
                job.created_by,
                job.created_at,
            ],
        )
        .map_err(DatabaseError::from_insert)?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM import_jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Finds the job bearing the given idempotency key.
pub fn find_by_idempotency_key(db: &Database, key: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM import_jobs WHERE idempotency_key = ?1",
                params![key],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Returns the pending job with the oldest `created_at` (ties broken by id).
pub fn oldest_pending(db: &Database) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM import_jobs WHERE status = 'pending'
                 ORDER BY created_at ASC, id ASC LIMIT 1",
                [],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// `pending → running`. Returns the number of rows changed (0 or 1).
pub fn mark_started(db: &Database, id: i64, started_at: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE import_jobs SET status = 'running', started_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, started_at],
        )?;
        Ok(changed)
    })
}

/// `running → status`, writing summary, error and completion time in one
/// statement. Returns the number of rows changed (0 or 1).
pub fn mark_completed(
    db: &Database,
    id: i64,
    status: &str,
    result_summary: Option<&str>,
    error_message: Option<&str>,
    completed_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE import_jobs
             SET status = ?2, result_summary = ?3, error_message = ?4, completed_at = ?5
             WHERE id = ?1 AND status = 'running'",
            params![id, status, result_summary, error_message, completed_at],
        )?;
        Ok(changed)
    })
}

/// `needs-confirmation → status`. Returns the number of rows changed.
pub fn resolve_confirmation(
    db: &Database,
    id: i64,
    status: &str,
    error_message: Option<&str>,
    completed_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE import_jobs SET status = ?2, error_message = ?3, completed_at = ?4
             WHERE id = ?1 AND status = 'needs-confirmation'",
            params![id, status, error_message, completed_at],
        )?;
        Ok(changed)
    })
}

/// Moves every `running` job started before `cutoff` to `failed`.
pub fn fail_running_before(
    db: &Database,
    cutoff: &str,
    error_message: &str,
    completed_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE import_jobs SET status = 'failed', error_message = ?2, completed_at = ?3
             WHERE status = 'running' AND started_at < ?1",
            params![cutoff, error_message, completed_at],
        )?;
        Ok(changed)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM import_jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(created_at: &str) -> NewJobRow {
        NewJobRow {
            kind: "file-upload".to_string(),
            original_filename: "quote.docx".to_string(),
            content_digest: Some("ab".repeat(32)),
            byte_count: 2048,
            stored_path: Some("/uploads/quote_20260101000000.docx".to_string()),
            raw_text: None,
            idempotency_key: None,
            supplier_id: 7,
            model_id: "qwen-plus".to_string(),
            prompt_id: "quote-extract-v1".to_string(),
            created_by: 42,
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let id = insert(&db, &sample_job("2026-01-01T00:00:00.000000Z")).unwrap();

        let found = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(found.status, "pending");
        assert_eq!(found.original_filename, "quote.docx");
        assert_eq!(found.supplier_id, 7);
        assert!(found.started_at.is_none());
        assert!(found.result_summary.is_none());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, 999).unwrap().is_none());
        assert!(find_by_idempotency_key(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_idempotency_key_is_unique_violation() {
        let db = test_db();
        let mut job = sample_job("2026-01-01T00:00:00.000000Z");
        job.idempotency_key = Some("upload-1".to_string());
        let first = insert(&db, &job).unwrap();

        let err = insert(&db, &job).unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(_)));

        let found = find_by_idempotency_key(&db, "upload-1").unwrap().unwrap();
        assert_eq!(found.id, first);
    }

    #[test]
    fn test_oldest_pending_is_fifo() {
        let db = test_db();
        let later = insert(&db, &sample_job("2026-01-02T00:00:00.000000Z")).unwrap();
        let earlier = insert(&db, &sample_job("2026-01-01T00:00:00.000000Z")).unwrap();

        assert_eq!(oldest_pending(&db).unwrap().unwrap().id, earlier);

        mark_started(&db, earlier, "2026-01-03T00:00:00.000000Z").unwrap();
        assert_eq!(oldest_pending(&db).unwrap().unwrap().id, later);
    }

    #[test]
    fn test_mark_started_only_from_pending() {
        let db = test_db();
        let id = insert(&db, &sample_job("2026-01-01T00:00:00.000000Z")).unwrap();

        assert_eq!(mark_started(&db, id, "2026-01-01T00:01:00.000000Z").unwrap(), 1);
        assert_eq!(mark_started(&db, id, "2026-01-01T00:02:00.000000Z").unwrap(), 0);

        let found = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(found.status, "running");
        assert_eq!(
            found.started_at.as_deref(),
            Some("2026-01-01T00:01:00.000000Z")
        );
    }

    #[test]
    fn test_started_at_cannot_be_rewritten() {
        let db = test_db();
        let id = insert(&db, &sample_job("2026-01-01T00:00:00.000000Z")).unwrap();
        mark_started(&db, id, "2026-01-01T00:01:00.000000Z").unwrap();

        let result = db.with_conn(|conn| {
            conn.execute(
                "UPDATE import_jobs SET started_at = '2030-01-01T00:00:00.000000Z' WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_mark_completed_only_from_running() {
        let db = test_db();
        let id = insert(&db, &sample_job("2026-01-01T00:00:00.000000Z")).unwrap();

        let changed = mark_completed(&db, id, "succeeded", Some("{}"), None, "t").unwrap();
        assert_eq!(changed, 0);

        mark_started(&db, id, "2026-01-01T00:01:00.000000Z").unwrap();
        let changed = mark_completed(
            &db,
            id,
            "failed",
            None,
            Some("boom"),
            "2026-01-01T00:02:00.000000Z",
        )
        .unwrap();
        assert_eq!(changed, 1);

        let found = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(found.status, "failed");
        assert_eq!(found.error_message.as_deref(), Some("boom"));
        assert!(found.completed_at.is_some());
    }

    #[test]
    fn test_fail_running_before_cutoff() {
        let db = test_db();
        let stale = insert(&db, &sample_job("2026-01-01T00:00:00.000000Z")).unwrap();
        let fresh = insert(&db, &sample_job("2026-01-01T00:00:01.000000Z")).unwrap();
        mark_started(&db, stale, "2026-01-01T00:00:00.000000Z").unwrap();
        mark_started(&db, fresh, "2026-01-01T12:00:00.000000Z").unwrap();

        let changed = fail_running_before(
            &db,
            "2026-01-01T06:00:00.000000Z",
            "abandoned",
            "2026-01-01T13:00:00.000000Z",
        )
        .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(find_by_id(&db, stale).unwrap().unwrap().status, "failed");
        assert_eq!(find_by_id(&db, fresh).unwrap().unwrap().status, "running");
    }

    #[test]
    fn test_count_by_status() {
        let db = test_db();
        insert(&db, &sample_job("2026-01-01T00:00:00.000000Z")).unwrap();
        let id = insert(&db, &sample_job("2026-01-01T00:00:01.000000Z")).unwrap();
        mark_started(&db, id, "2026-01-01T00:00:02.000000Z").unwrap();

        assert_eq!(count_by_status(&db, "pending").unwrap(), 1);
        assert_eq!(count_by_status(&db, "running").unwrap(), 1);
        assert_eq!(count_by_status(&db, "failed").unwrap(), 0);
    }
}
