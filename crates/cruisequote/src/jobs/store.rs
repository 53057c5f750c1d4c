//! Durable backing for import jobs.
//!
//! Status changes are single conditional updates; a zero row count means
//! another actor got there first and is reported as `Conflict`.

use chrono::{Duration, Utc};

use crate::db::{self, job_repo, Database, DatabaseError};
use crate::error::JobError;

use super::{ImportJob, ImportResultSummary, JobStatus, NewImportJob};

/// Error recorded on jobs failed by the startup sweep.
pub const ABANDONED_MESSAGE: &str = "abandoned: worker stopped before completion";

#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a pending job. When the idempotency key is already taken the
    /// existing job is returned unchanged and the flag is `false`.
    pub fn create(&self, new: &NewImportJob) -> Result<(ImportJob, bool), JobError> {
        let key = new.idempotency_key.as_deref().filter(|k| !k.is_empty());

        if let Some(key) = key {
            if let Some(existing) = self.find_by_idempotency_key(key)? {
                return Ok((existing, false));
            }
        }

        let row = job_repo::NewJobRow {
            kind: new.kind.as_str().to_string(),
            original_filename: new.original_filename.clone(),
            content_digest: new.content_digest.clone(),
            byte_count: i64::try_from(new.byte_count).unwrap_or(i64::MAX),
            stored_path: new
                .stored_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            raw_text: new.raw_text.clone(),
            idempotency_key: key.map(str::to_string),
            supplier_id: new.supplier_id,
            model_id: new.model_id.clone(),
            prompt_id: new.prompt_id.clone(),
            created_by: new.created_by,
            created_at: db::timestamp(Utc::now()),
        };

        match job_repo::insert(&self.db, &row) {
            Ok(id) => {
                let job = self.find_by_id(id)?.ok_or(JobError::NotFound(id))?;
                tracing::info!(job_id = id, kind = %new.kind.as_str(), "import job created");
                Ok((job, true))
            }
            // Lost a race with a concurrent submission bearing the same key.
            Err(DatabaseError::UniqueViolation(msg)) => match key {
                Some(key) => {
                    let existing = self.find_by_idempotency_key(key)?.ok_or_else(|| {
                        JobError::Database(DatabaseError::UniqueViolation(msg))
                    })?;
                    Ok((existing, false))
                }
                None => Err(JobError::Database(DatabaseError::UniqueViolation(msg))),
            },
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<ImportJob>, JobError> {
        job_repo::find_by_id(&self.db, id)?
            .map(ImportJob::try_from)
            .transpose()
    }

    pub fn find_by_idempotency_key(&self, key: &str) -> Result<Option<ImportJob>, JobError> {
        job_repo::find_by_idempotency_key(&self.db, key)?
            .map(ImportJob::try_from)
            .transpose()
    }

    /// The oldest pending job, without changing it. Ownership is taken by
    /// [`JobStore::mark_started`].
    pub fn claim_next_pending(&self) -> Result<Option<ImportJob>, JobError> {
        job_repo::oldest_pending(&self.db)?
            .map(ImportJob::try_from)
            .transpose()
    }

    /// `pending → running`, stamping `started_at`. Fails with `Conflict`
    /// if the job is no longer pending.
    pub fn mark_started(&self, id: i64) -> Result<ImportJob, JobError> {
        let changed = job_repo::mark_started(&self.db, id, &db::timestamp(Utc::now()))?;
        if changed == 0 {
            return Err(self.conflict_or_missing(id, JobStatus::Pending)?);
        }
        self.find_by_id(id)?.ok_or(JobError::NotFound(id))
    }

    /// `running → status`, writing summary, error and `completed_at` in
    /// one statement.
    pub fn mark_completed(
        &self,
        id: i64,
        status: JobStatus,
        summary: Option<&ImportResultSummary>,
        error_message: Option<&str>,
    ) -> Result<(), JobError> {
        check_transition(JobStatus::Running, status)?;

        let summary_json = summary.map(serde_json::to_string).transpose()?;
        let changed = job_repo::mark_completed(
            &self.db,
            id,
            status.as_str(),
            summary_json.as_deref(),
            error_message,
            &db::timestamp(Utc::now()),
        )?;
        if changed == 0 {
            return Err(self.conflict_or_missing(id, JobStatus::Running)?);
        }
        Ok(())
    }

    /// `needs-confirmation → succeeded | failed`.
    pub fn resolve_confirmation(
        &self,
        id: i64,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), JobError> {
        check_transition(JobStatus::NeedsConfirmation, status)?;

        let changed = job_repo::resolve_confirmation(
            &self.db,
            id,
            status.as_str(),
            error_message,
            &db::timestamp(Utc::now()),
        )?;
        if changed == 0 {
            return Err(self.conflict_or_missing(id, JobStatus::NeedsConfirmation)?);
        }
        Ok(())
    }

    /// Fails every `running` job whose `started_at` is older than
    /// `older_than`. Returns how many were failed.
    pub fn fail_abandoned(&self, older_than: Duration) -> Result<usize, JobError> {
        let now = Utc::now();
        let cutoff = db::timestamp(now - older_than);
        let failed =
            job_repo::fail_running_before(&self.db, &cutoff, ABANDONED_MESSAGE, &db::timestamp(now))?;
        if failed > 0 {
            tracing::warn!(count = failed, "failed abandoned running jobs");
        }
        Ok(failed)
    }

    pub fn count_by_status(&self, status: JobStatus) -> Result<u64, JobError> {
        Ok(job_repo::count_by_status(&self.db, status.as_str())?)
    }

    fn conflict_or_missing(&self, id: i64, expected: JobStatus) -> Result<JobError, JobError> {
        Ok(match job_repo::find_by_id(&self.db, id)? {
            Some(_) => JobError::Conflict {
                id,
                expected: expected.as_str().to_string(),
            },
            None => JobError::NotFound(id),
        })
    }
}

fn check_transition(from: JobStatus, to: JobStatus) -> Result<(), JobError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(JobError::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobKind;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn test_store() -> JobStore {
        JobStore::new(Database::open_in_memory().expect("Failed to create test database"))
    }

    fn sample_job(key: Option<&str>) -> NewImportJob {
        NewImportJob {
            kind: JobKind::FileUpload,
            original_filename: "quote.docx".to_string(),
            content_digest: Some("ab".repeat(32)),
            byte_count: 2048,
            stored_path: Some(PathBuf::from("/tmp/uploads/quote_20260101000000_ab12cd34.docx")),
            raw_text: None,
            idempotency_key: key.map(str::to_string),
            supplier_id: 7,
            model_id: "test-model".to_string(),
            prompt_id: "quote-extract-v1".to_string(),
            created_by: 42,
        }
    }

    #[test]
    fn test_create_and_read_back() {
        let store = test_store();
        let (job, created) = store.create(&sample_job(None)).unwrap();
        assert!(created);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.kind, JobKind::FileUpload);
        assert_eq!(job.byte_count, 2048);
        assert!(job.started_at.is_none());
        assert!(job.result_summary.is_none());
    }

    #[test]
    fn test_idempotency_key_returns_existing() {
        let store = test_store();
        let (first, created) = store.create(&sample_job(Some("k-1"))).unwrap();
        assert!(created);

        let mut again = sample_job(Some("k-1"));
        again.original_filename = "other.pdf".to_string();
        let (second, created) = store.create(&again).unwrap();
        assert!(!created);
        assert_eq!(second, first);
        assert_eq!(store.count_by_status(JobStatus::Pending).unwrap(), 1);
    }

    #[test]
    fn test_empty_key_is_not_a_key() {
        let store = test_store();
        let (a, _) = store.create(&sample_job(Some(""))).unwrap();
        let (b, _) = store.create(&sample_job(Some(""))).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.idempotency_key.is_none());
    }

    #[test]
    fn test_concurrent_creates_share_one_row() {
        let store = Arc::new(test_store());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.create(&sample_job(Some("race"))).unwrap().0.id)
            })
            .collect();
        let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(store.count_by_status(JobStatus::Pending).unwrap(), 1);
    }

    #[test]
    fn test_claim_is_fifo_and_does_not_mutate() {
        let store = test_store();
        let (first, _) = store.create(&sample_job(None)).unwrap();
        let (second, _) = store.create(&sample_job(None)).unwrap();

        assert_eq!(store.claim_next_pending().unwrap().unwrap().id, first.id);
        assert_eq!(store.claim_next_pending().unwrap().unwrap().id, first.id);

        store.mark_started(first.id).unwrap();
        assert_eq!(store.claim_next_pending().unwrap().unwrap().id, second.id);
    }

    #[test]
    fn test_mark_started_once() {
        let store = test_store();
        let (job, _) = store.create(&sample_job(None)).unwrap();

        let running = store.mark_started(job.id).unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert!(running.started_at.is_some());

        assert!(matches!(
            store.mark_started(job.id),
            Err(JobError::Conflict { .. })
        ));
        assert!(matches!(store.mark_started(999), Err(JobError::NotFound(999))));
    }

    #[test]
    fn test_mark_completed_writes_summary_once() {
        let store = test_store();
        let (job, _) = store.create(&sample_job(None)).unwrap();
        store.mark_started(job.id).unwrap();

        let summary = ImportResultSummary {
            total_rows: 1,
            success_rows: 1,
            created_quotes: 1,
            ..Default::default()
        };
        store
            .mark_completed(job.id, JobStatus::Succeeded, Some(&summary), None)
            .unwrap();

        let done = store.find_by_id(job.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(done.result_summary, Some(summary.clone()));
        assert!(done.completed_at.unwrap() >= done.started_at.unwrap());

        assert!(matches!(
            store.mark_completed(job.id, JobStatus::Failed, None, Some("late")),
            Err(JobError::Conflict { .. })
        ));
    }

    #[test]
    fn test_mark_completed_rejects_non_terminal_target() {
        let store = test_store();
        let (job, _) = store.create(&sample_job(None)).unwrap();
        store.mark_started(job.id).unwrap();
        assert!(matches!(
            store.mark_completed(job.id, JobStatus::Pending, None, None),
            Err(JobError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_pending_job_cannot_complete() {
        let store = test_store();
        let (job, _) = store.create(&sample_job(None)).unwrap();
        assert!(matches!(
            store.mark_completed(job.id, JobStatus::Failed, None, Some("boom")),
            Err(JobError::Conflict { .. })
        ));
    }

    #[test]
    fn test_resolve_confirmation() {
        let store = test_store();
        let (job, _) = store.create(&sample_job(None)).unwrap();
        store.mark_started(job.id).unwrap();
        store
            .mark_completed(
                job.id,
                JobStatus::NeedsConfirmation,
                Some(&ImportResultSummary::default()),
                None,
            )
            .unwrap();

        store
            .resolve_confirmation(job.id, JobStatus::Succeeded, None)
            .unwrap();
        assert_eq!(
            store.find_by_id(job.id).unwrap().unwrap().status,
            JobStatus::Succeeded
        );
        assert!(matches!(
            store.resolve_confirmation(job.id, JobStatus::Failed, None),
            Err(JobError::Conflict { .. })
        ));
    }

    #[test]
    fn test_fail_abandoned_only_touches_running_jobs() {
        let store = test_store();
        let (stale, _) = store.create(&sample_job(None)).unwrap();
        let (fresh, _) = store.create(&sample_job(None)).unwrap();
        let (pending, _) = store.create(&sample_job(None)).unwrap();
        store.mark_started(stale.id).unwrap();
        store.mark_started(fresh.id).unwrap();

        assert_eq!(store.fail_abandoned(Duration::hours(1)).unwrap(), 0);
        assert_eq!(store.fail_abandoned(Duration::seconds(-1)).unwrap(), 2);

        let stale = store.find_by_id(stale.id).unwrap().unwrap();
        assert_eq!(stale.status, JobStatus::Failed);
        assert_eq!(stale.error_message.as_deref(), Some(ABANDONED_MESSAGE));
        assert_eq!(
            store.find_by_id(pending.id).unwrap().unwrap().status,
            JobStatus::Pending
        );
    }
}
