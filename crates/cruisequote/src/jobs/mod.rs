//! Import jobs: their status machine, result summary and durable store.

pub mod store;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{self, job_repo::JobRow};
use crate::error::JobError;
use crate::quotes::QuoteSource;

pub use store::JobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    FileUpload,
    TextInput,
    TemplateImport,
    AdminGenerated,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::FileUpload => "file-upload",
            JobKind::TextInput => "text-input",
            JobKind::TemplateImport => "template-import",
            JobKind::AdminGenerated => "admin-generated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file-upload" => Some(JobKind::FileUpload),
            "text-input" => Some(JobKind::TextInput),
            "template-import" => Some(JobKind::TemplateImport),
            "admin-generated" => Some(JobKind::AdminGenerated),
            _ => None,
        }
    }

    /// Source recorded on quotes created by a job of this kind.
    pub fn quote_source(&self) -> QuoteSource {
        match self {
            JobKind::FileUpload => QuoteSource::FileImport,
            JobKind::TextInput => QuoteSource::TextImport,
            JobKind::TemplateImport => QuoteSource::TemplateImport,
            JobKind::AdminGenerated => QuoteSource::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    Running,
    NeedsConfirmation,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::NeedsConfirmation => "needs-confirmation",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "needs-confirmation" => Some(JobStatus::NeedsConfirmation),
            "succeeded" => Some(JobStatus::Succeeded),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// `succeeded` and `failed` admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Edges of the status DAG:
    /// `pending → running → {succeeded | failed | needs-confirmation}`,
    /// `needs-confirmation → {succeeded | failed}`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, NeedsConfirmation)
                | (NeedsConfirmation, Succeeded)
                | (NeedsConfirmation, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job row accounting, written once with the terminal transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResultSummary {
    pub total_rows: u32,
    pub success_rows: u32,
    pub failed_rows: u32,
    pub skipped_rows: u32,
    pub created_quotes: u32,
    pub warnings: Vec<String>,
}

impl ImportResultSummary {
    /// `success + failed + skipped == total` and `created <= success`.
    pub fn is_consistent(&self) -> bool {
        self.success_rows + self.failed_rows + self.skipped_rows == self.total_rows
            && self.created_quotes <= self.success_rows
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportJob {
    pub id: i64,
    pub kind: JobKind,
    pub status: JobStatus,
    pub original_filename: String,
    pub content_digest: Option<String>,
    pub byte_count: u64,
    pub stored_path: Option<PathBuf>,
    pub raw_text: Option<String>,
    pub idempotency_key: Option<String>,
    pub supplier_id: i64,
    pub model_id: String,
    pub prompt_id: String,
    pub result_summary: Option<ImportResultSummary>,
    pub error_message: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Submission-time fields of a new job.
#[derive(Debug, Clone)]
pub struct NewImportJob {
    pub kind: JobKind,
    pub original_filename: String,
    pub content_digest: Option<String>,
    pub byte_count: u64,
    pub stored_path: Option<PathBuf>,
    pub raw_text: Option<String>,
    pub idempotency_key: Option<String>,
    pub supplier_id: i64,
    pub model_id: String,
    pub prompt_id: String,
    pub created_by: i64,
}

impl TryFrom<JobRow> for ImportJob {
    type Error = JobError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |reason: String| JobError::CorruptRow { id, reason };

        let kind = JobKind::parse(&row.kind).ok_or_else(|| corrupt(format!("kind '{}'", row.kind)))?;
        let status =
            JobStatus::parse(&row.status).ok_or_else(|| corrupt(format!("status '{}'", row.status)))?;
        let created_at = db::parse_timestamp(&row.created_at)
            .ok_or_else(|| corrupt(format!("created_at '{}'", row.created_at)))?;
        let started_at = optional_timestamp(row.started_at.as_deref(), "started_at").map_err(corrupt)?;
        let completed_at =
            optional_timestamp(row.completed_at.as_deref(), "completed_at").map_err(corrupt)?;
        let result_summary = match row.result_summary.as_deref() {
            Some(raw) => Some(
                serde_json::from_str::<ImportResultSummary>(raw)
                    .map_err(|e| corrupt(format!("result_summary: {}", e)))?,
            ),
            None => None,
        };

        Ok(ImportJob {
            id,
            kind,
            status,
            original_filename: row.original_filename,
            content_digest: row.content_digest,
            byte_count: u64::try_from(row.byte_count).unwrap_or(0),
            stored_path: row.stored_path.map(PathBuf::from),
            raw_text: row.raw_text,
            idempotency_key: row.idempotency_key,
            supplier_id: row.supplier_id,
            model_id: row.model_id,
            prompt_id: row.prompt_id,
            result_summary,
            error_message: row.error_message,
            created_by: row.created_by,
            created_at,
            started_at,
            completed_at,
        })
    }
}

fn optional_timestamp(raw: Option<&str>, column: &str) -> Result<Option<DateTime<Utc>>, String> {
    match raw {
        Some(value) => db::parse_timestamp(value)
            .map(Some)
            .ok_or_else(|| format!("{} '{}'", column, value)),
        None => Ok(None),
    }
}
