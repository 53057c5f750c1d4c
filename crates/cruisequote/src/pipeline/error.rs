use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{ExtractionError, JobError, ProcessError};

/// Fatal outcomes of one orchestration. Everything except `Cancelled`
/// ends with the job marked `failed` and this error's text recorded.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Import job {0} not found")]
    JobNotFound(i64),

    #[error("Import job {0} has no staged document")]
    MissingInput(i64),

    #[error("Text extraction failed: {0}")]
    Process(#[from] ProcessError),

    #[error("Text extraction task failed: {0}")]
    Task(String),

    #[error("Document contains no extractable text")]
    EmptyDocument,

    #[error("Model extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Invalid departure date '{0}' (expected YYYY-MM-DD)")]
    InvalidDepartureDate(String),

    #[error("Sailing resolution failed for '{code}': {issues}")]
    SailingUnresolved { code: String, issues: String },

    #[error("Job store failed: {0}")]
    Job(#[from] JobError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Pipeline cancelled")]
    Cancelled,
}
