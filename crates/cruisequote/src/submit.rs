//! Submission boundary: turns an upload (or pasted text) into a pending
//! import job.

use std::io::Cursor;

use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::SubmitError;
use crate::extraction::PROMPT_ID;
use crate::jobs::{ImportJob, JobKind, JobStore, NewImportJob};
use crate::processor::DocumentKind;
use crate::storage::FileStaging;

/// `original_filename` recorded on text-input jobs.
pub const TEXT_INPUT_FILENAME: &str = "text-input";

/// One file upload as received from the HTTP layer.
#[derive(Debug, Clone)]
pub struct SubmitRequest<'a> {
    pub filename: &'a str,
    pub bytes: &'a [u8],
    pub creator_id: i64,
    pub supplier_id: i64,
    pub idempotency_key: Option<&'a str>,
}

pub struct Submitter {
    jobs: JobStore,
    staging: FileStaging,
    max_upload_bytes: u64,
    model_id: String,
    prompt_id: String,
}

impl Submitter {
    pub fn new(
        jobs: JobStore,
        staging: FileStaging,
        max_upload_bytes: u64,
        model_id: impl Into<String>,
        prompt_id: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            staging,
            max_upload_bytes,
            model_id: model_id.into(),
            prompt_id: prompt_id.into(),
        }
    }

    /// Stages into `upload_directory` and enforces `max_upload_bytes`;
    /// jobs record the configured model and the current prompt.
    pub fn from_config(jobs: JobStore, config: &Config) -> Self {
        Self::new(
            jobs,
            FileStaging::new(&config.upload_directory),
            config.max_upload_bytes,
            config.model.model.clone(),
            PROMPT_ID,
        )
    }

    /// Stages the upload and creates a pending `file-upload` job. A known
    /// idempotency key returns the existing job without touching the disk.
    pub fn submit(&self, request: SubmitRequest<'_>) -> Result<ImportJob, SubmitError> {
        DocumentKind::from_filename(request.filename)
            .map_err(|_| SubmitError::UnsupportedExtension(request.filename.to_string()))?;
        self.check_size(request.bytes.len())?;

        let key = request.idempotency_key.filter(|k| !k.is_empty());
        if let Some(existing) = self.existing(key)? {
            return Ok(existing);
        }

        let staged = self
            .staging
            .stage(request.filename, Cursor::new(request.bytes))?;

        let new = NewImportJob {
            kind: JobKind::FileUpload,
            original_filename: request.filename.to_string(),
            content_digest: Some(staged.digest.clone()),
            byte_count: staged.byte_count,
            stored_path: Some(staged.path.clone()),
            raw_text: None,
            idempotency_key: key.map(str::to_string),
            supplier_id: request.supplier_id,
            model_id: self.model_id.clone(),
            prompt_id: self.prompt_id.clone(),
            created_by: request.creator_id,
        };

        let (job, created) = match self.jobs.create(&new) {
            Ok(result) => result,
            Err(e) => {
                discard(&staged.path);
                return Err(e.into());
            }
        };
        if !created {
            // A concurrent submission with the same key won the insert.
            discard(&staged.path);
        }
        Ok(job)
    }

    /// Creates a pending `text-input` job holding `text` verbatim.
    pub fn submit_text(
        &self,
        text: &str,
        creator_id: i64,
        supplier_id: i64,
        idempotency_key: Option<&str>,
    ) -> Result<ImportJob, SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::EmptyText);
        }
        self.check_size(text.len())?;

        let key = idempotency_key.filter(|k| !k.is_empty());
        if let Some(existing) = self.existing(key)? {
            return Ok(existing);
        }

        let new = NewImportJob {
            kind: JobKind::TextInput,
            original_filename: TEXT_INPUT_FILENAME.to_string(),
            content_digest: Some(format!("{:x}", Sha256::digest(text.as_bytes()))),
            byte_count: text.len() as u64,
            stored_path: None,
            raw_text: Some(text.to_string()),
            idempotency_key: key.map(str::to_string),
            supplier_id,
            model_id: self.model_id.clone(),
            prompt_id: self.prompt_id.clone(),
            created_by: creator_id,
        };

        let (job, _) = self.jobs.create(&new)?;
        Ok(job)
    }

    fn check_size(&self, size: usize) -> Result<(), SubmitError> {
        let size = size as u64;
        if size > self.max_upload_bytes {
            return Err(SubmitError::TooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    fn existing(&self, key: Option<&str>) -> Result<Option<ImportJob>, SubmitError> {
        let Some(key) = key else {
            return Ok(None);
        };
        let existing = self.jobs.find_by_idempotency_key(key)?;
        if let Some(job) = &existing {
            tracing::info!(job_id = job.id, "idempotency key already used; returning existing job");
        }
        Ok(existing)
    }
}

fn discard(path: &std::path::Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            file = %crate::sanitize::redact_path(path),
            error = %e,
            "failed to remove staged upload"
        );
    }
}
