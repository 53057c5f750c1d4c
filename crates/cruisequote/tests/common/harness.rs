//! Test harness for isolated pipeline execution.
//!
//! The `TestHarness` struct provides:
//! - A temporary upload directory
//! - An in-memory database with the S1 catalog seeded
//! - Submission, pipeline and quote-writer wiring around a scripted model

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use cruisequote::audit::SqliteAuditLog;
use cruisequote::catalog::SqliteCatalog;
use cruisequote::db::{catalog_repo, quote_repo, Database};
use cruisequote::extraction::{ModelClient, PROMPT_ID};
use cruisequote::jobs::{ImportJob, JobStore};
use cruisequote::pipeline::{Pipeline, RunOutcome};
use cruisequote::quotes::QuoteWriter;
use cruisequote::storage::FileStaging;
use cruisequote::submit::{SubmitRequest, Submitter};
use cruisequote::{ExtractionError, MAX_UPLOAD_BYTES};

pub const CREATOR_ID: i64 = 42;

/// Model client that returns a fixed reply and records every prompt.
pub struct ScriptedModelClient {
    reply: Mutex<String>,
    transport_error: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModelClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: Mutex::new(reply.into()),
            transport_error: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: impl Into<String>) {
        *self.reply.lock().unwrap() = reply.into();
    }

    /// Every later call fails with `ExtractionError::Transport(message)`.
    pub fn fail_transport(&self, message: impl Into<String>) {
        *self.transport_error.lock().unwrap() = Some(message.into());
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ExtractionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(message) = self.transport_error.lock().unwrap().clone() {
            return Err(ExtractionError::Transport(message));
        }
        Ok(self.reply.lock().unwrap().clone())
    }
}

/// Catalog ids seeded by the harness.
#[derive(Debug, Clone, Copy)]
pub struct SeededCatalog {
    pub ship: i64,
    pub sailing: i64,
    pub balcony: i64,
    pub interior: i64,
    pub grand_suite: i64,
    pub supplier: i64,
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub db: Database,
    pub jobs: JobStore,
    pub catalog: SeededCatalog,
    pub model: Arc<ScriptedModelClient>,
    pub pipeline: Pipeline,
    pub submitter: Submitter,
    pub writer: QuoteWriter,
}

impl TestHarness {
    /// A harness whose model answers every prompt with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");

        let db = Database::open_in_memory().expect("Failed to open database");
        let catalog = seed_catalog(&db);
        let jobs = JobStore::new(db.clone());

        let model = Arc::new(ScriptedModelClient::new(reply));
        let pipeline = Pipeline::from_database(db.clone(), model.clone());
        let submitter = Submitter::new(
            jobs.clone(),
            FileStaging::new(&upload_dir),
            MAX_UPLOAD_BYTES,
            model.model_id(),
            PROMPT_ID,
        );
        let writer = QuoteWriter::new(
            db.clone(),
            Arc::new(SqliteCatalog::new(db.clone())),
            Arc::new(SqliteAuditLog::new(db.clone())),
        );

        Self {
            temp_dir,
            upload_dir,
            db,
            jobs,
            catalog,
            model,
            pipeline,
            submitter,
            writer,
        }
    }

    pub fn submit_docx(&self, filename: &str, paragraphs: &[&str], key: Option<&str>) -> ImportJob {
        self.submit_docx_for(self.catalog.supplier, filename, paragraphs, key)
    }

    pub fn submit_docx_for(
        &self,
        supplier_id: i64,
        filename: &str,
        paragraphs: &[&str],
        key: Option<&str>,
    ) -> ImportJob {
        let bytes = super::builders::docx_bytes(paragraphs);
        self.submitter
            .submit(SubmitRequest {
                filename,
                bytes: &bytes,
                creator_id: CREATOR_ID,
                supplier_id,
                idempotency_key: key,
            })
            .expect("submit failed")
    }

    pub async fn run(&self, job_id: i64) -> RunOutcome {
        self.pipeline
            .run(job_id, &CancellationToken::new())
            .await
            .expect("pipeline run failed")
    }

    pub fn job(&self, job_id: i64) -> ImportJob {
        self.jobs
            .find_by_id(job_id)
            .expect("job lookup failed")
            .expect("job missing")
    }

    pub fn quotes_for(&self, job_id: i64) -> Vec<quote_repo::QuoteRow> {
        quote_repo::list_by_job(&self.db, job_id).expect("quote lookup failed")
    }

    pub fn staged_files(&self) -> usize {
        match std::fs::read_dir(&self.upload_dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

/// Quantum of the Seas with sailing QN20260515 (2026-05-15, 5 nights) and
/// three cabin types: Balcony (阳台), Interior (内舱), Grand Suite (套房).
fn seed_catalog(db: &Database) -> SeededCatalog {
    let line = catalog_repo::insert_cruise_line(db, "Royal Caribbean").unwrap();
    let ship = catalog_repo::insert_ship(db, Some(line), "Quantum of the Seas", "active").unwrap();
    let sailing = catalog_repo::insert_sailing(
        db,
        ship,
        "QN20260515",
        NaiveDate::from_ymd_opt(2026, 5, 15).unwrap(),
        5,
        "Tokyo–Osaka",
    )
    .unwrap();

    let balcony_cat = catalog_repo::ensure_cabin_category(db, "阳台").unwrap();
    let inside_cat = catalog_repo::ensure_cabin_category(db, "内舱").unwrap();
    let suite_cat = catalog_repo::ensure_cabin_category(db, "套房").unwrap();

    let balcony = catalog_repo::insert_cabin_type(db, ship, Some(balcony_cat), "Balcony", true).unwrap();
    let interior = catalog_repo::insert_cabin_type(db, ship, Some(inside_cat), "Interior", true).unwrap();
    let grand_suite =
        catalog_repo::insert_cabin_type(db, ship, Some(suite_cat), "Grand Suite", true).unwrap();

    let supplier = catalog_repo::insert_supplier(db, "Blue Wave Travel").unwrap();

    SeededCatalog {
        ship,
        sailing,
        balcony,
        interior,
        grand_suite,
        supplier,
    }
}
