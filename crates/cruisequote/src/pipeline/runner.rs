use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::audit::{AuditLog, SqliteAuditLog};
use crate::catalog::{CatalogReader, Sailing, SqliteCatalog};
use crate::db::Database;
use crate::error::{ExtractionError, JobError};
use crate::extraction::{parse_iso_date, CabinCategory, ModelClient, ParseResult, QuoteExtractor};
use crate::jobs::{ImportJob, JobKind, JobStatus, JobStore};
use crate::matcher::CatalogMatcher;
use crate::processor::{DocumentKind, ProcessorRegistry};
use crate::quotes::{CreateQuoteInput, QuoteWriter};
use crate::sanitize;

use super::context::PipelineContext;
use super::error::PipelineError;

/// How a call to [`Pipeline::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The job reached this terminal status.
    Completed(JobStatus),
    /// Another processor started the job first; nothing was changed.
    AlreadyClaimed,
    /// Shutdown interrupted the run; the job stays `running`.
    Cancelled,
}

pub struct Pipeline {
    jobs: JobStore,
    processor: Arc<ProcessorRegistry>,
    extractor: QuoteExtractor,
    matcher: CatalogMatcher,
    writer: QuoteWriter,
}

impl Pipeline {
    /// Production constructor: catalog, audit and stores all read the same
    /// database.
    pub fn from_database(db: Database, client: Arc<dyn ModelClient>) -> Self {
        let catalog: Arc<dyn CatalogReader> = Arc::new(SqliteCatalog::new(db.clone()));
        let audit: Arc<dyn AuditLog> = Arc::new(SqliteAuditLog::new(db.clone()));

        Self {
            jobs: JobStore::new(db.clone()),
            processor: Arc::new(ProcessorRegistry::new()),
            extractor: QuoteExtractor::new(client),
            matcher: CatalogMatcher::new(Arc::clone(&catalog)),
            writer: QuoteWriter::new(db, catalog, audit),
        }
    }

    /// Drives one job from `pending` to a terminal status.
    ///
    /// Job-level failures are recorded on the job and reported as
    /// `Completed(Failed)`; `Err` is returned only when the job cannot be
    /// loaded or its terminal status cannot be written.
    pub async fn run(
        &self,
        job_id: i64,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let job = self
            .jobs
            .find_by_id(job_id)?
            .ok_or(PipelineError::JobNotFound(job_id))?;

        let span = info_span!("pipeline",
            job_id,
            filename = %sanitize::redact_path(Path::new(&job.original_filename)),
            kind = job.kind.as_str(),
        );
        self.run_job(job, cancel).instrument(span).await
    }

    async fn run_job(
        &self,
        job: ImportJob,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        // Not yet started: leave it pending for the next worker.
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }

        let job = match self.jobs.mark_started(job.id) {
            Ok(job) => job,
            Err(JobError::Conflict { .. }) => {
                debug!("job already claimed");
                return Ok(RunOutcome::AlreadyClaimed);
            }
            Err(e) => return Err(e.into()),
        };

        let mut ctx = PipelineContext::new(job);
        let result = self.execute(&mut ctx, cancel).await;

        if let Err(PipelineError::Cancelled) = result {
            warn!("cancelled mid-run; job left in running state");
            return Ok(RunOutcome::Cancelled);
        }

        let _step = info_span!("complete").entered();
        self.complete(&ctx, result)
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        // Step 1: Extract text
        ensure_live(cancel)?;
        let text = self
            .step_extract_text(&ctx.job, cancel)
            .instrument(info_span!("extract_text"))
            .await?;

        // Step 2: Model extraction
        ensure_live(cancel)?;
        let parsed = self
            .step_model_extract(ctx, &text, cancel)
            .instrument(info_span!("model_extract"))
            .await?;
        drop(text);
        ensure_live(cancel)?;

        // Step 3: Resolve the sailing
        let sailing = {
            let _step = info_span!("match").entered();
            self.step_match_sailing(ctx, &parsed)?
        };
        ensure_live(cancel)?;

        // Step 4: Match cabin types and write one quote per row
        {
            let _step = info_span!("write_quotes").entered();
            self.step_write_quotes(ctx, &parsed, &sailing, cancel)?;
        }

        Ok(())
    }

    async fn step_extract_text(
        &self,
        job: &ImportJob,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let text = if job.kind == JobKind::TextInput {
            job.raw_text.clone().unwrap_or_default()
        } else {
            let kind = DocumentKind::from_filename(&job.original_filename)?;
            let path = job
                .stored_path
                .clone()
                .ok_or(PipelineError::MissingInput(job.id))?;

            let processor = Arc::clone(&self.processor);
            let task = tokio::task::spawn_blocking(move || processor.extract(&path, kind));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                joined = task => joined.map_err(|e| PipelineError::Task(e.to_string()))??,
            }
        };

        if text.trim().is_empty() {
            return Err(PipelineError::EmptyDocument);
        }
        debug!(chars = text.chars().count(), "text extracted");
        Ok(text)
    }

    async fn step_model_extract(
        &self,
        ctx: &mut PipelineContext,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ParseResult, PipelineError> {
        match self.extractor.extract_quotes(text, cancel).await {
            Ok(parsed) => {
                info!(
                    sailing_code = %parsed.sailing_code,
                    quotes = parsed.quotes.len(),
                    "model extraction complete"
                );
                Ok(parsed)
            }
            Err(ExtractionError::Cancelled) => Err(PipelineError::Cancelled),
            Err(ExtractionError::SchemaViolation { field }) => {
                ctx.warn(format!("model output violates schema at field {}", field));
                Err(ExtractionError::SchemaViolation { field }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn step_match_sailing(
        &self,
        ctx: &mut PipelineContext,
        parsed: &ParseResult,
    ) -> Result<Sailing, PipelineError> {
        let departure = match parse_iso_date(&parsed.departure_date) {
            Some(date) => date,
            None => {
                ctx.warn(format!("invalid departure date: '{}'", parsed.departure_date));
                return Err(PipelineError::InvalidDepartureDate(
                    parsed.departure_date.clone(),
                ));
            }
        };

        let result = self.matcher.match_sailing(
            &parsed.sailing_code,
            &parsed.ship_name,
            departure,
            parsed.nights,
        )?;

        for issue in &result.issues {
            ctx.warn(issue.clone());
        }

        match result.sailing {
            Some(sailing) => {
                debug!(
                    sailing_id = sailing.id,
                    confidence = result.confidence,
                    "sailing resolved"
                );
                Ok(sailing)
            }
            None => {
                let issues = if result.issues.is_empty() {
                    "no matching sailing".to_string()
                } else {
                    result.issues.join("; ")
                };
                Err(PipelineError::SailingUnresolved {
                    code: parsed.sailing_code.clone(),
                    issues,
                })
            }
        }
    }

    fn step_write_quotes(
        &self,
        ctx: &mut PipelineContext,
        parsed: &ParseResult,
        sailing: &Sailing,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let names: Vec<String> = parsed
            .quotes
            .iter()
            .map(|q| q.cabin_type_name.clone())
            .collect();
        let mut categories: HashMap<String, CabinCategory> = HashMap::new();
        for quote in &parsed.quotes {
            if let Some(category) = quote.cabin_category {
                categories
                    .entry(quote.cabin_type_name.clone())
                    .or_insert(category);
            }
        }

        let matches = self
            .matcher
            .match_cabin_types(sailing.ship_id, &names, &categories)?;

        for quote in &parsed.quotes {
            ensure_live(cancel)?;
            let name = &quote.cabin_type_name;

            let Some(cabin) = matches.matched.get(name) else {
                let score = matches
                    .unmatched
                    .iter()
                    .find(|u| &u.name == name)
                    .map(|u| u.best_score)
                    .unwrap_or(0.0);
                ctx.summary.skipped_rows += 1;
                ctx.warn(format!(
                    "cabin type {} not matched (confidence: {:.2})",
                    name, score
                ));
                continue;
            };

            let input = CreateQuoteInput {
                sailing_id: sailing.id,
                cabin_type_id: cabin.cabin_type_id,
                supplier_id: ctx.job.supplier_id,
                price: format!("{:.2}", quote.price),
                currency: quote.currency.clone(),
                pricing_unit: quote.pricing_unit.as_str().to_string(),
                guest_count: None,
                cabin_quantity: None,
                valid_until: None,
                conditions: quote.conditions.clone(),
                promotion: quote.promotion.clone(),
                notes: quote.notes.clone(),
                source: ctx.job.kind.quote_source(),
                source_ref: ctx.job.original_filename.clone(),
                import_job_id: Some(ctx.job.id),
                created_by: ctx.job.created_by,
            };

            match self.writer.create(&input) {
                Ok(created) => {
                    debug!(quote_id = created.id, cabin = %name, "quote created");
                    ctx.summary.success_rows += 1;
                    ctx.summary.created_quotes += 1;
                }
                Err(e) => {
                    ctx.summary.skipped_rows += 1;
                    ctx.warn(format!("failed to create quote for cabin {}: {}", name, e));
                }
            }
        }

        ctx.summary.total_rows = parsed.quotes.len() as u32;
        Ok(())
    }

    fn complete(
        &self,
        ctx: &PipelineContext,
        result: Result<(), PipelineError>,
    ) -> Result<RunOutcome, PipelineError> {
        let id = ctx.job.id;
        match result {
            Ok(()) => {
                self.jobs
                    .mark_completed(id, JobStatus::Succeeded, Some(&ctx.summary), None)?;
                info!(
                    total = ctx.summary.total_rows,
                    created = ctx.summary.created_quotes,
                    skipped = ctx.summary.skipped_rows,
                    "import succeeded"
                );
                Ok(RunOutcome::Completed(JobStatus::Succeeded))
            }
            Err(e) => {
                let message = e.to_string();
                self.jobs.mark_completed(
                    id,
                    JobStatus::Failed,
                    ctx.partial_summary(),
                    Some(&message),
                )?;
                warn!(error = %message, "import failed");
                Ok(RunOutcome::Completed(JobStatus::Failed))
            }
        }
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}
