pub mod audit;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod jobs;
pub mod matcher;
pub mod pipeline;
pub mod processor;
pub mod quotes;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod submit;
pub mod worker;

pub use config::{load_config, load_config_from_str, Config, MAX_UPLOAD_BYTES};
pub use error::{
    ConfigError, CruiseQuoteError, ExtractionError, JobError, ProcessError, QuoteError, Result,
    StorageError, SubmitError,
};
pub use extraction::{HttpModelClient, ModelClient, QuoteExtractor};
pub use jobs::{ImportJob, ImportResultSummary, JobKind, JobStatus, JobStore};
pub use pipeline::{Pipeline, PipelineError, RunOutcome};
pub use quotes::{CreateQuoteInput, PriceQuote, QuoteWriter};
pub use secrets::{resolve_secret, SecretError};
pub use submit::{SubmitRequest, Submitter};
pub use worker::{Scheduler, SchedulerConfig};
