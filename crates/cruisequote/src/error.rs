use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CruiseQuoteError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to resolve model API key: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

/// Failures of the document text extractor.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document kind: '{0}'")]
    UnsupportedKind(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt document container: {0}")]
    CorruptContainer(String),

    #[error("Document is missing part '{0}'")]
    MissingPart(String),

    #[error("Failed to decode document text: {0}")]
    DecodeError(String),
}

/// Failures of the model-extraction client.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Model transport failed: {0}")]
    Transport(String),

    #[error("Model output violates schema at field '{field}'")]
    SchemaViolation { field: String },

    #[error("Model returned an empty reply")]
    Empty,

    #[error("Model call cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid upload file name: '{0}'")]
    InvalidName(String),
}

/// Failures of the quote writer.
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Invalid price '{0}': must be a positive decimal")]
    InvalidPrice(String),

    #[error("Unknown sailing {0}")]
    UnknownSailing(i64),

    #[error("Unknown cabin type {0}")]
    UnknownCabinType(i64),

    #[error("Unknown supplier {0}")]
    UnknownSupplier(i64),

    #[error("Invalid currency '{0}': must be three characters")]
    InvalidCurrency(String),

    #[error("Invalid pricing unit '{0}'")]
    InvalidPricingUnit(String),

    #[error("Quote {0} is not active")]
    NotActive(i64),

    #[error("Corrupt quote row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Import job {0} not found")]
    NotFound(i64),

    #[error("Import job {id} is not {expected}")]
    Conflict { id: i64, expected: String },

    #[error("Invalid job status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Corrupt job row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },

    #[error("Failed to encode result summary: {0}")]
    EncodeSummary(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

/// Failures at the submission boundary.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Unsupported file extension for '{0}' (expected .pdf, .docx or .doc)")]
    UnsupportedExtension(String),

    #[error("Upload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("Text input is empty")]
    EmptyText,

    #[error("Staging failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Job store failed: {0}")]
    Job(#[from] JobError),
}

pub type Result<T> = std::result::Result<T, CruiseQuoteError>;
