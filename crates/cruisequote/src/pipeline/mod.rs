//! Per-job orchestration: text → model → catalog match → quotes → summary.

pub mod context;
pub mod error;
pub mod runner;

pub use context::PipelineContext;
pub use error::PipelineError;
pub use runner::{Pipeline, RunOutcome};
