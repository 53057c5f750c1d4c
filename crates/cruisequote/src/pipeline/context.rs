use crate::jobs::{ImportJob, ImportResultSummary};

pub struct PipelineContext {
    // Input, as returned by mark_started
    pub job: ImportJob,

    // Row accounting and warnings, accumulated across steps
    pub summary: ImportResultSummary,
}

impl PipelineContext {
    pub fn new(job: ImportJob) -> Self {
        Self {
            job,
            summary: ImportResultSummary::default(),
        }
    }

    pub fn warn(&mut self, warning: String) {
        tracing::warn!(warning = %warning, "import warning");
        self.summary.warnings.push(warning);
    }

    /// The summary to persist with a failed job: only worth writing when
    /// something was recorded.
    pub fn partial_summary(&self) -> Option<&ImportResultSummary> {
        let s = &self.summary;
        let touched = !s.warnings.is_empty() || s.total_rows > 0 || s.created_quotes > 0;
        touched.then_some(s)
    }
}
