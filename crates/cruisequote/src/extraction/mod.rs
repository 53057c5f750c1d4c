//! Model-driven extraction of structured quotes from document text.

pub mod client;
pub mod parser;
pub mod prompt;
pub mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::ExtractionError;
use crate::sanitize::excerpt;

pub use client::{HttpModelClient, ModelClient};
pub use parser::{parse_iso_date, parse_reply};
pub use prompt::PROMPT_ID;
pub use types::{CabinCategory, ParseResult, ParsedQuote};

const REPLY_EXCERPT_CHARS: usize = 160;

/// Renders the prompt, calls the model and validates its reply.
#[derive(Clone)]
pub struct QuoteExtractor {
    client: Arc<dyn ModelClient>,
}

impl QuoteExtractor {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    pub fn model_id(&self) -> &str {
        self.client.model_id()
    }

    pub fn prompt_id(&self) -> &'static str {
        PROMPT_ID
    }

    /// Fails with `Cancelled` as soon as `cancel` fires, even mid-request.
    pub async fn extract_quotes(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ParseResult, ExtractionError> {
        let prompt = prompt::render(text);

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExtractionError::Cancelled),
            reply = self.client.complete(&prompt) => reply?,
        };

        tracing::debug!(
            model = self.client.model_id(),
            reply_chars = reply.chars().count(),
            reply = %excerpt(&reply, REPLY_EXCERPT_CHARS),
            "model replied"
        );

        parse_reply(&reply)
    }
}
