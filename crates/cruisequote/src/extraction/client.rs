//! Transport to the extraction model.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::ExtractionError;

/// Sends one prompt and returns the model's raw reply text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier recorded on each import job.
    fn model_id(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, ExtractionError>;
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
pub struct HttpModelClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout_secs: u64,
    api_key: Option<SecretString>,
}

impl HttpModelClient {
    pub fn new(config: &ModelConfig, api_key: Option<SecretString>) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            api_key,
        })
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ExtractionError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ExtractionError::Transport(format!("cannot connect to {}", self.endpoint))
            } else if e.is_timeout() {
                ExtractionError::Transport(format!(
                    "request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                ExtractionError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Transport(format!(
                "model endpoint returned {}: {}",
                status.as_u16(),
                crate::sanitize::excerpt(&body, 200)
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Transport(format!("undecodable response body: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ExtractionError::Empty);
        }
        Ok(content)
    }
}
