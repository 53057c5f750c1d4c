use serde::{Deserialize, Serialize};

use crate::secrets::{resolve_secret, SecretError, SecretSources};
use secrecy::SecretString;

/// Hard ceiling on accepted uploads (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_database_path() -> String {
    crate::db::default_database_path()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "cruisequote.db".to_string())
}

fn default_upload_directory() -> String {
    dirs::home_dir()
        .map(|h| {
            h.join(".cruisequote")
                .join("uploads")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "uploads".to_string())
}

fn default_max_upload_bytes() -> u64 {
    MAX_UPLOAD_BYTES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of processor tasks, and the depth of the hand-off channel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// `running` jobs started longer ago than this are failed at startup.
    #[serde(default = "default_abandoned_after")]
    pub abandoned_after_secs: u64,
}

fn default_concurrency() -> usize {
    1
}

fn default_poll_interval() -> u64 {
    5
}

fn default_abandoned_after() -> u64 {
    3600
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_secs: default_poll_interval(),
            abandoned_after_secs: default_abandoned_after(),
        }
    }
}

/// OpenAI-compatible chat-completions endpoint used for extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:11434/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "qwen2.5:7b-instruct".to_string()
}

fn default_model_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_model_timeout(),
            api_key: None,
            api_key_file: None,
            api_key_env: None,
        }
    }
}

impl ModelConfig {
    pub fn api_key_sources(&self) -> SecretSources<'_> {
        SecretSources {
            value: self.api_key.as_deref(),
            file: self.api_key_file.as_deref(),
            env_var: self.api_key_env.as_deref(),
        }
    }

    /// `None` when no key source is configured.
    pub fn resolve_api_key(&self) -> Result<Option<SecretString>, SecretError> {
        resolve_secret(&self.api_key_sources())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}
