//! Resolution of the model API key.
//!
//! Sources are tried in order: inline value, file (Docker secrets style),
//! environment variable. Configuring none of them is allowed; local model
//! endpoints usually need no key.

use secrecy::SecretString;
use std::fs;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Failed to read secret from file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{path}' is empty")]
    EmptyFile { path: String },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Where a secret may come from. Empty strings count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSources<'a> {
    pub value: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSources<'a> {
    pub fn is_configured(&self) -> bool {
        non_empty(self.value).is_some()
            || non_empty(self.file).is_some()
            || non_empty(self.env_var).is_some()
    }
}

/// Returns `Ok(None)` when no source is configured. A configured source
/// that cannot be read is an error; later sources are not consulted.
pub fn resolve_secret(sources: &SecretSources<'_>) -> Result<Option<SecretString>, SecretError> {
    if let Some(value) = non_empty(sources.value) {
        return Ok(Some(SecretString::from(value.to_string())));
    }

    if let Some(path) = non_empty(sources.file) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|source| SecretError::FileRead {
            path: expanded.clone(),
            source,
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::EmptyFile { path: expanded });
        }
        return Ok(Some(SecretString::from(trimmed.to_string())));
    }

    if let Some(name) = non_empty(sources.env_var) {
        return match std::env::var(name) {
            Ok(value) => Ok(Some(SecretString::from(value.trim().to_string()))),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Ok(None)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Expands a leading `~` or `~/` to the home directory.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
