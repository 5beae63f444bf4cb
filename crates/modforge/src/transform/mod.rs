//! Transformation providers.
//!
//! A [`Transformer`] turns raw artifact content plus a free-form directive
//! into new content, a changelog, and a token count. The engine calls it
//! exactly once per run and never retries.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{ProviderConfig, ProviderKind};
use crate::secrets;

mod openai;
pub mod prompt;
mod stub;

pub use openai::{OpenAiSettings, OpenAiTransformer, DEFAULT_BASE_URL as DEFAULT_OPENAI_BASE_URL};
pub use stub::StubTransformer;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to parse provider response: {0}")]
    ResponseParse(String),

    #[error("artifact content is not valid UTF-8")]
    NonUtf8Content,

    #[error("transformed content is invalid for {artifact_type}: {reason}")]
    InvalidOutput {
        artifact_type: String,
        reason: String,
    },

    #[error("no API key configured for provider '{0}'")]
    MissingApiKey(String),

    #[error("transformation rejected: {0}")]
    Rejected(String),
}

/// Input to one transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    pub content: Vec<u8>,
    pub directive: String,
    pub artifact_type: String,
    /// Extra `{key}` → value replacements applied to the directive.
    pub substitutions: BTreeMap<String, String>,
}

impl TransformRequest {
    pub fn new(
        content: impl Into<Vec<u8>>,
        directive: impl Into<String>,
        artifact_type: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            directive: directive.into(),
            artifact_type: artifact_type.into(),
            substitutions: BTreeMap::new(),
        }
    }

    pub fn with_substitution(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.substitutions.insert(key.into(), value.into());
        self
    }

    pub fn content_str(&self) -> Result<&str, TransformError> {
        std::str::from_utf8(&self.content).map_err(|_| TransformError::NonUtf8Content)
    }
}

/// Result of one transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub content: Vec<u8>,
    pub changelog: String,
    pub tokens_used: u32,
}

#[async_trait]
pub trait Transformer: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    async fn transform(&self, request: &TransformRequest) -> Result<TransformOutput, TransformError>;
}

/// Builds the provider selected by configuration.
pub fn build_transformer(config: &ProviderConfig) -> crate::Result<Arc<dyn Transformer>> {
    match config.kind {
        ProviderKind::Stub => Ok(Arc::new(StubTransformer::new())),
        ProviderKind::Openai => {
            let api_key = secrets::resolve_secret_optional(
                config.api_key.as_deref(),
                config.api_key_file.as_deref(),
                config.api_key_env_var.as_deref(),
            )?
            .ok_or_else(|| TransformError::MissingApiKey("openai".to_string()))?;
            let settings = OpenAiSettings {
                base_url: config.base_url.clone(),
                model: config.model.clone(),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                timeout: Duration::from_secs(config.timeout_secs),
            };
            Ok(Arc::new(OpenAiTransformer::new(api_key, settings)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForgeError;

    #[test]
    fn test_request_builder() {
        let request = TransformRequest::new("abc", "do it", "lua").with_substitution("tier", "epic");
        assert_eq!(request.content_str().unwrap(), "abc");
        assert_eq!(request.substitutions.get("tier").map(String::as_str), Some("epic"));
    }

    #[test]
    fn test_non_utf8_content() {
        let request = TransformRequest::new(vec![0xff, 0xfe], "x", "minecraft");
        assert!(matches!(
            request.content_str(),
            Err(TransformError::NonUtf8Content)
        ));
    }

    #[test]
    fn test_build_stub_provider() {
        let provider = build_transformer(&ProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "stub");
    }

    #[test]
    fn test_openai_without_key_fails() {
        let config = ProviderConfig {
            kind: ProviderKind::Openai,
            api_key: None,
            api_key_file: None,
            api_key_env_var: None,
            ..ProviderConfig::default()
        };
        let err = build_transformer(&config).err().unwrap();
        assert!(matches!(
            err,
            ForgeError::Transform(TransformError::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_build_openai_provider_with_direct_key() {
        let config = ProviderConfig {
            kind: ProviderKind::Openai,
            api_key: Some("sk-test".to_string()),
            ..ProviderConfig::default()
        };
        let provider = build_transformer(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
