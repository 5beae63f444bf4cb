use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::prompt::{build_prompt, parse_reply, system_prompt, validate_content};
use super::{TransformError, TransformOutput, TransformRequest, Transformer};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection and sampling settings for [`OpenAiTransformer`].
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 4000,
            temperature: 0.7,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

/// Chat-completions provider (OpenAI or any compatible endpoint).
pub struct OpenAiTransformer {
    client: Client,
    api_key: SecretString,
    settings: OpenAiSettings,
}

impl OpenAiTransformer {
    pub fn new(api_key: SecretString, settings: OpenAiSettings) -> Result<Self, TransformError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            client,
            api_key,
            settings,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, TransformError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(TransformError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TransformError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TransformError::ResponseParse(e.to_string()))
    }
}

#[async_trait]
impl Transformer for OpenAiTransformer {
    fn name(&self) -> &str {
        "openai"
    }

    async fn transform(&self, request: &TransformRequest) -> Result<TransformOutput, TransformError> {
        let content = request.content_str()?;
        let chat = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(&request.artifact_type),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(&request.directive, content, &request.substitutions),
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let response = self.send(&chat).await?;
        let reply = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| TransformError::ResponseParse("no choices in response".to_string()))?;

        let (processed, changelog) = parse_reply(&reply);
        validate_content(&processed, &request.artifact_type)?;

        Ok(TransformOutput {
            content: processed.into_bytes(),
            changelog,
            tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}
