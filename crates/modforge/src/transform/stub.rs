use std::time::Duration;

use async_trait::async_trait;

use super::prompt::validate_content;
use super::{TransformError, TransformOutput, TransformRequest, Transformer};

/// Usage reported by the stub for every successful call.
pub const STUB_TOKENS_USED: u32 = 100;

/// Fixed textual rewrites, applied in order.
const REWRITES: &[(&str, &str)] = &[
    ("minecraft:diamond", "minecraft:netherite_ingot"),
    ("enhanced_diamond_sword", "legendary_netherite_sword"),
    (
        "\"count\": 1",
        "\"count\": 1,\n      \"components\": {\n        \"minecraft:enchantments\": {\n          \"minecraft:sharpness\": 3,\n          \"minecraft:unbreaking\": 2\n        }\n      }",
    ),
];

#[derive(Debug, Clone)]
enum Behavior {
    Rewrite,
    Fail(String),
}

/// Deterministic offline provider.
///
/// Output depends only on (content, directive, substitutions), so identical
/// requests always produce byte-identical results.
#[derive(Debug, Clone)]
pub struct StubTransformer {
    behavior: Behavior,
    delay: Option<Duration>,
}

impl Default for StubTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl StubTransformer {
    pub fn new() -> Self {
        Self {
            behavior: Behavior::Rewrite,
            delay: None,
        }
    }

    /// A stub whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Fail(message.into()),
            delay: None,
        }
    }

    /// Sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Applies the fixed rewrites and `{key}` substitutions on raw bytes.
    /// Text gets a header naming the directive; binary archives are never
    /// prefixed, so an untouched jar stays a valid jar.
    fn rewrite(request: &TransformRequest) -> Vec<u8> {
        let mut content = request.content.clone();
        for (from, to) in REWRITES {
            content = replace_bytes(&content, from.as_bytes(), to.as_bytes());
        }
        for (key, value) in &request.substitutions {
            let placeholder = format!("{{{}}}", key);
            content = replace_bytes(&content, placeholder.as_bytes(), value.as_bytes());
        }

        if std::str::from_utf8(&content).is_err() {
            return content;
        }
        let mut out = format!(
            "// Enhanced by modforge with directive: {}\n\
             // - Upgraded materials from diamond to netherite\n\
             // - Added enchantments for better gameplay\n",
            request.directive
        )
        .into_bytes();
        out.extend_from_slice(&content);
        out
    }
}

/// Replaces every non-overlapping occurrence of `from`, left to right.
fn replace_bytes(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = rest.windows(from.len()).position(|w| w == from) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(to);
        rest = &rest[pos + from.len()..];
    }
    out.extend_from_slice(rest);
    out
}

#[async_trait]
impl Transformer for StubTransformer {
    fn name(&self) -> &str {
        "stub"
    }

    async fn transform(&self, request: &TransformRequest) -> Result<TransformOutput, TransformError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let content = match &self.behavior {
            Behavior::Fail(message) => return Err(TransformError::Rejected(message.clone())),
            Behavior::Rewrite => Self::rewrite(request),
        };
        if let Ok(text) = std::str::from_utf8(&content) {
            validate_content(text, &request.artifact_type)?;
        }

        Ok(TransformOutput {
            content,
            changelog: format!("Deterministic enhancement: {}", request.directive),
            tokens_used: STUB_TOKENS_USED,
        })
    }
}
