//! Prompt assembly and reply handling for chat-style providers.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::TransformError;

/// Changelog used when a provider reply carries none.
pub const DEFAULT_CHANGELOG: &str = "AI-generated modifications applied";

const CONTENT_PLACEHOLDER: &str = "{content}";

pub fn system_prompt(artifact_type: &str) -> String {
    format!(
        "You are an expert game modding assistant specializing in {} mods.\n\
         Your job is to modify game mod files while preserving their technical structure.\n\
         \n\
         Rules:\n\
         1. Always keep the file structure valid\n\
         2. Only modify content that makes sense to change\n\
         3. Preserve all technical IDs, keys, and references\n\
         4. Provide a brief changelog of what you modified\n\
         5. Be conservative\n\
         \n\
         Respond with a JSON object containing:\n\
         {{\n  \"processed_content\": \"the modified content\",\n  \"changelog\": \"brief summary of changes made\"\n}}",
        artifact_type
    )
}

/// Fills the directive template.
///
/// Substitutions run before the content is inserted so that placeholders
/// occurring inside the artifact itself are left alone. A template without
/// `{content}` gets the content appended after a blank line.
pub fn build_prompt(template: &str, content: &str, substitutions: &BTreeMap<String, String>) -> String {
    let mut prompt = template.to_string();
    for (key, value) in substitutions {
        if key == "content" {
            continue;
        }
        prompt = prompt.replace(&format!("{{{}}}", key), value);
    }

    if prompt.contains(CONTENT_PLACEHOLDER) {
        prompt.replace(CONTENT_PLACEHOLDER, content)
    } else {
        format!("{}\n\n{}", prompt, content)
    }
}

#[derive(Deserialize)]
struct StructuredReply {
    processed_content: String,
    #[serde(default)]
    changelog: Option<String>,
}

/// Splits a provider reply into (content, changelog).
///
/// Replies shaped like `{"processed_content": ..., "changelog": ...}`,
/// optionally inside a fenced code block, are unpacked. Anything else is
/// taken verbatim as the new content.
pub fn parse_reply(reply: &str) -> (String, String) {
    let trimmed = strip_code_fence(reply.trim());
    match serde_json::from_str::<StructuredReply>(trimmed) {
        Ok(parsed) => {
            let changelog = parsed
                .changelog
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CHANGELOG.to_string());
            (parsed.processed_content, changelog)
        }
        Err(_) => (reply.to_string(), DEFAULT_CHANGELOG.to_string()),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening fence line.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// Cheap structural check on transformed content.
pub fn validate_content(content: &str, artifact_type: &str) -> Result<(), TransformError> {
    match artifact_type {
        "minecraft" if !(content.contains('{') && content.contains('}')) => {
            Err(TransformError::InvalidOutput {
                artifact_type: artifact_type.to_string(),
                reason: "invalid JSON structure".to_string(),
            })
        }
        _ => Ok(()),
    }
}
