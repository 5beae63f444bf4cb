//! Submission validation and artifact-type detection.
//!
//! Classification is a pure function of (filename, bytes). The engine
//! treats its result as an opaque tag.

use std::path::Path;

use thiserror::Error;

pub const MINECRAFT: &str = "minecraft";
pub const SKYRIM: &str = "skyrim";
pub const LUA: &str = "lua";
pub const UNKNOWN: &str = "unknown";

/// Extensions accepted for upload (lowercase, without the dot).
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jar", "zip", "json", "lua", "esp", "esm"];

const MINECRAFT_JSON_MARKERS: &[&str] = &[
    "minecraft:",
    "modid",
    "forge",
    "fabric",
    "item",
    "block",
    "recipe",
    "texture",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("owner id must not be empty")]
    EmptyOwner,

    #[error("filename must not be empty")]
    EmptyFilename,

    #[error("unsupported file type '{0}'")]
    UnsupportedExtension(String),

    #[error("file size {size} exceeds the maximum of {max} bytes")]
    TooLarge { size: u64, max: u64 },
}

/// An upload as received from a client, before any side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub owner_id: String,
    pub filename: String,
    pub size: u64,
    pub content: Vec<u8>,
    pub artifact_type: String,
}

impl Submission {
    pub fn new(
        owner_id: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<Vec<u8>>,
        artifact_type: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            owner_id: owner_id.into(),
            filename: filename.into(),
            size: content.len() as u64,
            content,
            artifact_type: artifact_type.into(),
        }
    }

    /// Overrides the declared size (normally the content length). The
    /// declared size is what the job records as the original size.
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Checks the submission against upload rules.
    pub fn validate(&self, max_upload_bytes: u64) -> Result<(), SubmissionError> {
        if self.owner_id.trim().is_empty() {
            return Err(SubmissionError::EmptyOwner);
        }
        if self.filename.trim().is_empty() {
            return Err(SubmissionError::EmptyFilename);
        }

        let ext = extension(&self.filename);
        if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(SubmissionError::UnsupportedExtension(ext));
        }

        let actual = self.content.len() as u64;
        if self.size > max_upload_bytes || actual > max_upload_bytes {
            return Err(SubmissionError::TooLarge {
                size: self.size.max(actual),
                max: max_upload_bytes,
            });
        }
        Ok(())
    }
}

fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Maps an artifact to its type tag.
pub trait ArtifactClassifier: Send + Sync {
    fn classify(&self, filename: &str, content: &[u8]) -> String;
}

impl<F> ArtifactClassifier for F
where
    F: Fn(&str, &[u8]) -> String + Send + Sync,
{
    fn classify(&self, filename: &str, content: &[u8]) -> String {
        self(filename, content)
    }
}

/// Extension first, then content markers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionClassifier;

impl ArtifactClassifier for ExtensionClassifier {
    fn classify(&self, filename: &str, content: &[u8]) -> String {
        let text = String::from_utf8_lossy(content);

        match extension(filename).as_str() {
            "json" => {
                let lower = text.to_lowercase();
                if MINECRAFT_JSON_MARKERS.iter().any(|m| lower.contains(m)) {
                    return MINECRAFT.to_string();
                }
            }
            "esp" | "esm" => return SKYRIM.to_string(),
            "lua" => return LUA.to_string(),
            _ => {}
        }

        let tag = if text.contains("minecraft:")
            || text.contains("modid")
            || (text.contains("block") && text.contains("item"))
        {
            MINECRAFT
        } else if text.contains("GRUP") || text.contains("TES4") || text.contains("Skyrim.esm") {
            SKYRIM
        } else if text.contains("function") || text.contains("local") || text.contains("require") {
            LUA
        } else {
            UNKNOWN
        };
        tag.to_string()
    }
}
