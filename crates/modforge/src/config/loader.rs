use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let engine = &config.engine;
    let limits = [
        ("engine.max_concurrent_runs", engine.max_concurrent_runs as u64),
        ("engine.transform_timeout_secs", engine.transform_timeout_secs),
        ("engine.max_upload_bytes", engine.max_upload_bytes),
        ("engine.max_page_size", u64::from(engine.max_page_size)),
        ("storage.sign_ttl_secs", config.storage.sign_ttl_secs),
        ("provider.timeout_secs", config.provider.timeout_secs),
    ];
    for (name, value) in limits {
        if value == 0 {
            return Err(ConfigError::Validation {
                message: format!("{} must be greater than zero", name),
            });
        }
    }

    if config.storage.public_base_url.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "storage.public_base_url must not be empty".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogFormat, ProviderKind};
    use std::io::Write;

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Stub);
        assert_eq!(config.engine.credit_cost, 2);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database": { "path": "/var/lib/modforge/jobs.db" },
            "storage": {
                "root": "/var/lib/modforge/blobs",
                "public_base_url": "https://cdn.example.com/mods",
                "sign_ttl_secs": 600
            },
            "provider": {
                "kind": "openai",
                "model": "gpt-4o-mini",
                "api_key_env_var": "MY_KEY",
                "max_tokens": 2000,
                "temperature": 0.2
            },
            "engine": {
                "max_concurrent_runs": 4,
                "transform_timeout_secs": 60,
                "credit_cost": 5,
                "max_upload_bytes": 1048576,
                "max_page_size": 50
            },
            "logging": { "level": "debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Openai);
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.storage.sign_ttl_secs, 600);
        assert_eq!(config.engine.max_concurrent_runs, 4);
        assert_eq!(config.engine.credit_cost, 5);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_version_fails_schema() {
        let err = load_config_from_str(r#"{ "engine": {} }"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_unknown_provider_fails_schema() {
        let err = load_config_from_str(r#"{ "version": "1.0", "provider": { "kind": "llama" } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_unknown_top_level_key_fails_schema() {
        let err = load_config_from_str(r#"{ "version": "1.0", "workers": 3 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_unsupported_version() {
        let err = load_config_from_str(r#"{ "version": "2.0" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidation { .. }));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = load_config_from_str(r#"{ "version": "1.0", "engine": { "max_page_size": 0 } }"#)
            .unwrap_err();
        match err {
            ConfigError::SchemaValidation { .. } => {}
            ConfigError::Validation { message } => assert!(message.contains("max_page_size")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_invalid_json() {
        let err = load_config_from_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "version": "1.0", "logging": {{ "level": "warn" }} }}"#).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/modforge.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
