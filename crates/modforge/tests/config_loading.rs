//! Table-driven tests for configuration loading and engine wiring.

use modforge::config::{LogFormat, ProviderKind};
use modforge::{load_config_from_str, Config, JobEngine};

struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const JSON_CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{ "version": "1.0" }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_stub_in_memory",
        config_json: r#"{
            "version": "1.0",
            "database": { "in_memory": true },
            "provider": { "kind": "stub" },
            "engine": { "max_concurrent_runs": 1, "credit_cost": 0 }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_openai_with_env_key",
        config_json: r#"{
            "version": "1.0",
            "provider": {
                "kind": "openai",
                "model": "gpt-4o",
                "base_url": "https://api.openai.com/v1",
                "api_key_env_var": "OPENAI_API_KEY",
                "temperature": 0.7
            },
            "logging": { "level": "modforge=debug,info", "format": "json" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "invalid_json",
        config_json: r#"{ "version": "1.0", "#,
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
    ConfigTestCase {
        name: "invalid_missing_version",
        config_json: r#"{ "storage": { "root": "/srv/blobs" } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "invalid_negative_timeout",
        config_json: r#"{ "version": "1.0", "engine": { "transform_timeout_secs": -5 } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "invalid_temperature",
        config_json: r#"{ "version": "1.0", "provider": { "temperature": 3.5 } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "invalid_log_format",
        config_json: r#"{ "version": "1.0", "logging": { "format": "xml" } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "invalid_unknown_engine_key",
        config_json: r#"{ "version": "1.0", "engine": { "workers": 4 } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
];

#[test]
fn test_json_config_loading() {
    for test_case in JSON_CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_json);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_defaults_match_documented_values() {
    let config = Config::default();
    assert_eq!(config.version, "1.0");
    assert_eq!(config.provider.kind, ProviderKind::Stub);
    assert_eq!(config.engine.credit_cost, 2);
    assert_eq!(config.engine.transform_timeout_secs, 300);
    assert_eq!(config.engine.max_page_size, 100);
    assert_eq!(config.storage.sign_ttl_secs, 3600);
    assert_eq!(config.logging.format, LogFormat::Text);
}

#[tokio::test]
async fn test_engine_from_loaded_config() {
    let dir = tempfile::tempdir().unwrap();
    let json = format!(
        r#"{{
            "version": "1.0",
            "database": {{ "path": "{db}" }},
            "storage": {{ "root": "{blobs}", "public_base_url": "http://files.local" }},
            "engine": {{ "credit_cost": 5, "max_concurrent_runs": 2 }}
        }}"#,
        db = dir.path().join("jobs.db").display(),
        blobs = dir.path().join("blobs").display(),
    );
    let config = load_config_from_str(&json).unwrap();
    let engine = JobEngine::from_config(&config).unwrap();

    let job = engine
        .submit_detected("u1", "mod.json", br#"{"minecraft:diamond":1}"#.to_vec())
        .await
        .unwrap();
    assert_eq!(job.artifact_type(), "minecraft");
    assert!(job.original_handle().starts_with("http://files.local/"));

    engine.trigger(job.id(), "polish").unwrap();
    engine.wait_for(job.id()).await;

    let done = engine.status(job.id()).unwrap();
    assert_eq!(done.output().map(|o| o.credits_used), Some(5));
    assert!(dir.path().join("jobs.db").exists());
}
