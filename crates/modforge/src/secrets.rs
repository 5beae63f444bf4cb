//! Provider credential resolution.
//!
//! An API key may be given directly in the config, as a path to a file
//! holding it (Docker secrets), or as the name of an environment variable.
//! The first non-empty source wins, in that order.

use std::fmt;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Secret from {source_kind} is empty")]
    Empty { source_kind: SecretSource },
}

/// Where a secret came from. Safe to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Direct,
    File,
    Env,
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SecretSource::Direct => "direct value",
            SecretSource::File => "file",
            SecretSource::Env => "environment variable",
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Picks the source that [`resolve_secret`] would read, if any.
pub fn select_source(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Option<SecretSource> {
    if non_empty(direct).is_some() {
        Some(SecretSource::Direct)
    } else if non_empty(file_path).is_some() {
        Some(SecretSource::File)
    } else if non_empty(env_var).is_some() {
        Some(SecretSource::Env)
    } else {
        None
    }
}

/// Resolves a secret from the first configured source. File and env values
/// are trimmed; an empty result is an error.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString, SecretError> {
    let source = select_source(direct, file_path, env_var).ok_or(SecretError::NoSourceProvided)?;

    let value = match source {
        SecretSource::Direct => direct.unwrap_or_default().to_string(),
        SecretSource::File => {
            let expanded = expand_home(file_path.unwrap_or_default());
            std::fs::read_to_string(&expanded)
                .map_err(|e| SecretError::FileReadError {
                    path: expanded.clone(),
                    source: e,
                })?
                .trim()
                .to_string()
        }
        SecretSource::Env => {
            let name = env_var.unwrap_or_default();
            match std::env::var(name) {
                Ok(value) => value.trim().to_string(),
                Err(std::env::VarError::NotPresent) => {
                    return Err(SecretError::EnvVarNotSet {
                        name: name.to_string(),
                    })
                }
                Err(std::env::VarError::NotUnicode(_)) => {
                    return Err(SecretError::EnvVarNotUnicode {
                        name: name.to_string(),
                    })
                }
            }
        }
    };

    if value.is_empty() {
        return Err(SecretError::Empty {
            source_kind: source,
        });
    }
    tracing::debug!(source = %source, "Resolved provider secret");
    Ok(SecretString::from(value))
}

/// Like [`resolve_secret`], but `Ok(None)` when nothing is configured.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>, SecretError> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.to_string_lossy(), rest),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("MODFORGE_TEST_KEY_1", "env_value");
        let result = resolve_secret(Some("sk-direct"), None, Some("MODFORGE_TEST_KEY_1")).unwrap();
        assert_eq!(result.expose_secret(), "sk-direct");
        std::env::remove_var("MODFORGE_TEST_KEY_1");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "  sk-from-file  ").unwrap();

        std::env::set_var("MODFORGE_TEST_KEY_2", "env_value");
        let result = resolve_secret(
            None,
            Some(temp_file.path().to_str().unwrap()),
            Some("MODFORGE_TEST_KEY_2"),
        )
        .unwrap();
        assert_eq!(result.expose_secret(), "sk-from-file");
        std::env::remove_var("MODFORGE_TEST_KEY_2");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback_and_empty_strings() {
        std::env::set_var("MODFORGE_TEST_KEY_3", "sk-env\n");
        let result = resolve_secret(Some(""), Some(""), Some("MODFORGE_TEST_KEY_3")).unwrap();
        assert_eq!(result.expose_secret(), "sk-env");
        std::env::remove_var("MODFORGE_TEST_KEY_3");
    }

    #[test]
    #[serial]
    fn test_blank_env_value_is_error() {
        std::env::set_var("MODFORGE_TEST_KEY_4", "   ");
        let result = resolve_secret(None, None, Some("MODFORGE_TEST_KEY_4"));
        assert!(matches!(
            result,
            Err(SecretError::Empty {
                source_kind: SecretSource::Env
            })
        ));
        std::env::remove_var("MODFORGE_TEST_KEY_4");
    }

    #[test]
    fn test_no_source() {
        assert!(matches!(
            resolve_secret(None, None, None),
            Err(SecretError::NoSourceProvided)
        ));
        assert!(resolve_secret_optional(None, Some(""), None).unwrap().is_none());
    }

    #[test]
    fn test_missing_file_and_env() {
        assert!(matches!(
            resolve_secret(None, Some("/nonexistent/path/to/key"), None),
            Err(SecretError::FileReadError { .. })
        ));
        assert!(matches!(
            resolve_secret_optional(None, None, Some("MODFORGE_DEFINITELY_UNSET_98765")),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn test_select_source() {
        assert_eq!(select_source(Some("x"), Some("f"), Some("E")), Some(SecretSource::Direct));
        assert_eq!(select_source(None, Some("f"), Some("E")), Some(SecretSource::File));
        assert_eq!(select_source(Some(""), None, Some("E")), Some(SecretSource::Env));
        assert_eq!(select_source(None, None, None), None);
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        let home = home.to_string_lossy();
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/keys/openai"), format!("{}/keys/openai", home));
        assert_eq!(expand_home("~alice/key"), "~alice/key");
        assert_eq!(expand_home("/abs/key"), "/abs/key");
    }
}
