//! Configuration module for s3sync.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation and defaults. Command-line flags are merged
//! on top of these values by the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::ExcludeSet;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for s3sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Settings for the walk, fingerprint and manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Manifest location; relative paths resolve against the working directory.
    pub manifest_path: PathBuf,
    /// File and directory names that are always excluded.
    pub exclude: Vec<String>,
    /// Read buffer used when fingerprinting files (in KiB).
    pub hash_chunk_kb: u64,
}

/// Which blob store adapter to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// PUT objects to an S3-compatible HTTP endpoint.
    Http,
    /// Write objects below a local directory (one sub-directory per bucket).
    Filesystem,
}

/// Blob store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Base URL for the `http` backend; objects go to `{endpoint}/{bucket}/{key}`.
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer token for the `http` backend.
    pub token_env: String,
    /// Per-request timeout for the `http` backend (seconds).
    pub timeout_secs: u64,
    /// Directory holding buckets for the `filesystem` backend.
    pub root: Option<PathBuf>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` if it exists; a missing file yields [`Config::default`].
    ///
    /// Unlike a silent fallback, a file that exists but fails to parse is an
    /// error, so a typo in the config never changes what gets uploaded.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/s3sync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("s3sync")
            .join("config.yaml")
    }
}

impl SyncConfig {
    /// Configured exclusions as an [`ExcludeSet`].
    pub fn exclude_set(&self) -> ExcludeSet {
        self.exclude.iter().map(String::as_str).collect()
    }

    /// Fingerprint read buffer size in bytes.
    pub fn hash_chunk_bytes(&self) -> usize {
        (self.hash_chunk_kb as usize).saturating_mul(1024)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default manifest file name, resolved against the working directory.
pub const DEFAULT_MANIFEST_PATH: &str = ".state.json";

/// Default environment variable for the `http` backend token.
pub const DEFAULT_TOKEN_ENV: &str = "S3SYNC_TOKEN";

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            exclude: Vec::new(),
            hash_chunk_kb: 64,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Http,
            endpoint: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_secs: 300,
            root: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.hash_chunk_kb"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Backend-specific
    /// requirements (an endpoint for `http`, a root for `filesystem`) are
    /// checked when the store is built, because CLI flags may supply them.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.manifest_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.manifest_path".into(),
                message: "must not be empty".into(),
            });
        }
        if self.sync.hash_chunk_kb == 0 {
            errors.push(ValidationError {
                field: "sync.hash_chunk_kb".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.exclude.iter().any(|name| name.is_empty()) {
            errors.push(ValidationError {
                field: "sync.exclude".into(),
                message: "names must not be empty".into(),
            });
        }

        // --- store ---
        if self.store.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "store.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if let Some(endpoint) = &self.store.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                errors.push(ValidationError {
                    field: "store.endpoint".into(),
                    message: format!("must start with http:// or https://, got '{endpoint}'"),
                });
            }
        }
        if self.store.token_env.is_empty() {
            errors.push(ValidationError {
                field: "store.token_env".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.sync.manifest_path, PathBuf::from(".state.json"));
        assert!(cfg.sync.exclude.is_empty());
        assert_eq!(cfg.sync.hash_chunk_bytes(), 64 * 1024);
        assert_eq!(cfg.store.backend, StoreBackend::Http);
        assert_eq!(cfg.store.token_env, "S3SYNC_TOKEN");
        assert_eq!(cfg.store.timeout_secs, 300);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
sync:
  manifest_path: /var/lib/s3sync/state.json
  exclude: [node_modules, .git]
  hash_chunk_kb: 256
store:
  backend: filesystem
  root: /srv/buckets
logging:
  level: debug
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).unwrap();
        assert_eq!(
            cfg.sync.manifest_path,
            PathBuf::from("/var/lib/s3sync/state.json")
        );
        assert_eq!(cfg.sync.exclude, vec!["node_modules", ".git"]);
        assert!(cfg.sync.exclude_set().is_excluded("node_modules".as_ref()));
        assert_eq!(cfg.sync.hash_chunk_kb, 256);
        assert_eq!(cfg.store.backend, StoreBackend::Filesystem);
        assert_eq!(cfg.store.root, Some(PathBuf::from("/srv/buckets")));
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.store.timeout_secs, 300);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml")).unwrap();
        assert_eq!(cfg.sync.hash_chunk_kb, 64);
    }

    #[test]
    fn load_or_default_fails_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
        assert!(Config::load_or_default(tmp.path()).is_err());
    }

    #[test]
    fn validate_catches_zero_chunk_and_timeout() {
        let mut cfg = Config::default();
        cfg.sync.hash_chunk_kb = 0;
        cfg.store.timeout_secs = 0;
        let errors = cfg.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"sync.hash_chunk_kb"));
        assert!(fields.contains(&"store.timeout_secs"));
    }

    #[test]
    fn validate_catches_bad_endpoint_scheme() {
        let mut cfg = Config::default();
        cfg.store.endpoint = Some("s3.example.com".to_string());
        let errors = cfg.validate();
        assert!(errors
            .iter()
            .any(|e| e.field == "store.endpoint" && e.message.contains("http://")));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validate_catches_empty_exclude_name() {
        let mut cfg = Config::default();
        cfg.sync.exclude = vec![String::new()];
        assert!(cfg.validate().iter().any(|e| e.field == "sync.exclude"));
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "logging.level".into(),
            message: "bad".into(),
        };
        assert_eq!(err.to_string(), "logging.level: bad");
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("s3sync/config.yaml"));
    }
}
