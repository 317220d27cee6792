//! Engine configuration loaded from TOML.
//!
//! Every field is optional in the file; missing values fall back to the
//! built-in defaults. Example:
//!
//! ```toml
//! lookup_url = "https://lookup.example.com/api/documents"
//! timeout_secs = 30
//! max_retry_attempts = 3
//! base_url = "https://docs.example.com/portal"
//! view_path_prefix = "view/"
//!
//! [[replacement]]
//! old_title = "Draft"
//! new_title = "Final"
//! new_content_id = "TSRC-ABC-000111"
//! ```

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::record::{ReplacementRule, TargetSettings};
use crate::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRY_ATTEMPTS, RetryPolicy};

/// Directory name under the user config root.
const CONFIG_DIR_NAME: &str = "hyperlink-repair";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound for `max_retry_attempts`.
pub const MAX_RETRY_ATTEMPTS_LIMIT: u32 = 10;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has mistyped values.
    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its allowed range.
    #[error("Invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::Invalid {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// File-backed engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Lookup service endpoint; lookups are skipped when unset.
    pub lookup_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retry_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_backoff: bool,
    /// Address written into rewritten links.
    pub base_url: String,
    /// Prefix joined with a document id to form the rewritten anchor.
    pub view_path_prefix: String,
    #[serde(rename = "replacement")]
    pub replacements: Vec<ReplacementRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let target = TargetSettings::default();
        Self {
            lookup_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            base_delay_ms: duration_ms(DEFAULT_BASE_DELAY),
            max_delay_ms: duration_ms(DEFAULT_MAX_DELAY),
            exponential_backoff: true,
            base_url: target.base_url,
            view_path_prefix: target.view_path_prefix,
            replacements: Vec::new(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=3600).contains(&self.timeout_secs) {
            return Err(ConfigError::invalid(
                "timeout_secs",
                self.timeout_secs,
                "range: 1..=3600",
            ));
        }
        if self.max_retry_attempts > MAX_RETRY_ATTEMPTS_LIMIT {
            return Err(ConfigError::invalid(
                "max_retry_attempts",
                self.max_retry_attempts,
                "range: 0..=10",
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::invalid(
                "max_delay_ms",
                self.max_delay_ms,
                "a value >= base_delay_ms",
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("base_url", "\"\"", "a non-empty URL"));
        }
        if let Some(url) = &self.lookup_url
            && url.trim().is_empty()
        {
            return Err(ConfigError::invalid(
                "lookup_url",
                "\"\"",
                "a non-empty URL or no value",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retry_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.exponential_backoff,
        )
    }

    #[must_use]
    pub fn target_settings(&self) -> TargetSettings {
        TargetSettings::new(self.base_url.clone(), self.view_path_prefix.clone())
    }
}

/// A configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Path consulted, if one could be resolved.
    pub path: Option<PathBuf>,
    pub config: EngineConfig,
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/hyperlink-repair/config.toml`
/// 2. `$HOME/.config/hyperlink-repair/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from an explicit path; the file must exist.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
pub fn load_config_file(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = EngineConfig::from_toml_str(&raw, path)?;
    debug!(path = %path.display(), "loaded config file");
    Ok(LoadedConfig {
        path: Some(path.to_path_buf()),
        config,
        loaded_from_file: true,
    })
}

/// Loads config from the default path, falling back to defaults when absent.
///
/// # Errors
///
/// Returns [`ConfigError`] if a file exists but is unreadable or invalid.
pub fn load_default_config() -> Result<LoadedConfig, ConfigError> {
    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => load_config_file(path_ref),
        _ => Ok(LoadedConfig {
            path,
            config: EngineConfig::default(),
            loaded_from_file: false,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<EngineConfig, ConfigError> {
        EngineConfig::from_toml_str(raw, Path::new("config.toml"))
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.lookup_url.is_none());
    }

    #[test]
    fn test_full_document_parses_rules() {
        let config = parse(
            r#"
lookup_url = "https://lookup.example.com/api"
timeout_secs = 5
max_retry_attempts = 0
base_delay_ms = 10
max_delay_ms = 20
exponential_backoff = false
base_url = "https://docs.example.com/portal"
view_path_prefix = "!/view?docid="

[[replacement]]
old_title = "Draft"
new_title = "Final"
new_content_id = "TSRC-ABC-000111"
"#,
        )
        .unwrap();

        assert_eq!(config.lookup_url.as_deref(), Some("https://lookup.example.com/api"));
        assert_eq!(config.replacements.len(), 1);
        assert_eq!(config.replacements[0].new_title, "Final");
        let policy = config.retry_policy();
        assert_eq!(policy.max_retry_attempts(), 0);
        assert!(!policy.is_exponential());
        assert_eq!(
            config.target_settings().anchor_for("TSRC-ABC-000111"),
            "!/view?docid=TSRC-ABC-000111"
        );
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let err = parse("max_retry_attempts = 11").unwrap_err();
        assert!(
            err.to_string()
                .contains("Invalid config value for `max_retry_attempts`: 11")
        );
        assert!(matches!(parse("timeout_secs = 0"), Err(ConfigError::Invalid { field: "timeout_secs", .. })));
        assert!(matches!(
            parse("base_delay_ms = 500\nmax_delay_ms = 100"),
            Err(ConfigError::Invalid { field: "max_delay_ms", .. })
        ));
    }

    #[test]
    fn test_unknown_keys_and_bad_types_fail_to_parse() {
        assert!(matches!(parse("concurrency = 4"), Err(ConfigError::Parse { .. })));
        assert!(matches!(parse("timeout_secs = \"soon\""), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_config_file_reads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout_secs = 12\n").unwrap();

        let loaded = load_config_file(&path).unwrap();
        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.config.timeout_secs, 12);
    }

    #[test]
    fn test_load_config_file_missing_is_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = load_config_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
