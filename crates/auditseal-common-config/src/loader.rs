//! Configuration file loading and validation.

use crate::env::{vars, Environment};
use crate::types::AuditSealConfig;
use auditseal_common_core::RetentionYears;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

const PLACEHOLDER: &str = r"\$\{([^}:]+)(?::-([^}]*))?\}";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line_label(line))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

fn line_label(line: &Option<usize>) -> String {
    line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// Configuration loader.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Loader for an explicit file path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Loader for `AUDITSEAL_CONFIG_PATH`, or `auditseal.yaml` in the
    /// working directory.
    pub fn from_env() -> Self {
        Self::new(Environment::get_or(vars::AUDITSEAL_CONFIG_PATH, "auditseal.yaml"))
    }

    /// Path this loader reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the configuration. A missing file yields defaults.
    pub fn load(&self) -> Result<AuditSealConfig, ConfigError> {
        let mut config = if self.path.exists() {
            let contents = std::fs::read_to_string(&self.path)?;
            Self::parse(&contents)?
        } else {
            AuditSealConfig::default()
        };

        config.logging = config.logging.merge_env();
        validate(&config)?;
        Ok(config)
    }

    /// Parse YAML content after placeholder expansion.
    pub fn parse(contents: &str) -> Result<AuditSealConfig, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Expand `${VAR}` and `${VAR:-default}` placeholders.
pub fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(PLACEHOLDER).map_err(|e| ConfigError::ValidationError {
        message: e.to_string(),
    })?;

    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for cap in re.captures_iter(content) {
        let Some(whole) = cap.get(0) else { continue };
        let name = &cap[1];
        let value = match (std::env::var(name), cap.get(2)) {
            (Ok(v), _) => v,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                return Err(ConfigError::EnvVarNotFound {
                    var: name.to_string(),
                })
            }
        };
        out.push_str(&content[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&content[last..]);
    Ok(out)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        message: message.into(),
    }
}

/// Validate configuration values.
pub fn validate(config: &AuditSealConfig) -> Result<(), ConfigError> {
    url::Url::parse(&config.tsa.url)
        .map_err(|e| invalid(format!("tsa.url is not a valid URL: {e}")))?;

    if config.tsa.max_attempts == 0 {
        return Err(invalid("tsa.max_attempts must be at least 1"));
    }

    if config.tsa.timeout_secs == 0 {
        return Err(invalid("tsa.timeout_secs must be at least 1"));
    }

    if config.storage.bucket.trim().is_empty() {
        return Err(invalid("storage.bucket must not be empty"));
    }

    if config.storage.presign_ttl_secs == 0 {
        return Err(invalid("storage.presign_ttl_secs must be greater than 0"));
    }

    RetentionYears::new(config.retention.default_years)
        .map_err(|e| invalid(format!("retention.default_years: {e}")))?;

    Ok(())
}
