//! Logging infrastructure for AuditSeal.
//!
//! Stderr output follows the configured format. When a log file is set it
//! always receives JSON lines so audit operators can ship it as-is.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Distributed tracing utilities.
pub mod spans;

/// Convenience macros re-exported from tracing.
pub use tracing::{debug, error, info, trace, warn};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum log level.
    pub level: LogLevel,
    /// Stderr output format.
    pub format: LogFormat,
    /// JSON log file, appended to.
    pub file: Option<PathBuf>,
    /// Include source location.
    pub source_location: bool,
    /// Emit span open/close events.
    pub span_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            file: None,
            source_location: false,
            span_events: false,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable pretty format.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON structured format.
    Json,
}

impl LogFormat {
    /// Parse from string, defaulting to pretty.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

impl LogConfig {
    /// Create config from `AUDITSEAL_LOG_*` environment variables.
    ///
    /// `RUST_LOG` is consulted for the level when `AUDITSEAL_LOG_LEVEL` is unset.
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Overlay environment variables onto an existing configuration.
    pub fn merge_env(mut self) -> Self {
        let level = std::env::var("AUDITSEAL_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .and_then(|l| LogLevel::parse(&l));
        if let Some(level) = level {
            self.level = level;
        }

        if let Ok(format) = std::env::var("AUDITSEAL_LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }

        if let Ok(path) = std::env::var("AUDITSEAL_LOG_FILE") {
            self.file = Some(PathBuf::from(path));
        }

        if let Some(source) = env_flag("AUDITSEAL_LOG_SOURCE") {
            self.source_location = source;
        }

        if let Some(spans) = env_flag("AUDITSEAL_LOG_SPANS") {
            self.span_events = spans;
        }

        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Initialize the global subscriber with the given configuration.
pub fn init(config: LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.directive()));

    let pretty = matches!(config.format, LogFormat::Pretty).then(|| {
        fmt::layer()
            .with_target(true)
            .with_file(config.source_location)
            .with_line_number(config.source_location)
            .with_span_events(config.span_events())
            .with_writer(io::stderr)
    });

    let compact = matches!(config.format, LogFormat::Compact).then(|| {
        fmt::layer()
            .compact()
            .with_span_events(config.span_events())
            .with_writer(io::stderr)
    });

    let json = matches!(config.format, LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_span_events(config.span_events())
            .with_writer(io::stderr)
    });

    let file = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_span_events(config.span_events()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(compact)
        .with(json)
        .with(file)
        .try_init()
        .map_err(|e| LogError::InitError(e.to_string()))
}

/// Logging errors.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to initialize logging: {0}")]
    InitError(String),

    #[error("failed to open log file: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("Warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("invalid"), None);
    }

    #[test]
    fn test_level_filter_conversion() {
        assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::TRACE);
        assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
    }

    #[test]
    fn test_config_deserializes_lowercase() {
        let config: LogConfig =
            serde_json::from_str(r#"{"level":"debug","format":"json"}"#).unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.file.is_none());
    }

    // Single test so the environment is not mutated concurrently.
    #[test]
    fn test_config_from_env() {
        let saved: Vec<(&str, Option<String>)> = [
            "AUDITSEAL_LOG_LEVEL",
            "AUDITSEAL_LOG_FORMAT",
            "AUDITSEAL_LOG_FILE",
            "AUDITSEAL_LOG_SOURCE",
            "AUDITSEAL_LOG_SPANS",
            "RUST_LOG",
        ]
        .into_iter()
        .map(|k| (k, env::var(k).ok()))
        .collect();

        env::set_var("AUDITSEAL_LOG_LEVEL", "debug");
        env::set_var("AUDITSEAL_LOG_FORMAT", "json");
        env::set_var("AUDITSEAL_LOG_FILE", "/tmp/auditseal.log");
        env::set_var("AUDITSEAL_LOG_SOURCE", "true");
        env::set_var("AUDITSEAL_LOG_SPANS", "1");

        let config = LogConfig::from_env();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/auditseal.log")));
        assert!(config.source_location);
        assert!(config.span_events);

        env::remove_var("AUDITSEAL_LOG_LEVEL");
        env::set_var("RUST_LOG", "warn");
        assert_eq!(LogConfig::from_env().level, LogLevel::Warn);

        for (key, value) in saved {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}
