//! Environment variable handling.

use std::env;

/// Environment variable names.
pub mod vars {
    pub const AUDITSEAL_CONFIG_PATH: &str = "AUDITSEAL_CONFIG_PATH";
    pub const AUDITSEAL_ENV: &str = "AUDITSEAL_ENV";
    pub const AUDITSEAL_LOG_LEVEL: &str = "AUDITSEAL_LOG_LEVEL";
    pub const RUST_LOG: &str = "RUST_LOG";
}

/// Environment access.
pub struct Environment;

impl Environment {
    /// Load `.env`, `.env.local` and `.env.{AUDITSEAL_ENV}` if present.
    /// Later files do not override variables that are already set.
    pub fn init() {
        let _ = dotenvy::from_filename(".env");
        let _ = dotenvy::from_filename(".env.local");
        if let Ok(stage) = env::var(vars::AUDITSEAL_ENV) {
            let _ = dotenvy::from_filename(format!(".env.{stage}"));
        }
    }

    /// Get an optional variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }

    /// Get a variable with a default value.
    pub fn get_or(var: &str, default: &str) -> String {
        env::var(var).unwrap_or_else(|_| default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_default() {
        assert_eq!(Environment::get_or("AUDITSEAL_NONEXISTENT_12345", "fallback"), "fallback");
    }

    #[test]
    fn test_init_without_files() {
        Environment::init();
    }
}
