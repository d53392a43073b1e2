//! Secret references in `config.toml`.
//!
//! A credential can be written inline or point somewhere else:
//!
//! - `pass::cinema/veezi` is the first line of `pass show cinema/veezi`
//! - `env::VEEZI_TOKEN` is the value of `$VEEZI_TOKEN`

use std::process::Command;

use thiserror::Error;
use tracing::debug;

/// Why a secret could not be resolved.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("environment variable `{0}` is not set")]
    EnvUnset(String),

    #[error("`pass show {path}` failed: {reason}")]
    Pass { path: String, reason: String },

    #[error("secret is empty")]
    Empty,
}

/// Where a configured value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRef<'a> {
    Pass(&'a str),
    Env(&'a str),
    Inline(&'a str),
}

impl<'a> SecretRef<'a> {
    pub fn parse(value: &'a str) -> Self {
        if let Some(path) = value.strip_prefix("pass::") {
            Self::Pass(path)
        } else if let Some(var) = value.strip_prefix("env::") {
            Self::Env(var)
        } else {
            Self::Inline(value)
        }
    }

    /// Fetches the value, trimmed. Blank values are rejected so an unset
    /// secret never reaches a source as an empty credential.
    pub fn resolve(self) -> Result<String, SecretError> {
        let value = match self {
            Self::Pass(path) => {
                debug!(path = %path, "resolving secret from pass");
                pass_show(path)?
            }
            Self::Env(var) => {
                debug!(var = %var, "resolving secret from environment");
                std::env::var(var).map_err(|_| SecretError::EnvUnset(var.to_string()))?
            }
            Self::Inline(value) => value.to_string(),
        };

        let value = value.trim();
        if value.is_empty() {
            return Err(SecretError::Empty);
        }
        Ok(value.to_string())
    }
}

/// Resolves a configured value that may be a reference.
pub fn resolve(value: &str) -> Result<String, SecretError> {
    SecretRef::parse(value).resolve()
}

/// Whether a value points elsewhere rather than holding the secret itself.
pub fn is_reference(value: &str) -> bool {
    !matches!(SecretRef::parse(value), SecretRef::Inline(_))
}

fn pass_show(path: &str) -> Result<String, SecretError> {
    let failed = |reason: String| SecretError::Pass {
        path: path.to_string(),
        reason,
    };

    let output = Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| failed(e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(format!("{}: {}", output.status, stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string())
}
