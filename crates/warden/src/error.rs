use std::path::PathBuf;

use thiserror::Error;

/// Errors of the command-line front end, wrapping the policy engine's own.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("policy error: {0}")]
    Policy(#[from] warden_policy::PolicyError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to load {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
