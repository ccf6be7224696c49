//! Custom error types for the backup client.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage host unreachable: {0}")]
    HostUnreachable(String),

    #[error("Mount error: {0}")]
    Mount(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Copy error: {0}")]
    Copy(String),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Errors that end the whole run rather than a single target or file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::Configuration(_) | AgentError::HostUnreachable(_) | AgentError::Mount(_)
        )
    }
}

impl From<toml::de::Error> for AgentError {
    fn from(err: toml::de::Error) -> Self {
        AgentError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
