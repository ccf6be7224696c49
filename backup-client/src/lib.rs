//! Backup Client Library
//!
//! Detects which watched directories changed since the last run, archives
//! them and ships the archives to the storage host.

pub mod archive;
pub mod config;
pub mod detector;
pub mod fs;
pub mod run;
pub mod snapshot;
pub mod store;
pub mod targets;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use run::{BackupRun, RunReport};
pub use utils::errors::AgentError;
pub type Result<T> = std::result::Result<T, AgentError>;
