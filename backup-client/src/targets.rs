//! Target list loading.

use crate::utils::errors::{AgentError, Result};
use std::path::{Path, PathBuf};

/// Read the newline-delimited list of watched directories.
///
/// Blank lines are skipped and trailing whitespace trimmed. An empty list is a
/// configuration error: there is nothing to back up.
pub fn load_target_list(path: &Path) -> Result<Vec<PathBuf>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AgentError::Configuration(format!("cannot read target list {}: {}", path.display(), e))
    })?;

    let targets = parse_target_list(&content);
    if targets.is_empty() {
        return Err(AgentError::Configuration(format!(
            "target list {} is empty",
            path.display()
        )));
    }

    Ok(targets)
}

fn parse_target_list(content: &str) -> Vec<PathBuf> {
    content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(PathBuf::from)
        .collect()
}
