use crate::error::DiscoveryError;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Files the change touches relative to `base`, deletions excluded
pub fn get_touched_files(repo: &Path, base: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let output = Command::new("git")
        .current_dir(repo)
        .args(["diff", "--name-only", "--diff-filter=ACMR", base])
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DiscoveryError::GitDiff(stderr.trim().to_string()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut files: Vec<PathBuf> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect();
    files.sort();
    files.dedup();

    Ok(files)
}
