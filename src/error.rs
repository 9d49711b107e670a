use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid glob pattern '{pattern}': {source}")]
    GlobPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("repeat_count must be at least 2 to detect flakiness, got {0}")]
    RepeatCountTooLow(u32),

    #[error("failure_limit must be greater than zero")]
    ZeroFailureLimit,

    #[error("No executor command configured")]
    MissingCommand,
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Git diff failed: {0}")]
    GitDiff(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Stage timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Failed to spawn step command: {0}")]
    Spawn(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed or missing result artifact. Always an infrastructure anomaly,
/// never "zero failures".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No result payload found")]
    NoPayload,

    #[error("Result payload is not terminated (unbalanced at byte {0})")]
    Unterminated(usize),

    #[error("Invalid result JSON: {0}")]
    Json(String),

    #[error("Result payload root is not an object")]
    NotAnObject,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// The first run hit the failure-limit ceiling and nothing conclusive was
    /// proven about the enumerated subset.
    #[error("Results are incomplete: the first run exceeded the failure limit")]
    IncompleteResult,

    #[error("No usable repeat results; classification deferred ({0})")]
    Deferred(String),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to create output directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Failed to write report: {0}")]
    WriteReport(std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}
