use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    #[serde(default)]
    pub suite: SuiteConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// What to do when the without-change repeat misses its deadline
    #[serde(default)]
    pub baseline_timeout: BaselineTimeoutPolicy,

    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub relevance: RelevanceConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SuiteConfig {
    /// Failures enumerated before the first run aborts early
    #[serde(default = "default_failure_limit")]
    pub failure_limit: u32,

    /// Times each test in the failing subset is repeated
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,

    #[serde(default = "default_first_run_timeout_sec")]
    pub first_run_timeout_sec: u64,

    #[serde(default = "default_repeat_timeout_sec")]
    pub repeat_timeout_sec: u64,
}

impl SuiteConfig {
    pub fn first_run_deadline(&self) -> Duration {
        Duration::from_secs(self.first_run_timeout_sec)
    }

    pub fn repeat_deadline(&self) -> Duration {
        Duration::from_secs(self.repeat_timeout_sec)
    }
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            failure_limit: default_failure_limit(),
            repeat_count: default_repeat_count(),
            first_run_timeout_sec: default_first_run_timeout_sec(),
            repeat_timeout_sec: default_repeat_timeout_sec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RetryConfig {
    /// Whole-attempt restarts allowed before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum BaselineTimeoutPolicy {
    /// Report the with-change repeat's consistent failures as new
    #[default]
    Report,
    /// Fall back to a single clean-tree pass over the failing subset
    CleanTree,
    /// Treat as an infrastructure anomaly and restart the attempt
    Retry,
}

impl std::fmt::Display for BaselineTimeoutPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaselineTimeoutPolicy::Report => write!(f, "report"),
            BaselineTimeoutPolicy::CleanTree => write!(f, "clean-tree"),
            BaselineTimeoutPolicy::Retry => write!(f, "retry"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ParserConfig {
    #[serde(default = "default_envelope_prefix")]
    pub envelope_prefix: String,

    #[serde(default = "default_envelope_suffix")]
    pub envelope_suffix: String,

    /// Artifact name the executor stores the result blob under
    #[serde(default = "default_results_artifact")]
    pub results_artifact: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            envelope_prefix: default_envelope_prefix(),
            envelope_suffix: default_envelope_suffix(),
            results_artifact: default_results_artifact(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RelevanceConfig {
    #[serde(default = "default_tests_root")]
    pub tests_root: PathBuf,

    /// Globs matched against each directory name; a match marks fixtures
    /// rather than tests
    #[serde(default = "default_excluded_segments")]
    pub excluded_segments: Vec<String>,

    /// File-name globs for expectation companion files
    #[serde(default = "default_companion_patterns")]
    pub companion_patterns: Vec<String>,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            tests_root: default_tests_root(),
            excluded_segments: default_excluded_segments(),
            companion_patterns: default_companion_patterns(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ExecutorConfig {
    /// Program and leading arguments used to run the suite
    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Where the runner writes its result blob; a temp dir is used if unset
    #[serde(default)]
    pub results_path: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            working_dir: default_working_dir(),
            results_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Failing paths listed before the list is truncated
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,

    #[serde(default)]
    pub flaky_recipients: Vec<String>,

    #[serde(default)]
    pub pre_existing_recipients: Vec<String>,

    #[serde(default)]
    pub new_failure_recipients: Vec<String>,

    /// Add the change author to the new-failure report
    #[serde(default = "default_true")]
    pub notify_author: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            display_limit: default_display_limit(),
            flaky_recipients: Vec::new(),
            pre_existing_recipients: Vec::new(),
            new_failure_recipients: Vec::new(),
            notify_author: true,
        }
    }
}
