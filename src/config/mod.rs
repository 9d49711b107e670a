mod defaults;
mod types;

pub use types::*;

use crate::error::ConfigError;
use defaults::*;
use globset::Glob;
use std::path::Path;

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            report_dir: default_report_dir(),
            suite: SuiteConfig::default(),
            retry: RetryConfig::default(),
            baseline_timeout: BaselineTimeoutPolicy::default(),
            parser: ParserConfig::default(),
            relevance: RelevanceConfig::default(),
            executor: ExecutorConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config if the file exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.suite.failure_limit == 0 {
            return Err(ConfigError::ZeroFailureLimit);
        }

        // A single repetition cannot show mixed outcomes
        if self.suite.repeat_count < 2 {
            return Err(ConfigError::RepeatCountTooLow(self.suite.repeat_count));
        }

        let relevance = &self.relevance;
        for pattern in relevance
            .excluded_segments
            .iter()
            .chain(&relevance.companion_patterns)
        {
            Glob::new(pattern).map_err(|e| ConfigError::GlobPattern {
                pattern: pattern.clone(),
                source: e,
            })?;
        }

        Ok(())
    }
}
