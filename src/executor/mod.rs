mod command;

pub use command::CommandExecutor;

use crate::error::ExecutorError;
use crate::parser::{RunStage, TestPath};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// What to run for one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommand {
    pub stage: RunStage,
    /// Tests to run; empty means the whole suite
    pub tests: Vec<TestPath>,
    pub repeat_each: u32,
    /// Stop enumerating failures after this many; `None` disables the cutoff
    pub failure_limit: Option<u32>,
    /// Explicit environment overrides for the runner
    pub environment: BTreeMap<String, String>,
}

impl StepCommand {
    pub fn apply_change(&self) -> bool {
        self.stage.applies_change()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Non-zero is normal when tests fail
    pub exit_status: i32,
    pub stdout: String,
    pub artifacts: BTreeMap<String, Vec<u8>>,
    pub duration: Duration,
}

/// Runs the test suite on a worker. Forced abort on deadline expiry is the
/// executor's job; the orchestrator only stops waiting.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, command: &StepCommand, deadline: Duration)
        -> Result<StepOutput, ExecutorError>;
}
