use crate::error::ExecutorError;
use crate::executor::{StepCommand, StepExecutor};
use crate::parser::{ResultBlobParser, ResultSet, RunStage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// What a stage produced
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult {
    Completed(ResultSet),
    /// Deadline expired before a result list was produced
    TimedOut,
    /// Ran, but left nothing trustworthy to read
    Unusable(String),
}

impl StageResult {
    /// The result list, if it can be trusted as exhaustive
    pub fn complete(&self) -> Option<&ResultSet> {
        match self {
            StageResult::Completed(results) if results.is_complete() => Some(results),
            _ => None,
        }
    }

    /// Sort a repeat stage into a trustworthy list (`Ok(Some)`), a timeout
    /// (`Ok(None)`), or an anomaly that must restart the attempt (`Err`).
    pub fn into_repeat(self) -> Result<Option<ResultSet>, String> {
        match self {
            StageResult::Completed(results) if results.is_complete() => Ok(Some(results)),
            StageResult::Completed(_) => Err("result list is incomplete".to_string()),
            StageResult::TimedOut => Ok(None),
            StageResult::Unusable(reason) => Err(format!("unusable: {}", reason)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Completed {
        failing: usize,
        flaky: usize,
        complete: bool,
    },
    TimedOut,
    Unusable {
        reason: String,
    },
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Completed {
                failing,
                flaky,
                complete,
            } => {
                write!(f, "completed: {} failing, {} flaky", failing, flaky)?;
                if !complete {
                    write!(f, " (truncated)")?;
                }
                Ok(())
            }
            StageStatus::TimedOut => write!(f, "timed_out"),
            StageStatus::Unusable { reason } => write!(f, "unusable: {}", reason),
        }
    }
}

/// One line of the stage log kept across all attempts of a triage
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StageRecord {
    pub attempt: u32,
    pub stage: RunStage,
    pub tests: usize,
    #[serde(flatten)]
    pub status: StageStatus,
    pub duration_ms: u64,
}

impl StageRecord {
    pub fn new(attempt: u32, command: &StepCommand, result: &StageResult, duration: Duration) -> Self {
        let status = match result {
            StageResult::Completed(results) => StageStatus::Completed {
                failing: results.failing().len(),
                flaky: results.flaky().len(),
                complete: results.is_complete(),
            },
            StageResult::TimedOut => StageStatus::TimedOut,
            StageResult::Unusable(reason) => StageStatus::Unusable {
                reason: reason.clone(),
            },
        };
        Self {
            attempt,
            stage: command.stage,
            tests: command.tests.len(),
            status,
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Run one stage under its deadline and parse whatever it left behind.
///
/// The deadline is enforced here as well as in the executor, so an executor
/// that ignores it still cannot stall the triage.
pub async fn execute_stage(
    executor: &dyn StepExecutor,
    parser: &ResultBlobParser,
    results_artifact: &str,
    command: &StepCommand,
    deadline: Duration,
) -> StageResult {
    info!(
        "Running {} via {} executor ({} tests, repeat {}, deadline {:?})",
        command.stage,
        executor.name(),
        if command.tests.is_empty() {
            "all".to_string()
        } else {
            command.tests.len().to_string()
        },
        command.repeat_each,
        deadline
    );

    let output = match timeout(deadline, executor.run(command, deadline)).await {
        Err(_) | Ok(Err(ExecutorError::Timeout(_))) => {
            warn!("{} timed out after {:?}", command.stage, deadline);
            return StageResult::TimedOut;
        }
        Ok(Err(e)) => {
            warn!("{} failed to execute: {}", command.stage, e);
            return StageResult::Unusable(e.to_string());
        }
        Ok(Ok(output)) => output,
    };

    debug!(
        "{} exited with status {} in {:?}",
        command.stage, output.exit_status, output.duration
    );

    let artifact = output.artifacts.get(results_artifact).map(|b| b.as_slice());
    match parser.parse_step_output(&output.stdout, artifact) {
        Ok(results) => StageResult::Completed(results),
        Err(e) => {
            warn!("{} produced no usable results: {}", command.stage, e);
            StageResult::Unusable(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::StepOutput;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct FixedExecutor {
        result: fn() -> Result<StepOutput, ExecutorError>,
        delay: Duration,
    }

    #[async_trait]
    impl StepExecutor for FixedExecutor {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn run(
            &self,
            _command: &StepCommand,
            _deadline: Duration,
        ) -> Result<StepOutput, ExecutorError> {
            tokio::time::sleep(self.delay).await;
            (self.result)()
        }
    }

    fn command() -> StepCommand {
        StepCommand {
            stage: RunStage::WithChangeFirst,
            tests: Vec::new(),
            repeat_each: 1,
            failure_limit: Some(60),
            environment: BTreeMap::new(),
        }
    }

    fn parser() -> ResultBlobParser {
        ResultBlobParser::new("ADD_RESULTS(", ");")
    }

    #[tokio::test]
    async fn test_completed_from_stdout() {
        let executor = FixedExecutor {
            result: || {
                Ok(StepOutput {
                    exit_status: 1,
                    stdout: r#"ADD_RESULTS({"tests":{"a.html":{"report":"REGRESSION","expected":"PASS","actual":"TEXT"}}});"#.to_string(),
                    ..StepOutput::default()
                })
            },
            delay: Duration::ZERO,
        };

        let result = execute_stage(
            &executor,
            &parser(),
            "full_results.json",
            &command(),
            Duration::from_secs(5),
        )
        .await;
        let results = result.complete().unwrap();
        assert_eq!(results.failing().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_payload_is_unusable() {
        let executor = FixedExecutor {
            result: || {
                Ok(StepOutput {
                    exit_status: 0,
                    stdout: "worker lost connection".to_string(),
                    ..StepOutput::default()
                })
            },
            delay: Duration::ZERO,
        };

        let result = execute_stage(
            &executor,
            &parser(),
            "full_results.json",
            &command(),
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, StageResult::Unusable(_)));
        assert!(result.complete().is_none());
    }

    #[tokio::test]
    async fn test_slow_executor_times_out() {
        let executor = FixedExecutor {
            result: || Ok(StepOutput::default()),
            delay: Duration::from_secs(60),
        };

        let result = execute_stage(
            &executor,
            &parser(),
            "full_results.json",
            &command(),
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(result, StageResult::TimedOut);
    }

    #[tokio::test]
    async fn test_executor_timeout_error_is_timed_out() {
        let executor = FixedExecutor {
            result: || Err(ExecutorError::Timeout(Duration::from_secs(1))),
            delay: Duration::ZERO,
        };

        let result = execute_stage(
            &executor,
            &parser(),
            "full_results.json",
            &command(),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(result, StageResult::TimedOut);
    }

    #[test]
    fn test_only_timeout_counts_as_missing_repeat() {
        assert_eq!(StageResult::TimedOut.into_repeat(), Ok(None));

        let interrupted = ResultSet::new(Default::default(), true, false);
        let err = StageResult::Completed(interrupted).into_repeat().unwrap_err();
        assert!(err.contains("incomplete"));

        let err = StageResult::Unusable("No result payload found".to_string())
            .into_repeat()
            .unwrap_err();
        assert!(err.contains("No result payload found"));

        let results = StageResult::Completed(ResultSet::default()).into_repeat().unwrap();
        assert_eq!(results, Some(ResultSet::default()));
    }

    #[test]
    fn test_record_summarizes_truncated_run() {
        let results = ResultSet::default().with_failure_limit_exceeded(true);
        let record = StageRecord::new(
            2,
            &command(),
            &StageResult::Completed(results),
            Duration::from_millis(1500),
        );
        assert_eq!(record.attempt, 2);
        assert_eq!(record.duration_ms, 1500);
        assert_eq!(record.status.to_string(), "completed: 0 failing, 0 flaky (truncated)");
    }
}
