use super::{StepCommand, StepExecutor, StepOutput};
use crate::config::{Config, ExecutorConfig};
use crate::error::{ConfigError, ExecutorError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout as tokio_timeout;

/// Runs the suite through a local command, e.g. a `run-webkit-tests`
/// wrapper that dispatches to a worker.
///
/// Stage details reach the command as `run-webkit-tests` style flags plus
/// `TRIAGE_STAGE` / `TRIAGE_APPLY_CHANGE` environment variables. Reverting
/// the change for baseline stages is the wrapper's responsibility.
pub struct CommandExecutor {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub results_path: Option<PathBuf>,
    pub results_artifact: String,
}

impl CommandExecutor {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let ExecutorConfig {
            command,
            working_dir,
            results_path,
        } = &config.executor;

        let (program, args) = command.split_first().ok_or(ConfigError::MissingCommand)?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir: working_dir.clone(),
            results_path: results_path.clone(),
            results_artifact: config.parser.results_artifact.clone(),
        })
    }

    fn build_args(&self, command: &StepCommand, results_dir: &std::path::Path) -> Vec<String> {
        let mut args = self.args.clone();

        args.push("--results-directory".to_string());
        args.push(results_dir.display().to_string());

        if let Some(limit) = command.failure_limit {
            args.push("--exit-after-n-failures".to_string());
            args.push(limit.to_string());
        }
        if command.repeat_each > 1 {
            args.push("--repeat-each".to_string());
            args.push(command.repeat_each.to_string());
        }

        args.extend(command.tests.iter().map(|t| t.to_string()));
        args
    }
}

#[async_trait]
impl StepExecutor for CommandExecutor {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn run(
        &self,
        command: &StepCommand,
        deadline: Duration,
    ) -> Result<StepOutput, ExecutorError> {
        // Lives until the artifact has been read
        let scratch: tempfile::TempDir;
        let results_dir = match &self.results_path {
            Some(path) => path.clone(),
            None => {
                scratch = tempfile::tempdir()?;
                scratch.path().to_path_buf()
            }
        };

        // A configured results directory outlives the stage; a runner that dies
        // before writing must not hand back the previous stage's artifact
        let artifact_path = results_dir.join(&self.results_artifact);
        match tokio::fs::remove_file(&artifact_path).await {
            Ok(()) => tracing::debug!("Removed stale artifact {}", artifact_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ExecutorError::Io(e)),
        }

        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&self.working_dir)
            .args(self.build_args(command, &results_dir))
            .envs(&command.environment)
            .env("TRIAGE_STAGE", command.stage.to_string())
            .env(
                "TRIAGE_APPLY_CHANGE",
                if command.apply_change() { "1" } else { "0" },
            )
            .kill_on_drop(true);

        let start = std::time::Instant::now();

        let output = tokio_timeout(deadline, cmd.output())
            .await
            .map_err(|_| ExecutorError::Timeout(deadline))?
            .map_err(ExecutorError::Spawn)?;

        let mut artifacts = BTreeMap::new();
        match tokio::fs::read(&artifact_path).await {
            Ok(bytes) => {
                artifacts.insert(self.results_artifact.clone(), bytes);
            }
            Err(e) => {
                tracing::debug!(
                    "No results artifact at {}: {}",
                    artifact_path.display(),
                    e
                );
            }
        }

        Ok(StepOutput {
            exit_status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            artifacts,
            duration: start.elapsed(),
        })
    }
}
