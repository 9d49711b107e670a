use crate::classifier::{classify, format_test_list, Classification};
use crate::config::{BaselineTimeoutPolicy, Config};
use crate::executor::{StepCommand, StepExecutor};
use crate::notify::{build_digests, Digest, DigestInput, NotificationSink};
use crate::parser::{ResultBlobParser, ResultSet, RunStage, TestPath};
use crate::verdict::Verdict;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::retry::{RetryDecision, RetryState};
use super::stage::{execute_stage, StageRecord, StageResult};

/// Who and what is being triaged. Passed explicitly into every attempt.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AttemptContext {
    pub change_id: String,
    pub author: Option<String>,
    /// Worker identity, used only in notification text
    pub host: Option<String>,
    pub lane: Option<String>,
    /// Environment overrides threaded into every step command
    pub environment: BTreeMap<String, String>,
    /// Tests the change itself adds or edits
    pub touched_tests: Vec<TestPath>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriageReport {
    pub triage_id: String,
    pub change_id: String,
    pub verdict: Verdict,
    pub summary: String,
    pub retry_count: u32,
    pub classification: Option<Classification>,
    pub stages: Vec<StageRecord>,
    /// Flaky tests seen in any stage of any attempt, plus failures the final
    /// classification found flaky
    pub flaky_observed: BTreeSet<TestPath>,
    pub digests: Vec<Digest>,
    #[serde(skip)]
    pub duration: Duration,
}

/// Result of one attempt, before retry handling
struct AttemptOutcome {
    verdict: Verdict,
    classification: Option<Classification>,
    reason: Option<String>,
}

impl AttemptOutcome {
    fn retry(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Retry,
            classification: None,
            reason: Some(reason.into()),
        }
    }

    fn classified(classification: Classification) -> Self {
        Self {
            verdict: classification.verdict(),
            classification: Some(classification),
            reason: None,
        }
    }
}

/// Observations that outlive a single attempt
#[derive(Default)]
struct TriageLog {
    stages: Vec<StageRecord>,
    flaky: BTreeSet<TestPath>,
}

pub struct Orchestrator {
    config: Config,
    executor: Arc<dyn StepExecutor>,
    parser: ResultBlobParser,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl Orchestrator {
    pub fn new(config: Config, executor: Arc<dyn StepExecutor>, parser: ResultBlobParser) -> Self {
        Self {
            config,
            executor,
            parser,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Triage one change to a terminal verdict. Never returns `Retry`: an
    /// anomalous attempt either restarts from scratch or, once the budget is
    /// spent, ends as `UnresolvedInfraIssue`.
    pub async fn triage(&self, context: &AttemptContext) -> TriageReport {
        let start = Instant::now();
        let triage_id = Uuid::new_v4().to_string();
        let mut retry = RetryState::new(self.config.retry.max_retries);
        let mut log = TriageLog::default();

        info!(
            "Triaging change {} (triage {}, max {} retries)",
            context.change_id, triage_id, self.config.retry.max_retries
        );

        let mut attempt = 1;
        let (verdict, classification) = loop {
            let outcome = self.run_attempt(context, attempt, &mut log).await;
            if outcome.verdict != Verdict::Retry {
                break (outcome.verdict, outcome.classification);
            }

            let reason = outcome.reason.unwrap_or_default();
            match retry.record_retry() {
                RetryDecision::Restart => {
                    let delay = retry.backoff(&self.config.retry);
                    warn!(
                        "Attempt {} hit an infrastructure anomaly: {}. Restarting in {:?} ({}/{})",
                        attempt,
                        reason,
                        delay,
                        retry.retry_count(),
                        self.config.retry.max_retries
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Exhausted => {
                    warn!(
                        "Attempt {} hit an infrastructure anomaly: {}. Retries exhausted",
                        attempt, reason
                    );
                    break (Verdict::UnresolvedInfraIssue, None);
                }
            }
        };

        if let Some(c) = &classification {
            // Failures that did not reproduce are flaky observations too
            log.flaky.extend(c.flaky.iter().cloned());
            if c.lacks_clean_majority() {
                warn!(
                    "Change {}: {} reproduced vs {} unreproduced failures; too many flaky failures for a clean signal",
                    context.change_id, c.reproduced, c.unreproduced
                );
            }
        }

        let summary = summarize(&verdict, retry.retry_count(), self.config.notifications.display_limit);
        info!("Change {}: {}", context.change_id, summary);

        let pre_existing = classification
            .as_ref()
            .map(|c| c.pre_existing.clone())
            .unwrap_or_default();
        let digests = if self.config.notifications.enabled {
            build_digests(
                &DigestInput {
                    context,
                    verdict: &verdict,
                    flaky_observed: &log.flaky,
                    pre_existing: &pre_existing,
                    retry_count: retry.retry_count(),
                },
                &self.config.notifications,
            )
        } else {
            Vec::new()
        };
        self.deliver(&digests).await;

        TriageReport {
            triage_id,
            change_id: context.change_id.clone(),
            verdict,
            summary,
            retry_count: retry.retry_count(),
            classification,
            stages: log.stages,
            flaky_observed: log.flaky,
            digests,
            duration: start.elapsed(),
        }
    }

    async fn deliver(&self, digests: &[Digest]) {
        let Some(sink) = &self.sink else {
            return;
        };
        let mut deliveries: FuturesUnordered<_> = digests
            .iter()
            .map(|digest| async move { (digest, sink.deliver(digest).await) })
            .collect();
        while let Some((digest, result)) = deliveries.next().await {
            if let Err(e) = result {
                warn!("Failed to deliver {} digest: {}", digest.kind, e);
            }
        }
    }

    /// One complete pass of the stage sequence. Every `ResultSet` used here is
    /// produced within this call.
    async fn run_attempt(
        &self,
        context: &AttemptContext,
        attempt: u32,
        log: &mut TriageLog,
    ) -> AttemptOutcome {
        let suite = &self.config.suite;

        let first = self
            .run_stage(
                context,
                attempt,
                log,
                RunStage::WithChangeFirst,
                Vec::new(),
                1,
                Some(suite.failure_limit),
                suite.first_run_deadline(),
            )
            .await;
        let first = match first {
            StageResult::Completed(results) => results,
            StageResult::TimedOut => return AttemptOutcome::retry("first run timed out"),
            StageResult::Unusable(reason) => {
                return AttemptOutcome::retry(format!("first run unusable: {}", reason))
            }
        };

        let failing = first.failing();
        if failing.is_empty() {
            // Nothing to confirm. A truncated or interrupted run with nothing
            // enumerated comes back as incomplete.
            return match classify(&first, None, None, None) {
                Ok(c) => AttemptOutcome::classified(c),
                Err(e) => AttemptOutcome::retry(e.to_string()),
            };
        }

        let subset: Vec<TestPath> = failing.union(&first.flaky()).cloned().collect();
        info!(
            "First run: {} failing, {} flaky; repeating {} tests",
            failing.len(),
            first.flaky().len(),
            subset.len()
        );

        let repeat_with = self
            .run_stage(
                context,
                attempt,
                log,
                RunStage::WithChangeRepeat,
                subset.clone(),
                suite.repeat_count,
                None,
                suite.repeat_deadline(),
            )
            .await;
        // Only a timeout may fall back to the first run; anything else restarts
        let repeat_with = match repeat_with.into_repeat() {
            Ok(results) => results,
            Err(reason) => {
                return AttemptOutcome::retry(format!("{}: {}", RunStage::WithChangeRepeat, reason))
            }
        };

        if let Some(results) = &repeat_with {
            if results.failing().is_empty() {
                debug!("With-change repeat reproduced nothing; skipping baseline");
                return self.finish(&first, None, Some(results), None);
            }
        }

        let repeat_without = self
            .run_stage(
                context,
                attempt,
                log,
                RunStage::WithoutChangeRepeat,
                subset.clone(),
                suite.repeat_count,
                None,
                suite.repeat_deadline(),
            )
            .await;
        let repeat_without = match repeat_without.into_repeat() {
            Ok(results) => results,
            Err(reason) => {
                return AttemptOutcome::retry(format!(
                    "{}: {}",
                    RunStage::WithoutChangeRepeat,
                    reason
                ))
            }
        };

        // `None` below always means the stage timed out
        match (&repeat_with, &repeat_without) {
            (None, None) => AttemptOutcome::retry("both repeat stages timed out"),
            (None, Some(without)) => self.finish(&first, None, None, Some(without)),
            (Some(with), Some(without)) => self.finish(&first, None, Some(with), Some(without)),
            (Some(with), None) => match self.config.baseline_timeout {
                BaselineTimeoutPolicy::Report => {
                    info!("Without-change repeat timed out; reporting reproduced failures as new");
                    self.finish(&first, None, Some(with), None)
                }
                BaselineTimeoutPolicy::Retry => {
                    AttemptOutcome::retry("without-change repeat timed out")
                }
                BaselineTimeoutPolicy::CleanTree => {
                    let clean = self
                        .run_stage(
                            context,
                            attempt,
                            log,
                            RunStage::CleanTreeBaseline,
                            subset,
                            1,
                            Some(suite.failure_limit),
                            suite.first_run_deadline(),
                        )
                        .await;
                    match clean.complete() {
                        Some(clean) => self.finish(&first, Some(clean), Some(with), None),
                        None => AttemptOutcome::retry(
                            "without-change repeat timed out and clean-tree baseline produced no result list",
                        ),
                    }
                }
            },
        }
    }

    fn finish(
        &self,
        first: &ResultSet,
        clean_tree: Option<&ResultSet>,
        repeat_with: Option<&ResultSet>,
        repeat_without: Option<&ResultSet>,
    ) -> AttemptOutcome {
        match classify(first, clean_tree, repeat_with, repeat_without) {
            Ok(c) => AttemptOutcome::classified(c),
            Err(e) => AttemptOutcome::retry(e.to_string()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_stage(
        &self,
        context: &AttemptContext,
        attempt: u32,
        log: &mut TriageLog,
        stage: RunStage,
        tests: Vec<TestPath>,
        repeat_each: u32,
        failure_limit: Option<u32>,
        deadline: Duration,
    ) -> StageResult {
        let command = StepCommand {
            stage,
            tests,
            repeat_each,
            failure_limit,
            environment: context.environment.clone(),
        };

        let start = Instant::now();
        let result = execute_stage(
            self.executor.as_ref(),
            &self.parser,
            &self.config.parser.results_artifact,
            &command,
            deadline,
        )
        .await;

        if let StageResult::Completed(results) = &result {
            log.flaky.extend(results.flaky());
        }
        log.stages
            .push(StageRecord::new(attempt, &command, &result, start.elapsed()));
        result
    }
}

fn summarize(verdict: &Verdict, retry_count: u32, display_limit: usize) -> String {
    match verdict {
        Verdict::Passed => "Passed".to_string(),
        Verdict::NewFailure(tests) => format!(
            "Found {} new test failures: {}",
            tests.len(),
            format_test_list(tests, display_limit)
        ),
        Verdict::PreExisting(tests) => format!(
            "Found {} pre-existing test failures: {}",
            tests.len(),
            format_test_list(tests, display_limit)
        ),
        Verdict::Retry => "Retrying".to_string(),
        Verdict::UnresolvedInfraIssue => format!(
            "Unable to confirm whether the change introduces failures after {} retries",
            retry_count
        ),
    }
}
