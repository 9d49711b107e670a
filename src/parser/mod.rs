mod blob;
mod results;

pub use blob::ResultBlobParser;
pub use results::{Evidence, Outcome, ResultSet, RunStage, TestPath};

use crate::config::ParserConfig;
use crate::discovery::PathRelevanceFilter;
use crate::error::ParseError;
use regex::Regex;
use std::sync::LazyLock;

/// run-webkit-tests style `Exiting early after N failures` line
static FAILURE_LIMIT_BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)Exiting early after (\d+) (?:failures|crashes|timeouts)")
        .expect("failure limit banner pattern is valid")
});

impl ResultBlobParser {
    pub fn from_config(config: &ParserConfig, filter: PathRelevanceFilter) -> Self {
        Self::new(&config.envelope_prefix, &config.envelope_suffix).with_filter(filter)
    }

    /// Parse one step's output: the results artifact when present, otherwise
    /// the envelope echoed to stdout.
    ///
    /// The runner's early-exit banner also marks the result as truncated, so
    /// a blob written before the flag was set is never read as exhaustive.
    pub fn parse_step_output(
        &self,
        stdout: &str,
        artifact: Option<&[u8]>,
    ) -> Result<ResultSet, ParseError> {
        let results = match artifact {
            Some(bytes) => self.parse(&String::from_utf8_lossy(bytes))?,
            None => {
                tracing::debug!("No results artifact; scanning stdout for result envelope");
                self.parse(stdout)?
            }
        };

        let early_exit = failure_limit_banner(stdout);
        if let Some(count) = early_exit {
            tracing::debug!("Runner exited early after {} failures", count);
        }
        Ok(results.with_failure_limit_exceeded(early_exit.is_some()))
    }
}

/// Failure count from the early-exit banner, if the runner printed one
fn failure_limit_banner(stdout: &str) -> Option<u32> {
    FAILURE_LIMIT_BANNER
        .captures(stdout)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ResultBlobParser {
        ResultBlobParser::new("ADD_RESULTS(", ");")
    }

    #[test]
    fn test_artifact_preferred_over_stdout() {
        let artifact = br#"ADD_RESULTS({"tests":{"a.html":{"report":"REGRESSION","expected":"PASS","actual":"TEXT"}}});"#;
        let stdout = r#"ADD_RESULTS({"tests":{}});"#;
        let set = parser()
            .parse_step_output(stdout, Some(artifact.as_slice()))
            .unwrap();
        assert_eq!(set.failing().len(), 1);
    }

    #[test]
    fn test_stdout_fallback() {
        let stdout = "Running 5 tests\nADD_RESULTS({\"tests\":{}});\nDone";
        let set = parser().parse_step_output(stdout, None).unwrap();
        assert!(set.outcomes().is_empty());
        assert!(set.is_complete());
    }

    #[test]
    fn test_early_exit_banner_marks_truncated() {
        let stdout = "Exiting early after 60 failures. 9000 tests run.\nADD_RESULTS({\"tests\":{}});";
        let set = parser().parse_step_output(stdout, None).unwrap();
        assert!(set.exceeded_failure_limit());
        assert_eq!(failure_limit_banner(stdout), Some(60));
    }

    #[test]
    fn test_banner_variants_across_calls() {
        assert_eq!(
            failure_limit_banner("Exiting early after 5 crashes.\n"),
            Some(5)
        );
        assert_eq!(
            failure_limit_banner("worker 2\nExiting early after 12 timeouts\n"),
            Some(12)
        );
        assert_eq!(failure_limit_banner("Exiting early after many failures"), None);
        assert_eq!(failure_limit_banner("All 9000 tests ran as expected."), None);
    }

    #[test]
    fn test_missing_everything_is_parse_error() {
        assert_eq!(
            parser().parse_step_output("runner crashed", None),
            Err(ParseError::NoPayload)
        );
    }
}
