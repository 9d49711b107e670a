use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Slash-separated test identifier, relative to the tests root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct TestPath(String);

impl TestPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TestPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestPath {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TestPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Per-test outcome of one suite execution.
///
/// The expected/actual strings are the runner's raw result tokens
/// (e.g. `"PASS"`, `"TEXT IMAGE"`, `"FAIL PASS"`). They are opaque to
/// classification except for spotting mixed results across repeats.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail { expected: String, actual: String },
    Flaky { expected: String, actual: String },
    Timeout { expected: String, actual: String },
    Missing { expected: String, actual: String },
}

impl Outcome {
    /// Mixed pass/fail within one stage
    pub fn is_flaky(&self) -> bool {
        match self {
            Outcome::Flaky { .. } => true,
            Outcome::Fail { actual, .. } | Outcome::Timeout { actual, .. } => has_mixed_results(actual),
            _ => false,
        }
    }

    /// Failed on every execution within the stage
    pub fn is_consistent_failure(&self) -> bool {
        matches!(self, Outcome::Fail { .. } | Outcome::Timeout { .. }) && !self.is_flaky()
    }
}

fn has_mixed_results(actual: &str) -> bool {
    let mut tokens = actual.split_whitespace();
    let Some(first) = tokens.next() else {
        return false;
    };
    let mut saw_pass = first == "PASS";
    let mut saw_other = first != "PASS";
    for token in tokens {
        if token == "PASS" {
            saw_pass = true;
        } else {
            saw_other = true;
        }
    }
    saw_pass && saw_other
}

/// What one stage's results say about a single path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    Failed,
    Flaky,
    Passed,
    /// Absent from a truncated result list, or reported without a verdict
    Unknown,
}

/// Execution stage of a triage attempt, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    WithChangeFirst,
    WithChangeRepeat,
    WithoutChangeRepeat,
    CleanTreeBaseline,
}

impl RunStage {
    /// Whether the stage runs with the proposed change applied
    pub fn applies_change(&self) -> bool {
        matches!(self, RunStage::WithChangeFirst | RunStage::WithChangeRepeat)
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStage::WithChangeFirst => write!(f, "with-change"),
            RunStage::WithChangeRepeat => write!(f, "with-change-repeat"),
            RunStage::WithoutChangeRepeat => write!(f, "without-change-repeat"),
            RunStage::CleanTreeBaseline => write!(f, "clean-tree-baseline"),
        }
    }
}

/// Normalized results of one suite execution. Passing tests are usually
/// absent; only non-passing outcomes are recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ResultSet {
    outcomes: BTreeMap<TestPath, Outcome>,
    interrupted: bool,
    exceeded_failure_limit: bool,
}

impl ResultSet {
    pub fn new(
        outcomes: BTreeMap<TestPath, Outcome>,
        interrupted: bool,
        exceeded_failure_limit: bool,
    ) -> Self {
        Self {
            outcomes,
            interrupted,
            exceeded_failure_limit,
        }
    }

    pub fn outcomes(&self) -> &BTreeMap<TestPath, Outcome> {
        &self.outcomes
    }

    pub fn outcome(&self, path: &TestPath) -> Option<&Outcome> {
        self.outcomes.get(path)
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn exceeded_failure_limit(&self) -> bool {
        self.exceeded_failure_limit
    }

    /// The failing list is exhaustive: absence means "passed"
    pub fn is_complete(&self) -> bool {
        !self.interrupted && !self.exceeded_failure_limit
    }

    /// Non-flaky failing paths
    pub fn failing(&self) -> BTreeSet<TestPath> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_consistent_failure())
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn flaky(&self) -> BTreeSet<TestPath> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_flaky())
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn missing(&self) -> BTreeSet<TestPath> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Missing { .. }))
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Evidence for one path. Never reports `Passed` for an absent path when
    /// the list is known to be truncated.
    pub fn evidence(&self, path: &TestPath) -> Evidence {
        match self.outcomes.get(path) {
            Some(o) if o.is_flaky() => Evidence::Flaky,
            Some(o) if o.is_consistent_failure() => Evidence::Failed,
            Some(Outcome::Pass) => Evidence::Passed,
            Some(_) => Evidence::Unknown,
            None if self.is_complete() => Evidence::Passed,
            None => Evidence::Unknown,
        }
    }

    pub fn with_failure_limit_exceeded(self, exceeded: bool) -> Self {
        Self {
            exceeded_failure_limit: self.exceeded_failure_limit || exceeded,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail(actual: &str) -> Outcome {
        Outcome::Fail {
            expected: "PASS".to_string(),
            actual: actual.to_string(),
        }
    }

    #[test]
    fn test_mixed_actual_is_flaky() {
        assert!(fail("TEXT PASS").is_flaky());
        assert!(fail("PASS CRASH").is_flaky());
        assert!(!fail("TEXT TEXT").is_flaky());
        assert!(!fail("").is_flaky());
        assert!(fail("TEXT TEXT").is_consistent_failure());
        assert!(!fail("TEXT PASS").is_consistent_failure());
    }

    #[test]
    fn test_timeout_counts_as_failure() {
        let outcome = Outcome::Timeout {
            expected: "PASS".to_string(),
            actual: "TIMEOUT".to_string(),
        };
        assert!(outcome.is_consistent_failure());
    }

    #[test]
    fn test_absent_path_unknown_when_truncated() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(TestPath::from("fast/a.html"), fail("TEXT"));
        let truncated = ResultSet::new(outcomes.clone(), false, true);
        let complete = ResultSet::new(outcomes, false, false);

        let absent = TestPath::from("fast/b.html");
        assert_eq!(truncated.evidence(&absent), Evidence::Unknown);
        assert_eq!(complete.evidence(&absent), Evidence::Passed);
        assert_eq!(
            truncated.evidence(&TestPath::from("fast/a.html")),
            Evidence::Failed
        );
    }

    #[test]
    fn test_missing_is_neither_failing_nor_flaky() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            TestPath::from("fast/new.html"),
            Outcome::Missing {
                expected: "PASS".to_string(),
                actual: "MISSING".to_string(),
            },
        );
        let set = ResultSet::new(outcomes, false, false);
        assert!(set.failing().is_empty());
        assert!(set.flaky().is_empty());
        assert_eq!(set.missing().len(), 1);
        assert_eq!(
            set.evidence(&TestPath::from("fast/new.html")),
            Evidence::Unknown
        );
    }
}
