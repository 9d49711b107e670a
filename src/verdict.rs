use crate::parser::TestPath;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of one triage attempt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "verdict", content = "tests", rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    /// Failures introduced by the change. Blocking.
    NewFailure(BTreeSet<TestPath>),
    /// Failures that also reproduce without the change. Informational.
    PreExisting(BTreeSet<TestPath>),
    /// Infrastructure anomaly; the attempt should restart
    Retry,
    /// Retries exhausted without a trustworthy signal. Warning grade.
    UnresolvedInfraIssue,
}

impl Verdict {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Verdict::NewFailure(_))
    }

    pub fn tests(&self) -> Option<&BTreeSet<TestPath>> {
        match self {
            Verdict::NewFailure(tests) | Verdict::PreExisting(tests) => Some(tests),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Passed => "passed",
            Verdict::NewFailure(_) => "new_failure",
            Verdict::PreExisting(_) => "pre_existing",
            Verdict::Retry => "retry",
            Verdict::UnresolvedInfraIssue => "unresolved_infra_issue",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tests() {
            Some(tests) => write!(f, "{} ({} tests)", self.label(), tests.len()),
            None => write!(f, "{}", self.label()),
        }
    }
}
