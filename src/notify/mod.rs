mod sink;

pub use sink::FileSink;

use crate::classifier::format_test_bullets;
use crate::config::NotificationConfig;
use crate::error::NotifyError;
use crate::parser::TestPath;
use crate::runner::AttemptContext;
use crate::verdict::Verdict;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestKind {
    Flaky,
    PreExisting,
    NewFailure,
}

impl std::fmt::Display for DigestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DigestKind::Flaky => write!(f, "flaky"),
            DigestKind::PreExisting => write!(f, "pre-existing"),
            DigestKind::NewFailure => write!(f, "new-failure"),
        }
    }
}

/// One notification payload. Transport is the sink's concern.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Digest {
    pub kind: DigestKind,
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
    pub tests: Vec<TestPath>,
    pub fingerprint: String,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, digest: &Digest) -> Result<(), NotifyError>;
}

/// Everything the digests are built from, gathered at the end of a triage
pub struct DigestInput<'a> {
    pub context: &'a AttemptContext,
    pub verdict: &'a Verdict,
    pub flaky_observed: &'a BTreeSet<TestPath>,
    pub pre_existing: &'a BTreeSet<TestPath>,
    pub retry_count: u32,
}

/// Build up to three independent digests. `Passed` triages notify nobody.
pub fn build_digests(input: &DigestInput<'_>, config: &NotificationConfig) -> Vec<Digest> {
    if matches!(input.verdict, Verdict::Passed | Verdict::Retry) {
        return Vec::new();
    }

    let mut digests = Vec::new();
    let change = &input.context.change_id;

    if !input.flaky_observed.is_empty() {
        let mut body = format!(
            "## Flaky tests\n\nObserved while triaging change `{}`{}.\n\n",
            change,
            origin_suffix(input.context)
        );
        body.push_str(&format_test_bullets(input.flaky_observed, config.display_limit));
        digests.push(make_digest(
            DigestKind::Flaky,
            format!(
                "Flaky tests observed on change {}: {} tests",
                change,
                input.flaky_observed.len()
            ),
            body,
            config.flaky_recipients.clone(),
            input.flaky_observed,
        ));
    }

    if !input.pre_existing.is_empty() {
        let mut body = format!(
            "## Pre-existing failures\n\nThese tests fail with and without change `{}`{}. \
             They did not block the change.\n\n",
            change,
            origin_suffix(input.context)
        );
        body.push_str(&format_test_bullets(input.pre_existing, config.display_limit));
        digests.push(make_digest(
            DigestKind::PreExisting,
            format!(
                "Pre-existing test failures: {} tests",
                input.pre_existing.len()
            ),
            body,
            config.pre_existing_recipients.clone(),
            input.pre_existing,
        ));
    }

    if let Verdict::NewFailure(tests) = input.verdict {
        let modified: BTreeSet<&TestPath> = input.context.touched_tests.iter().collect();
        let mut body = format!(
            "## New test failures\n\nChange `{}` fails {} tests that pass without it{}.\n\n",
            change,
            tests.len(),
            origin_suffix(input.context)
        );
        for test in tests.iter().take(config.display_limit) {
            if modified.contains(test) {
                body.push_str(&format!("- {} (modified by this change)\n", test));
            } else {
                body.push_str(&format!("- {}\n", test));
            }
        }
        if tests.len() > config.display_limit {
            body.push_str(&format!(
                "- ... and {} more\n",
                tests.len() - config.display_limit
            ));
        }
        if input.retry_count > 0 {
            body.push_str(&format!(
                "\nConfirmed after {} infrastructure retries.\n",
                input.retry_count
            ));
        }

        let mut recipients = config.new_failure_recipients.clone();
        if config.notify_author {
            if let Some(author) = &input.context.author {
                recipients.push(author.clone());
            }
        }
        digests.push(make_digest(
            DigestKind::NewFailure,
            format!("Change {} introduces {} new test failures", change, tests.len()),
            body,
            recipients,
            tests,
        ));
    }

    digests
}

fn origin_suffix(context: &AttemptContext) -> String {
    match (&context.host, &context.lane) {
        (Some(host), Some(lane)) => format!(" on {} ({})", lane, host),
        (Some(host), None) => format!(" on {}", host),
        (None, Some(lane)) => format!(" on {}", lane),
        (None, None) => String::new(),
    }
}

fn make_digest(
    kind: DigestKind,
    subject: String,
    mut body: String,
    mut recipients: Vec<String>,
    tests: &BTreeSet<TestPath>,
) -> Digest {
    recipients.sort();
    recipients.dedup();
    let fingerprint = fingerprint(kind, tests);
    body.push_str(&format!("\n<!-- flaketriage:fp:{} -->\n", fingerprint));
    Digest {
        kind,
        subject,
        body,
        recipients,
        tests: tests.iter().cloned().collect(),
        fingerprint,
    }
}

/// Stable id for a digest's content so repeated triages can be deduplicated
/// downstream
fn fingerprint(kind: DigestKind, tests: &BTreeSet<TestPath>) -> String {
    let input = format!(
        "{}|{}",
        kind,
        tests
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join("|")
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)[..12].to_string()
}
