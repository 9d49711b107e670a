//! Partitions a change's failing tests into new, pre-existing and flaky.

mod display;

pub use display::{format_test_bullets, format_test_list};

use crate::error::ClassifyError;
use crate::parser::{Evidence, ResultSet, TestPath};
use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Which run the pre-existing check compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    RepeatWithoutChange,
    CleanTree,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Classification {
    pub new_failures: BTreeSet<TestPath>,
    pub pre_existing: BTreeSet<TestPath>,
    pub flaky: BTreeSet<TestPath>,
    /// First-run failures that failed again on every repeat
    pub reproduced: usize,
    /// First-run failures that passed on every repeat
    pub unreproduced: usize,
    /// The with-change repeat was unavailable; first-run failures stood in
    pub first_run_fallback: bool,
    pub baseline: BaselineSource,
}

impl Classification {
    fn empty(baseline: BaselineSource) -> Self {
        Self {
            new_failures: BTreeSet::new(),
            pre_existing: BTreeSet::new(),
            flaky: BTreeSet::new(),
            reproduced: 0,
            unreproduced: 0,
            first_run_fallback: false,
            baseline,
        }
    }

    pub fn verdict(&self) -> Verdict {
        if !self.new_failures.is_empty() {
            Verdict::NewFailure(self.new_failures.clone())
        } else if !self.pre_existing.is_empty() {
            Verdict::PreExisting(self.pre_existing.clone())
        } else {
            Verdict::Passed
        }
    }

    /// Neither the reproduced nor the unreproduced first-run failures form a
    /// strict majority. Observed pipelines treated this as "too many flaky
    /// failures"; it is surfaced for reporting only.
    pub fn lacks_clean_majority(&self) -> bool {
        let total = self.new_failures.len() + self.pre_existing.len() + self.flaky.len();
        if self.reproduced == 0 || self.unreproduced == 0 {
            return false;
        }
        self.reproduced.max(self.unreproduced) * 2 <= total
    }
}

/// Classify the change's first-run failures using whatever later-stage
/// evidence is available.
///
/// - `with_change`: first full run with the change applied.
/// - `without_change`: optional clean-tree pass, consulted only when the
///   without-change repeat is unavailable.
/// - `repeat_with_change` / `repeat_without_change`: repeats of the failing
///   subset. Incomplete repeats (interrupted or truncated) are ignored.
///
/// Every first-run failing path ends up in exactly one bucket.
pub fn classify(
    with_change: &ResultSet,
    without_change: Option<&ResultSet>,
    repeat_with_change: Option<&ResultSet>,
    repeat_without_change: Option<&ResultSet>,
) -> Result<Classification, ClassifyError> {
    let first_failures = with_change.failing();
    let first_flaky = with_change.flaky();

    let repeat_with = repeat_with_change.filter(|r| r.is_complete());
    let (baseline, source) = match repeat_without_change.filter(|r| r.is_complete()) {
        Some(r) => (Some(r), BaselineSource::RepeatWithoutChange),
        None => match without_change {
            Some(r) => (Some(r), BaselineSource::CleanTree),
            None => (None, BaselineSource::None),
        },
    };

    if first_failures.is_empty() && first_flaky.is_empty() {
        if !with_change.is_complete() {
            return Err(ClassifyError::IncompleteResult);
        }
        return Ok(Classification::empty(source));
    }

    if !first_failures.is_empty() && repeat_with.is_none() && baseline.is_none() {
        return Err(ClassifyError::Deferred(
            "neither repeat stage produced a complete result list".to_string(),
        ));
    }

    let mut result = Classification::empty(source);
    result.first_run_fallback = repeat_with.is_none() && !first_failures.is_empty();
    result.flaky.extend(first_flaky);

    for path in &first_failures {
        let reproduced = match repeat_with.map(|r| r.evidence(path)) {
            Some(Evidence::Failed) => true,
            Some(Evidence::Flaky) => false,
            Some(Evidence::Passed) => {
                result.unreproduced += 1;
                false
            }
            // No verdict from the repeat: fall back to the first run's failure
            Some(Evidence::Unknown) | None => true,
        };

        if !reproduced {
            debug!("{} did not reproduce consistently; flaky", path);
            result.flaky.insert(path.clone());
            continue;
        }
        result.reproduced += 1;

        match baseline.map(|b| b.evidence(path)) {
            Some(Evidence::Failed) => {
                result.pre_existing.insert(path.clone());
            }
            Some(Evidence::Unknown) => {
                return Err(ClassifyError::Deferred(format!(
                    "baseline has no usable result for {}",
                    path
                )));
            }
            Some(Evidence::Flaky) | Some(Evidence::Passed) | None => {
                result.new_failures.insert(path.clone());
            }
        }
    }

    // A truncated first run can hide more failures: only a proven new failure
    // is conclusive.
    if !with_change.is_complete() && result.new_failures.is_empty() {
        return Err(ClassifyError::IncompleteResult);
    }

    debug!(
        "Classified {} new, {} pre-existing, {} flaky (baseline: {:?})",
        result.new_failures.len(),
        result.pre_existing.len(),
        result.flaky.len(),
        result.baseline
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Outcome;
    use std::collections::BTreeMap;

    fn fail() -> Outcome {
        Outcome::Fail {
            expected: "PASS".to_string(),
            actual: "TEXT".to_string(),
        }
    }

    fn flaky() -> Outcome {
        Outcome::Flaky {
            expected: "PASS".to_string(),
            actual: "TEXT PASS".to_string(),
        }
    }

    fn results(entries: &[(&str, Outcome)]) -> ResultSet {
        let outcomes: BTreeMap<TestPath, Outcome> = entries
            .iter()
            .map(|(p, o)| (TestPath::from(*p), o.clone()))
            .collect();
        ResultSet::new(outcomes, false, false)
    }

    fn truncated(entries: &[(&str, Outcome)]) -> ResultSet {
        results(entries).with_failure_limit_exceeded(true)
    }

    fn set(names: &[&str]) -> BTreeSet<TestPath> {
        names.iter().map(|n| TestPath::from(*n)).collect()
    }

    #[test]
    fn test_clean_first_run_passes() {
        let first = results(&[]);
        let c = classify(&first, None, None, None).unwrap();
        assert_eq!(c.verdict(), Verdict::Passed);
    }

    #[test]
    fn test_consistent_new_failure() {
        let first = results(&[("a.html", fail())]);
        let repeat_with = results(&[("a.html", fail())]);
        let repeat_without = results(&[]);

        let c = classify(&first, None, Some(&repeat_with), Some(&repeat_without)).unwrap();
        assert_eq!(c.verdict(), Verdict::NewFailure(set(&["a.html"])));
        assert_eq!(c.baseline, BaselineSource::RepeatWithoutChange);
    }

    #[test]
    fn test_pre_existing_with_flaky_companion() {
        let first = results(&[("a.html", fail()), ("b.html", fail())]);
        let repeat_with = results(&[("a.html", fail()), ("b.html", flaky())]);
        let repeat_without = results(&[("a.html", fail())]);

        let c = classify(&first, None, Some(&repeat_with), Some(&repeat_without)).unwrap();
        assert_eq!(c.verdict(), Verdict::PreExisting(set(&["a.html"])));
        assert_eq!(c.flaky, set(&["b.html"]));
        assert!(c.new_failures.is_empty());
        assert!(!c.verdict().is_blocking());
    }

    #[test]
    fn test_every_failure_in_exactly_one_bucket() {
        let first = results(&[
            ("a.html", fail()),
            ("b.html", fail()),
            ("c.html", fail()),
            ("d.html", fail()),
        ]);
        let repeat_with = results(&[("a.html", fail()), ("b.html", fail()), ("c.html", flaky())]);
        let repeat_without = results(&[("b.html", fail()), ("a.html", flaky())]);

        let c = classify(&first, None, Some(&repeat_with), Some(&repeat_without)).unwrap();
        for path in first.failing() {
            let buckets = [
                c.new_failures.contains(&path),
                c.pre_existing.contains(&path),
                c.flaky.contains(&path),
            ];
            assert_eq!(buckets.iter().filter(|b| **b).count(), 1, "{}", path);
        }
        assert_eq!(c.new_failures, set(&["a.html"]));
        assert_eq!(c.pre_existing, set(&["b.html"]));
        assert_eq!(c.flaky, set(&["c.html", "d.html"]));
        assert_eq!(c.reproduced, 2);
        assert_eq!(c.unreproduced, 1);
    }

    #[test]
    fn test_unreproduced_failure_is_flaky() {
        let first = results(&[("a.html", fail())]);
        let repeat_with = results(&[]);
        let c = classify(&first, None, Some(&repeat_with), None).unwrap();
        assert_eq!(c.verdict(), Verdict::Passed);
        assert_eq!(c.flaky, set(&["a.html"]));
    }

    #[test]
    fn test_first_run_fallback_when_with_change_repeat_missing() {
        let first = results(&[("a.html", fail()), ("b.html", fail())]);
        let repeat_without = results(&[("b.html", fail())]);

        let c = classify(&first, None, None, Some(&repeat_without)).unwrap();
        assert!(c.first_run_fallback);
        assert_eq!(c.new_failures, set(&["a.html"]));
        assert_eq!(c.pre_existing, set(&["b.html"]));
    }

    #[test]
    fn test_no_baseline_reports_reproduced_as_new() {
        let first = results(&[("a.html", fail())]);
        let repeat_with = results(&[("a.html", fail())]);
        let c = classify(&first, None, Some(&repeat_with), None).unwrap();
        assert_eq!(c.verdict(), Verdict::NewFailure(set(&["a.html"])));
        assert_eq!(c.baseline, BaselineSource::None);
    }

    #[test]
    fn test_clean_tree_baseline_used_when_repeat_missing() {
        let first = results(&[("a.html", fail())]);
        let repeat_with = results(&[("a.html", fail())]);
        let clean = results(&[("a.html", fail())]);
        let c = classify(&first, Some(&clean), Some(&repeat_with), None).unwrap();
        assert_eq!(c.verdict(), Verdict::PreExisting(set(&["a.html"])));
        assert_eq!(c.baseline, BaselineSource::CleanTree);
    }

    #[test]
    fn test_truncated_baseline_absence_is_not_a_pass() {
        let first = results(&[("a.html", fail())]);
        let repeat_with = results(&[("a.html", fail())]);
        let clean = truncated(&[("other.html", fail())]);
        let err = classify(&first, Some(&clean), Some(&repeat_with), None).unwrap_err();
        assert!(matches!(err, ClassifyError::Deferred(_)));
    }

    #[test]
    fn test_truncated_first_run_never_passes() {
        let empty = truncated(&[]);
        assert_eq!(
            classify(&empty, None, None, None),
            Err(ClassifyError::IncompleteResult)
        );

        let first = truncated(&[("a.html", fail())]);
        let repeat_with = results(&[("a.html", fail())]);
        let repeat_without = results(&[("a.html", fail())]);
        assert_eq!(
            classify(&first, None, Some(&repeat_with), Some(&repeat_without)),
            Err(ClassifyError::IncompleteResult)
        );
    }

    #[test]
    fn test_truncated_first_run_with_proven_new_failure() {
        let first = truncated(&[("a.html", fail())]);
        let repeat_with = results(&[("a.html", fail())]);
        let repeat_without = results(&[]);
        let c = classify(&first, None, Some(&repeat_with), Some(&repeat_without)).unwrap();
        assert_eq!(c.verdict(), Verdict::NewFailure(set(&["a.html"])));
    }

    #[test]
    fn test_incomplete_repeats_defer() {
        let first = results(&[("a.html", fail())]);
        let interrupted = ResultSet::new(BTreeMap::new(), true, false);
        assert!(matches!(
            classify(&first, None, Some(&interrupted), Some(&interrupted)),
            Err(ClassifyError::Deferred(_))
        ));
    }

    #[test]
    fn test_flaky_baseline_does_not_excuse_failure() {
        let first = results(&[("a.html", fail())]);
        let repeat_with = results(&[("a.html", fail())]);
        let repeat_without = results(&[("a.html", flaky())]);
        let c = classify(&first, None, Some(&repeat_with), Some(&repeat_without)).unwrap();
        assert_eq!(c.new_failures, set(&["a.html"]));
    }

    #[test]
    fn test_lacks_clean_majority() {
        let first = results(&[("a.html", fail()), ("b.html", fail())]);
        let repeat_with = results(&[("a.html", fail())]);
        let repeat_without = results(&[]);
        let c = classify(&first, None, Some(&repeat_with), Some(&repeat_without)).unwrap();
        assert!(c.lacks_clean_majority());

        let repeat_with = results(&[("a.html", fail()), ("b.html", fail())]);
        let c = classify(&first, None, Some(&repeat_with), Some(&repeat_without)).unwrap();
        assert!(!c.lacks_clean_majority());
    }
}
