use crate::classifier::BaselineSource;
use crate::error::OutputError;
use crate::parser::TestPath;
use crate::runner::{StageRecord, TriageReport};
use crate::verdict::Verdict;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Machine-readable verdict export consumed by the CI front end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictReport {
    pub timestamp: String,
    pub triage_id: String,
    pub change_id: String,
    #[serde(flatten)]
    pub verdict: Verdict,
    pub summary: String,
    pub blocking: bool,
    pub retry_count: u32,
    pub duration_sec: f64,
    pub flaky: BTreeSet<TestPath>,
    pub pre_existing: BTreeSet<TestPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineSource>,
    pub too_many_flaky: bool,
    pub stages: Vec<StageRecord>,
    pub exit_code: i32,
}

pub fn build_verdict_report(report: &TriageReport) -> VerdictReport {
    let classification = report.classification.as_ref();
    VerdictReport {
        timestamp: Utc::now().to_rfc3339(),
        triage_id: report.triage_id.clone(),
        change_id: report.change_id.clone(),
        verdict: report.verdict.clone(),
        summary: report.summary.clone(),
        blocking: report.verdict.is_blocking(),
        retry_count: report.retry_count,
        duration_sec: report.duration.as_secs_f64(),
        flaky: report.flaky_observed.clone(),
        pre_existing: classification
            .map(|c| c.pre_existing.clone())
            .unwrap_or_default(),
        baseline: classification.map(|c| c.baseline),
        too_many_flaky: classification.is_some_and(|c| c.lacks_clean_majority()),
        stages: report.stages.clone(),
        exit_code: if report.verdict.is_blocking() { 1 } else { 0 },
    }
}

pub fn write_verdict_report(report_dir: &Path, report: &VerdictReport) -> Result<(), OutputError> {
    fs::create_dir_all(report_dir).map_err(OutputError::CreateDir)?;

    let json_path = report_dir.join("verdict.json");
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&json_path, json).map_err(OutputError::WriteReport)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn triage_report(verdict: Verdict) -> TriageReport {
        TriageReport {
            triage_id: "t-1".to_string(),
            change_id: "abc123".to_string(),
            verdict,
            summary: "Found 1 new test failures: a.html".to_string(),
            retry_count: 1,
            classification: None,
            stages: Vec::new(),
            flaky_observed: [TestPath::from("b.html")].into_iter().collect(),
            digests: Vec::new(),
            duration: Duration::from_secs(90),
        }
    }

    #[test]
    fn test_new_failure_is_blocking() {
        let tests: BTreeSet<TestPath> = [TestPath::from("a.html")].into_iter().collect();
        let report = build_verdict_report(&triage_report(Verdict::NewFailure(tests)));
        assert!(report.blocking);
        assert_eq!(report.exit_code, 1);
        assert_eq!(report.duration_sec, 90.0);
    }

    #[test]
    fn test_writes_verdict_json() {
        let dir = tempfile::tempdir().unwrap();
        let tests: BTreeSet<TestPath> = [TestPath::from("a.html")].into_iter().collect();
        let report = build_verdict_report(&triage_report(Verdict::NewFailure(tests)));

        write_verdict_report(dir.path(), &report).unwrap();

        let json = fs::read_to_string(dir.path().join("verdict.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["verdict"], "new_failure");
        assert_eq!(value["tests"][0], "a.html");
        assert_eq!(value["flaky"][0], "b.html");
        assert_eq!(value["retry_count"], 1);
    }

    #[test]
    fn test_unresolved_is_warning_grade() {
        let report = build_verdict_report(&triage_report(Verdict::UnresolvedInfraIssue));
        assert!(!report.blocking);
        assert_eq!(report.exit_code, 0);
    }
}
