use super::VerdictReport;
use crate::classifier::format_test_bullets;
use crate::error::OutputError;
use crate::verdict::Verdict;
use std::fs;
use std::path::Path;

/// Human-readable companion to `verdict.json`
pub fn write_summary(report_dir: &Path, report: &VerdictReport) -> Result<(), OutputError> {
    fs::create_dir_all(report_dir).map_err(OutputError::CreateDir)?;

    let md_path = report_dir.join("summary.md");
    fs::write(&md_path, build_summary_markdown(report)).map_err(OutputError::WriteReport)?;

    Ok(())
}

fn build_summary_markdown(report: &VerdictReport) -> String {
    let mut md = String::new();

    md.push_str(&format!("# flaketriage: change {}\n\n", report.change_id));
    md.push_str(&format!("**Generated:** {}\n", report.timestamp));
    md.push_str(&format!("**Triage:** {}\n", report.triage_id));
    md.push_str(&format!("**Duration:** {:.1}s\n\n", report.duration_sec));

    md.push_str(&format!(
        "{} **{}**\n\n{}\n\n",
        verdict_icon(&report.verdict),
        report.verdict.label(),
        report.summary
    ));

    md.push_str("| Metric | Value |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Blocking | {} |\n", report.blocking));
    md.push_str(&format!("| Retries | {} |\n", report.retry_count));
    md.push_str(&format!("| Flaky | {} |\n", report.flaky.len()));
    md.push_str(&format!("| Pre-existing | {} |\n", report.pre_existing.len()));
    if let Some(baseline) = report.baseline {
        md.push_str(&format!("| Baseline | {:?} |\n", baseline));
    }
    md.push('\n');

    if report.too_many_flaky {
        md.push_str("> Too many flaky failures: neither reproduced nor unreproduced failures form a majority.\n\n");
    }

    if let Verdict::NewFailure(tests) = &report.verdict {
        md.push_str("## New failures\n\n");
        md.push_str(&format_test_bullets(tests, usize::MAX));
        md.push('\n');
    }
    if !report.pre_existing.is_empty() {
        md.push_str("## Pre-existing failures\n\n");
        md.push_str(&format_test_bullets(&report.pre_existing, usize::MAX));
        md.push('\n');
    }
    if !report.flaky.is_empty() {
        md.push_str("## Flaky tests\n\n");
        md.push_str(&format_test_bullets(&report.flaky, usize::MAX));
        md.push('\n');
    }

    if !report.stages.is_empty() {
        md.push_str("## Stages\n\n");
        md.push_str("| Attempt | Stage | Tests | Status | Duration |\n");
        md.push_str("|---------|-------|-------|--------|----------|\n");
        for stage in &report.stages {
            let tests = if stage.tests == 0 {
                "all".to_string()
            } else {
                stage.tests.to_string()
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {:.1}s |\n",
                stage.attempt,
                stage.stage,
                tests,
                stage.status,
                stage.duration_ms as f64 / 1000.0
            ));
        }
    }

    md
}

fn verdict_icon(verdict: &Verdict) -> &'static str {
    match verdict {
        Verdict::Passed => "✅",
        Verdict::NewFailure(_) => "❌",
        Verdict::PreExisting(_) => "⚠️",
        Verdict::Retry => "🔁",
        Verdict::UnresolvedInfraIssue => "⏱️",
    }
}
