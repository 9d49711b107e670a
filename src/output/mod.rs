mod report;
mod summary;

pub use report::{build_verdict_report, write_verdict_report, VerdictReport};
pub use summary::write_summary;

use crate::error::OutputError;
use crate::runner::TriageReport;
use std::path::Path;

/// Write `verdict.json` and `summary.md` for one triage
pub fn write_triage_outputs(report_dir: &Path, report: &TriageReport) -> Result<(), OutputError> {
    let verdict = build_verdict_report(report);
    write_verdict_report(report_dir, &verdict)?;
    write_summary(report_dir, &verdict)?;
    Ok(())
}
