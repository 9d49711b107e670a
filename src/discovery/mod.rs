mod diff;
mod relevance;

pub use diff::get_touched_files;
pub use relevance::PathRelevanceFilter;

use crate::error::DiscoveryError;
use crate::parser::TestPath;
use std::path::Path;

/// Tests the change adds or modifies, relative to the tests root
pub fn discover_touched_tests(
    repo: &Path,
    base: &str,
    filter: &PathRelevanceFilter,
) -> Result<Vec<TestPath>, DiscoveryError> {
    let touched = get_touched_files(repo, base)?;
    let tests = filter.relevant_tests(&touched);
    tracing::info!(
        "Change touches {} files, {} of them tests",
        touched.len(),
        tests.len()
    );
    Ok(tests)
}
