use crate::parser::TestPath;

/// Sorted, comma-joined list truncated with an ellipsis past `limit`.
/// For human consumption only; decisions always use the full set.
pub fn format_test_list<'a>(tests: impl IntoIterator<Item = &'a TestPath>, limit: usize) -> String {
    let mut sorted: Vec<&TestPath> = tests.into_iter().collect();
    sorted.sort();
    sorted.dedup();

    let shown = sorted
        .iter()
        .take(limit)
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    if sorted.len() > limit {
        format!("{} ...", shown)
    } else {
        shown
    }
}

/// One line per test, same truncation rule as [`format_test_list`]
pub fn format_test_bullets<'a>(tests: impl IntoIterator<Item = &'a TestPath>, limit: usize) -> String {
    let mut sorted: Vec<&TestPath> = tests.into_iter().collect();
    sorted.sort();
    sorted.dedup();

    let mut out = String::new();
    for test in sorted.iter().take(limit) {
        out.push_str(&format!("- {}\n", test));
    }
    if sorted.len() > limit {
        out.push_str(&format!("- ... and {} more\n", sorted.len() - limit));
    }
    out
}
