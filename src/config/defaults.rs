use std::path::PathBuf;

pub fn default_version() -> u32 {
    1
}

pub fn default_report_dir() -> PathBuf {
    PathBuf::from("triage-reports")
}

pub fn default_failure_limit() -> u32 {
    60
}

pub fn default_repeat_count() -> u32 {
    10
}

pub fn default_first_run_timeout_sec() -> u64 {
    3 * 60 * 60
}

pub fn default_repeat_timeout_sec() -> u64 {
    45 * 60
}

pub fn default_max_retries() -> u32 {
    3
}

pub fn default_backoff_base_ms() -> u64 {
    1000
}

pub fn default_envelope_prefix() -> String {
    "ADD_RESULTS(".to_string()
}

pub fn default_envelope_suffix() -> String {
    ");".to_string()
}

pub fn default_results_artifact() -> String {
    "full_results.json".to_string()
}

pub fn default_tests_root() -> PathBuf {
    PathBuf::from("LayoutTests")
}

pub fn default_excluded_segments() -> Vec<String> {
    [
        "resources",
        "support",
        "script-tests",
        "tools",
        "reference",
        "references",
        "reftest-reference",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_companion_patterns() -> Vec<String> {
    [
        "*-expected.txt",
        "*-expected.png",
        "*-expected.html",
        "*-expected.svg",
        "*-expected.xht",
        "*-expected.wav",
        "*-expected.checksum",
        "*-expected-mismatch.html",
        "*-expected-mismatch.svg",
        "*-ref.html",
        "*-ref.xht",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

pub fn default_display_limit() -> usize {
    10
}

pub fn default_true() -> bool {
    true
}
