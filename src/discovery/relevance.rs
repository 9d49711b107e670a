use crate::config::RelevanceConfig;
use crate::error::ConfigError;
use crate::parser::TestPath;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// Decides whether a path names an executable test rather than a fixture,
/// helper or expectation file.
///
/// Segment patterns match one whole directory name: `resources` excludes
/// `fast/resources/` but keeps `fast/resources-loading/`. Skipping a real test
/// costs more than running a helper.
#[derive(Debug, Clone)]
pub struct PathRelevanceFilter {
    tests_root: PathBuf,
    excluded_segments: GlobSet,
    companions: GlobSet,
}

impl PathRelevanceFilter {
    pub fn new(
        tests_root: impl Into<PathBuf>,
        excluded_segments: &[String],
        companion_patterns: &[String],
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            tests_root: tests_root.into(),
            excluded_segments: build_glob_set(excluded_segments, "excluded segment set")?,
            companions: build_glob_set(companion_patterns, "companion set")?,
        })
    }

    pub fn from_config(config: &RelevanceConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.tests_root.clone(),
            &config.excluded_segments,
            &config.companion_patterns,
        )
    }

    /// Repository-relative path check: must live under the tests root
    pub fn is_relevant(&self, path: &Path) -> bool {
        match self.relative_test_path(path) {
            Some(rel) => self.is_relevant_result(&rel),
            None => false,
        }
    }

    /// Check for a path already relative to the tests root, as result blobs
    /// report them
    pub fn is_relevant_result(&self, rel: &str) -> bool {
        let segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
        let Some((file_name, dirs)) = segments.split_last() else {
            return false;
        };

        if dirs.iter().any(|d| self.excluded_segments.is_match(d)) {
            return false;
        }

        !self.companions.is_match(file_name)
    }

    /// Touched paths that are real tests, relative to the tests root
    pub fn relevant_tests(&self, touched: &[PathBuf]) -> Vec<TestPath> {
        let tests: BTreeSet<TestPath> = touched
            .iter()
            .filter(|p| self.is_relevant(p))
            .filter_map(|p| self.relative_test_path(p))
            .map(TestPath::from)
            .collect();
        tests.into_iter().collect()
    }

    fn relative_test_path(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.tests_root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}

fn build_glob_set(patterns: &[String], label: &str) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::GlobPattern {
            pattern: pattern.clone(),
            source: e,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ConfigError::GlobPattern {
        pattern: label.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelevanceConfig;

    fn filter() -> PathRelevanceFilter {
        PathRelevanceFilter::from_config(&RelevanceConfig::default()).unwrap()
    }

    #[test]
    fn test_accepts_plain_test() {
        assert!(filter().is_relevant(Path::new("LayoutTests/fast/dom/a.html")));
    }

    #[test]
    fn test_rejects_outside_tests_root() {
        assert!(!filter().is_relevant(Path::new("Source/WebCore/dom/Node.cpp")));
        assert!(!filter().is_relevant(Path::new("LayoutTests")));
    }

    #[test]
    fn test_rejects_excluded_segments() {
        let f = filter();
        assert!(!f.is_relevant(Path::new("LayoutTests/fast/resources/helper.js")));
        assert!(!f.is_relevant(Path::new(
            "LayoutTests/imported/w3c/support/common.html"
        )));
        assert!(!f.is_relevant(Path::new("LayoutTests/fast/script-tests/a.js")));
    }

    #[test]
    fn test_rejects_expectation_companions() {
        let f = filter();
        assert!(!f.is_relevant(Path::new("LayoutTests/fast/a-expected.txt")));
        assert!(!f.is_relevant(Path::new("LayoutTests/fast/a-expected.png")));
        assert!(!f.is_relevant(Path::new(
            "LayoutTests/fast/a-expected-mismatch.html"
        )));
    }

    #[test]
    fn test_partial_segment_match_is_kept() {
        let f = filter();
        assert!(f.is_relevant(Path::new("LayoutTests/fast/resources-loading/a.html")));
        assert!(f.is_relevant(Path::new("LayoutTests/fast/supported/a.html")));
        // A file named like an excluded directory is still a test
        assert!(f.is_relevant(Path::new("LayoutTests/fast/tools")));
    }

    #[test]
    fn test_excluded_segments_accept_globs() {
        let f = PathRelevanceFilter::new(
            "LayoutTests",
            &["resources".to_string(), "*-helpers".to_string()],
            &[],
        )
        .unwrap();
        assert!(!f.is_relevant(Path::new("LayoutTests/fast/media-helpers/a.html")));
        assert!(!f.is_relevant(Path::new("LayoutTests/fast/resources/a.html")));
        assert!(f.is_relevant(Path::new("LayoutTests/fast/helpers-media/a.html")));
        assert!(f.is_relevant(Path::new("LayoutTests/fast/resources-loading/a.html")));
    }

    #[test]
    fn test_invalid_segment_glob_is_config_error() {
        let err = PathRelevanceFilter::new("LayoutTests", &["[unclosed".to_string()], &[]);
        assert!(matches!(err, Err(ConfigError::GlobPattern { .. })));
    }

    #[test]
    fn test_relevant_tests_dedupes_and_sorts() {
        let touched = vec![
            PathBuf::from("LayoutTests/fast/b.html"),
            PathBuf::from("LayoutTests/fast/a.html"),
            PathBuf::from("LayoutTests/fast/a-expected.txt"),
            PathBuf::from("LayoutTests/fast/b.html"),
            PathBuf::from("Source/WebCore/x.cpp"),
        ];
        let tests = filter().relevant_tests(&touched);
        assert_eq!(
            tests,
            vec![TestPath::from("fast/a.html"), TestPath::from("fast/b.html")]
        );
    }
}
