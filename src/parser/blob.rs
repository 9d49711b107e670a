use super::{Outcome, ResultSet, TestPath};
use crate::discovery::PathRelevanceFilter;
use crate::error::ParseError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

const TESTS_KEY: &str = "tests";
const INTERRUPTED_KEY: &str = "interrupted";
const EXCEEDED_KEY: &str = "exceeded_failure_limit";

/// Turns a raw result blob into a [`ResultSet`].
///
/// The blob is a JSON object optionally framed by a literal envelope, e.g.
/// `ADD_RESULTS({...});`. Log transports may hard-wrap it, so raw newlines can
/// appear inside string values, and arbitrary bytes may follow the closing
/// brace.
#[derive(Debug, Clone)]
pub struct ResultBlobParser {
    prefix: String,
    suffix: String,
    filter: Option<PathRelevanceFilter>,
}

impl ResultBlobParser {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            filter: None,
        }
    }

    /// Drop leaves that name fixture or expectation files rather than tests
    pub fn with_filter(mut self, filter: PathRelevanceFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn parse(&self, raw: &str) -> Result<ResultSet, ParseError> {
        let payload = self.extract_payload(raw)?;

        let root: Value =
            serde_json::from_str(&payload).map_err(|e| ParseError::Json(e.to_string()))?;
        let Value::Object(root) = root else {
            return Err(ParseError::NotAnObject);
        };

        let tests = match root.get(TESTS_KEY) {
            Some(Value::Object(tests)) => tests,
            _ => &root,
        };

        let mut outcomes = BTreeMap::new();
        let mut segments = Vec::new();
        self.walk(tests, &mut segments, &mut outcomes);

        let interrupted = root
            .get(INTERRUPTED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let exceeded = root
            .get(EXCEEDED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        debug!(
            "Parsed {} non-passing results (interrupted={}, exceeded_failure_limit={})",
            outcomes.len(),
            interrupted,
            exceeded
        );

        Ok(ResultSet::new(outcomes, interrupted, exceeded))
    }

    /// Cut the structural unit out of the raw text: from the first `{` after
    /// the envelope prefix to its matching `}`. Raw line breaks inside string
    /// values are dropped so a wrapped blob reads like its one-line original.
    fn extract_payload(&self, raw: &str) -> Result<String, ParseError> {
        let search_from = match raw.find(&self.prefix) {
            Some(idx) if !self.prefix.is_empty() => idx + self.prefix.len(),
            _ => 0,
        };
        let start = raw[search_from..]
            .find('{')
            .map(|i| search_from + i)
            .ok_or(ParseError::NoPayload)?;

        let mut payload = String::with_capacity(raw.len() - start);
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, c) in raw[start..].char_indices() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                } else if c == '\n' || c == '\r' {
                    continue;
                }
                payload.push(c);
                continue;
            }

            match c {
                '"' => in_string = true,
                '{' | '[' => depth += 1,
                '}' | ']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        payload.push(c);
                        let trailing = raw[start + i + c.len_utf8()..].trim();
                        if !trailing.is_empty() && !trailing.starts_with(&self.suffix) {
                            debug!("Ignoring {} trailing bytes after result payload", trailing.len());
                        }
                        return Ok(payload);
                    }
                }
                _ => {}
            }
            payload.push(c);
        }

        Err(ParseError::Unterminated(start))
    }

    fn walk(
        &self,
        node: &Map<String, Value>,
        segments: &mut Vec<String>,
        out: &mut BTreeMap<TestPath, Outcome>,
    ) {
        for (key, value) in node {
            let Value::Object(child) = value else {
                continue;
            };
            segments.push(key.clone());
            if is_leaf(child) {
                let path = TestPath::new(segments.join("/"));
                if self.is_result_relevant(&path) {
                    if let Some(outcome) = leaf_outcome(child) {
                        out.insert(path, outcome);
                    }
                } else {
                    debug!("Skipping non-test result entry {}", path);
                }
            } else {
                self.walk(child, segments, out);
            }
            segments.pop();
        }
    }

    fn is_result_relevant(&self, path: &TestPath) -> bool {
        self.filter
            .as_ref()
            .map(|f| f.is_relevant_result(path.as_str()))
            .unwrap_or(true)
    }
}

fn is_leaf(node: &Map<String, Value>) -> bool {
    node.contains_key("expected") && node.contains_key("actual")
}

fn leaf_outcome(leaf: &Map<String, Value>) -> Option<Outcome> {
    let expected = value_text(leaf.get("expected"));
    let actual = value_text(leaf.get("actual"));

    match leaf.get("report").and_then(Value::as_str) {
        Some("REGRESSION") => {
            if actual.split_whitespace().last() == Some("TIMEOUT") {
                Some(Outcome::Timeout { expected, actual })
            } else {
                Some(Outcome::Fail { expected, actual })
            }
        }
        Some("FLAKY") => Some(Outcome::Flaky { expected, actual }),
        Some("MISSING") => Some(Outcome::Missing { expected, actual }),
        _ => None,
    }
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
