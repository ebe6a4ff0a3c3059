use crate::params::ParameterLocation;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Issue type identifiers, matching the wire `type` field.
pub mod kinds {
    pub const MISSING: &str = "missing";
    pub const JSON_INVALID: &str = "json_invalid";
    pub const VALUE_ERROR: &str = "value_error";
    pub const STRING_TYPE: &str = "string_type";
    pub const STRING_UNICODE: &str = "string_unicode";
    pub const INT_TYPE: &str = "int_type";
    pub const INT_PARSING: &str = "int_parsing";
    pub const INT_FROM_FLOAT: &str = "int_from_float";
    pub const FLOAT_TYPE: &str = "float_type";
    pub const FLOAT_PARSING: &str = "float_parsing";
    pub const FINITE_NUMBER: &str = "finite_number";
    pub const BOOL_TYPE: &str = "bool_type";
    pub const BOOL_PARSING: &str = "bool_parsing";
    pub const LIST_TYPE: &str = "list_type";
    pub const MODEL_TYPE: &str = "model_type";
    pub const EXTRA_FORBIDDEN: &str = "extra_forbidden";
    pub const UPLOAD_FILE_TYPE: &str = "upload_file_type";
    pub const GREATER_THAN: &str = "greater_than";
    pub const GREATER_THAN_EQUAL: &str = "greater_than_equal";
    pub const LESS_THAN: &str = "less_than";
    pub const LESS_THAN_EQUAL: &str = "less_than_equal";
    pub const MULTIPLE_OF: &str = "multiple_of";
    pub const STRING_TOO_SHORT: &str = "string_too_short";
    pub const STRING_TOO_LONG: &str = "string_too_long";
    pub const TOO_SHORT: &str = "too_short";
    pub const TOO_LONG: &str = "too_long";
    pub const STRING_PATTERN_MISMATCH: &str = "string_pattern_mismatch";
    pub const ENUM: &str = "enum";
}

/// Coarse grouping of issue kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCategory {
    Missing,
    TypeError,
    ConstraintViolation,
    DecodeError,
}

/// One segment of an issue location: a field name or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum LocItem {
    Field(String),
    Index(usize),
}

impl From<&str> for LocItem {
    fn from(s: &str) -> Self {
        LocItem::Field(s.to_string())
    }
}

impl From<String> for LocItem {
    fn from(s: String) -> Self {
        LocItem::Field(s)
    }
}

impl From<usize> for LocItem {
    fn from(i: usize) -> Self {
        LocItem::Index(i)
    }
}

impl From<ParameterLocation> for LocItem {
    fn from(location: ParameterLocation) -> Self {
        LocItem::Field(location.as_str().to_string())
    }
}

impl fmt::Display for LocItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocItem::Field(s) => f.write_str(s),
            LocItem::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Build a location path from heterogeneous segments.
///
/// ```rust
/// use reqbind::loc;
/// use reqbind::validator::LocItem;
///
/// let path = loc!["body", "items", 0usize];
/// assert_eq!(path[2], LocItem::Index(0));
/// ```
#[macro_export]
macro_rules! loc {
    ($($item:expr),* $(,)?) => {
        vec![$($crate::validator::LocItem::from($item)),*]
    };
}

/// A single structured validation failure.
///
/// Serializes as `{"type": .., "loc": [..], "msg": .., "input": ..}` with an
/// optional `ctx` object carrying the violated constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub loc: Vec<LocItem>,
    pub msg: String,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx: Option<Map<String, Value>>,
}

impl ValidationIssue {
    pub fn new(kind: &'static str, loc: Vec<LocItem>, msg: impl Into<String>, input: Value) -> Self {
        ValidationIssue {
            kind,
            loc,
            msg: msg.into(),
            input,
            ctx: None,
        }
    }

    /// A required value was not supplied.
    pub fn missing(loc: Vec<LocItem>, input: Value) -> Self {
        Self::new(kinds::MISSING, loc, "Field required", input)
    }

    /// Attach one context entry.
    #[must_use]
    pub fn with_ctx(mut self, key: &str, value: Value) -> Self {
        self.ctx
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn category(&self) -> IssueCategory {
        match self.kind {
            kinds::MISSING => IssueCategory::Missing,
            kinds::JSON_INVALID | kinds::STRING_UNICODE => IssueCategory::DecodeError,
            kinds::GREATER_THAN
            | kinds::GREATER_THAN_EQUAL
            | kinds::LESS_THAN
            | kinds::LESS_THAN_EQUAL
            | kinds::MULTIPLE_OF
            | kinds::STRING_TOO_SHORT
            | kinds::STRING_TOO_LONG
            | kinds::TOO_SHORT
            | kinds::TOO_LONG
            | kinds::STRING_PATTERN_MISMATCH
            | kinds::ENUM
            | kinds::EXTRA_FORBIDDEN => IssueCategory::ConstraintViolation,
            _ => IssueCategory::TypeError,
        }
    }

    /// Dotted rendering of the location, e.g. `query.n`.
    #[must_use]
    pub fn loc_string(&self) -> String {
        self.loc
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.loc_string(), self.msg)
    }
}

/// Render a list of issues, one per line, for error messages and logs.
#[must_use]
pub fn summarize_issues(issues: &[ValidationIssue]) -> String {
    let mut out = format!("{} validation error(s)", issues.len());
    for issue in issues {
        out.push_str("\n  ");
        out.push_str(&issue.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_issue_wire_shape() {
        let issue = ValidationIssue::missing(crate::loc!["query", "n"], Value::Null);
        let v = serde_json::to_value(&issue).unwrap();
        assert_eq!(
            v,
            json!({"type": "missing", "loc": ["query", "n"], "msg": "Field required", "input": null})
        );
    }

    #[test]
    fn test_index_segments_serialize_as_numbers() {
        let issue = ValidationIssue::new(kinds::INT_PARSING, crate::loc!["query", "ids", 1usize], "bad", json!("x"))
            .with_ctx("expected", json!("integer"));
        let v = serde_json::to_value(&issue).unwrap();
        assert_eq!(v["loc"], json!(["query", "ids", 1]));
        assert_eq!(v["ctx"]["expected"], json!("integer"));
        assert_eq!(issue.loc_string(), "query.ids.1");
    }

    #[test]
    fn test_categories() {
        let missing = ValidationIssue::missing(vec![], Value::Null);
        assert_eq!(missing.category(), IssueCategory::Missing);
        let bound = ValidationIssue::new(kinds::GREATER_THAN, vec![], "", Value::Null);
        assert_eq!(bound.category(), IssueCategory::ConstraintViolation);
        let decode = ValidationIssue::new(kinds::JSON_INVALID, vec![], "", Value::Null);
        assert_eq!(decode.category(), IssueCategory::DecodeError);
        let ty = ValidationIssue::new(kinds::INT_PARSING, vec![], "", Value::Null);
        assert_eq!(ty.category(), IssueCategory::TypeError);
    }
}
