use super::multipart::{parse_multipart, FormValue, MultipartError};
use crate::exceptions::HttpError;
use crate::runtime_config::RuntimeConfig;
use crate::validator::{kinds, RawValue, ValidationIssue};
use http::Method;
use serde_json::{json, Map, Value};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info};

/// Path parameters captured by the host router, in declaration order.
pub type ParamVec = SmallVec<[(Arc<str>, String); 8]>;

/// Read access to one request location.
///
/// String-valued sources (query, header, cookie, path, form) hand back
/// `RawValue::Json(Value::String(..))`; a decoded JSON body hands back
/// whatever JSON sits under the key.
pub trait ValueSource {
    /// The first value stored under `key`.
    fn get(&self, key: &str) -> Option<RawValue>;

    /// Every value stored under `key`, in arrival order.
    fn get_all(&self, key: &str) -> Vec<RawValue> {
        self.get(key).into_iter().collect()
    }

    /// Whether a key may carry more than one value.
    fn supports_multi(&self) -> bool;

    /// Distinct keys in first-seen order.
    fn keys(&self) -> Vec<String>;

    /// Whether two keys name the same entry in this source.
    fn same_key(&self, a: &str, b: &str) -> bool {
        a == b
    }
}

fn distinct_keys<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for key in keys {
        if !out.iter().any(|k| k == key) {
            out.push(key.to_string());
        }
    }
    out
}

fn text(value: &str) -> RawValue {
    RawValue::Json(Value::String(value.to_string()))
}

/// Order-preserving, multi-valued query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse `key=value&key=value2` with percent-decoding. Blank values are kept.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let pairs = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl ValueSource for QueryParams {
    fn get(&self, key: &str) -> Option<RawValue> {
        self.first(key).map(text)
    }

    fn get_all(&self, key: &str) -> Vec<RawValue> {
        self.all(key).into_iter().map(text).collect()
    }

    fn supports_multi(&self) -> bool {
        true
    }

    fn keys(&self) -> Vec<String> {
        distinct_keys(self.pairs.iter().map(|(k, _)| k.as_str()))
    }
}

/// Case-insensitive, order-preserving, multi-valued header map.
///
/// Names are stored lowercase; repeated headers keep one entry per occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((name.to_ascii_lowercase(), value.into()));
    }

    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ValueSource for Headers {
    fn get(&self, key: &str) -> Option<RawValue> {
        self.first(key).map(text)
    }

    fn same_key(&self, a: &str, b: &str) -> bool {
        a.eq_ignore_ascii_case(b)
    }

    fn get_all(&self, key: &str) -> Vec<RawValue> {
        self.all(key).into_iter().map(text).collect()
    }

    fn supports_multi(&self) -> bool {
        true
    }

    fn keys(&self) -> Vec<String> {
        distinct_keys(self.entries.iter().map(|(k, _)| k.as_str()))
    }
}

/// Cookies parsed from every `Cookie` header. Single-valued; the first
/// occurrence of a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    pairs: Vec<(String, String)>,
}

impl Cookies {
    #[must_use]
    pub fn from_headers(headers: &Headers) -> Self {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for raw in headers.all("cookie") {
            for pair in raw.split(';') {
                let mut parts = pair.trim().splitn(2, '=');
                let Some(name) = parts.next().map(str::trim).filter(|n| !n.is_empty()) else {
                    continue;
                };
                let value = parts.next().unwrap_or("").trim().trim_matches('"');
                let value = urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string());
                if !pairs.iter().any(|(k, _)| k == name) {
                    pairs.push((name.to_string(), value));
                }
            }
        }
        Self { pairs }
    }

    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl ValueSource for Cookies {
    fn get(&self, key: &str) -> Option<RawValue> {
        self.first(key).map(text)
    }

    fn supports_multi(&self) -> bool {
        false
    }

    fn keys(&self) -> Vec<String> {
        self.pairs.iter().map(|(k, _)| k.clone()).collect()
    }
}

/// Path parameters as supplied by the host router.
#[derive(Debug, Clone, Default)]
pub struct PathParams(pub ParamVec);

impl ValueSource for PathParams {
    fn get(&self, key: &str) -> Option<RawValue> {
        self.0
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| text(v))
    }

    fn supports_multi(&self) -> bool {
        false
    }

    fn keys(&self) -> Vec<String> {
        self.0.iter().map(|(k, _)| k.to_string()).collect()
    }
}

/// A decoded form body, urlencoded or multipart.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    #[must_use]
    pub fn new(entries: Vec<(String, FormValue)>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON view of the form, last value per key, files described.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (k, v) in &self.entries {
            let value = match v {
                FormValue::Text(t) => Value::String(t.clone()),
                FormValue::File(f) => f.describe(),
            };
            map.insert(k.clone(), value);
        }
        Value::Object(map)
    }
}

fn form_raw(value: &FormValue) -> RawValue {
    match value {
        FormValue::Text(t) => text(t),
        FormValue::File(f) => RawValue::File(Arc::clone(f)),
    }
}

impl ValueSource for FormData {
    fn get(&self, key: &str) -> Option<RawValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| form_raw(v))
    }

    fn get_all(&self, key: &str) -> Vec<RawValue> {
        self.entries
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| form_raw(v))
            .collect()
    }

    fn supports_multi(&self) -> bool {
        true
    }

    fn keys(&self) -> Vec<String> {
        distinct_keys(self.entries.iter().map(|(k, _)| k.as_str()))
    }
}

impl ValueSource for Map<String, Value> {
    fn get(&self, key: &str) -> Option<RawValue> {
        Map::get(self, key).cloned().map(RawValue::Json)
    }

    fn supports_multi(&self) -> bool {
        false
    }

    fn keys(&self) -> Vec<String> {
        Map::keys(self).cloned().collect()
    }
}

/// The request as the transport hands it over: method, path, parameter
/// containers and the raw body bytes.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    pub path: String,
    pub path_params: PathParams,
    pub query: QueryParams,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl RequestParts {
    /// Build from a request target such as `/items?limit=10`.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, QueryParams::parse(q)),
            None => (target, QueryParams::default()),
        };
        Self {
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            path_params: PathParams::default(),
            query,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_path_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.path_params.0.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.headers.append("content-type", content_type);
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_json(self, body: &Value) -> Self {
        self.with_body("application/json", body.to_string())
    }

    #[must_use]
    pub fn with_form(self, pairs: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.with_body("application/x-www-form-urlencoded", encoded)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.first("content-type")
    }

    #[must_use]
    pub fn cookies(&self) -> Cookies {
        Cookies::from_headers(&self.headers)
    }
}

/// A successfully decoded request body.
#[derive(Debug, Clone)]
pub enum DecodedBody {
    Json(Value),
    Form(FormData),
}

impl DecodedBody {
    /// The body as plain JSON, attached to validation errors for diagnostics.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            DecodedBody::Json(v) => v.clone(),
            DecodedBody::Form(f) => f.to_value(),
        }
    }
}

/// Why a body could not be decoded.
#[derive(Debug)]
pub enum BodyError {
    /// Raised by the transport limits; surfaced as-is.
    Http(HttpError),
    /// The encoding was unreadable; becomes a request validation issue.
    Invalid(ValidationIssue),
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Zero-based character offset of a serde_json error position.
fn json_error_offset(text: &str, line: usize, column: usize) -> usize {
    let before: usize = text
        .split('\n')
        .take(line.saturating_sub(1))
        .map(|l| l.chars().count() + 1)
        .sum();
    before + column.saturating_sub(1)
}

fn decode_json(body: &[u8]) -> Result<Value, BodyError> {
    serde_json::from_slice(body).map_err(|e| {
        let text = String::from_utf8_lossy(body);
        let offset = json_error_offset(&text, e.line(), e.column());
        BodyError::Invalid(
            ValidationIssue::new(
                kinds::JSON_INVALID,
                crate::loc!["body", offset],
                "JSON decode error",
                json!({}),
            )
            .with_ctx("error", Value::String(e.to_string())),
        )
    })
}

/// Decode the body according to its content type.
///
/// Returns `Ok(None)` for an empty body. JSON is assumed when no content type
/// is given; unknown media types are passed through as a string.
///
/// # Errors
///
/// [`BodyError::Http`] with status 413 when the body or the number of form
/// parts exceeds the configured limits, [`BodyError::Invalid`] when the
/// encoding cannot be read.
pub fn decode_body(parts: &RequestParts, config: &RuntimeConfig) -> Result<Option<DecodedBody>, BodyError> {
    if parts.body.is_empty() {
        return Ok(None);
    }
    if parts.body.len() > config.max_body_size {
        info!(
            body_size_bytes = parts.body.len(),
            max_body_size = config.max_body_size,
            "Request body rejected: too large"
        );
        return Err(BodyError::Http(HttpError::new(413)));
    }

    let content_type = parts.content_type().unwrap_or("");
    let media = media_type(content_type);
    let parse_start = std::time::Instant::now();

    let decoded = if media.is_empty() || media == "application/json" || media.ends_with("+json") {
        DecodedBody::Json(decode_json(&parts.body)?)
    } else if media == "application/x-www-form-urlencoded" {
        let entries: Vec<(String, FormValue)> = url::form_urlencoded::parse(&parts.body)
            .map(|(k, v)| (k.into_owned(), FormValue::Text(v.into_owned())))
            .collect();
        if entries.len() > config.max_form_parts {
            return Err(BodyError::Http(
                HttpError::new(413).with_detail(format!("Too many form parts, maximum is {}", config.max_form_parts)),
            ));
        }
        DecodedBody::Form(FormData::new(entries))
    } else if media == "multipart/form-data" {
        match parse_multipart(&parts.body, content_type, config.max_form_parts, config.spool_threshold) {
            Ok(entries) => DecodedBody::Form(FormData::new(entries)),
            Err(MultipartError::TooManyParts(max)) => {
                return Err(BodyError::Http(
                    HttpError::new(413).with_detail(format!("Too many form parts, maximum is {}", max)),
                ));
            }
            Err(MultipartError::InvalidText { name }) => {
                return Err(BodyError::Invalid(ValidationIssue::new(
                    kinds::STRING_UNICODE,
                    crate::loc!["body", name],
                    "Input should be a valid string, unable to parse raw data as a unicode string",
                    Value::Null,
                )));
            }
            Err(e) => {
                return Err(BodyError::Invalid(
                    ValidationIssue::new(
                        kinds::VALUE_ERROR,
                        crate::loc!["body"],
                        "There was an error parsing the body",
                        Value::Null,
                    )
                    .with_ctx("error", Value::String(e.to_string())),
                ));
            }
        }
    } else {
        DecodedBody::Json(Value::String(String::from_utf8_lossy(&parts.body).into_owned()))
    };

    debug!(
        content_type = %media,
        body_size_bytes = parts.body.len(),
        parse_duration_us = parse_start.elapsed().as_micros() as u64,
        "Request body decoded"
    );
    Ok(Some(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::LocItem;

    #[test]
    fn test_query_keeps_blank_and_repeated_values() {
        let q = QueryParams::parse("a=1&a=2&b=&c");
        assert_eq!(q.all("a"), vec!["1", "2"]);
        assert_eq!(q.first("b"), Some(""));
        assert_eq!(q.first("c"), Some(""));
        assert_eq!(q.keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_query_percent_decoding() {
        let q = QueryParams::parse("name=J%C3%BCrgen&sp=a+b");
        assert_eq!(q.first("name"), Some("Jürgen"));
        assert_eq!(q.first("sp"), Some("a b"));
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut h = Headers::new();
        h.append("X-Tag", "a");
        h.append("x-tag", "b");
        assert_eq!(h.all("X-TAG"), vec!["a", "b"]);
        assert_eq!(h.first("x-Tag"), Some("a"));
    }

    #[test]
    fn test_parse_cookies() {
        let mut h = Headers::new();
        h.append("cookie", "a=b; c=hello%20world");
        let cookies = Cookies::from_headers(&h);
        assert_eq!(cookies.first("a"), Some("b"));
        assert_eq!(cookies.first("c"), Some("hello world"));
    }

    #[test]
    fn test_request_target_split() {
        let parts = RequestParts::new(Method::GET, "/items?limit=10");
        assert_eq!(parts.path, "/items");
        assert_eq!(parts.query.first("limit"), Some("10"));
    }

    #[test]
    fn test_decode_invalid_json_reports_offset() {
        let parts = RequestParts::new(Method::POST, "/").with_body("application/json", "{\"a\": }");
        let err = decode_body(&parts, &RuntimeConfig::default()).unwrap_err();
        let BodyError::Invalid(issue) = err else {
            panic!("expected decode issue");
        };
        assert_eq!(issue.kind, kinds::JSON_INVALID);
        assert_eq!(issue.loc[0], LocItem::from("body"));
        assert_eq!(issue.loc[1], LocItem::Index(6));
    }

    #[test]
    fn test_decode_rejects_oversized_body() {
        let config = RuntimeConfig {
            max_body_size: 4,
            ..RuntimeConfig::default()
        };
        let parts = RequestParts::new(Method::POST, "/").with_json(&json!({"long": "value"}));
        match decode_body(&parts, &config) {
            Err(BodyError::Http(e)) => assert_eq!(e.status, 413),
            other => panic!("expected 413, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_form() {
        let parts = RequestParts::new(Method::POST, "/").with_form(&[("a", "1"), ("a", "2")]);
        let Some(DecodedBody::Form(form)) = decode_body(&parts, &RuntimeConfig::default()).unwrap() else {
            panic!("expected form");
        };
        assert_eq!(form.get_all("a").len(), 2);
    }
}
