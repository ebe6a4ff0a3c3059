use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// Header storage for responses.
///
/// Most responses carry only a handful of headers, so they live on the stack.
/// Names are stored lowercase.
pub type HeaderVec = SmallVec<[(Arc<str>, String); 16]>;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Canonical reason phrase for a status code, `"Unknown"` when there is none.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Informational statuses, 204, 205 and 304 never carry a body.
#[must_use]
pub fn is_body_allowed_for_status(status: u16) -> bool {
    !(status < 200 || matches!(status, 204 | 205 | 304))
}

fn set_header(headers: &mut HeaderVec, name: &str, value: String) {
    let name = name.to_ascii_lowercase();
    match headers.iter_mut().find(|(k, _)| k.as_ref() == name) {
        Some(slot) => slot.1 = value,
        None => headers.push((Arc::from(name), value)),
    }
}

fn get_header<'a>(headers: &'a HeaderVec, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Mutable response state threaded through a dispatch before the body exists.
///
/// Handlers receive it by `&mut` and may set a status or add headers. Both are
/// applied to the final response; a route-level status code still wins.
#[derive(Debug, Clone, Default)]
pub struct ResponseEnvelope {
    pub status: Option<u16>,
    pub headers: HeaderVec,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        set_header(&mut self.headers, name, value.into());
    }

    /// Add a header without touching existing values with the same name.
    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.into()));
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        get_header(&self.headers, name)
    }
}

/// The finished response handed back to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl WireResponse {
    /// An empty response with the given status.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// A JSON response. The body is dropped when `status` disallows one.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        let mut res = Self::empty(status);
        res.set_header("content-type", CONTENT_TYPE_JSON);
        if is_body_allowed_for_status(status) {
            res.body = body.to_string().into_bytes();
        }
        res
    }

    /// A plain-text response. The body is dropped when `status` disallows one.
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        let mut res = Self::empty(status);
        res.set_header("content-type", CONTENT_TYPE_TEXT);
        if is_body_allowed_for_status(status) {
            res.body = body.into().into_bytes();
        }
        res
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        set_header(&mut self.headers, name, value.into());
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        get_header(&self.headers, name)
    }

    /// Copy in headers whose names this response did not carry beforehand.
    ///
    /// Repeated names in `extra` are all kept.
    pub fn merge_headers(&mut self, extra: &HeaderVec) {
        let own = self.headers.len();
        for (name, value) in extra {
            let claimed = self.headers[..own].iter().any(|(n, _)| n.eq_ignore_ascii_case(name));
            if !claimed {
                self.headers.push((Arc::clone(name), value.clone()));
            }
        }
    }

    /// Body decoded as JSON, `None` when empty or not JSON.
    #[must_use]
    pub fn json_body(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    #[must_use]
    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// How a route renders its validated return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseClass {
    #[default]
    Json,
    /// Strings are written verbatim; other values are written as JSON text.
    PlainText,
}

impl ResponseClass {
    #[must_use]
    pub fn render(self, status: u16, content: &Value) -> WireResponse {
        match self {
            ResponseClass::Json => WireResponse::json(status, content),
            ResponseClass::PlainText => match content {
                Value::String(s) => WireResponse::text(status, s.clone()),
                Value::Null => WireResponse::text(status, String::new()),
                other => WireResponse::text(status, other.to_string()),
            },
        }
    }
}
