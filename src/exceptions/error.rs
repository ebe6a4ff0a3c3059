use crate::params::ParameterLocation;
use crate::server::status_reason;
use crate::validator::{summarize_issues, ValidationIssue};
use http::Method;
use serde_json::Value;
use std::error::Error;
use std::fmt;

/// Error type handlers return; dispatch classifies it by downcasting.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// A route could not be registered. Raised at registration time, never per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The declared type cannot be read from the parameter's location.
    UnsupportedParameterType {
        name: String,
        location: ParameterLocation,
        field_type: String,
    },
    /// Path parameters are always required.
    PathParameterDefault { name: String },
    /// Two fields or parameters share a wire name.
    DuplicateField { owner: String, alias: String },
    /// A `pattern` constraint failed to compile.
    InvalidPattern {
        field: String,
        pattern: String,
        reason: String,
    },
    /// The route was given an empty verb set.
    MissingMethod { path: String },
    /// The route was built without a handler.
    MissingHandler { method: Method, path: String },
    /// Route paths must start with `/`.
    InvalidPath { path: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::UnsupportedParameterType {
                name,
                location,
                field_type,
            } => write!(
                f,
                "parameter '{}' of type {} cannot be read from the {}; only scalars, scalar lists \
                 and flat models are supported there",
                name, field_type, location
            ),
            ConfigurationError::PathParameterDefault { name } => {
                write!(f, "path parameter '{}' cannot have a default", name)
            }
            ConfigurationError::DuplicateField { owner, alias } => {
                write!(f, "duplicate field '{}' in {}", alias, owner)
            }
            ConfigurationError::InvalidPattern {
                field,
                pattern,
                reason,
            } => write!(f, "invalid pattern '{}' on field '{}': {}", pattern, field, reason),
            ConfigurationError::MissingMethod { path } => {
                write!(f, "route {} accepts no HTTP methods", path)
            }
            ConfigurationError::MissingHandler { method, path } => {
                write!(f, "route {} {} has no handler", method, path)
            }
            ConfigurationError::InvalidPath { path } => {
                write!(f, "route path '{}' must start with '/'", path)
            }
        }
    }
}

impl Error for ConfigurationError {}

/// An explicit, application-raised error carrying a status and detail.
///
/// ```rust
/// use reqbind::exceptions::HttpError;
///
/// let err = HttpError::new(404);
/// assert_eq!(err.detail, "Not Found");
/// let err = HttpError::new(403).with_detail("no access").with_header("x-reason", "policy");
/// assert_eq!(err.headers.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    pub status: u16,
    /// A string or any structured JSON value.
    pub detail: Value,
    pub headers: Vec<(String, String)>,
}

impl HttpError {
    /// Detail defaults to the status's reason phrase.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            detail: Value::String(status_reason(status).to_string()),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Value::String(s) => write!(f, "{}: {}", self.status, s),
            other => write!(f, "{}: {}", self.status, other),
        }
    }
}

impl Error for HttpError {}

/// Every issue found while binding a request, in reporting order.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestValidationError {
    pub errors: Vec<ValidationIssue>,
    /// The decoded body, when there was one.
    pub body: Option<Value>,
}

impl RequestValidationError {
    #[must_use]
    pub fn new(errors: Vec<ValidationIssue>, body: Option<Value>) -> Self {
        Self { errors, body }
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }
}

impl fmt::Display for RequestValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&summarize_issues(&self.errors))
    }
}

impl Error for RequestValidationError {}

/// The handler returned a value that does not match its declared response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseValidationError {
    pub errors: Vec<ValidationIssue>,
    /// The offending return value. Logged, never sent to the client.
    pub body: Value,
}

impl ResponseValidationError {
    #[must_use]
    pub fn new(errors: Vec<ValidationIssue>, body: Value) -> Self {
        Self { errors, body }
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }
}

impl fmt::Display for ResponseValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "response validation failed: {}", summarize_issues(&self.errors))
    }
}

impl Error for ResponseValidationError {}

/// A failure no exception handler claimed. Returned to the transport.
#[derive(Debug)]
pub struct UnhandledError {
    pub request_id: String,
    pub source: BoxError,
}

impl UnhandledError {
    /// Borrow the original error, e.g. to downcast it.
    #[must_use]
    pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.source
    }

    #[must_use]
    pub fn into_inner(self) -> BoxError {
        self.source
    }
}

impl fmt::Display for UnhandledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unhandled error in request {}: {}", self.request_id, self.source)
    }
}

impl Error for UnhandledError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        let inner: &(dyn Error + 'static) = &*self.source;
        Some(inner)
    }
}

/// A dispatch failure sorted into the kind that picks its handler.
#[derive(Debug)]
pub enum Failure {
    Http(HttpError),
    RequestValidation(RequestValidationError),
    ResponseValidation(ResponseValidationError),
    Other(BoxError),
}

impl Failure {
    /// Sort a boxed error by its concrete type.
    #[must_use]
    pub fn classify(err: BoxError) -> Self {
        let err = match err.downcast::<HttpError>() {
            Ok(e) => return Failure::Http(*e),
            Err(e) => e,
        };
        let err = match err.downcast::<RequestValidationError>() {
            Ok(e) => return Failure::RequestValidation(*e),
            Err(e) => e,
        };
        match err.downcast::<ResponseValidationError>() {
            Ok(e) => Failure::ResponseValidation(*e),
            Err(e) => Failure::Other(e),
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Failure::Http(_) => "http",
            Failure::RequestValidation(_) => "request_validation",
            Failure::ResponseValidation(_) => "response_validation",
            Failure::Other(_) => "other",
        }
    }
}

impl From<HttpError> for Failure {
    fn from(e: HttpError) -> Self {
        Failure::Http(e)
    }
}

impl From<RequestValidationError> for Failure {
    fn from(e: RequestValidationError) -> Self {
        Failure::RequestValidation(e)
    }
}

impl From<ResponseValidationError> for Failure {
    fn from(e: ResponseValidationError) -> Self {
        Failure::ResponseValidation(e)
    }
}
