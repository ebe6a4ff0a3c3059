use crate::binding::{Arguments, BindingPlan};
use crate::exceptions::{BoxError, ConfigurationError, ExceptionHandlers};
use crate::params::Parameter;
use crate::responses::ResponseSpec;
use crate::server::{ParamVec, ResponseClass, ResponseEnvelope, WireResponse};
use crate::validator::BoundValue;
use http::Method;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// What a route handler produced.
#[derive(Debug, Clone)]
pub enum HandlerOutput {
    /// A value still to be validated against the route's response spec.
    Value(Value),
    /// A bound argument handed back as is, e.g. an echoed model.
    Bound(BoundValue),
    /// A finished response, passed through without validation.
    Raw(WireResponse),
    /// No content; only the status and envelope headers are sent.
    Empty,
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        HandlerOutput::Value(value)
    }
}

impl From<BoundValue> for HandlerOutput {
    fn from(value: BoundValue) -> Self {
        HandlerOutput::Bound(value)
    }
}

impl From<WireResponse> for HandlerOutput {
    fn from(response: WireResponse) -> Self {
        HandlerOutput::Raw(response)
    }
}

/// Type-erased route handler.
pub type HandlerFn =
    Arc<dyn Fn(Arguments, &mut ResponseEnvelope) -> Result<HandlerOutput, BoxError> + Send + Sync>;

/// Compiled path template such as `/items/{id}`.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: String,
    regex: Regex,
    params: Vec<String>,
    literal_segments: usize,
}

impl PathTemplate {
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidPath`] for a template that does not start
    /// with `/`, has an empty or unbalanced `{}` segment, or repeats a name.
    pub fn parse(path: &str) -> Result<Self, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidPath { path: path.to_string() };
        if !path.starts_with('/') {
            return Err(invalid());
        }

        let mut pattern = String::with_capacity(path.len() + 8);
        pattern.push('^');
        let mut params: Vec<String> = Vec::new();
        let mut literal_segments = 0;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                if name.is_empty() || name.contains(['{', '}']) || params.iter().any(|p| p == name) {
                    return Err(invalid());
                }
                pattern.push_str("/([^/]+)");
                params.push(name.to_string());
            } else if segment.contains(['{', '}']) {
                return Err(invalid());
            } else {
                pattern.push('/');
                pattern.push_str(&regex::escape(segment));
                literal_segments += 1;
            }
        }
        if params.is_empty() && literal_segments == 0 {
            pattern.push('/');
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|_| invalid())?;
        Ok(Self {
            raw: path.to_string(),
            regex,
            params,
            literal_segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the `{}` segments, in order.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        self.params.is_empty()
    }

    /// Percent-decoded captures when `path` matches.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<ParamVec> {
        let caps = self.regex.captures(path)?;
        let mut out = ParamVec::new();
        for (idx, name) in self.params.iter().enumerate() {
            let raw = caps.get(idx + 1).map_or("", |m| m.as_str());
            let value = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |v| v.into_owned());
            out.push((Arc::from(name.as_str()), value));
        }
        Some(out)
    }

    /// Ranks templates that match the same path; static segments win.
    pub(crate) fn specificity(&self) -> usize {
        self.literal_segments
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Route declaration, assembled with builder calls and handed to
/// [`Dispatcher::register`](super::Dispatcher::register).
///
/// ```rust
/// use reqbind::dispatcher::{HandlerOutput, Route};
/// use reqbind::params::{FieldType, Parameter};
/// use reqbind::responses::ResponseSpec;
///
/// let route = Route::get("/double")
///     .param(Parameter::new("n", FieldType::int()))
///     .response(ResponseSpec::new(FieldType::int()).unwrap())
///     .handler(|args, _env| {
///         let n: i64 = args.parse("n")?;
///         Ok(HandlerOutput::from(serde_json::json!(n * 2)))
///     });
/// # let _ = route;
/// ```
pub struct Route {
    pub(crate) methods: Vec<Method>,
    pub(crate) path: String,
    pub(crate) name: Option<String>,
    pub(crate) params: Vec<Parameter>,
    pub(crate) response: Option<ResponseSpec>,
    pub(crate) status_code: Option<u16>,
    pub(crate) response_class: ResponseClass,
    pub(crate) security_scopes: Vec<String>,
    pub(crate) handler: Option<HandlerFn>,
    pub(crate) exception_handlers: Option<Arc<ExceptionHandlers>>,
}

impl Route {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            methods: vec![method],
            path: path.into(),
            name: None,
            params: Vec::new(),
            response: None,
            status_code: None,
            response_class: ResponseClass::Json,
            security_scopes: Vec::new(),
            handler: None,
            exception_handlers: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serve the same handler under every listed verb, replacing the verb set
    /// given at construction. Each verb becomes its own registered endpoint.
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods.clear();
        for method in methods {
            if !self.methods.contains(&method) {
                self.methods.push(method);
            }
        }
        self
    }

    /// Handler name used in logs and the plan's cache key. Defaults to `"METHOD path"`.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn params(mut self, params: impl IntoIterator<Item = Parameter>) -> Self {
        self.params.extend(params);
        self
    }

    #[must_use]
    pub fn response(mut self, spec: ResponseSpec) -> Self {
        self.response = Some(spec);
        self
    }

    /// Fixed success status; wins over any status the handler sets on the envelope.
    #[must_use]
    pub fn status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    #[must_use]
    pub fn response_class(mut self, class: ResponseClass) -> Self {
        self.response_class = class;
        self
    }

    #[must_use]
    pub fn security_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.security_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Arguments, &mut ResponseEnvelope) -> Result<HandlerOutput, BoxError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn handler_fn(mut self, handler: HandlerFn) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Replace the dispatcher's exception table for this route only.
    #[must_use]
    pub fn exception_handlers(mut self, handlers: ExceptionHandlers) -> Self {
        self.exception_handlers = Some(Arc::new(handlers));
        self
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.methods)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("params", &self.params.len())
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

/// A registered endpoint: one verb, compiled template, binding plan and handler.
///
/// Immutable once built and shared by every concurrent dispatch.
pub struct RouteRecord {
    pub method: Method,
    pub template: PathTemplate,
    pub plan: BindingPlan,
    pub response: Option<ResponseSpec>,
    pub status_code: Option<u16>,
    pub response_class: ResponseClass,
    pub(crate) handler: HandlerFn,
    pub(crate) exception_handlers: Option<Arc<ExceptionHandlers>>,
}

impl RouteRecord {
    /// Compile a route declaration into one record per verb. The records share
    /// a single binding plan, handler and name.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::MissingMethod`], [`ConfigurationError::MissingHandler`],
    /// [`ConfigurationError::InvalidPath`] or anything [`BindingPlan::build`] rejects.
    pub fn compile(route: Route) -> Result<Vec<Self>, ConfigurationError> {
        let Route {
            methods,
            path,
            name,
            params,
            response,
            status_code,
            response_class,
            security_scopes,
            handler,
            exception_handlers,
        } = route;

        let Some(first) = methods.first() else {
            return Err(ConfigurationError::MissingMethod { path });
        };
        let Some(handler) = handler else {
            return Err(ConfigurationError::MissingHandler {
                method: first.clone(),
                path,
            });
        };
        let template = PathTemplate::parse(&path)?;
        let name = name.unwrap_or_else(|| {
            let verbs: Vec<&str> = methods.iter().map(Method::as_str).collect();
            format!("{} {path}", verbs.join(","))
        });
        let plan = BindingPlan::build(name, params, &security_scopes)?;

        Ok(methods
            .into_iter()
            .map(|method| Self {
                method,
                template: template.clone(),
                plan: plan.clone(),
                response: response.clone(),
                status_code,
                response_class,
                handler: Arc::clone(&handler),
                exception_handlers: exception_handlers.as_ref().map(Arc::clone),
            })
            .collect())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.plan.name()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.template.as_str()
    }

    pub(crate) fn same_endpoint(&self, other: &RouteRecord) -> bool {
        self.method == other.method && self.template.as_str() == other.template.as_str()
    }
}

impl fmt::Debug for RouteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRecord")
            .field("method", &self.method)
            .field("path", &self.template.as_str())
            .field("name", &self.name())
            .field("status_code", &self.status_code)
            .field("response_class", &self.response_class)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::FieldType;

    #[test]
    fn test_template_captures_and_decodes() {
        let t = PathTemplate::parse("/users/{id}/files/{name}").unwrap();
        assert_eq!(t.param_names(), ["id", "name"]);
        let caps = t.matches("/users/42/files/a%20b").unwrap();
        assert_eq!(caps[0].1, "42");
        assert_eq!(caps[1].1, "a b");
        assert!(t.matches("/users/42").is_none());
        assert!(t.matches("/users/42/files/x/y").is_none());
    }

    #[test]
    fn test_root_and_literal_escaping() {
        let root = PathTemplate::parse("/").unwrap();
        assert!(root.matches("/").is_some());
        assert!(root.matches("/x").is_none());

        let dotted = PathTemplate::parse("/v1.0/items").unwrap();
        assert!(dotted.matches("/v1.0/items").is_some());
        assert!(dotted.matches("/v1x0/items").is_none());
        assert!(dotted.is_static());
    }

    #[test]
    fn test_invalid_templates() {
        for bad in ["items", "/items/{}", "/items/{id", "/a/{id}/b/{id}", "/x{y}"] {
            assert!(
                matches!(PathTemplate::parse(bad), Err(ConfigurationError::InvalidPath { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_compile_requires_handler() {
        let err = RouteRecord::compile(Route::get("/x")).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingHandler { .. }));

        let err = RouteRecord::compile(Route::get("/x").methods([]).handler(|_, _| Ok(HandlerOutput::Empty)))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingMethod { .. }));
    }

    #[test]
    fn test_compile_default_name() {
        let record = RouteRecord::compile(
            Route::post("/items")
                .param(Parameter::new("q", FieldType::str()))
                .handler(|_, _| Ok(HandlerOutput::Empty)),
        )
        .unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record[0].name(), "POST /items");
        assert_eq!(record[0].plan.len(), 1);
    }

    #[test]
    fn test_compile_one_record_per_verb() {
        let records = RouteRecord::compile(
            Route::get("/items")
                .methods([Method::GET, Method::HEAD, Method::GET])
                .handler(|_, _| Ok(HandlerOutput::Empty)),
        )
        .unwrap();
        let verbs: Vec<&Method> = records.iter().map(|r| &r.method).collect();
        assert_eq!(verbs, [&Method::GET, &Method::HEAD]);
        assert!(records.iter().all(|r| r.name() == "GET,HEAD /items"));
    }
}
