use super::error::{BoxError, Failure, HttpError, RequestValidationError, ResponseValidationError};
use crate::server::WireResponse;
use http::Method;
use serde_json::{json, Value};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What an exception handler gets to see about the failed request.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionContext<'a> {
    pub request_id: &'a str,
    pub method: &'a Method,
    pub path: &'a str,
}

type HttpHandler = Arc<dyn Fn(&ExceptionContext<'_>, &HttpError) -> WireResponse + Send + Sync>;
type RequestValidationHandler =
    Arc<dyn Fn(&ExceptionContext<'_>, &RequestValidationError) -> WireResponse + Send + Sync>;
type ResponseValidationHandler =
    Arc<dyn Fn(&ExceptionContext<'_>, &ResponseValidationError) -> WireResponse + Send + Sync>;
type ErasedHandler =
    Arc<dyn Fn(&ExceptionContext<'_>, &(dyn Error + 'static)) -> Option<WireResponse> + Send + Sync>;

/// Immutable table mapping failure kinds to response-producing handlers.
///
/// Built once per application and shared by every route. Resolution runs
/// exactly one handler per failure:
///
/// - [`HttpError`]: a handler registered for its exact status, else the
///   [`on_http`](Self::on_http) handler, else `{"detail": ..}` with the status.
/// - [`RequestValidationError`]: the registered handler, else 422 with
///   `{"detail": [issues]}`.
/// - [`ResponseValidationError`]: the registered handler, else an empty 500.
/// - anything else: the first [`on`](Self::on) / [`on_any`](Self::on_any)
///   handler whose type matches the error or an error in its `source()` chain.
///   With no match the error is handed back to the caller.
///
/// ```rust
/// use reqbind::exceptions::{ExceptionHandlers, HttpError};
/// use reqbind::server::WireResponse;
///
/// let handlers = ExceptionHandlers::new()
///     .on_status(404, |_ctx, err: &HttpError| WireResponse::text(404, format!("missing: {}", err.detail)));
/// # let _ = handlers;
/// ```
#[derive(Clone, Default)]
pub struct ExceptionHandlers {
    http: Option<HttpHandler>,
    by_status: Vec<(u16, HttpHandler)>,
    request_validation: Option<RequestValidationHandler>,
    response_validation: Option<ResponseValidationHandler>,
    custom: Vec<(&'static str, ErasedHandler)>,
}

impl ExceptionHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_http<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExceptionContext<'_>, &HttpError) -> WireResponse + Send + Sync + 'static,
    {
        self.http = Some(Arc::new(handler));
        self
    }

    /// Handle [`HttpError`]s with one specific status. Takes precedence over [`on_http`](Self::on_http).
    #[must_use]
    pub fn on_status<F>(mut self, status: u16, handler: F) -> Self
    where
        F: Fn(&ExceptionContext<'_>, &HttpError) -> WireResponse + Send + Sync + 'static,
    {
        self.by_status.retain(|(s, _)| *s != status);
        self.by_status.push((status, Arc::new(handler)));
        self
    }

    #[must_use]
    pub fn on_request_validation<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExceptionContext<'_>, &RequestValidationError) -> WireResponse + Send + Sync + 'static,
    {
        self.request_validation = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn on_response_validation<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExceptionContext<'_>, &ResponseValidationError) -> WireResponse + Send + Sync + 'static,
    {
        self.response_validation = Some(Arc::new(handler));
        self
    }

    /// Handle errors of type `E`, also when `E` is wrapped further down a `source()` chain.
    #[must_use]
    pub fn on<E, F>(mut self, handler: F) -> Self
    where
        E: Error + 'static,
        F: Fn(&ExceptionContext<'_>, &E) -> WireResponse + Send + Sync + 'static,
    {
        let erased: ErasedHandler = Arc::new(move |ctx: &ExceptionContext<'_>, err: &(dyn Error + 'static)| {
            let mut current = Some(err);
            while let Some(e) = current {
                if let Some(typed) = e.downcast_ref::<E>() {
                    return Some(handler(ctx, typed));
                }
                current = e.source();
            }
            None
        });
        self.custom.push((std::any::type_name::<E>(), erased));
        self
    }

    /// Catch-all for errors no earlier [`on`](Self::on) handler claimed.
    #[must_use]
    pub fn on_any<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExceptionContext<'_>, &(dyn Error + 'static)) -> WireResponse + Send + Sync + 'static,
    {
        let erased: ErasedHandler =
            Arc::new(move |ctx: &ExceptionContext<'_>, err: &(dyn Error + 'static)| Some(handler(ctx, err)));
        self.custom.push(("any", erased));
        self
    }

    /// Run the one handler responsible for `failure`.
    ///
    /// # Errors
    ///
    /// Hands the original error back when it is not one of the built-in kinds
    /// and no custom handler matches it.
    pub fn resolve(&self, ctx: &ExceptionContext<'_>, failure: Failure) -> Result<WireResponse, BoxError> {
        match failure {
            Failure::Http(err) => {
                if let Some((_, handler)) = self.by_status.iter().find(|(s, _)| *s == err.status) {
                    debug!(status = err.status, handler = "status", "Resolved HTTP error handler");
                    return Ok(handler(ctx, &err));
                }
                Ok(match &self.http {
                    Some(handler) => handler(ctx, &err),
                    None => http_error_response(&err),
                })
            }
            Failure::RequestValidation(err) => Ok(match &self.request_validation {
                Some(handler) => handler(ctx, &err),
                None => request_validation_response(&err),
            }),
            Failure::ResponseValidation(err) => Ok(match &self.response_validation {
                Some(handler) => handler(ctx, &err),
                None => response_validation_response(&err),
            }),
            Failure::Other(err) => {
                let as_error: &(dyn Error + 'static) = &*err;
                for (name, handler) in &self.custom {
                    if let Some(res) = handler(ctx, as_error) {
                        debug!(handler = name, "Resolved custom exception handler");
                        return Ok(res);
                    }
                }
                Err(err)
            }
        }
    }

    /// True when no handler has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.http.is_none()
            && self.by_status.is_empty()
            && self.request_validation.is_none()
            && self.response_validation.is_none()
            && self.custom.is_empty()
    }
}

impl fmt::Debug for ExceptionHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionHandlers")
            .field("http", &self.http.is_some())
            .field("by_status", &self.by_status.iter().map(|(s, _)| *s).collect::<Vec<_>>())
            .field("request_validation", &self.request_validation.is_some())
            .field("response_validation", &self.response_validation.is_some())
            .field("custom", &self.custom.iter().map(|(n, _)| *n).collect::<Vec<_>>())
            .finish()
    }
}

/// `{"detail": ..}` with the error's status and headers; no body where the status forbids one.
#[must_use]
pub fn http_error_response(err: &HttpError) -> WireResponse {
    let mut res = WireResponse::json(err.status, &json!({ "detail": err.detail }));
    for (name, value) in &err.headers {
        res.set_header(name, value.clone());
    }
    res
}

/// 422 with `{"detail": [issues]}`.
#[must_use]
pub fn request_validation_response(err: &RequestValidationError) -> WireResponse {
    let detail = serde_json::to_value(&err.errors).unwrap_or(Value::Array(Vec::new()));
    WireResponse::json(422, &json!({ "detail": detail }))
}

/// Empty 500. Server-side model details never reach the client.
#[must_use]
pub fn response_validation_response(_err: &ResponseValidationError) -> WireResponse {
    WireResponse::empty(500)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loc;
    use crate::validator::ValidationIssue;

    #[derive(Debug)]
    struct Inner;
    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("inner")
        }
    }
    impl Error for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);
    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("outer")
        }
    }
    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    fn ctx() -> (Method, String) {
        (Method::GET, "/t".to_string())
    }

    #[test]
    fn test_default_http_handler() {
        let (m, p) = ctx();
        let c = ExceptionContext {
            request_id: "r",
            method: &m,
            path: &p,
        };
        let res = ExceptionHandlers::new()
            .resolve(&c, Failure::Http(HttpError::new(404).with_detail("not found")))
            .unwrap();
        assert_eq!(res.status, 404);
        assert_eq!(res.json_body(), Some(json!({"detail": "not found"})));

        let res = ExceptionHandlers::new()
            .resolve(&c, Failure::Http(HttpError::new(304)))
            .unwrap();
        assert!(res.body.is_empty());
    }

    #[test]
    fn test_status_handler_wins() {
        let (m, p) = ctx();
        let c = ExceptionContext {
            request_id: "r",
            method: &m,
            path: &p,
        };
        let handlers = ExceptionHandlers::new()
            .on_http(|_, e| WireResponse::text(e.status, "generic"))
            .on_status(404, |_, _| WireResponse::text(404, "specific"));
        let res = handlers.resolve(&c, HttpError::new(404).into()).unwrap();
        assert_eq!(res.text_body(), "specific");
        let res = handlers.resolve(&c, HttpError::new(400).into()).unwrap();
        assert_eq!(res.text_body(), "generic");
    }

    #[test]
    fn test_default_validation_handlers() {
        let (m, p) = ctx();
        let c = ExceptionContext {
            request_id: "r",
            method: &m,
            path: &p,
        };
        let issue = ValidationIssue::missing(loc!["query", "n"], Value::Null);
        let res = ExceptionHandlers::new()
            .resolve(&c, RequestValidationError::new(vec![issue], None).into())
            .unwrap();
        assert_eq!(res.status, 422);
        assert_eq!(res.json_body().unwrap()["detail"][0]["type"], json!("missing"));

        let res = ExceptionHandlers::new()
            .resolve(&c, ResponseValidationError::new(vec![], json!("secret")).into())
            .unwrap();
        assert_eq!(res.status, 500);
        assert!(res.body.is_empty());
    }

    #[test]
    fn test_is_a_matching_walks_source_chain() {
        let (m, p) = ctx();
        let c = ExceptionContext {
            request_id: "r",
            method: &m,
            path: &p,
        };
        let handlers = ExceptionHandlers::new().on::<Inner, _>(|_, _| WireResponse::text(409, "inner"));
        let res = handlers
            .resolve(&c, Failure::Other(Box::new(Outer(Inner))))
            .unwrap();
        assert_eq!(res.status, 409);
    }

    #[test]
    fn test_first_match_wins_and_unmatched_propagates() {
        let (m, p) = ctx();
        let c = ExceptionContext {
            request_id: "r",
            method: &m,
            path: &p,
        };
        let handlers = ExceptionHandlers::new()
            .on_any(|_, _| WireResponse::text(500, "any"))
            .on::<Inner, _>(|_, _| WireResponse::text(409, "inner"));
        let res = handlers.resolve(&c, Failure::Other(Box::new(Inner))).unwrap();
        assert_eq!(res.text_body(), "any");

        let err = ExceptionHandlers::new()
            .on::<Inner, _>(|_, _| WireResponse::text(409, "inner"))
            .resolve(&c, Failure::Other(Box::new(HttpErrorLike)))
            .unwrap_err();
        assert_eq!(err.to_string(), "like");
    }

    #[derive(Debug)]
    struct HttpErrorLike;
    impl fmt::Display for HttpErrorLike {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("like")
        }
    }
    impl Error for HttpErrorLike {}
}
