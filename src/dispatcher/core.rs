use super::route::{HandlerOutput, Route, RouteRecord};
use crate::binding::{solve, Solved};
use crate::exceptions::{
    ConfigurationError, ExceptionContext, ExceptionHandlers, Failure, HttpError, UnhandledError,
};
use crate::ids::RequestId;
use crate::responses::{serialize_bound_response, serialize_response};
use crate::runtime_config::RuntimeConfig;
use crate::server::{ParamVec, RequestParts, ResponseEnvelope, WireResponse};
use arc_swap::ArcSwap;
use http::Method;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Pipeline stage a dispatch is in; reported when a stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Extracting,
    Validating,
    Invoking,
    Serializing,
}

impl DispatchStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStage::Extracting => "extracting",
            DispatchStage::Validating => "validating",
            DispatchStage::Invoking => "invoking",
            DispatchStage::Serializing => "serializing",
        }
    }
}

/// Registered routes. Replaced wholesale on registration, never mutated.
#[derive(Debug, Clone, Default)]
struct RouteTable {
    routes: Vec<Arc<RouteRecord>>,
}

enum Lookup {
    Found(Arc<RouteRecord>, ParamVec),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl RouteTable {
    fn find(&self, method: &Method, path: &str) -> Lookup {
        let mut best: Option<(&Arc<RouteRecord>, ParamVec)> = None;
        let mut allowed: Vec<Method> = Vec::new();
        for record in &self.routes {
            let Some(captures) = record.template.matches(path) else {
                continue;
            };
            if record.method != *method {
                if !allowed.contains(&record.method) {
                    allowed.push(record.method.clone());
                }
                continue;
            }
            let better = match &best {
                Some((b, _)) => record.template.specificity() > b.template.specificity(),
                None => true,
            };
            if better {
                best = Some((record, captures));
            }
        }
        match best {
            Some((record, captures)) => Lookup::Found(Arc::clone(record), captures),
            None if !allowed.is_empty() => Lookup::MethodNotAllowed(allowed),
            None => Lookup::NotFound,
        }
    }
}

/// Routes requests to their handlers through the binding pipeline.
///
/// Every dispatch runs `Extracting → Validating → Invoking → Serializing`.
/// A failure at any stage is classified and handed to exactly one exception
/// handler, taken from the route's own table when it has one and from the
/// dispatcher's table otherwise.
///
/// Registration takes `&self`: the route table lives behind an [`ArcSwap`], so
/// routes added at runtime never block requests already in flight.
pub struct Dispatcher {
    routes: ArcSwap<RouteTable>,
    handlers: Arc<ExceptionHandlers>,
    config: RuntimeConfig,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(ExceptionHandlers::default())
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(handlers: ExceptionHandlers) -> Self {
        Self {
            routes: ArcSwap::from_pointee(RouteTable::default()),
            handlers: Arc::new(handlers),
            config: RuntimeConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn exception_handlers(&self) -> &ExceptionHandlers {
        &self.handlers
    }

    /// Compile and add a route, one endpoint per verb. An endpoint with the
    /// same method and path template replaces the earlier one.
    ///
    /// # Errors
    ///
    /// Any [`ConfigurationError`] raised while compiling the route. The table
    /// is left unchanged.
    pub fn register(&self, route: Route) -> Result<(), ConfigurationError> {
        let records: Vec<Arc<RouteRecord>> = match RouteRecord::compile(route) {
            Ok(records) => records.into_iter().map(Arc::new).collect(),
            Err(err) => {
                error!(error = %err, "Route registration failed");
                return Err(err);
            }
        };

        let previous = self.routes.rcu(|table| {
            let mut next = RouteTable::clone(table);
            next.routes
                .retain(|r| !records.iter().any(|record| r.same_endpoint(record)));
            next.routes.extend(records.iter().map(Arc::clone));
            next
        });

        for record in &records {
            if previous.routes.iter().any(|r| r.same_endpoint(record)) {
                warn!(
                    method = %record.method,
                    path = %record.path(),
                    handler_name = %record.name(),
                    "Replaced existing route"
                );
            }
            info!(
                method = %record.method,
                path = %record.path(),
                handler_name = %record.name(),
                param_count = record.plan.len(),
                cache_key = %record.plan.cache_key(),
                "Route registered"
            );
        }
        Ok(())
    }

    /// `(method, path template, handler name)` for every registered route.
    #[must_use]
    pub fn routes(&self) -> Vec<(Method, String, String)> {
        self.routes
            .load()
            .routes
            .iter()
            .map(|r| (r.method.clone(), r.path().to_string(), r.name().to_string()))
            .collect()
    }

    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.load().routes.len()
    }

    /// Run one request through the pipeline.
    ///
    /// Unknown paths fail with [`HttpError`] 404 and known paths with another
    /// verb with 405 plus an `Allow` header; both go through the exception
    /// table like any other failure.
    ///
    /// # Errors
    ///
    /// [`UnhandledError`] when the handler raised an error no exception
    /// handler claims. The transport decides what to send in that case.
    pub fn dispatch(&self, mut request: RequestParts) -> Result<WireResponse, UnhandledError> {
        let request_id = RequestId::from_headers(&request.headers).to_string();
        let start = Instant::now();
        let table = self.routes.load();

        let record = match table.find(&request.method, &request.path) {
            Lookup::Found(record, captures) => {
                for (name, value) in captures {
                    if !request.path_params.0.iter().any(|(n, _)| *n == name) {
                        request.path_params.0.push((name, value));
                    }
                }
                record
            }
            Lookup::MethodNotAllowed(allowed) => {
                let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                warn!(
                    request_id = %request_id,
                    method = %request.method,
                    path = %request.path,
                    allow = %allow,
                    "Method not allowed"
                );
                let err = HttpError::new(405).with_header("allow", allow);
                return self.fail(&self.handlers, &request_id, &request, Failure::Http(err));
            }
            Lookup::NotFound => {
                warn!(
                    request_id = %request_id,
                    method = %request.method,
                    path = %request.path,
                    "No route matched"
                );
                return self.fail(&self.handlers, &request_id, &request, Failure::Http(HttpError::new(404)));
            }
        };

        debug!(
            request_id = %request_id,
            handler_name = %record.name(),
            method = %request.method,
            path = %request.path,
            "Route matched"
        );

        let handlers = record.exception_handlers.as_ref().unwrap_or(&self.handlers);
        match self.run(&record, &request, &request_id) {
            Ok(response) => {
                info!(
                    request_id = %request_id,
                    handler_name = %record.name(),
                    status = response.status,
                    latency_us = start.elapsed().as_micros() as u64,
                    "Request completed"
                );
                Ok(response)
            }
            Err((stage, failure)) => {
                debug!(
                    request_id = %request_id,
                    handler_name = %record.name(),
                    stage = stage.as_str(),
                    failure = failure.kind(),
                    "Dispatch failed"
                );
                self.fail(handlers, &request_id, &request, failure)
            }
        }
    }

    fn run(
        &self,
        record: &RouteRecord,
        request: &RequestParts,
        request_id: &str,
    ) -> Result<WireResponse, (DispatchStage, Failure)> {
        let stage = if record.plan.has_body() {
            DispatchStage::Extracting
        } else {
            DispatchStage::Validating
        };
        let Solved {
            arguments,
            mut envelope,
        } = solve(&record.plan, request, &self.config).map_err(|f| {
            let stage = match f {
                Failure::RequestValidation(_) => DispatchStage::Validating,
                _ => stage,
            };
            (stage, f)
        })?;

        debug!(
            request_id = %request_id,
            handler_name = %record.name(),
            arg_count = arguments.len(),
            "Invoking handler"
        );
        let output = (record.handler)(arguments, &mut envelope)
            .map_err(|e| (DispatchStage::Invoking, Failure::classify(e)))?;

        let status = record.status_code.or(envelope.status).unwrap_or(200);
        match output {
            HandlerOutput::Raw(mut response) => {
                response.merge_headers(&envelope.headers);
                Ok(response)
            }
            HandlerOutput::Empty => {
                let mut response = WireResponse::empty(status);
                apply_envelope(&mut response, &envelope);
                Ok(response)
            }
            HandlerOutput::Value(value) => {
                let content = serialize_response(record.response.as_ref(), value)
                    .map_err(|e| (DispatchStage::Serializing, Failure::ResponseValidation(e)))?;
                let mut response = record.response_class.render(status, &content);
                apply_envelope(&mut response, &envelope);
                Ok(response)
            }
            HandlerOutput::Bound(bound) => {
                let content = serialize_bound_response(record.response.as_ref(), &bound)
                    .map_err(|e| (DispatchStage::Serializing, Failure::ResponseValidation(e)))?;
                let mut response = record.response_class.render(status, &content);
                apply_envelope(&mut response, &envelope);
                Ok(response)
            }
        }
    }

    fn fail(
        &self,
        handlers: &ExceptionHandlers,
        request_id: &str,
        request: &RequestParts,
        failure: Failure,
    ) -> Result<WireResponse, UnhandledError> {
        if let Failure::ResponseValidation(err) = &failure {
            error!(
                request_id = %request_id,
                path = %request.path,
                issues = %err,
                "Handler returned a value that does not match its response declaration"
            );
        }
        let kind = failure.kind();
        let ctx = ExceptionContext {
            request_id,
            method: &request.method,
            path: &request.path,
        };
        match handlers.resolve(&ctx, failure) {
            Ok(response) => {
                debug!(
                    request_id = %request_id,
                    failure = kind,
                    status = response.status,
                    "Exception handled"
                );
                Ok(response)
            }
            Err(source) => {
                error!(
                    request_id = %request_id,
                    method = %request.method,
                    path = %request.path,
                    error = %source,
                    "Unhandled error"
                );
                Err(UnhandledError {
                    request_id: request_id.to_string(),
                    source,
                })
            }
        }
    }
}

/// Envelope headers land on the response; `content-type` replaces the
/// rendered one, every other header is appended.
fn apply_envelope(response: &mut WireResponse, envelope: &ResponseEnvelope) {
    for (name, value) in &envelope.headers {
        if name.eq_ignore_ascii_case("content-type") {
            response.set_header(name, value.clone());
        } else {
            response.headers.push((Arc::clone(name), value.clone()));
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.route_count())
            .field("handlers", &self.handlers)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exceptions::BoxError;
    use crate::params::{FieldType, ParamSpec, Parameter};
    use crate::responses::ResponseSpec;
    use serde_json::json;

    fn echo_route(path: &str) -> Route {
        Route::get(path)
            .param(Parameter::new("id", FieldType::int()).with(ParamSpec::path()))
            .handler(|args, _| Ok(HandlerOutput::Value(args.to_value())))
    }

    #[test]
    fn test_path_captures_feed_path_params() {
        let d = Dispatcher::default();
        d.register(echo_route("/items/{id}")).unwrap();
        let res = d.dispatch(RequestParts::new(Method::GET, "/items/7")).unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(res.json_body(), Some(json!({"id": 7})));
    }

    #[test]
    fn test_static_route_beats_template() {
        let d = Dispatcher::default();
        d.register(echo_route("/items/{id}")).unwrap();
        d.register(Route::get("/items/latest").handler(|_, _| Ok(json!("latest").into())))
            .unwrap();
        let res = d.dispatch(RequestParts::new(Method::GET, "/items/latest")).unwrap();
        assert_eq!(res.json_body(), Some(json!("latest")));
    }

    #[test]
    fn test_not_found_and_method_not_allowed() {
        let d = Dispatcher::default();
        d.register(echo_route("/items/{id}")).unwrap();

        let res = d.dispatch(RequestParts::new(Method::GET, "/nope")).unwrap();
        assert_eq!(res.status, 404);
        assert_eq!(res.json_body(), Some(json!({"detail": "Not Found"})));

        let res = d.dispatch(RequestParts::new(Method::POST, "/items/1")).unwrap();
        assert_eq!(res.status, 405);
        assert_eq!(res.header("allow"), Some("GET"));
    }

    #[test]
    fn test_reregistration_replaces() {
        let d = Dispatcher::default();
        d.register(Route::get("/v").handler(|_, _| Ok(json!(1).into()))).unwrap();
        d.register(Route::get("/v").handler(|_, _| Ok(json!(2).into()))).unwrap();
        assert_eq!(d.route_count(), 1);
        let res = d.dispatch(RequestParts::new(Method::GET, "/v")).unwrap();
        assert_eq!(res.json_body(), Some(json!(2)));
    }

    #[test]
    fn test_status_precedence() {
        let d = Dispatcher::default();
        d.register(Route::get("/envelope").handler(|_, env| {
            env.set_status(202);
            env.set_header("x-extra", "1");
            Ok(json!("ok").into())
        }))
        .unwrap();
        d.register(Route::get("/fixed").status_code(201).handler(|_, env| {
            env.set_status(202);
            Ok(json!("ok").into())
        }))
        .unwrap();

        let res = d.dispatch(RequestParts::new(Method::GET, "/envelope")).unwrap();
        assert_eq!(res.status, 202);
        assert_eq!(res.header("x-extra"), Some("1"));
        let res = d.dispatch(RequestParts::new(Method::GET, "/fixed")).unwrap();
        assert_eq!(res.status, 201);
    }

    #[test]
    fn test_no_body_status_drops_content() {
        let d = Dispatcher::default();
        d.register(Route::delete("/x").status_code(204).handler(|_, _| Ok(json!({"gone": true}).into())))
            .unwrap();
        let res = d.dispatch(RequestParts::new(Method::DELETE, "/x")).unwrap();
        assert_eq!(res.status, 204);
        assert!(res.body.is_empty());
    }

    #[test]
    fn test_raw_response_keeps_handler_headers() {
        let d = Dispatcher::default();
        d.register(Route::get("/raw").handler(|_, env| {
            env.set_header("x-a", "envelope");
            env.set_header("x-b", "envelope");
            env.append_header("set-cookie", "a=1");
            env.append_header("set-cookie", "b=2");
            Ok(WireResponse::text(418, "teapot").with_header("x-a", "handler").into())
        }))
        .unwrap();
        let res = d.dispatch(RequestParts::new(Method::GET, "/raw")).unwrap();
        assert_eq!(res.status, 418);
        assert_eq!(res.header("x-a"), Some("handler"));
        assert_eq!(res.header("x-b"), Some("envelope"));
        let cookies: Vec<&str> = res
            .headers
            .iter()
            .filter(|(n, _)| n.as_ref() == "set-cookie")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        assert_eq!(res.headers.iter().filter(|(n, _)| n.as_ref() == "x-a").count(), 1);
        assert_eq!(res.text_body(), "teapot");
    }

    #[test]
    fn test_unclaimed_error_propagates() {
        let d = Dispatcher::default();
        d.register(Route::get("/boom").handler(|_, _| {
            let err: BoxError = "boom".into();
            Err(err)
        }))
        .unwrap();
        let err = d
            .dispatch(RequestParts::new(Method::GET, "/boom").with_header("x-request-id", "01ARZ3NDEKTSV4RRFFQ69G5FAV"))
            .unwrap_err();
        assert_eq!(err.request_id, "01ARZ3NDEKTSV4RRFFQ69G5FAV");
        assert_eq!(err.inner().to_string(), "boom");
    }

    #[test]
    fn test_route_level_exception_table() {
        let d = Dispatcher::default();
        d.register(
            Route::get("/n")
                .param(Parameter::new("n", FieldType::int()))
                .response(ResponseSpec::new(FieldType::int()).unwrap())
                .exception_handlers(
                    ExceptionHandlers::new().on_request_validation(|_, e| WireResponse::text(400, e.to_string())),
                )
                .handler(|args, _| Ok(HandlerOutput::Value(args.to_value()["n"].clone()))),
        )
        .unwrap();
        let res = d.dispatch(RequestParts::new(Method::GET, "/n")).unwrap();
        assert_eq!(res.status, 400);
    }
}
