//! # reqbind
//!
//! **reqbind** binds HTTP requests to explicitly declared handler parameters,
//! validates them, and validates and serializes what the handler returns.
//!
//! ## Overview
//!
//! A route declares each parameter (name, type, location, default,
//! constraints) up front. At registration the declarations are compiled into
//! an immutable binding plan; per request the plan extracts every value from
//! the path, query string, headers, cookies and body, coerces it, checks its
//! constraints, and either calls the handler with the bound arguments or
//! reports every problem at once as a 422 with `{"detail": [issues]}`.
//!
//! The transport stays outside: the host hands in a
//! [`RequestParts`](server::RequestParts) and receives a
//! [`WireResponse`](server::WireResponse).
//!
//! ## Architecture
//!
//! - **[`params`]** - Parameter declarations: types, locations, defaults, constraints
//! - **[`validator`]** - Field validators, structured models, issues, serialization options
//! - **[`binding`]** - Per-route binding plans and request extraction
//! - **[`responses`]** - Response specs and return-value validation
//! - **[`dispatcher`]** - Route registration and the dispatch pipeline
//! - **[`exceptions`]** - Error taxonomy and the immutable exception-handler table
//! - **[`server`]** - Request containers, body decoding, multipart uploads, wire responses
//! - **[`typed`]** - Handlers over `serde` request/response structs
//! - **[`runtime_config`]** - Body and upload limits from the environment or YAML
//! - **[`logging`]** - `tracing-subscriber` initialisation
//! - **[`ids`]** - ULID request ids
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host as Transport
//!     participant Disp as Dispatcher
//!     participant Plan as BindingPlan
//!     participant Handler
//!     participant Resp as ResponseSpec
//!     participant Exc as ExceptionHandlers
//!
//!     Host->>Disp: dispatch(RequestParts)
//!     Disp->>Disp: match path template
//!     alt no route / wrong verb
//!         Disp->>Exc: HttpError 404 / 405
//!     end
//!     Disp->>Plan: solve(request)
//!     Plan->>Plan: decode body (fail fast)
//!     Plan->>Plan: path → query → header → cookie → body
//!     alt issues
//!         Plan->>Exc: RequestValidationError
//!         Exc-->>Host: 422 {"detail": [...]}
//!     end
//!     Plan-->>Disp: Arguments + ResponseEnvelope
//!     Disp->>Handler: handler(args, &mut envelope)
//!     Handler-->>Disp: value / raw response / error
//!     Disp->>Resp: validate + serialize
//!     alt mismatch
//!         Resp->>Exc: ResponseValidationError
//!         Exc-->>Host: 500 (empty)
//!     end
//!     Disp-->>Host: WireResponse
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use reqbind::dispatcher::{Dispatcher, HandlerOutput, Route};
//! use reqbind::exceptions::{ExceptionHandlers, HttpError};
//! use reqbind::params::{FieldType, ParamSpec, Parameter};
//! use reqbind::responses::ResponseSpec;
//! use reqbind::server::RequestParts;
//! use serde_json::json;
//!
//! let dispatcher = Dispatcher::new(ExceptionHandlers::new());
//! dispatcher
//!     .register(
//!         Route::get("/items/{id}")
//!             .param(Parameter::new("id", FieldType::int()).with(ParamSpec::path()))
//!             .param(Parameter::new("verbose", FieldType::bool()).with(ParamSpec::query().default(json!(false))))
//!             .response(ResponseSpec::new(FieldType::Any).unwrap())
//!             .handler(|args, _env| {
//!                 let id: i64 = args.parse("id")?;
//!                 if id == 0 {
//!                     return Err(HttpError::new(404).with_detail("not found").into());
//!                 }
//!                 Ok(HandlerOutput::from(json!({"id": id, "verbose": args.value("verbose")})))
//!             }),
//!     )
//!     .unwrap();
//!
//! let ok = dispatcher.dispatch(RequestParts::new(http::Method::GET, "/items/3")).unwrap();
//! assert_eq!(ok.json_body(), Some(json!({"id": 3, "verbose": false})));
//!
//! let bad = dispatcher.dispatch(RequestParts::new(http::Method::GET, "/items/x")).unwrap();
//! assert_eq!(bad.status, 422);
//!
//! let missing = dispatcher.dispatch(RequestParts::new(http::Method::GET, "/items/0")).unwrap();
//! assert_eq!(missing.json_body(), Some(json!({"detail": "not found"})));
//! ```
//!
//! ## Runtime Considerations
//!
//! Dispatch is synchronous. Compiled plans and validators are immutable and
//! shared across threads; per-request state is allocated fresh for each call
//! and defaults are copied on every use. The route table sits behind an
//! `ArcSwap`, so registering routes never blocks a dispatch in flight.
//! Handlers that block, block the calling thread; timeouts belong to the host.
//!
//! ## Logging
//!
//! Every stage emits `tracing` events carrying the request id. Call
//! [`logging::init_logging_with_config`] once at startup, or install any
//! other subscriber.

pub mod binding;
pub mod dispatcher;
pub mod exceptions;
pub mod ids;
pub mod logging;
pub mod params;
pub mod responses;
pub mod runtime_config;
pub mod server;
pub mod typed;
pub mod validator;

pub use binding::{Arguments, BindingPlan};
pub use dispatcher::{Dispatcher, HandlerOutput, Route};
pub use exceptions::{
    ConfigurationError, ExceptionHandlers, HttpError, RequestValidationError, ResponseValidationError,
    UnhandledError,
};
pub use params::{FieldDescriptor, FieldType, ParamSpec, Parameter, ParameterLocation};
pub use responses::ResponseSpec;
pub use runtime_config::RuntimeConfig;
pub use server::{RequestParts, ResponseEnvelope, WireResponse};
pub use validator::{ModelSchema, SerializeOptions, ValidationIssue};
