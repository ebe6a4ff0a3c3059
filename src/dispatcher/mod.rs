//! # Dispatcher Module
//!
//! Route registration and the per-request pipeline.
//!
//! ## Overview
//!
//! Routes are declared with the [`Route`] builder: method, path template,
//! explicitly declared parameters, an optional [`ResponseSpec`] and a handler
//! closure. [`Dispatcher::register`] compiles the declaration into an immutable
//! [`RouteRecord`] (path regex, binding plan, validators) once, up front.
//! Configuration mistakes surface here as
//! [`ConfigurationError`](crate::exceptions::ConfigurationError), never per
//! request.
//!
//! ## Request Flow
//!
//! 1. The path is matched against every template; static segments win ties.
//!    No match is a 404, a match under another verb a 405 with `Allow`.
//! 2. The body is decoded and every parameter extracted and validated.
//! 3. The handler runs with the bound [`Arguments`](crate::binding::Arguments)
//!    and a mutable [`ResponseEnvelope`](crate::server::ResponseEnvelope).
//! 4. The return value is validated against the route's response spec and
//!    rendered; raw [`WireResponse`](crate::server::WireResponse)s pass through.
//!
//! Any failure along the way goes to exactly one handler from the
//! [`ExceptionHandlers`](crate::exceptions::ExceptionHandlers) table.
//!
//! ```rust
//! use reqbind::dispatcher::{Dispatcher, HandlerOutput, Route};
//! use reqbind::params::{FieldType, Parameter};
//! use reqbind::responses::ResponseSpec;
//! use reqbind::server::RequestParts;
//!
//! let dispatcher = Dispatcher::default();
//! dispatcher
//!     .register(
//!         Route::get("/square")
//!             .param(Parameter::new("n", FieldType::int()))
//!             .response(ResponseSpec::new(FieldType::int()).unwrap())
//!             .handler(|args, _env| {
//!                 let n: i64 = args.parse("n")?;
//!                 Ok(HandlerOutput::from(serde_json::json!(n * n)))
//!             }),
//!     )
//!     .unwrap();
//!
//! let res = dispatcher.dispatch(RequestParts::new(http::Method::GET, "/square?n=4")).unwrap();
//! assert_eq!(res.status, 200);
//! assert_eq!(res.body, b"16");
//! ```
//!
//! [`ResponseSpec`]: crate::responses::ResponseSpec

mod core;
mod route;

pub use core::{DispatchStage, Dispatcher};
pub use route::{HandlerFn, HandlerOutput, PathTemplate, Route, RouteRecord};
