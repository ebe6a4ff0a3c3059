//! # Exceptions Module
//!
//! The error taxonomy of the binding pipeline and the table that turns a
//! failure into a response.
//!
//! - [`ConfigurationError`]: a route could not be registered.
//! - [`RequestValidationError`]: the request did not bind; surfaced as 422.
//! - [`ResponseValidationError`]: the handler broke its response contract;
//!   surfaced as an empty 500.
//! - [`HttpError`]: raised by application code, surfaced verbatim.
//! - [`UnhandledError`]: anything no handler claimed, handed back to the transport.
//!
//! Handlers return [`BoxError`]; [`Failure::classify`] sorts it into one of the
//! kinds above and [`ExceptionHandlers::resolve`] runs the single handler
//! responsible for it.

mod error;
mod handlers;

pub use error::{
    BoxError, ConfigurationError, Failure, HttpError, RequestValidationError, ResponseValidationError,
    UnhandledError,
};
pub use handlers::{
    http_error_response, request_validation_response, response_validation_response, ExceptionContext,
    ExceptionHandlers,
};
