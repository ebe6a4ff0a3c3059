#![allow(dead_code)]

use reqbind::dispatcher::{Dispatcher, HandlerOutput, Route};
use reqbind::exceptions::{ExceptionHandlers, HttpError};
use reqbind::params::{FieldType, Parameter};
use reqbind::responses::ResponseSpec;
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output to the test harness for the lifetime of the guard.
pub struct TestTracing {
    _guard: tracing::subscriber::DefaultGuard,
}

impl TestTracing {
    pub fn init() -> Self {
        let subscriber = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(EnvFilter::new("reqbind=debug"))
            .finish();
        Self {
            _guard: tracing::subscriber::set_default(subscriber),
        }
    }
}

/// `GET /n` taking a required `n: int` query parameter and returning an int.
///
/// `n = 404` raises `HttpError(404, "not found")`; `n = 13` returns a string,
/// which fails response validation.
pub fn int_route() -> Route {
    Route::get("/n")
        .name("read_n")
        .param(Parameter::new("n", FieldType::int()))
        .response(ResponseSpec::new(FieldType::int()).unwrap())
        .handler(|args, _env| {
            let n: i64 = args.parse("n")?;
            match n {
                404 => Err(HttpError::new(404).with_detail("not found").into()),
                13 => Ok(HandlerOutput::Value(json!("thirteen"))),
                n => Ok(HandlerOutput::Value(json!(n))),
            }
        })
}

pub fn int_dispatcher(handlers: ExceptionHandlers) -> Dispatcher {
    let dispatcher = Dispatcher::new(handlers);
    dispatcher.register(int_route()).unwrap();
    dispatcher
}
