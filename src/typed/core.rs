use crate::binding::Arguments;
use crate::dispatcher::{HandlerFn, HandlerOutput, Route};
use crate::exceptions::BoxError;
use crate::server::ResponseEnvelope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Trait implemented by typed route handlers.
///
/// The bound arguments, keyed by declared parameter name, are deserialized
/// into [`Self::Request`]; the returned [`Self::Response`] is serialized to
/// JSON and then goes through the route's response validation like any
/// other return value.
pub trait TypedHandler: Send + Sync + 'static {
    /// Built from the validated arguments.
    type Request: DeserializeOwned;
    type Response: Serialize;

    /// # Errors
    ///
    /// Any error; it is classified and resolved like an untyped handler's.
    fn handle(&self, req: Self::Request, envelope: &mut ResponseEnvelope) -> Result<Self::Response, BoxError>;
}

/// The validated arguments did not fit the handler's request type.
///
/// Means the declared parameters and the request struct disagree; nothing
/// the client sent can cause it.
#[derive(Debug)]
pub struct TypedConversionError {
    pub handler: &'static str,
    pub source: serde_json::Error,
}

impl fmt::Display for TypedConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arguments do not fit {}: {}", self.handler, self.source)
    }
}

impl std::error::Error for TypedConversionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Wrap a typed handler as a route handler.
pub fn typed_handler<H: TypedHandler>(handler: H) -> HandlerFn {
    let handler = Arc::new(handler);
    Arc::new(move |args: Arguments, envelope: &mut ResponseEnvelope| -> Result<HandlerOutput, BoxError> {
        let request = serde_json::from_value::<H::Request>(args.to_value()).map_err(|source| {
            let err = TypedConversionError {
                handler: std::any::type_name::<H>(),
                source,
            };
            error!(error = %err, "Typed request conversion failed");
            err
        })?;
        let response = handler.handle(request, envelope)?;
        Ok(HandlerOutput::Value(serde_json::to_value(response)?))
    })
}

impl Route {
    /// Use a [`TypedHandler`] for this route.
    #[must_use]
    pub fn typed<H: TypedHandler>(self, handler: H) -> Self {
        self.handler_fn(typed_handler(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::params::{FieldType, Parameter};
    use crate::server::RequestParts;
    use http::Method;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Greet {
        name: String,
        times: Option<i64>,
    }

    #[derive(Serialize)]
    struct Greeting {
        message: String,
    }

    struct GreetHandler;

    impl TypedHandler for GreetHandler {
        type Request = Greet;
        type Response = Greeting;

        fn handle(&self, req: Greet, _envelope: &mut ResponseEnvelope) -> Result<Greeting, BoxError> {
            let times = usize::try_from(req.times.unwrap_or(1))?;
            Ok(Greeting {
                message: format!("hi {}", req.name).repeat(times),
            })
        }
    }

    #[test]
    fn test_typed_route() {
        let d = Dispatcher::default();
        d.register(
            Route::get("/greet")
                .param(Parameter::new("name", FieldType::str()))
                .param(Parameter::new("times", FieldType::optional(FieldType::int())).with(
                    crate::params::ParamSpec::query().default(json!(null)),
                ))
                .typed(GreetHandler),
        )
        .unwrap();
        let res = d.dispatch(RequestParts::new(Method::GET, "/greet?name=bo&times=2")).unwrap();
        assert_eq!(res.json_body(), Some(json!({"message": "hi bohi bo"})));
    }

    #[test]
    fn test_conversion_failure_is_unhandled() {
        let d = Dispatcher::default();
        d.register(Route::get("/greet").typed(GreetHandler)).unwrap();
        let err = d.dispatch(RequestParts::new(Method::GET, "/greet")).unwrap_err();
        assert!(err.inner().downcast_ref::<TypedConversionError>().is_some());
    }
}
