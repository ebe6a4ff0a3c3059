use super::arguments::Arguments;
use super::extract::{extract_field, extract_nested, Extracted};
use super::plan::{BindingPlan, BoundParam};
use crate::exceptions::{Failure, RequestValidationError};
use crate::params::ParameterLocation;
use crate::runtime_config::RuntimeConfig;
use crate::server::{decode_body, BodyError, DecodedBody, RequestParts, ResponseEnvelope, ValueSource};
use crate::validator::{LocItem, RawValue, ValidationIssue};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A request that bound cleanly.
#[derive(Debug, Clone)]
pub struct Solved {
    pub arguments: Arguments,
    /// Default status unset (200), no headers.
    pub envelope: ResponseEnvelope,
}

/// Bind a request against a plan, collecting every issue before failing.
///
/// The body is decoded first; an unreadable body fails immediately with a
/// single decode issue, and an [`HttpError`](crate::exceptions::HttpError)
/// raised while decoding (such as 413) is passed through unchanged. Fields are
/// then validated location by location, path, query, header, cookie, body,
/// and issues are reported in that order.
///
/// # Errors
///
/// [`Failure::RequestValidation`] carrying every issue, or [`Failure::Http`]
/// from body decoding.
pub fn solve(plan: &BindingPlan, request: &RequestParts, config: &RuntimeConfig) -> Result<Solved, Failure> {
    let body = if plan.has_body() {
        match decode_body(request, config) {
            Ok(body) => body,
            Err(BodyError::Http(err)) => return Err(Failure::Http(err)),
            Err(BodyError::Invalid(issue)) => {
                warn!(
                    handler = plan.name(),
                    issue_type = issue.kind,
                    msg = %issue.msg,
                    "Request body could not be decoded"
                );
                return Err(RequestValidationError::new(vec![issue], None).into());
            }
        }
    } else {
        None
    };

    let mut arguments = Arguments::new();
    let mut issues = Vec::new();
    let cookies = request.cookies();
    let sources: [(ParameterLocation, &dyn ValueSource); 4] = [
        (ParameterLocation::Path, &request.path_params),
        (ParameterLocation::Query, &request.query),
        (ParameterLocation::Header, &request.headers),
        (ParameterLocation::Cookie, &cookies),
    ];
    for (location, source) in sources {
        bind_location(plan.params(location), source, location, &mut arguments, &mut issues);
    }
    bind_body(plan, body.as_ref(), &mut arguments, &mut issues);

    if !issues.is_empty() {
        warn!(
            handler = plan.name(),
            issue_count = issues.len(),
            first_loc = %issues[0].loc_string(),
            first_type = issues[0].kind,
            "Request validation failed"
        );
        return Err(RequestValidationError::new(issues, body.map(|b| b.to_value())).into());
    }

    debug!(handler = plan.name(), arg_count = arguments.len(), "Request bound");
    Ok(Solved {
        arguments,
        envelope: ResponseEnvelope::new(),
    })
}

fn bind_location(
    params: &[BoundParam],
    source: &dyn ValueSource,
    location: ParameterLocation,
    arguments: &mut Arguments,
    issues: &mut Vec<ValidationIssue>,
) {
    if let [only] = params {
        if only.descriptor.field.field_type.is_flat_model() {
            bind_nested(only, source, &[LocItem::from(location)], arguments, issues);
            return;
        }
    }
    for param in params {
        let loc = [LocItem::from(location), LocItem::from(param.alias())];
        bind_one(param, extract_field(param, source), &loc, arguments, issues);
    }
}

fn bind_one(
    param: &BoundParam,
    extracted: Extracted,
    loc: &[LocItem],
    arguments: &mut Arguments,
    issues: &mut Vec<ValidationIssue>,
) {
    match extracted {
        Extracted::Raw(raw) => {
            let (bound, mut found) = param.validator.validate(&raw, loc);
            if let Some(bound) = bound {
                arguments.insert(param.name(), bound);
            }
            issues.append(&mut found);
        }
        Extracted::Default(default) => arguments.insert(param.name(), default.into()),
        Extracted::Missing => issues.push(ValidationIssue::missing(loc.to_vec(), Value::Null)),
    }
}

/// Nested mode: the model's sub-fields come straight from the source's keys.
fn bind_nested(
    param: &BoundParam,
    source: &dyn ValueSource,
    loc: &[LocItem],
    arguments: &mut Arguments,
    issues: &mut Vec<ValidationIssue>,
) {
    let Some(schema) = param.descriptor.field.field_type.as_model() else {
        return;
    };
    let (assembled, found) = extract_nested(schema, source);
    if !found {
        if let Some(default) = param.descriptor.field.default.produce() {
            arguments.insert(param.name(), default.into());
            return;
        }
    }
    bind_one(
        param,
        Extracted::Raw(RawValue::Json(Value::Object(assembled))),
        loc,
        arguments,
        issues,
    );
}

fn bind_body(
    plan: &BindingPlan,
    body: Option<&DecodedBody>,
    arguments: &mut Arguments,
    issues: &mut Vec<ValidationIssue>,
) {
    let params = plan.params(ParameterLocation::Body);
    let empty = Map::new();

    if plan.embed_body() {
        let source: &dyn ValueSource = match body {
            Some(DecodedBody::Json(Value::Object(map))) => map,
            Some(DecodedBody::Form(form)) => form,
            Some(DecodedBody::Json(_)) | None => &empty,
        };
        for param in params {
            let loc = [LocItem::from("body"), LocItem::from(param.alias())];
            bind_one(param, extract_field(param, source), &loc, arguments, issues);
        }
        return;
    }

    let Some(param) = params.first() else {
        return;
    };
    let loc = [LocItem::from("body")];
    let field_type = &param.descriptor.field.field_type;
    match body {
        None => {
            let extracted = match param.descriptor.field.default.produce() {
                Some(default) => Extracted::Default(default),
                None => Extracted::Missing,
            };
            bind_one(param, extracted, &loc, arguments, issues);
        }
        Some(DecodedBody::Json(value)) => {
            bind_one(param, Extracted::Raw(RawValue::Json(value.clone())), &loc, arguments, issues);
        }
        Some(DecodedBody::Form(form)) if field_type.is_flat_model() => {
            bind_nested(param, form, &loc, arguments, issues);
        }
        Some(DecodedBody::Form(form)) if field_type.as_model().is_some() => {
            bind_one(param, Extracted::Raw(RawValue::Json(form.to_value())), &loc, arguments, issues);
        }
        Some(DecodedBody::Form(form)) => {
            let loc = [LocItem::from("body"), LocItem::from(param.alias())];
            bind_one(param, extract_field(param, form), &loc, arguments, issues);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loc;
    use crate::params::{FieldDescriptor, FieldType, ParamSpec, Parameter};
    use crate::validator::{kinds, ModelSchema};
    use http::Method;
    use serde_json::json;

    fn plan(params: Vec<Parameter>) -> BindingPlan {
        BindingPlan::build("test", params, &[]).unwrap()
    }

    fn validation_errors(result: Result<Solved, Failure>) -> Vec<ValidationIssue> {
        match result {
            Err(Failure::RequestValidation(e)) => e.errors,
            other => panic!("expected request validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_all_issues_collected_in_location_order() {
        let plan = plan(vec![
            Parameter::new("item", FieldType::int()).with(ParamSpec::body().embed(true)),
            Parameter::new("token", FieldType::str()).with(ParamSpec::header()),
            Parameter::new("n", FieldType::int()),
        ]);
        let req = RequestParts::new(Method::POST, "/?n=abc").with_json(&json!({}));
        let errors = validation_errors(solve(&plan, &req, &RuntimeConfig::default()));
        let locs: Vec<_> = errors.iter().map(|e| e.loc.clone()).collect();
        assert_eq!(
            locs,
            vec![loc!["query", "n"], loc!["header", "token"], loc!["body", "item"]]
        );
        assert_eq!(errors[0].kind, kinds::INT_PARSING);
        assert_eq!(errors[1].kind, kinds::MISSING);
    }

    #[test]
    fn test_malformed_body_short_circuits() {
        let plan = plan(vec![
            Parameter::new("n", FieldType::int()),
            Parameter::new("item", FieldType::Any).with(ParamSpec::body()),
        ]);
        let req = RequestParts::new(Method::POST, "/").with_body("application/json", "{oops");
        let errors = validation_errors(solve(&plan, &req, &RuntimeConfig::default()));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, kinds::JSON_INVALID);
    }

    #[test]
    fn test_oversized_body_is_http_error() {
        let plan = plan(vec![Parameter::new("item", FieldType::Any).with(ParamSpec::body())]);
        let config = RuntimeConfig {
            max_body_size: 2,
            ..RuntimeConfig::default()
        };
        let req = RequestParts::new(Method::POST, "/").with_json(&json!({"a": 1}));
        assert!(matches!(solve(&plan, &req, &config), Err(Failure::Http(e)) if e.status == 413));
    }

    #[test]
    fn test_nested_query_model() {
        let schema = ModelSchema::builder("Filter")
            .field(FieldDescriptor::new("a", FieldType::int()))
            .field(FieldDescriptor::new("b", FieldType::int()))
            .build()
            .unwrap();
        let plan = plan(vec![Parameter::new("filter", FieldType::model(schema))]);
        let req = RequestParts::new(Method::GET, "/?a=1&b=2&c=3");
        let solved = solve(&plan, &req, &RuntimeConfig::default()).unwrap();
        let model = solved.arguments.get("filter").and_then(|b| b.as_model()).unwrap();
        assert_eq!(model.get("a").unwrap().to_value(), json!(1));
        assert_eq!(model.get("b").unwrap().to_value(), json!(2));

        let missing = RequestParts::new(Method::GET, "/?a=1");
        let errors = validation_errors(solve(&plan, &missing, &RuntimeConfig::default()));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].loc, loc!["query", "b"]);
    }

    #[test]
    fn test_single_model_body_is_not_embedded() {
        let schema = ModelSchema::builder("Item")
            .field(FieldDescriptor::new("name", FieldType::str()))
            .build()
            .unwrap();
        let plan = plan(vec![Parameter::new("item", FieldType::model(schema)).with(ParamSpec::body())]);
        let req = RequestParts::new(Method::POST, "/").with_json(&json!({"name": "x"}));
        let solved = solve(&plan, &req, &RuntimeConfig::default()).unwrap();
        assert_eq!(solved.arguments.get("item").unwrap().to_value(), json!({"name": "x"}));

        let empty = RequestParts::new(Method::POST, "/");
        let errors = validation_errors(solve(&plan, &empty, &RuntimeConfig::default()));
        assert_eq!(errors[0].loc, loc!["body"]);
    }

    #[test]
    fn test_path_and_cookie_sources() {
        let plan = plan(vec![
            Parameter::new("id", FieldType::int()).with(ParamSpec::path()),
            Parameter::new("session", FieldType::str()).with(ParamSpec::cookie()),
        ]);
        let req = RequestParts::new(Method::GET, "/items/7")
            .with_path_param("id", "7")
            .with_header("cookie", "session=abc");
        let solved = solve(&plan, &req, &RuntimeConfig::default()).unwrap();
        assert_eq!(solved.arguments.value("id"), Some(&json!(7)));
        assert_eq!(solved.arguments.value("session"), Some(&json!("abc")));
        assert!(solved.envelope.status.is_none());
    }
}
