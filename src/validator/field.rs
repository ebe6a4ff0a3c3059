use super::issue::{kinds, LocItem, ValidationIssue};
use super::model::{BoundValue, ExtraPolicy, ModelInstance, ModelSchema};
use super::serialize::{serialize_bound, SerializeOptions};
use crate::exceptions::ConfigurationError;
use crate::params::{Constraints, FieldDescriptor, FieldType, ScalarType};
use crate::server::UploadFile;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Raw input handed to a validator: decoded JSON or an uploaded file part.
#[derive(Debug, Clone)]
pub enum RawValue {
    Json(Value),
    File(Arc<UploadFile>),
}

impl RawValue {
    /// The input as it should be echoed in an issue.
    #[must_use]
    pub fn as_input(&self) -> Value {
        match self {
            RawValue::Json(v) => v.clone(),
            RawValue::File(f) => f.describe(),
        }
    }
}

impl From<Value> for RawValue {
    fn from(v: Value) -> Self {
        RawValue::Json(v)
    }
}

/// Binds one [`FieldDescriptor`] to compiled type-check and coercion logic.
///
/// Validators are immutable after construction; `validate` takes `&self`,
/// touches no shared state and returns the same result for the same input.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    descriptor: FieldDescriptor,
    pattern: Option<Regex>,
}

impl FieldValidator {
    /// Compile a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPattern`] when the pattern constraint
    /// is not a valid regular expression.
    pub fn new(descriptor: FieldDescriptor) -> Result<Self, ConfigurationError> {
        let pattern = match &descriptor.constraints.pattern {
            Some(p) => Some(Regex::new(p).map_err(|e| ConfigurationError::InvalidPattern {
                field: descriptor.name.clone(),
                pattern: p.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        Ok(Self {
            descriptor,
            pattern,
        })
    }

    #[must_use]
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        self.descriptor.alias()
    }

    #[must_use]
    pub fn required(&self) -> bool {
        self.descriptor.required()
    }

    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        &self.descriptor.field_type
    }

    /// Coerce `raw` to the declared type, then check constraints.
    ///
    /// `loc` is the full location of the value (for a query parameter that is
    /// `["query", alias]`). Issues are returned, never raised; a coercion failure
    /// skips the constraint checks for this field.
    #[must_use]
    pub fn validate(&self, raw: &RawValue, loc: &[LocItem]) -> (Option<BoundValue>, Vec<ValidationIssue>) {
        let mut issues = Vec::new();
        let mut path = loc.to_vec();
        let bound = match raw {
            RawValue::File(file) => self.validate_file(file, &mut path, &mut issues),
            RawValue::Json(value) => {
                validate_type(&self.descriptor.field_type, value, &mut path, &mut issues)
            }
        };
        let bound = match bound {
            Some(b) if issues.is_empty() => {
                check_constraints(&self.descriptor.constraints, self.pattern.as_ref(), &b, loc, &mut issues);
                Some(b)
            }
            other => other,
        };
        if issues.is_empty() {
            (bound, issues)
        } else {
            (None, issues)
        }
    }

    /// Convenience wrapper for JSON input.
    #[must_use]
    pub fn validate_json(&self, value: &Value, loc: &[LocItem]) -> (Option<BoundValue>, Vec<ValidationIssue>) {
        self.validate(&RawValue::Json(value.clone()), loc)
    }

    /// Encode a value that already passed [`validate`](Self::validate).
    #[must_use]
    pub fn serialize(&self, value: &BoundValue, options: &SerializeOptions) -> Value {
        serialize_bound(value, options, true)
    }

    fn validate_file(
        &self,
        file: &Arc<UploadFile>,
        path: &mut Vec<LocItem>,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<BoundValue> {
        match self.descriptor.field_type.inner() {
            FieldType::File | FieldType::Any => Some(BoundValue::File(Arc::clone(file))),
            other => {
                issues.push(type_issue(other, path, file.describe()));
                None
            }
        }
    }
}

fn validate_type(
    ty: &FieldType,
    value: &Value,
    path: &mut Vec<LocItem>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<BoundValue> {
    match ty {
        FieldType::Any => Some(BoundValue::Value(value.clone())),
        FieldType::Optional(inner) => {
            if value.is_null() {
                Some(BoundValue::Value(Value::Null))
            } else {
                validate_type(inner, value, path, issues)
            }
        }
        FieldType::Scalar(scalar) => match coerce_scalar(*scalar, value) {
            Ok(v) => Some(BoundValue::Value(v)),
            Err((kind, msg)) => {
                issues.push(ValidationIssue::new(kind, path.clone(), msg, value.clone()));
                None
            }
        },
        FieldType::Sequence(item) => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                let before = issues.len();
                for (idx, v) in items.iter().enumerate() {
                    path.push(LocItem::Index(idx));
                    if let Some(b) = validate_type(item, v, path, issues) {
                        out.push(b);
                    }
                    path.pop();
                }
                (issues.len() == before).then_some(BoundValue::List(out))
            }
            other => {
                issues.push(ValidationIssue::new(
                    kinds::LIST_TYPE,
                    path.clone(),
                    "Input should be a valid list",
                    other.clone(),
                ));
                None
            }
        },
        FieldType::Model(schema) => validate_model(schema, value, path, issues),
        FieldType::File => {
            issues.push(type_issue(ty, path, value.clone()));
            None
        }
    }
}

fn validate_model(
    schema: &Arc<ModelSchema>,
    value: &Value,
    path: &mut Vec<LocItem>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<BoundValue> {
    let Value::Object(map) = value else {
        issues.push(ValidationIssue::new(
            kinds::MODEL_TYPE,
            path.clone(),
            format!("Input should be a valid dictionary or instance of {}", schema.name()),
            value.clone(),
        ));
        return None;
    };

    let before = issues.len();
    let mut values = Vec::with_capacity(schema.fields().len());
    let mut fields_set = BTreeSet::new();
    for field in schema.fields() {
        path.push(LocItem::Field(field.alias().to_string()));
        match map.get(field.alias()) {
            Some(raw) => {
                let (bound, mut field_issues) = field.validate_json(raw, path);
                issues.append(&mut field_issues);
                if let Some(b) = bound {
                    values.push((field.name().to_string(), b));
                    fields_set.insert(field.name().to_string());
                }
            }
            None => match field.descriptor().default.produce() {
                Some(default) => values.push((field.name().to_string(), BoundValue::Value(default))),
                None => issues.push(ValidationIssue::missing(path.clone(), value.clone())),
            },
        }
        path.pop();
    }

    let mut extra = Map::new();
    for (key, v) in map {
        if schema.aliases().any(|a| a == key.as_str()) {
            continue;
        }
        match schema.extra() {
            ExtraPolicy::Ignore => {}
            ExtraPolicy::Allow => {
                extra.insert(key.clone(), v.clone());
            }
            ExtraPolicy::Forbid => {
                path.push(LocItem::Field(key.clone()));
                issues.push(ValidationIssue::new(
                    kinds::EXTRA_FORBIDDEN,
                    path.clone(),
                    "Extra inputs are not permitted",
                    v.clone(),
                ));
                path.pop();
            }
        }
    }

    if issues.len() > before {
        return None;
    }
    Some(BoundValue::Model(ModelInstance {
        schema: Arc::clone(schema),
        values,
        fields_set,
        extra,
    }))
}

fn type_issue(ty: &FieldType, path: &[LocItem], input: Value) -> ValidationIssue {
    let (kind, msg) = match ty.inner() {
        FieldType::Scalar(s) => scalar_type_error(*s),
        FieldType::Sequence(_) => (kinds::LIST_TYPE, "Input should be a valid list".to_string()),
        FieldType::Model(schema) => (
            kinds::MODEL_TYPE,
            format!("Input should be a valid dictionary or instance of {}", schema.name()),
        ),
        FieldType::File => (kinds::UPLOAD_FILE_TYPE, "Input should be an uploaded file".to_string()),
        FieldType::Any | FieldType::Optional(_) => (kinds::VALUE_ERROR, "Invalid input".to_string()),
    };
    ValidationIssue::new(kind, path.to_vec(), msg, input)
}

fn scalar_type_error(scalar: ScalarType) -> (&'static str, String) {
    match scalar {
        ScalarType::Str => (kinds::STRING_TYPE, "Input should be a valid string".to_string()),
        ScalarType::Int => (kinds::INT_TYPE, "Input should be a valid integer".to_string()),
        ScalarType::Float => (kinds::FLOAT_TYPE, "Input should be a valid number".to_string()),
        ScalarType::Bool => (kinds::BOOL_TYPE, "Input should be a valid boolean".to_string()),
    }
}

/// Lax scalar coercion: strings are parsed into numbers and booleans.
fn coerce_scalar(scalar: ScalarType, value: &Value) -> Result<Value, (&'static str, String)> {
    match (scalar, value) {
        (ScalarType::Str, Value::String(_)) => Ok(value.clone()),
        (ScalarType::Int, Value::Number(n)) => int_from_number(n),
        (ScalarType::Int, Value::String(s)) => match s.parse::<i64>() {
            Ok(i) => Ok(Value::from(i)),
            Err(_) => match s.parse::<f64>().ok().and_then(whole_to_i64) {
                Some(i) => Ok(Value::from(i)),
                None => Err((
                    kinds::INT_PARSING,
                    "Input should be a valid integer, unable to parse string as an integer".to_string(),
                )),
            },
        },
        (ScalarType::Float, Value::Number(n)) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| scalar_type_error(ScalarType::Float)),
        (ScalarType::Float, Value::String(s)) => match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| scalar_type_error(ScalarType::Float)),
            Ok(_) => Err((kinds::FINITE_NUMBER, "Input should be a finite number".to_string())),
            Err(_) => Err((
                kinds::FLOAT_PARSING,
                "Input should be a valid number, unable to parse string as a number".to_string(),
            )),
        },
        (ScalarType::Bool, Value::Bool(_)) => Ok(value.clone()),
        (ScalarType::Bool, Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err((
                kinds::BOOL_PARSING,
                "Input should be a valid boolean, unable to interpret input".to_string(),
            )),
        },
        (ScalarType::Bool, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" | "f" | "n" => Ok(Value::Bool(false)),
            _ => Err((
                kinds::BOOL_PARSING,
                "Input should be a valid boolean, unable to interpret input".to_string(),
            )),
        },
        (scalar, _) => Err(scalar_type_error(scalar)),
    }
}

fn int_from_number(n: &Number) -> Result<Value, (&'static str, String)> {
    if n.is_i64() || n.is_u64() {
        return Ok(Value::Number(n.clone()));
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 => whole_to_i64(f).map(Value::from).ok_or((
            kinds::INT_PARSING,
            "Input should be a valid integer, value is out of range".to_string(),
        )),
        _ => Err((
            kinds::INT_FROM_FLOAT,
            "Input should be a valid integer, got a number with a fractional part".to_string(),
        )),
    }
}

/// Exact conversion of a whole float; `None` when it has a fraction or does not fit.
fn whole_to_i64(f: f64) -> Option<i64> {
    // i64::MAX rounds up to 2^63 as f64, so the upper bound is exclusive
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

fn check_constraints(
    constraints: &Constraints,
    pattern: Option<&Regex>,
    bound: &BoundValue,
    loc: &[LocItem],
    issues: &mut Vec<ValidationIssue>,
) {
    if constraints.is_empty() {
        return;
    }
    match bound {
        BoundValue::Value(Value::Number(n)) => {
            if let Some(x) = n.as_f64() {
                check_numeric(constraints, x, &Value::Number(n.clone()), loc, issues);
            }
        }
        BoundValue::Value(Value::String(s)) => {
            let input = Value::String(s.clone());
            let len = s.chars().count();
            if let Some(min) = constraints.min_length {
                if len < min {
                    issues.push(
                        ValidationIssue::new(
                            kinds::STRING_TOO_SHORT,
                            loc.to_vec(),
                            format!("String should have at least {} character{}", min, plural(min)),
                            input.clone(),
                        )
                        .with_ctx("min_length", Value::from(min)),
                    );
                }
            }
            if let Some(max) = constraints.max_length {
                if len > max {
                    issues.push(
                        ValidationIssue::new(
                            kinds::STRING_TOO_LONG,
                            loc.to_vec(),
                            format!("String should have at most {} character{}", max, plural(max)),
                            input.clone(),
                        )
                        .with_ctx("max_length", Value::from(max)),
                    );
                }
            }
            if let (Some(re), Some(raw)) = (pattern, constraints.pattern.as_deref()) {
                if !re.is_match(s) {
                    issues.push(
                        ValidationIssue::new(
                            kinds::STRING_PATTERN_MISMATCH,
                            loc.to_vec(),
                            format!("String should match pattern '{}'", raw),
                            input,
                        )
                        .with_ctx("pattern", Value::from(raw)),
                    );
                }
            }
        }
        BoundValue::List(items) => {
            let input = bound.to_value();
            if let Some(min) = constraints.min_length {
                if items.len() < min {
                    issues.push(
                        ValidationIssue::new(
                            kinds::TOO_SHORT,
                            loc.to_vec(),
                            format!(
                                "List should have at least {} item{} after validation, not {}",
                                min,
                                plural(min),
                                items.len()
                            ),
                            input.clone(),
                        )
                        .with_ctx("min_length", Value::from(min)),
                    );
                }
            }
            if let Some(max) = constraints.max_length {
                if items.len() > max {
                    issues.push(
                        ValidationIssue::new(
                            kinds::TOO_LONG,
                            loc.to_vec(),
                            format!(
                                "List should have at most {} item{} after validation, not {}",
                                max,
                                plural(max),
                                items.len()
                            ),
                            input,
                        )
                        .with_ctx("max_length", Value::from(max)),
                    );
                }
            }
        }
        _ => {}
    }

    if let (Some(choices), BoundValue::Value(v)) = (&constraints.choices, bound) {
        if !v.is_null() && !choices.iter().any(|c| c == v) {
            issues.push(
                ValidationIssue::new(
                    kinds::ENUM,
                    loc.to_vec(),
                    format!("Input should be {}", describe_choices(choices)),
                    v.clone(),
                )
                .with_ctx("expected", Value::from(describe_choices(choices))),
            );
        }
    }
}

fn check_numeric(constraints: &Constraints, x: f64, input: &Value, loc: &[LocItem], issues: &mut Vec<ValidationIssue>) {
    let checks: [(Option<f64>, &'static str, &'static str, &'static str, fn(f64, f64) -> bool); 4] = [
        (constraints.gt, kinds::GREATER_THAN, "gt", "greater than", |x, b| x > b),
        (constraints.ge, kinds::GREATER_THAN_EQUAL, "ge", "greater than or equal to", |x, b| x >= b),
        (constraints.lt, kinds::LESS_THAN, "lt", "less than", |x, b| x < b),
        (constraints.le, kinds::LESS_THAN_EQUAL, "le", "less than or equal to", |x, b| x <= b),
    ];
    for (bound, kind, key, phrase, ok) in checks {
        if let Some(b) = bound {
            if !ok(x, b) {
                issues.push(
                    ValidationIssue::new(kind, loc.to_vec(), format!("Input should be {} {}", phrase, fmt_num(b)), input.clone())
                        .with_ctx(key, number_value(b)),
                );
            }
        }
    }
    if let Some(step) = constraints.multiple_of {
        if step != 0.0 && ((x / step) - (x / step).round()).abs() > 1e-9 {
            issues.push(
                ValidationIssue::new(
                    kinds::MULTIPLE_OF,
                    loc.to_vec(),
                    format!("Input should be a multiple of {}", fmt_num(step)),
                    input.clone(),
                )
                .with_ctx("multiple_of", number_value(step)),
            );
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn fmt_num(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    }
}

fn number_value(x: f64) -> Value {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        Value::from(x as i64)
    } else {
        Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn describe_choices(choices: &[Value]) -> String {
    let rendered: Vec<String> = choices
        .iter()
        .map(|c| match c {
            Value::String(s) => format!("'{}'", s),
            other => other.to_string(),
        })
        .collect();
    match rendered.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loc;
    use serde_json::json;

    fn validator(ty: FieldType, constraints: Constraints) -> FieldValidator {
        FieldValidator::new(FieldDescriptor::new("f", ty).with_constraints(constraints)).unwrap()
    }

    #[test]
    fn test_int_coercion_from_string() {
        let v = validator(FieldType::int(), Constraints::default());
        let (bound, issues) = v.validate_json(&json!("5"), &loc!["query", "f"]);
        assert!(issues.is_empty());
        assert_eq!(bound.unwrap().to_value(), json!(5));
    }

    #[test]
    fn test_int_parsing_issue() {
        let v = validator(FieldType::int(), Constraints::default());
        let (bound, issues) = v.validate_json(&json!("abc"), &loc!["query", "f"]);
        assert!(bound.is_none());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, kinds::INT_PARSING);
        assert_eq!(issues[0].loc, loc!["query", "f"]);
        assert_eq!(issues[0].input, json!("abc"));
    }

    #[test]
    fn test_fractional_float_is_not_int() {
        let v = validator(FieldType::int(), Constraints::default());
        let (_, issues) = v.validate_json(&json!(2.5), &loc!["body"]);
        assert_eq!(issues[0].kind, kinds::INT_FROM_FLOAT);
    }

    #[test]
    fn test_whole_float_outside_i64_is_rejected() {
        let v = validator(FieldType::int(), Constraints::default());
        for raw in [json!("1e30"), json!(1e30), json!(-1e19), json!("9223372036854775808.0")] {
            let (bound, issues) = v.validate_json(&raw, &loc!["query", "f"]);
            assert!(bound.is_none(), "{raw}");
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].kind, kinds::INT_PARSING);
        }
        let (bound, issues) = v.validate_json(&json!("4e3"), &loc!["query", "f"]);
        assert!(issues.is_empty());
        assert_eq!(bound.unwrap().to_value(), json!(4000));
        let (bound, _) = v.validate_json(&json!(-9.223372036854776e18), &loc!["query", "f"]);
        assert_eq!(bound.unwrap().to_value(), json!(i64::MIN));
    }

    #[test]
    fn test_bool_coercion() {
        let v = validator(FieldType::bool(), Constraints::default());
        for (raw, expected) in [("true", true), ("0", false), ("Yes", true), ("off", false)] {
            let (bound, issues) = v.validate_json(&json!(raw), &loc!["query", "f"]);
            assert!(issues.is_empty(), "{raw}");
            assert_eq!(bound.unwrap().to_value(), json!(expected));
        }
        let (_, issues) = v.validate_json(&json!("maybe"), &loc!["query", "f"]);
        assert_eq!(issues[0].kind, kinds::BOOL_PARSING);
    }

    #[test]
    fn test_type_failure_skips_constraints() {
        let v = validator(
            FieldType::int(),
            Constraints {
                ge: Some(10.0),
                ..Default::default()
            },
        );
        let (_, issues) = v.validate_json(&json!("x"), &loc!["query", "f"]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, kinds::INT_PARSING);
    }

    #[test]
    fn test_numeric_bounds() {
        let v = validator(
            FieldType::int(),
            Constraints {
                gt: Some(0.0),
                le: Some(10.0),
                ..Default::default()
            },
        );
        let (_, low) = v.validate_json(&json!(0), &loc!["query", "f"]);
        assert_eq!(low[0].kind, kinds::GREATER_THAN);
        assert_eq!(low[0].msg, "Input should be greater than 0");
        assert_eq!(low[0].ctx.as_ref().unwrap()["gt"], json!(0));

        let (_, high) = v.validate_json(&json!(11), &loc!["query", "f"]);
        assert_eq!(high[0].kind, kinds::LESS_THAN_EQUAL);

        let (ok, none) = v.validate_json(&json!(10), &loc!["query", "f"]);
        assert!(none.is_empty());
        assert_eq!(ok.unwrap().to_value(), json!(10));
    }

    #[test]
    fn test_string_constraints() {
        let v = validator(
            FieldType::str(),
            Constraints {
                min_length: Some(3),
                max_length: Some(5),
                pattern: Some("^[a-z]+$".to_string()),
                ..Default::default()
            },
        );
        let (_, short) = v.validate_json(&json!("ab"), &loc!["query", "f"]);
        assert_eq!(short[0].kind, kinds::STRING_TOO_SHORT);
        let (_, long) = v.validate_json(&json!("abcdef"), &loc!["query", "f"]);
        assert_eq!(long[0].kind, kinds::STRING_TOO_LONG);
        let (_, bad) = v.validate_json(&json!("ABC"), &loc!["query", "f"]);
        assert_eq!(bad[0].kind, kinds::STRING_PATTERN_MISMATCH);
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let err = FieldValidator::new(FieldDescriptor::new("f", FieldType::str()).with_constraints(Constraints {
            pattern: Some("(".to_string()),
            ..Default::default()
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidPattern { .. }));
    }

    #[test]
    fn test_choices() {
        let v = validator(
            FieldType::str(),
            Constraints {
                choices: Some(vec![json!("asc"), json!("desc")]),
                ..Default::default()
            },
        );
        let (_, issues) = v.validate_json(&json!("up"), &loc!["query", "order"]);
        assert_eq!(issues[0].kind, kinds::ENUM);
        assert_eq!(issues[0].msg, "Input should be 'asc' or 'desc'");
    }

    #[test]
    fn test_sequence_item_issues_carry_index() {
        let v = validator(FieldType::list(FieldType::int()), Constraints::default());
        let (bound, issues) = v.validate_json(&json!(["1", "x", "3"]), &loc!["query", "ids"]);
        assert!(bound.is_none());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].loc, loc!["query", "ids", 1usize]);
    }

    #[test]
    fn test_model_validation_collects_all_issues() {
        let schema = ModelSchema::builder("Item")
            .field(FieldDescriptor::new("name", FieldType::str()))
            .field(FieldDescriptor::new("price", FieldType::float()))
            .field(FieldDescriptor::new("tax", FieldType::optional(FieldType::float())).with_default(Value::Null))
            .build()
            .unwrap();
        let v = validator(FieldType::model(schema), Constraints::default());
        let (bound, issues) = v.validate_json(&json!({"price": "abc"}), &loc!["body"]);
        assert!(bound.is_none());
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, kinds::MISSING);
        assert_eq!(issues[0].loc, loc!["body", "name"]);
        assert_eq!(issues[1].kind, kinds::FLOAT_PARSING);
        assert_eq!(issues[1].loc, loc!["body", "price"]);
    }

    #[test]
    fn test_extra_forbidden() {
        let schema = ModelSchema::builder("Strict")
            .field(FieldDescriptor::new("a", FieldType::int()))
            .extra(ExtraPolicy::Forbid)
            .build()
            .unwrap();
        let v = validator(FieldType::model(schema), Constraints::default());
        let (_, issues) = v.validate_json(&json!({"a": 1, "b": 2}), &loc!["body"]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, kinds::EXTRA_FORBIDDEN);
        assert_eq!(issues[0].loc, loc!["body", "b"]);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let schema = ModelSchema::builder("Item")
            .field(FieldDescriptor::new("a", FieldType::int()))
            .field(FieldDescriptor::new("b", FieldType::list(FieldType::str())).with_default(json!([])))
            .build()
            .unwrap();
        let v = validator(FieldType::model(schema), Constraints::default());
        for raw in [json!({"a": "1"}), json!({"a": "x", "b": 3})] {
            let (first, first_issues) = v.validate_json(&raw, &loc!["body"]);
            let (second, second_issues) = v.validate_json(&raw, &loc!["body"]);
            assert_eq!(first.map(|b| b.to_value()), second.map(|b| b.to_value()));
            assert_eq!(first_issues, second_issues);
        }
    }

    #[test]
    fn test_optional_accepts_null() {
        let v = validator(FieldType::optional(FieldType::int()), Constraints::default());
        let (bound, issues) = v.validate_json(&Value::Null, &loc!["body", "x"]);
        assert!(issues.is_empty());
        assert!(bound.unwrap().is_none());
    }
}
