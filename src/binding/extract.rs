//! Pulling raw values for declared fields out of request containers.

use super::plan::BoundParam;
use crate::server::ValueSource;
use crate::validator::{ModelSchema, RawValue};
use serde_json::{Map, Value};
use tracing::debug;

/// Outcome of looking up one field.
#[derive(Debug, Clone)]
pub enum Extracted {
    /// A value was present and still needs validating.
    Raw(RawValue),
    /// Absent, with a fresh copy of the declared default.
    Default(Value),
    /// Absent and required.
    Missing,
}

fn as_json(raw: RawValue) -> Value {
    match raw {
        RawValue::Json(v) => v,
        RawValue::File(f) => f.describe(),
    }
}

/// Look up one parameter by its wire name.
///
/// Scalar sequences read every occurrence of the key from multi-valued
/// sources. An empty sequence counts as absent.
#[must_use]
pub fn extract_field(param: &BoundParam, source: &dyn ValueSource) -> Extracted {
    let alias = param.alias();
    let found = if param.descriptor.field.field_type.is_scalar_sequence() && source.supports_multi() {
        let values = source.get_all(alias);
        if values.is_empty() {
            None
        } else {
            Some(RawValue::Json(Value::Array(values.into_iter().map(as_json).collect())))
        }
    } else {
        source.get(alias)
    };

    match found {
        Some(raw) => Extracted::Raw(raw),
        None => match param.descriptor.field.default.produce() {
            Some(default) => Extracted::Default(default),
            None => Extracted::Missing,
        },
    }
}

/// Assemble a flat model's input straight from a source's keys.
///
/// Each sub-field is looked up under its own wire name, not under the
/// parent's. Keys no sub-field claims are copied through unchanged so the
/// model's extra policy decides what happens to them. Returns the assembled
/// object and whether any key was found at all.
#[must_use]
pub fn extract_nested(schema: &ModelSchema, source: &dyn ValueSource) -> (Map<String, Value>, bool) {
    let mut assembled = Map::new();
    for field in schema.fields() {
        let alias = field.alias();
        let ty = &field.descriptor().field_type;
        if ty.is_scalar_sequence() && source.supports_multi() {
            let values = source.get_all(alias);
            if !values.is_empty() {
                assembled.insert(
                    alias.to_string(),
                    Value::Array(values.into_iter().map(as_json).collect()),
                );
            }
        } else if let Some(raw) = source.get(alias) {
            assembled.insert(alias.to_string(), as_json(raw));
        }
    }
    let claimed = assembled.len();

    for key in source.keys() {
        let claimed_key = assembled.keys().any(|k| source.same_key(k, &key))
            || schema.aliases().any(|a| source.same_key(a, &key));
        if claimed_key {
            continue;
        }
        let mut values = source.get_all(&key);
        let value = if values.len() > 1 {
            Value::Array(values.into_iter().map(as_json).collect())
        } else {
            match values.pop() {
                Some(raw) => as_json(raw),
                None => continue,
            }
        };
        assembled.insert(key, value);
    }

    debug!(
        model = schema.name(),
        claimed,
        passthrough = assembled.len() - claimed,
        "Nested model assembled from source"
    );
    let found = !assembled.is_empty();
    (assembled, found)
}
