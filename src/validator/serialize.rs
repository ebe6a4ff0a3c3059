use super::model::{BoundValue, ModelInstance};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Knobs applied when encoding a validated value back to JSON.
///
/// `include` and `exclude` name declared fields of a top-level model; they are
/// ignored for any other shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Emit wire aliases instead of declared names.
    pub by_alias: bool,
    /// Drop fields that were filled from a default rather than the input.
    pub exclude_unset: bool,
    /// Drop fields whose value equals the declared default.
    pub exclude_defaults: bool,
    /// Drop fields whose value is `null`.
    pub exclude_none: bool,
    pub include: Option<BTreeSet<String>>,
    pub exclude: Option<BTreeSet<String>>,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            by_alias: true,
            exclude_unset: false,
            exclude_defaults: false,
            exclude_none: false,
            include: None,
            exclude: None,
        }
    }
}

impl SerializeOptions {
    #[must_use]
    pub fn with_include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(names.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(names.into_iter().map(Into::into).collect());
        self
    }

    fn keeps(&self, name: &str, top_level: bool) -> bool {
        if !top_level {
            return true;
        }
        if let Some(include) = &self.include {
            if !include.contains(name) {
                return false;
            }
        }
        match &self.exclude {
            Some(exclude) => !exclude.contains(name),
            None => true,
        }
    }
}

pub(crate) fn serialize_bound(value: &BoundValue, options: &SerializeOptions, top_level: bool) -> Value {
    match value {
        BoundValue::Value(v) => v.clone(),
        BoundValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| serialize_bound(item, options, false))
                .collect(),
        ),
        BoundValue::Model(model) => serialize_model(model, options, top_level),
        BoundValue::File(file) => file.describe(),
    }
}

fn serialize_model(model: &ModelInstance, options: &SerializeOptions, top_level: bool) -> Value {
    let mut out = Map::new();
    for (name, value) in &model.values {
        if !options.keeps(name, top_level) {
            continue;
        }
        if options.exclude_unset && !model.fields_set.contains(name) {
            continue;
        }
        if options.exclude_none && value.is_none() {
            continue;
        }
        let field = model.schema.field(name);
        if options.exclude_defaults {
            let default = field.and_then(|f| f.descriptor().default.produce());
            if default.is_some_and(|d| d == value.to_value()) {
                continue;
            }
        }
        let key = match (options.by_alias, field) {
            (true, Some(f)) => f.alias().to_string(),
            _ => name.clone(),
        };
        out.insert(key, serialize_bound(value, options, false));
    }
    for (key, value) in &model.extra {
        if !options.keeps(key, top_level) || (options.exclude_none && value.is_null()) {
            continue;
        }
        out.insert(key.clone(), value.clone());
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loc;
    use crate::params::{FieldDescriptor, FieldType};
    use crate::validator::{FieldValidator, ModelSchema};
    use serde_json::json;

    fn item_validator() -> FieldValidator {
        let schema = ModelSchema::builder("Item")
            .field(FieldDescriptor::new("item_name", FieldType::str()).with_alias("itemName"))
            .field(FieldDescriptor::new("price", FieldType::float()).with_default(json!(1.0)))
            .field(FieldDescriptor::new("tax", FieldType::optional(FieldType::float())).with_default(Value::Null))
            .build()
            .unwrap();
        FieldValidator::new(FieldDescriptor::new("item", FieldType::model(schema))).unwrap()
    }

    #[test]
    fn test_by_alias_is_default() {
        let v = item_validator();
        let (bound, _) = v.validate_json(&json!({"itemName": "x"}), &loc!["response"]);
        let out = v.serialize(&bound.unwrap(), &SerializeOptions::default());
        assert_eq!(out, json!({"itemName": "x", "price": 1.0, "tax": null}));

        let by_name = SerializeOptions {
            by_alias: false,
            ..Default::default()
        };
        let (bound, _) = v.validate_json(&json!({"itemName": "x"}), &loc!["response"]);
        let out = v.serialize(&bound.unwrap(), &by_name);
        assert!(out.get("item_name").is_some());
    }

    #[test]
    fn test_exclusion_flags() {
        let v = item_validator();
        let (bound, _) = v.validate_json(&json!({"itemName": "x", "price": 1.0}), &loc!["response"]);
        let bound = bound.unwrap();

        let unset = SerializeOptions {
            exclude_unset: true,
            ..Default::default()
        };
        assert_eq!(v.serialize(&bound, &unset), json!({"itemName": "x", "price": 1.0}));

        let defaults = SerializeOptions {
            exclude_defaults: true,
            ..Default::default()
        };
        assert_eq!(v.serialize(&bound, &defaults), json!({"itemName": "x"}));

        let none = SerializeOptions {
            exclude_none: true,
            ..Default::default()
        };
        assert_eq!(v.serialize(&bound, &none), json!({"itemName": "x", "price": 1.0}));
    }

    #[test]
    fn test_include_and_exclude() {
        let v = item_validator();
        let (bound, _) = v.validate_json(&json!({"itemName": "x"}), &loc!["response"]);
        let bound = bound.unwrap();
        let only = SerializeOptions::default().with_include(["item_name"]);
        assert_eq!(v.serialize(&bound, &only), json!({"itemName": "x"}));
        let without = SerializeOptions::default().with_exclude(["tax", "price"]);
        assert_eq!(v.serialize(&bound, &without), json!({"itemName": "x"}));
    }
}
