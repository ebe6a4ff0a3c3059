use super::field::FieldValidator;
use super::serialize::{serialize_bound, SerializeOptions};
use crate::exceptions::ConfigurationError;
use crate::params::FieldDescriptor;
use crate::server::UploadFile;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// What a model does with input keys none of its fields claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtraPolicy {
    /// Drop them silently.
    #[default]
    Ignore,
    /// Keep them on the instance and serialize them back out.
    Allow,
    /// Report each one as an `extra_forbidden` issue.
    Forbid,
}

/// A structured model: an ordered set of named, typed fields.
#[derive(Debug)]
pub struct ModelSchema {
    name: String,
    fields: Vec<FieldValidator>,
    extra: ExtraPolicy,
}

impl ModelSchema {
    pub fn builder(name: impl Into<String>) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            extra: ExtraPolicy::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldValidator] {
        &self.fields
    }

    #[must_use]
    pub fn extra(&self) -> ExtraPolicy {
        self.extra
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValidator> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// True when every field is a scalar or a scalar sequence.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.fields.iter().all(|f| {
            let ty = &f.descriptor().field_type;
            ty.is_scalar() || ty.is_scalar_sequence()
        })
    }

    /// Wire names claimed by this model's fields.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.alias())
    }
}

pub struct ModelSchemaBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
    extra: ExtraPolicy,
}

impl ModelSchemaBuilder {
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn extra(mut self, policy: ExtraPolicy) -> Self {
        self.extra = policy;
        self
    }

    /// Compile the model.
    ///
    /// # Errors
    ///
    /// Fails on duplicate wire names or an invalid field pattern.
    pub fn build(self) -> Result<Arc<ModelSchema>, ConfigurationError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        for desc in self.fields {
            if !seen.insert(desc.alias().to_string()) {
                return Err(ConfigurationError::DuplicateField {
                    owner: self.name,
                    alias: desc.alias().to_string(),
                });
            }
            fields.push(FieldValidator::new(desc)?);
        }
        Ok(Arc::new(ModelSchema {
            name: self.name,
            fields,
            extra: self.extra,
        }))
    }
}

/// A validated model value.
///
/// Remembers which fields were explicitly present in the input so that
/// serialization can honour `exclude_unset`.
#[derive(Debug, Clone)]
pub struct ModelInstance {
    pub(crate) schema: Arc<ModelSchema>,
    pub(crate) values: Vec<(String, BoundValue)>,
    pub(crate) fields_set: BTreeSet<String>,
    pub(crate) extra: Map<String, Value>,
}

impl ModelInstance {
    #[must_use]
    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// Field value by declared name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut BoundValue> {
        self.values
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Replace a field value and mark it as explicitly set.
    pub fn set(&mut self, name: &str, value: BoundValue) -> bool {
        match self.get_mut(name) {
            Some(slot) => {
                *slot = value;
                self.fields_set.insert(name.to_string());
                true
            }
            None => false,
        }
    }

    /// Declared names of the fields present in the input.
    #[must_use]
    pub fn fields_set(&self) -> &BTreeSet<String> {
        &self.fields_set
    }

    /// Unclaimed input keys retained under [`ExtraPolicy::Allow`].
    #[must_use]
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &BoundValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// A validated value as handed to handlers and serializers.
#[derive(Debug, Clone)]
pub enum BoundValue {
    Value(Value),
    List(Vec<BoundValue>),
    Model(ModelInstance),
    File(Arc<UploadFile>),
}

impl BoundValue {
    /// Plain JSON keyed by declared field names, with every field included.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            BoundValue::Value(v) => v.clone(),
            BoundValue::List(items) => Value::Array(items.iter().map(BoundValue::to_value).collect()),
            BoundValue::Model(m) => {
                let mut map = Map::new();
                for (name, v) in &m.values {
                    map.insert(name.clone(), v.to_value());
                }
                for (k, v) in &m.extra {
                    map.insert(k.clone(), v.clone());
                }
                Value::Object(map)
            }
            BoundValue::File(file) => file.describe(),
        }
    }

    /// JSON keyed by wire aliases, holding only explicitly set fields.
    ///
    /// Validating the result against the same shape rebuilds an equal value,
    /// defaults included.
    #[must_use]
    pub fn to_wire_value(&self) -> Value {
        let options = SerializeOptions {
            exclude_unset: true,
            ..SerializeOptions::default()
        };
        serialize_bound(self, &options, false)
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            BoundValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_value_mut(&mut self) -> Option<&mut Value> {
        match self {
            BoundValue::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_model(&self) -> Option<&ModelInstance> {
        match self {
            BoundValue::Model(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[BoundValue]> {
        match self {
            BoundValue::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_file(&self) -> Option<&Arc<UploadFile>> {
        match self {
            BoundValue::File(f) => Some(f),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, BoundValue::Value(Value::Null))
    }
}

impl From<Value> for BoundValue {
    fn from(v: Value) -> Self {
        BoundValue::Value(v)
    }
}
