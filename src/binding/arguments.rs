use crate::validator::BoundValue;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::sync::Arc;

/// Validated handler arguments keyed by declared parameter name.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: SmallVec<[(Arc<str>, BoundValue); 8]>,
}

impl Arguments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: &str, value: BoundValue) {
        self.values.push((Arc::from(name), value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.values
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut BoundValue> {
        self.values
            .iter_mut()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Plain JSON value of a scalar or sequence argument.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(BoundValue::as_value)
    }

    /// Move an argument out.
    pub fn take(&mut self, name: &str) -> Option<BoundValue> {
        let idx = self.values.iter().position(|(n, _)| n.as_ref() == name)?;
        Some(self.values.remove(idx).1)
    }

    /// Deserialize one argument into a concrete type.
    ///
    /// # Errors
    ///
    /// Fails when the argument is absent or does not fit `T`.
    pub fn parse<T: DeserializeOwned>(&self, name: &str) -> Result<T, serde_json::Error> {
        let value = self.get(name).map(BoundValue::to_value).unwrap_or(Value::Null);
        serde_json::from_value(value)
    }

    /// All arguments as one JSON object keyed by declared name.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_value()))
            .collect();
        Value::Object(map)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundValue)> {
        self.values.iter().map(|(n, v)| (n.as_ref(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
