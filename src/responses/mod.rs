//! # Responses Module
//!
//! Validation and encoding of handler return values.
//!
//! A route may declare the shape of what its handler returns as a
//! [`ResponseSpec`]. The return value is validated like any request field, but
//! a mismatch is a bug on the server side: it surfaces as a
//! [`ResponseValidationError`], which the default exception handler turns into
//! an empty 500 so the offending value never reaches the client.
//!
//! ```rust
//! use reqbind::params::FieldType;
//! use reqbind::responses::ResponseSpec;
//! use serde_json::json;
//!
//! let spec = ResponseSpec::new(FieldType::int()).unwrap();
//! assert_eq!(spec.serialize_response(&json!(5)).unwrap(), json!(5));
//! assert!(spec.serialize_response(&json!("five")).is_err());
//! ```

use crate::exceptions::{ConfigurationError, ResponseValidationError};
use crate::params::{FieldDescriptor, FieldType};
use crate::validator::{BoundValue, FieldValidator, LocItem, SerializeOptions};
use crate::validator::serialize_bound;
use serde_json::Value;
use tracing::{debug, warn};

/// Declared shape and encoding options for a route's return value.
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    field: FieldValidator,
    pub options: SerializeOptions,
}

impl ResponseSpec {
    /// # Errors
    ///
    /// [`ConfigurationError`] when the field cannot be compiled.
    pub fn new(field_type: FieldType) -> Result<Self, ConfigurationError> {
        Self::from_descriptor(FieldDescriptor::new("response", field_type))
    }

    /// Build from a full descriptor, e.g. to attach constraints.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] when the field cannot be compiled.
    pub fn from_descriptor(descriptor: FieldDescriptor) -> Result<Self, ConfigurationError> {
        Ok(Self {
            field: FieldValidator::new(descriptor)?,
            options: SerializeOptions::default(),
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: SerializeOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        self.field.field_type()
    }

    /// Validate a return value, then encode it with this spec's options.
    ///
    /// Issues are reported under the `["response"]` location.
    ///
    /// # Errors
    ///
    /// [`ResponseValidationError`] carrying every issue and the rejected value.
    pub fn serialize_response(&self, value: &Value) -> Result<Value, ResponseValidationError> {
        let loc = [LocItem::from("response")];
        let (bound, issues) = self.field.validate_json(value, &loc);
        match bound {
            Some(bound) if issues.is_empty() => {
                let encoded = self.field.serialize(&bound, &self.options);
                debug!(field_type = %self.field.field_type(), "Response serialized");
                Ok(encoded)
            }
            _ => {
                warn!(
                    field_type = %self.field.field_type(),
                    issue_count = issues.len(),
                    "Handler return value failed response validation"
                );
                Err(ResponseValidationError::new(issues, value.clone()))
            }
        }
    }
}

/// Encode a return value against an optional spec; without one the value
/// passes through untouched.
///
/// # Errors
///
/// See [`ResponseSpec::serialize_response`].
pub fn serialize_response(spec: Option<&ResponseSpec>, value: Value) -> Result<Value, ResponseValidationError> {
    match spec {
        Some(spec) => spec.serialize_response(&value),
        None => Ok(value),
    }
}

/// Encode a bound value handed back by a handler.
///
/// With a spec the value is revalidated from its alias-keyed wire form, so a
/// model received as an argument can be returned unchanged. Without one it is
/// emitted by alias with every field.
///
/// # Errors
///
/// See [`ResponseSpec::serialize_response`].
pub fn serialize_bound_response(
    spec: Option<&ResponseSpec>,
    bound: &BoundValue,
) -> Result<Value, ResponseValidationError> {
    match spec {
        Some(spec) => spec.serialize_response(&bound.to_wire_value()),
        None => Ok(serialize_bound(bound, &SerializeOptions::default(), true)),
    }
}
