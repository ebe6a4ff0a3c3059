//! # Validator Module
//!
//! Field validators, structured models and the issue type every validation
//! failure is reported with.
//!
//! A [`FieldValidator`] is compiled once from a
//! [`FieldDescriptor`](crate::params::FieldDescriptor) and then shared
//! read-only by every request that touches the field. Validation never raises:
//! it returns the coerced [`BoundValue`] or the list of [`ValidationIssue`]s that
//! explain why the input was rejected, each carrying the full location path.
//!
//! ## Coercion
//!
//! Inputs arriving from strings (query, header, cookie, path, form) are coerced
//! laxly: `"5"` becomes `5` for an integer field, `"yes"` becomes `true` for a
//! boolean. Constraint checks only run once coercion succeeded, so a value of
//! the wrong type produces exactly one issue.
//!
//! ## Serialization
//!
//! [`FieldValidator::serialize`] is the inverse path used for responses. It
//! honours [`SerializeOptions`], which default to emitting wire aliases.

mod field;
mod issue;
mod model;
mod serialize;

pub use field::{FieldValidator, RawValue};
pub use issue::{kinds, summarize_issues, IssueCategory, LocItem, ValidationIssue};
pub use model::{BoundValue, ExtraPolicy, ModelInstance, ModelSchema, ModelSchemaBuilder};
pub use serialize::SerializeOptions;
pub(crate) use serialize::serialize_bound;
