use crate::validator::ModelSchema;
use std::fmt;
use std::sync::Arc;

/// Part of the request a parameter is read from.
///
/// The declaration order doubles as the validation and reporting order used by
/// the aggregator: path, query, header, cookie, body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl ParameterLocation {
    /// All locations in aggregation order.
    pub const ORDERED: [ParameterLocation; 5] = [
        ParameterLocation::Path,
        ParameterLocation::Query,
        ParameterLocation::Header,
        ParameterLocation::Cookie,
        ParameterLocation::Body,
    ];

    /// Lowercase name used as the first segment of an issue location.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::Body => "body",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar shapes a field may coerce to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Str,
    Int,
    Float,
    Bool,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScalarType::Str => "string",
            ScalarType::Int => "integer",
            ScalarType::Float => "number",
            ScalarType::Bool => "boolean",
        };
        f.write_str(s)
    }
}

/// Declared type of a parameter, model field, or response.
///
/// Only the shapes the binding layer knows how to validate exist here: scalars,
/// sequences, structured models, uploaded files, and an optional wrapper.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// Accepts any JSON value unchanged.
    Any,
    Scalar(ScalarType),
    Sequence(Box<FieldType>),
    Model(Arc<ModelSchema>),
    /// An uploaded multipart file part.
    File,
    /// Accepts `null` in addition to the inner type.
    Optional(Box<FieldType>),
}

impl FieldType {
    pub fn str() -> Self {
        FieldType::Scalar(ScalarType::Str)
    }

    pub fn int() -> Self {
        FieldType::Scalar(ScalarType::Int)
    }

    pub fn float() -> Self {
        FieldType::Scalar(ScalarType::Float)
    }

    pub fn bool() -> Self {
        FieldType::Scalar(ScalarType::Bool)
    }

    pub fn list(item: FieldType) -> Self {
        FieldType::Sequence(Box::new(item))
    }

    pub fn optional(inner: FieldType) -> Self {
        FieldType::Optional(Box::new(inner))
    }

    pub fn model(schema: Arc<ModelSchema>) -> Self {
        FieldType::Model(schema)
    }

    /// Strip any `Optional` wrappers.
    #[must_use]
    pub fn inner(&self) -> &FieldType {
        match self {
            FieldType::Optional(inner) => inner.inner(),
            other => other,
        }
    }

    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self.inner(), FieldType::Scalar(_) | FieldType::Any)
    }

    /// A sequence whose items are scalars; fetched with `get_all` from multi-valued sources.
    #[must_use]
    pub fn is_scalar_sequence(&self) -> bool {
        match self.inner() {
            FieldType::Sequence(item) => item.is_scalar(),
            _ => false,
        }
    }

    #[must_use]
    pub fn as_model(&self) -> Option<&Arc<ModelSchema>> {
        match self.inner() {
            FieldType::Model(schema) => Some(schema),
            _ => None,
        }
    }

    /// A model whose fields are all scalars or scalar sequences.
    #[must_use]
    pub fn is_flat_model(&self) -> bool {
        self.as_model().is_some_and(|schema| schema.is_flat())
    }

    /// Shapes that can be read from a string-valued source (query, header, cookie).
    #[must_use]
    pub fn is_string_source_compatible(&self) -> bool {
        self.is_scalar() || self.is_scalar_sequence() || self.is_flat_model()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Any => f.write_str("any"),
            FieldType::Scalar(s) => write!(f, "{}", s),
            FieldType::Sequence(item) => write!(f, "list[{}]", item),
            FieldType::Model(schema) => f.write_str(schema.name()),
            FieldType::File => f.write_str("file"),
            FieldType::Optional(inner) => write!(f, "optional[{}]", inner),
        }
    }
}
