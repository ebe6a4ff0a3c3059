use super::types::{FieldType, ParameterLocation};
use crate::exceptions::ConfigurationError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Produces a fresh default value for each request.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Default of a field. A field is required iff its default is [`DefaultValue::Required`].
#[derive(Clone, Default)]
pub enum DefaultValue {
    #[default]
    Required,
    Value(Value),
    Factory(DefaultFactory),
}

impl DefaultValue {
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(self, DefaultValue::Required)
    }

    /// A deep copy of the default, or a freshly built one for factories.
    ///
    /// Every call returns an independent value so one request mutating its
    /// bound argument can never leak into the next.
    #[must_use]
    pub fn produce(&self) -> Option<Value> {
        match self {
            DefaultValue::Required => None,
            DefaultValue::Value(v) => Some(v.clone()),
            DefaultValue::Factory(f) => Some(f()),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Required => f.write_str("Required"),
            DefaultValue::Value(v) => write!(f, "Value({})", v),
            DefaultValue::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Value constraints checked after type coercion succeeds.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub gt: Option<f64>,
    pub ge: Option<f64>,
    pub lt: Option<f64>,
    pub le: Option<f64>,
    pub multiple_of: Option<f64>,
    /// Minimum length of a string or sequence.
    pub min_length: Option<usize>,
    /// Maximum length of a string or sequence.
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    /// Enumerated choices; the coerced value must equal one of them.
    pub choices: Option<Vec<Value>>,
}

impl Constraints {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gt.is_none()
            && self.ge.is_none()
            && self.lt.is_none()
            && self.le.is_none()
            && self.multiple_of.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.pattern.is_none()
            && self.choices.is_none()
    }
}

/// Location-independent description of one field: a model field, a response
/// value, or the field part of a request parameter.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub alias: Option<String>,
    pub field_type: FieldType,
    pub default: DefaultValue,
    pub constraints: Constraints,
    pub description: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            field_type,
            default: DefaultValue::Required,
            constraints: Constraints::default(),
            description: None,
        }
    }

    /// Wire name: the explicit alias, else the declared name.
    #[must_use]
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn required(&self) -> bool {
        self.default.is_required()
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = DefaultValue::Value(value);
        self
    }

    pub fn with_default_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = DefaultValue::Factory(Arc::new(factory));
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Options shared by every parameter location.
#[derive(Debug, Clone, Default)]
pub struct ParamOptions {
    pub alias: Option<String>,
    pub default: DefaultValue,
    pub constraints: Constraints,
    pub description: Option<String>,
}

/// Tagged parameter specification, one variant per location.
///
/// ```rust
/// use reqbind::params::ParamSpec;
/// use serde_json::json;
///
/// let limit = ParamSpec::query().default(json!(10)).ge(1.0).le(100.0);
/// let token = ParamSpec::header().convert_underscores(true);
/// # let _ = (limit, token);
/// ```
#[derive(Debug, Clone)]
pub enum ParamSpec {
    Path(ParamOptions),
    Query(ParamOptions),
    Header {
        options: ParamOptions,
        /// Translate `_` to `-` in the declared name when no alias is given.
        convert_underscores: bool,
    },
    Cookie(ParamOptions),
    Body {
        options: ParamOptions,
        /// Wrap the value under its own key even when it is the only body parameter.
        embed: bool,
    },
}

impl ParamSpec {
    pub fn path() -> Self {
        ParamSpec::Path(ParamOptions::default())
    }

    pub fn query() -> Self {
        ParamSpec::Query(ParamOptions::default())
    }

    pub fn header() -> Self {
        ParamSpec::Header {
            options: ParamOptions::default(),
            convert_underscores: false,
        }
    }

    pub fn cookie() -> Self {
        ParamSpec::Cookie(ParamOptions::default())
    }

    pub fn body() -> Self {
        ParamSpec::Body {
            options: ParamOptions::default(),
            embed: false,
        }
    }

    #[must_use]
    pub fn location(&self) -> ParameterLocation {
        match self {
            ParamSpec::Path(_) => ParameterLocation::Path,
            ParamSpec::Query(_) => ParameterLocation::Query,
            ParamSpec::Header { .. } => ParameterLocation::Header,
            ParamSpec::Cookie(_) => ParameterLocation::Cookie,
            ParamSpec::Body { .. } => ParameterLocation::Body,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ParamOptions {
        match self {
            ParamSpec::Path(o) | ParamSpec::Query(o) | ParamSpec::Cookie(o) => o,
            ParamSpec::Header { options, .. } | ParamSpec::Body { options, .. } => options,
        }
    }

    fn options_mut(&mut self) -> &mut ParamOptions {
        match self {
            ParamSpec::Path(o) | ParamSpec::Query(o) | ParamSpec::Cookie(o) => o,
            ParamSpec::Header { options, .. } | ParamSpec::Body { options, .. } => options,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.options_mut().alias = Some(alias.into());
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.options_mut().default = DefaultValue::Value(value);
        self
    }

    pub fn default_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.options_mut().default = DefaultValue::Factory(Arc::new(factory));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.options_mut().description = Some(description.into());
        self
    }

    pub fn gt(mut self, bound: f64) -> Self {
        self.options_mut().constraints.gt = Some(bound);
        self
    }

    pub fn ge(mut self, bound: f64) -> Self {
        self.options_mut().constraints.ge = Some(bound);
        self
    }

    pub fn lt(mut self, bound: f64) -> Self {
        self.options_mut().constraints.lt = Some(bound);
        self
    }

    pub fn le(mut self, bound: f64) -> Self {
        self.options_mut().constraints.le = Some(bound);
        self
    }

    pub fn multiple_of(mut self, step: f64) -> Self {
        self.options_mut().constraints.multiple_of = Some(step);
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.options_mut().constraints.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.options_mut().constraints.max_length = Some(len);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.options_mut().constraints.pattern = Some(pattern.into());
        self
    }

    pub fn choices(mut self, choices: Vec<Value>) -> Self {
        self.options_mut().constraints.choices = Some(choices);
        self
    }

    /// Only meaningful for headers; ignored elsewhere.
    pub fn convert_underscores(mut self, enabled: bool) -> Self {
        if let ParamSpec::Header {
            convert_underscores,
            ..
        } = &mut self
        {
            *convert_underscores = enabled;
        }
        self
    }

    /// Only meaningful for body parameters; ignored elsewhere.
    pub fn embed(mut self, enabled: bool) -> Self {
        if let ParamSpec::Body { embed, .. } = &mut self {
            *embed = enabled;
        }
        self
    }
}

/// A handler parameter as declared at registration time.
///
/// Without an explicit [`ParamSpec`] the parameter is read from the query string.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub field_type: FieldType,
    pub spec: Option<ParamSpec>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            spec: None,
        }
    }

    pub fn with(mut self, spec: ParamSpec) -> Self {
        self.spec = Some(spec);
        self
    }
}

/// Resolved, immutable parameter metadata.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub field: FieldDescriptor,
    pub location: ParameterLocation,
    /// Explicit embed request for body parameters.
    pub embed: bool,
}

impl ParameterDescriptor {
    /// Classify a declared parameter.
    ///
    /// Alias priority: explicit alias, then the underscore-converted name (headers
    /// that opted in), then the declared name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when the declared type cannot be read from
    /// the parameter's location.
    pub fn resolve(param: Parameter) -> Result<Self, ConfigurationError> {
        let spec = param.spec.unwrap_or_else(ParamSpec::query);
        let location = spec.location();
        let (options, convert, embed) = match spec {
            ParamSpec::Header {
                options,
                convert_underscores,
            } => (options, convert_underscores, false),
            ParamSpec::Body { options, embed } => (options, false, embed),
            ParamSpec::Path(options) | ParamSpec::Query(options) | ParamSpec::Cookie(options) => {
                (options, false, false)
            }
        };

        check_location_type(&param.name, location, &param.field_type)?;
        if location == ParameterLocation::Path && !options.default.is_required() {
            return Err(ConfigurationError::PathParameterDefault { name: param.name });
        }

        let alias = match options.alias {
            Some(alias) => Some(alias),
            None if convert => Some(param.name.replace('_', "-")),
            None => None,
        };

        let field = FieldDescriptor {
            name: param.name,
            alias,
            field_type: param.field_type,
            default: options.default,
            constraints: options.constraints,
            description: options.description,
        };

        Ok(ParameterDescriptor {
            field,
            location,
            embed,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.field.name
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        self.field.alias()
    }

    #[must_use]
    pub fn required(&self) -> bool {
        self.field.required()
    }
}

fn check_location_type(
    name: &str,
    location: ParameterLocation,
    field_type: &FieldType,
) -> Result<(), ConfigurationError> {
    let ok = match location {
        ParameterLocation::Path => field_type.is_scalar(),
        ParameterLocation::Query | ParameterLocation::Header | ParameterLocation::Cookie => {
            field_type.is_string_source_compatible()
        }
        ParameterLocation::Body => true,
    };
    if ok {
        Ok(())
    } else {
        Err(ConfigurationError::UnsupportedParameterType {
            name: name.to_string(),
            location,
            field_type: field_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_to_query_and_required() {
        let desc = ParameterDescriptor::resolve(Parameter::new("n", FieldType::int())).unwrap();
        assert_eq!(desc.location, ParameterLocation::Query);
        assert!(desc.required());
        assert_eq!(desc.alias(), "n");
    }

    #[test]
    fn test_underscore_conversion_is_opt_in() {
        let plain = ParameterDescriptor::resolve(
            Parameter::new("x_token", FieldType::str()).with(ParamSpec::header()),
        )
        .unwrap();
        assert_eq!(plain.alias(), "x_token");

        let converted = ParameterDescriptor::resolve(
            Parameter::new("x_token", FieldType::str())
                .with(ParamSpec::header().convert_underscores(true)),
        )
        .unwrap();
        assert_eq!(converted.alias(), "x-token");

        let explicit = ParameterDescriptor::resolve(
            Parameter::new("x_token", FieldType::str())
                .with(ParamSpec::header().alias("X-Auth").convert_underscores(true)),
        )
        .unwrap();
        assert_eq!(explicit.alias(), "X-Auth");
    }

    #[test]
    fn test_default_makes_optional() {
        let desc = ParameterDescriptor::resolve(
            Parameter::new("q", FieldType::str()).with(ParamSpec::query().default(json!("x"))),
        )
        .unwrap();
        assert!(!desc.required());
        assert_eq!(desc.field.default.produce(), Some(json!("x")));
    }

    #[test]
    fn test_query_rejects_nested_sequence() {
        let err = ParameterDescriptor::resolve(Parameter::new(
            "grid",
            FieldType::list(FieldType::list(FieldType::int())),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnsupportedParameterType { .. }
        ));
    }

    #[test]
    fn test_path_rejects_default() {
        let err = ParameterDescriptor::resolve(
            Parameter::new("id", FieldType::int()).with(ParamSpec::path().default(json!(1))),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::PathParameterDefault { .. }));
    }
}
