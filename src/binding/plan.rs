use crate::exceptions::ConfigurationError;
use crate::params::{Parameter, ParameterDescriptor, ParameterLocation};
use crate::validator::FieldValidator;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// One classified parameter and its compiled validator.
#[derive(Debug, Clone)]
pub struct BoundParam {
    pub descriptor: ParameterDescriptor,
    pub validator: FieldValidator,
}

impl BoundParam {
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        self.descriptor.alias()
    }
}

/// Compiled, per-route binding plan.
///
/// Built once when a route is registered and read-only afterwards. Every
/// parameter ends up in exactly one location list, in declaration order.
#[derive(Debug, Clone)]
pub struct BindingPlan {
    name: String,
    path: Vec<BoundParam>,
    query: Vec<BoundParam>,
    header: Vec<BoundParam>,
    cookie: Vec<BoundParam>,
    body: Vec<BoundParam>,
    embed_body: bool,
    security_scopes: Vec<String>,
    cache_key: String,
}

impl BindingPlan {
    /// Classify and compile a handler's declared parameters.
    ///
    /// # Errors
    ///
    /// Any [`ConfigurationError`] from resolving a parameter or compiling its
    /// validator, or [`ConfigurationError::DuplicateField`] when two parameters
    /// share a name, or share a wire name within one location.
    pub fn build(
        name: impl Into<String>,
        params: Vec<Parameter>,
        security_scopes: &[String],
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let mut plan = BindingPlan {
            name: name.clone(),
            path: Vec::new(),
            query: Vec::new(),
            header: Vec::new(),
            cookie: Vec::new(),
            body: Vec::new(),
            embed_body: false,
            security_scopes: Vec::new(),
            cache_key: String::new(),
        };

        let mut names = HashSet::new();
        let mut wire_names = HashSet::new();
        for param in params {
            let descriptor = ParameterDescriptor::resolve(param)?;
            if !names.insert(descriptor.name().to_string()) {
                return Err(ConfigurationError::DuplicateField {
                    owner: name,
                    alias: descriptor.name().to_string(),
                });
            }
            // header names compare case-insensitively on the wire
            let wire = match descriptor.location {
                ParameterLocation::Header => descriptor.alias().to_ascii_lowercase(),
                _ => descriptor.alias().to_string(),
            };
            if !wire_names.insert((descriptor.location, wire)) {
                return Err(ConfigurationError::DuplicateField {
                    owner: name,
                    alias: descriptor.alias().to_string(),
                });
            }
            let validator = FieldValidator::new(descriptor.field.clone())?;
            debug!(
                handler = %name,
                param = %descriptor.name(),
                alias = %descriptor.alias(),
                location = %descriptor.location,
                field_type = %descriptor.field.field_type,
                required = descriptor.required(),
                "Parameter classified"
            );
            plan.list_mut(descriptor.location)
                .push(BoundParam { descriptor, validator });
        }

        plan.embed_body = plan.body.len() > 1 || plan.body.iter().any(|p| p.descriptor.embed);

        let scopes: BTreeSet<&str> = security_scopes.iter().map(String::as_str).collect();
        plan.security_scopes = scopes.iter().map(|s| s.to_string()).collect();
        plan.cache_key = format!("{}|{}", name, plan.security_scopes.join(","));
        Ok(plan)
    }

    fn list_mut(&mut self, location: ParameterLocation) -> &mut Vec<BoundParam> {
        match location {
            ParameterLocation::Path => &mut self.path,
            ParameterLocation::Query => &mut self.query,
            ParameterLocation::Header => &mut self.header,
            ParameterLocation::Cookie => &mut self.cookie,
            ParameterLocation::Body => &mut self.body,
        }
    }

    /// Parameters read from `location`, in declaration order.
    #[must_use]
    pub fn params(&self, location: ParameterLocation) -> &[BoundParam] {
        match location {
            ParameterLocation::Path => &self.path,
            ParameterLocation::Query => &self.query,
            ParameterLocation::Header => &self.header,
            ParameterLocation::Cookie => &self.cookie,
            ParameterLocation::Body => &self.body,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    /// Whether body parameters are read from under their own keys.
    #[must_use]
    pub fn embed_body(&self) -> bool {
        self.embed_body
    }

    /// Sorted, de-duplicated security scopes.
    #[must_use]
    pub fn security_scopes(&self) -> &[String] {
        &self.security_scopes
    }

    /// Handler identity plus its sorted scopes; equal for equal plans.
    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    #[must_use]
    pub fn len(&self) -> usize {
        ParameterLocation::ORDERED
            .iter()
            .map(|l| self.params(*l).len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{FieldType, ParamSpec};

    #[test]
    fn test_partition_is_total_and_disjoint() {
        let plan = BindingPlan::build(
            "h",
            vec![
                Parameter::new("id", FieldType::int()).with(ParamSpec::path()),
                Parameter::new("q", FieldType::str()),
                Parameter::new("x_token", FieldType::str()).with(ParamSpec::header()),
                Parameter::new("session", FieldType::str()).with(ParamSpec::cookie()),
                Parameter::new("item", FieldType::Any).with(ParamSpec::body()),
            ],
            &[],
        )
        .unwrap();
        assert_eq!(plan.len(), 5);
        for location in ParameterLocation::ORDERED {
            assert_eq!(plan.params(location).len(), 1, "{location}");
        }
        assert!(!plan.embed_body());
    }

    #[test]
    fn test_multiple_body_params_embed() {
        let plan = BindingPlan::build(
            "h",
            vec![
                Parameter::new("a", FieldType::int()).with(ParamSpec::body()),
                Parameter::new("b", FieldType::int()).with(ParamSpec::body()),
            ],
            &[],
        )
        .unwrap();
        assert!(plan.embed_body());

        let single = BindingPlan::build(
            "h",
            vec![Parameter::new("a", FieldType::int()).with(ParamSpec::body().embed(true))],
            &[],
        )
        .unwrap();
        assert!(single.embed_body());
    }

    #[test]
    fn test_cache_key_sorts_scopes() {
        let a = BindingPlan::build("h", vec![], &["write".into(), "read".into(), "read".into()]).unwrap();
        let b = BindingPlan::build("h", vec![], &["read".into(), "write".into()]).unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.security_scopes(), ["read", "write"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = BindingPlan::build(
            "h",
            vec![
                Parameter::new("a", FieldType::int()),
                Parameter::new("a", FieldType::int()).with(ParamSpec::header()),
            ],
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateField { .. }));
    }
}
