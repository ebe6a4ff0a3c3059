//! # Params Module
//!
//! Static metadata describing where a handler parameter comes from and what
//! shape it must have.
//!
//! Parameters are declared explicitly at registration time through
//! [`Parameter`] and an optional tagged [`ParamSpec`]. Resolution into a
//! [`ParameterDescriptor`] happens once, when the route is registered, and
//! rejects shapes a location cannot carry (for example a nested list in a
//! query string) with a [`ConfigurationError`](crate::exceptions::ConfigurationError).
//!
//! ```rust
//! use reqbind::params::{FieldType, ParamSpec, Parameter, ParameterDescriptor, ParameterLocation};
//!
//! let tags = Parameter::new("x_tag", FieldType::list(FieldType::str()))
//!     .with(ParamSpec::header().convert_underscores(true));
//! let desc = ParameterDescriptor::resolve(tags).unwrap();
//! assert_eq!(desc.location, ParameterLocation::Header);
//! assert_eq!(desc.alias(), "x-tag");
//! ```

mod descriptor;
mod types;

pub use descriptor::*;
pub use types::*;
