//! # Binding Module
//!
//! Turns a request into validated handler arguments.
//!
//! A [`BindingPlan`] is compiled once per route from the handler's declared
//! [`Parameter`](crate::params::Parameter)s and partitions them by location.
//! Per request, [`solve`] walks the plan:
//!
//! 1. decode the body, failing fast on an unreadable encoding;
//! 2. extract and validate every field, path → query → header → cookie → body,
//!    collecting all issues;
//! 3. return the bound [`Arguments`] with a fresh
//!    [`ResponseEnvelope`](crate::server::ResponseEnvelope), or one
//!    [`RequestValidationError`](crate::exceptions::RequestValidationError)
//!    carrying every issue.
//!
//! ## Nested mode
//!
//! When a location declares exactly one parameter and it is a flat model, the
//! model's sub-fields are read directly from that location's keys:
//!
//! ```rust
//! use reqbind::binding::{solve, BindingPlan};
//! use reqbind::params::{FieldDescriptor, FieldType, Parameter};
//! use reqbind::runtime_config::RuntimeConfig;
//! use reqbind::server::RequestParts;
//! use reqbind::validator::ModelSchema;
//!
//! let page = ModelSchema::builder("Page")
//!     .field(FieldDescriptor::new("limit", FieldType::int()))
//!     .field(FieldDescriptor::new("offset", FieldType::int()))
//!     .build()
//!     .unwrap();
//! let plan = BindingPlan::build("list_items", vec![Parameter::new("page", FieldType::model(page))], &[]).unwrap();
//!
//! let req = RequestParts::new(http::Method::GET, "/items?limit=10&offset=20");
//! let solved = solve(&plan, &req, &RuntimeConfig::default()).unwrap();
//! let page = solved.arguments.get("page").and_then(|v| v.as_model()).unwrap();
//! assert_eq!(page.get("limit").and_then(|v| v.as_value()), Some(&serde_json::json!(10)));
//! ```

mod arguments;
mod extract;
mod plan;
mod solve;

pub use arguments::Arguments;
pub use extract::{extract_field, extract_nested, Extracted};
pub use plan::{BindingPlan, BoundParam};
pub use solve::{solve, Solved};
