//! # Typed Module
//!
//! Handlers that work with their own request and response structs instead of
//! raw [`Arguments`](crate::binding::Arguments).
//!
//! Parameters are still declared on the [`Route`](crate::dispatcher::Route)
//! and validated first; the typed layer only converts the already-bound
//! arguments with `serde` and serializes what the handler returns.
//!
//! ```rust
//! use reqbind::dispatcher::Route;
//! use reqbind::exceptions::BoxError;
//! use reqbind::params::{FieldType, Parameter};
//! use reqbind::server::ResponseEnvelope;
//! use reqbind::typed::TypedHandler;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct GetPet {
//!     pet_id: i64,
//! }
//!
//! #[derive(Serialize)]
//! struct Pet {
//!     id: i64,
//!     name: String,
//! }
//!
//! struct GetPetHandler;
//!
//! impl TypedHandler for GetPetHandler {
//!     type Request = GetPet;
//!     type Response = Pet;
//!
//!     fn handle(&self, req: GetPet, _env: &mut ResponseEnvelope) -> Result<Pet, BoxError> {
//!         Ok(Pet { id: req.pet_id, name: "Fluffy".to_string() })
//!     }
//! }
//!
//! let route = Route::get("/pets/{pet_id}")
//!     .param(Parameter::new("pet_id", FieldType::int()).with(reqbind::params::ParamSpec::path()))
//!     .typed(GetPetHandler);
//! # let _ = route;
//! ```

mod core;

pub use core::{typed_handler, TypedConversionError, TypedHandler};
