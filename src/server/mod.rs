//! # Server Module
//!
//! The transport-facing types: request containers the binding layer reads
//! from, body decoding, uploaded files, and the response written back.
//!
//! No sockets live here. A host transport builds a [`RequestParts`] from
//! whatever it received, hands it to
//! [`Dispatcher::dispatch`](crate::dispatcher::Dispatcher::dispatch), and
//! writes out the returned [`WireResponse`].

pub mod multipart;
pub mod request;
pub mod response;

pub use multipart::{FormValue, MultipartError, UploadFile};
pub use request::{
    decode_body, BodyError, Cookies, DecodedBody, FormData, Headers, ParamVec, PathParams, QueryParams,
    RequestParts, ValueSource,
};
pub use response::{
    is_body_allowed_for_status, status_reason, HeaderVec, ResponseClass, ResponseEnvelope, WireResponse,
};
