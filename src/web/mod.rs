//! Web framework integration surface.
//!
//! This module is the boundary between HTTP frameworks and the endpoint
//! adapter. It handles:
//! - Representing an inbound request as owned, framework-neutral data
//! - Reading the request body exactly once
//! - Turning the query string, body and form fields into JSON values that
//!   validators can check
//!
//! # Design Principles
//!
//! 1. **No Framework Dependencies**: nothing here knows about a concrete
//!    server. Framework glue builds a [`Request`] and hands it to
//!    [`Endpoint::handle`](crate::Endpoint::handle).
//!
//! 2. **One Read**: [`Body`] drains its stream on first use and caches the
//!    bytes, so JSON, multipart and text decoding never compete for it.
//!
//! 3. **Content-Type Dispatch**: exactly one body strategy is chosen per
//!    request, from [`ContentKind`].
//!
//! # Example Flow
//!
//! ```ignore
//! // In a framework-specific integration (e.g., axum, hyper):
//! let request = Request::new(method, &uri)?
//!     .with_body(Body::from_stream(incoming_body));
//! let response = endpoint.handle(request).await;
//! // Copy response.status(), headers and body onto the framework response.
//! ```

mod body;
mod extract;
mod request;

pub use body::{Body, BodyError, BoxError};
pub(crate) use extract::extract;
pub use extract::{
    decode_multipart, decode_urlencoded, fold_fields, query_object, ContentKind,
};
pub use request::{InvalidUrl, Request};
