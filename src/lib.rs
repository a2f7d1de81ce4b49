//! Schema-validated HTTP endpoints.
//!
//! This crate wraps endpoint handlers in request and response validation:
//! - **Input channels**: query string, request body and form data are each
//!   checked by their own [`Validator`] before the handler runs
//! - **Output check**: the handler's reply body is validated before it is
//!   serialized, so a buggy handler cannot leak malformed data
//! - **Fixed errors**: every failure maps onto one of a handful of stable JSON
//!   error bodies, see [`EndpointError`]
//!
//! # Core Types
//!
//! - [`EndpointConfig`]: Builder holding one validator per channel
//! - [`Endpoint`]: A handler wrapped in validation, driven by [`Endpoint::handle`]
//! - [`Handler`]: User code, usually a plain `async fn`
//! - [`Schema<T>`]: Validator that deserializes into `T`
//! - [`Cors`]: CORS headers and preflight responder
//!
//! # Examples
//!
//! ```
//! use schema_endpoint::{web::Request, EndpointConfig, Reply, RequestData, Schema};
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct GreetQuery {
//!     name: String,
//! }
//!
//! #[derive(Serialize, Deserialize)]
//! struct Greeting {
//!     greeting: String,
//! }
//!
//! async fn greet(data: RequestData<GreetQuery>) -> anyhow::Result<Reply<Greeting>> {
//!     Ok(Reply::ok(Greeting {
//!         greeting: format!("hello {}", data.query.name),
//!     }))
//! }
//!
//! let endpoint = EndpointConfig::new()
//!     .query(Schema::<GreetQuery>::new())
//!     .response(Schema::<Greeting>::new())
//!     .handler(greet);
//!
//! let response = futures::executor::block_on(
//!     endpoint.handle(Request::get("/greet?name=alice").unwrap()),
//! );
//! assert_eq!(response.status(), 200);
//! assert_eq!(response.body_json().unwrap(), json!({ "greeting": "hello alice" }));
//!
//! let response = futures::executor::block_on(endpoint.handle(Request::get("/greet").unwrap()));
//! assert_eq!(response.status(), 400);
//! assert_eq!(response.body_json().unwrap(), json!({ "error": "Invalid request data" }));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cors;
mod endpoint;
mod error;
mod handler;
mod http;
mod logging;
mod validator;
pub mod web;

pub use cors::{cors, Cors, CorsOptions};
pub use endpoint::{endpoint, Endpoint, EndpointConfig};
pub use error::{Channel, ChannelFailure, EndpointError, ErrorBody};
pub use handler::{Handler, Reply, RequestData};
pub use http::{is_valid_status, Headers, InvalidMethod, Method, Response};
pub use logging::{RequestLog, REQUEST_ID_HEADER};
pub use validator::{
    from_fn, AcceptAll, ErrorDetail, FnValidator, Refine, Schema, ValidationFailure,
    ValidationResult, Validator, ValidatorExt,
};
