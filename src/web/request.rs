//! Framework-agnostic inbound request.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::http::{Headers, Method};

use super::Body;

/// Base used to resolve path-only URLs such as `/users?id=1`.
const LOCAL_BASE: &str = "http://localhost";

/// Error returned when a request URL cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid request URL: {0}")]
pub struct InvalidUrl(#[from] url::ParseError);

/// An incoming HTTP request, as handed over by the hosting framework.
///
/// `Request` holds simple owned data so that it does not couple the adapter
/// to any particular server. Framework glue converts its own request type into
/// a `Request` (typically via a `From` impl) and passes it to
/// [`Endpoint::handle`](crate::Endpoint::handle).
///
/// # Examples
///
/// ```
/// use schema_endpoint::web::Request;
/// use schema_endpoint::Method;
///
/// let request = Request::new(Method::Post, "/users/42?verbose=1")
///     .unwrap()
///     .with_header("Content-Type", "application/json")
///     .with_param("id", "42")
///     .with_body(r#"{"name":"alice"}"#);
///
/// assert_eq!(request.url().path(), "/users/42");
/// assert_eq!(request.content_type(), Some("application/json"));
/// assert_eq!(request.params()["id"], "42");
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Headers,
    params: BTreeMap<String, String>,
    body: Body,
}

impl Request {
    /// Creates a request with no headers, params or body.
    ///
    /// `url` may be absolute or a path with an optional query string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidUrl`] if `url` cannot be parsed.
    pub fn new(method: Method, url: &str) -> Result<Self, InvalidUrl> {
        Ok(Self {
            method,
            url: parse_url(url)?,
            headers: Headers::new(),
            params: BTreeMap::new(),
            body: Body::empty(),
        })
    }

    /// Creates a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidUrl`] if `url` cannot be parsed.
    pub fn get(url: &str) -> Result<Self, InvalidUrl> {
        Self::new(Method::Get, url)
    }

    /// Creates a POST request.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidUrl`] if `url` cannot be parsed.
    pub fn post(url: &str) -> Result<Self, InvalidUrl> {
        Self::new(Method::Post, url)
    }

    /// Appends a header and returns the request.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    /// Appends a header.
    pub fn add_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers.append(name, value);
    }

    /// Sets a route parameter and returns the request.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_param(key, value);
        self
    }

    /// Sets a route parameter supplied by the routing layer.
    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Replaces the body and returns the request.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` as the JSON body and sets a JSON content type.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(value)?;
        self.headers.insert("content-type", "application/json");
        self.body = Body::from(body);
        Ok(self)
    }

    /// Returns the request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the parsed request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the route parameters.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Returns the `content-type` header, if present and non-empty.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get("content-type")
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Returns the body for reading.
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }
}

fn parse_url(raw: &str) -> Result<Url, url::ParseError> {
    match Url::parse(raw) {
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(LOCAL_BASE)?.join(raw),
        parsed => parsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_url_resolves_against_localhost() {
        let request = Request::get("/ep?name=alice").unwrap();
        assert_eq!(request.url().as_str(), "http://localhost/ep?name=alice");
    }

    #[test]
    fn absolute_url_is_kept() {
        let request = Request::get("https://api.example.com/v1/items").unwrap();
        assert_eq!(request.url().host_str(), Some("api.example.com"));
        assert_eq!(request.url().path(), "/v1/items");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(Request::get("http://[::1").is_err());
    }

    #[test]
    fn empty_content_type_is_absent() {
        let request = Request::post("/").unwrap().with_header("Content-Type", "  ");
        assert_eq!(request.content_type(), None);
    }

    #[test]
    fn params_are_stored() {
        let mut request = Request::get("/users/7").unwrap();
        request.add_param("id", "7");
        assert_eq!(request.params().get("id").map(String::as_str), Some("7"));
    }

    #[tokio::test]
    async fn with_json_sets_body_and_content_type() {
        let mut request = Request::post("/")
            .unwrap()
            .with_json(&serde_json::json!({ "a": 1 }))
            .unwrap();

        assert_eq!(request.content_type(), Some("application/json"));
        assert_eq!(request.body_mut().bytes().await.unwrap(), r#"{"a":1}"#);
    }
}
