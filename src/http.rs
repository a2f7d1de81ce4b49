use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::error::EndpointError;

/// HTTP method of an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET method
    Get,
    /// HTTP HEAD method
    Head,
    /// HTTP POST method
    Post,
    /// HTTP PUT method
    Put,
    /// HTTP PATCH method
    Patch,
    /// HTTP DELETE method
    Delete,
    /// HTTP OPTIONS method
    Options,
}

impl Method {
    /// Returns `true` for methods whose body the adapter reads.
    ///
    /// Only POST, PUT and PATCH bodies are extracted; every other method is
    /// treated as bodiless even if the client sent bytes.
    pub fn carries_body(self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }

    /// Returns the canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unsupported method name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported HTTP method: {0}")]
pub struct InvalidMethod(pub String);

impl FromStr for Method {
    type Err = InvalidMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(InvalidMethod(s.to_string())),
        }
    }
}

/// Returns `true` if `status` may be used on a final response.
///
/// Matches the range a fetch-style `Response` accepts: 200 through 599.
pub fn is_valid_status(status: u16) -> bool {
    (200..=599).contains(&status)
}

/// An ordered, case-insensitive header collection.
///
/// Names are stored lower-cased. A name may carry several values; use
/// [`Headers::insert`] to replace and [`Headers::append`] to add.
///
/// # Examples
///
/// ```
/// use schema_endpoint::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "application/json");
/// headers.append("Accept", "text/html");
/// headers.append("accept", "application/json");
///
/// assert_eq!(headers.get("content-type"), Some("application/json"));
/// assert_eq!(headers.get_all("ACCEPT").count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, replacing any existing values.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref().to_ascii_lowercase();
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, value.into()));
    }

    /// Adds a value for `name`, keeping existing values.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
    }

    /// Returns the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> impl Iterator<Item = &str> + '_ {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(move |(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if at least one value exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlays `other` onto `self`.
    ///
    /// Every name present in `other` replaces all of its values here; names
    /// only present in `self` are kept.
    pub fn merge(&mut self, other: &Headers) {
        self.entries
            .retain(|(name, _)| !other.entries.iter().any(|(n, _)| n == name));
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Flattens into a name → value map, joining repeated values with `", "`.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in &self.entries {
            map.entry(name.clone())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.clone());
        }
        map
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// An HTTP response produced by the endpoint adapter.
///
/// The body is always JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Serializes `body` as JSON with the given status and a JSON content type.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    ///
    /// # Examples
    ///
    /// ```
    /// use schema_endpoint::Response;
    /// use serde_json::json;
    ///
    /// let response = Response::json(201, &json!({ "id": 7 })).unwrap();
    /// assert_eq!(response.status(), 201);
    /// assert_eq!(response.headers().get("content-type"), Some("application/json"));
    /// assert_eq!(response.body_json().unwrap(), json!({ "id": 7 }));
    /// ```
    pub fn json<T: Serialize + ?Sized>(status: u16, body: &T) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(body)?;
        let mut headers = Headers::new();
        headers.insert("content-type", "application/json");

        Ok(Self {
            status,
            headers,
            body: Bytes::from(body),
        })
    }

    /// Builds the fixed JSON response for an adapter error.
    ///
    /// # Examples
    ///
    /// ```
    /// use schema_endpoint::{EndpointError, Response};
    /// use serde_json::json;
    ///
    /// let response = Response::from_error(&EndpointError::NoFormData, false);
    /// assert_eq!(response.status(), 400);
    /// assert_eq!(response.body_json().unwrap(), json!({ "error": "No form data found" }));
    /// ```
    pub fn from_error(error: &EndpointError, expose_details: bool) -> Self {
        let status = error.status();
        Self::json(status, &error.body(expose_details))
            .unwrap_or_else(|_| Self::static_json(status, br#"{"error":"Internal Server Error"}"#))
    }

    /// A JSON response from a pre-serialized body.
    pub(crate) fn static_json(status: u16, body: &'static [u8]) -> Self {
        let mut headers = Headers::new();
        headers.insert("content-type", "application/json");
        Self {
            status,
            headers,
            body: Bytes::from_static(body),
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns a mutable reference to the response headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the serialized body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Parses the body back into a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON.
    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}
