use std::collections::BTreeMap;
use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use crate::http::Headers;

/// Validated request data handed to a [`Handler`].
///
/// `query`, `body` and `form_data` are the outputs of the endpoint's
/// validators; with no validator configured they are plain JSON values.
/// `params` come from the routing layer and are passed through untouched.
/// `headers` are flattened with lower-cased names.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestData<Q = Value, B = Value, F = Value> {
    /// Route parameters (unvalidated)
    pub params: BTreeMap<String, String>,
    /// Validated query parameters
    pub query: Q,
    /// Validated request body
    pub body: B,
    /// Validated form fields
    pub form_data: F,
    /// Request headers, repeated values joined with `", "`
    pub headers: BTreeMap<String, String>,
}

/// What a handler wants to send back.
///
/// `body` is validated against the endpoint's response schema before it is
/// serialized. `headers`, when present, are merged over the default response
/// headers.
///
/// # Examples
///
/// ```
/// use schema_endpoint::Reply;
/// use serde_json::json;
///
/// let reply = Reply::new(201, json!({ "id": 1 })).with_header("Location", "/items/1");
/// assert_eq!(reply.status, 201);
/// assert_eq!(reply.headers.unwrap().get("location"), Some("/items/1"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    /// HTTP status code, must be in 200..=599
    pub status: u16,
    /// Response payload
    pub body: T,
    /// Extra or overriding response headers
    pub headers: Option<Headers>,
}

impl<T> Reply<T> {
    /// Creates a reply with the given status and body.
    pub fn new(status: u16, body: T) -> Self {
        Self {
            status,
            body,
            headers: None,
        }
    }

    /// Creates a `200 OK` reply.
    pub fn ok(body: T) -> Self {
        Self::new(200, body)
    }

    /// Sets a response header, replacing earlier values for the same name.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name, value);
        self
    }

    /// Merges a set of response headers, such as CORS headers.
    pub fn with_headers(mut self, headers: &Headers) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .merge(headers);
        self
    }
}

/// User code invoked with validated request data.
///
/// Implemented for every `Fn(RequestData<Q, B, F>) -> impl Future` returning
/// `anyhow::Result<Reply<T>>`, so plain `async fn`s work as handlers.
/// Returning `Err` (or panicking) produces a 500 response; the error itself is
/// only logged.
///
/// # Examples
///
/// ```
/// use schema_endpoint::{Handler, Reply, RequestData};
/// use serde_json::{json, Value};
///
/// async fn echo(data: RequestData) -> anyhow::Result<Reply<Value>> {
///     Ok(Reply::ok(json!({ "query": data.query })))
/// }
///
/// fn assert_handler<H: Handler<Value, Value, Value>>(_: &H) {}
/// assert_handler(&echo);
/// ```
pub trait Handler<Q, B, F>: Send + Sync {
    /// The response payload type.
    type Body: Serialize;

    /// Handles one request.
    fn invoke(
        &self,
        data: RequestData<Q, B, F>,
    ) -> impl Future<Output = anyhow::Result<Reply<Self::Body>>> + Send;
}

impl<Func, Fut, Q, B, F, T> Handler<Q, B, F> for Func
where
    Func: Fn(RequestData<Q, B, F>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Reply<T>>> + Send,
    T: Serialize,
{
    type Body = T;

    fn invoke(
        &self,
        data: RequestData<Q, B, F>,
    ) -> impl Future<Output = anyhow::Result<Reply<T>>> + Send {
        self(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(query: Value) -> RequestData {
        RequestData {
            params: BTreeMap::new(),
            query,
            body: json!({}),
            form_data: json!({}),
            headers: BTreeMap::new(),
        }
    }

    async fn echo_query(data: RequestData) -> anyhow::Result<Reply<Value>> {
        Ok(Reply::ok(data.query))
    }

    #[tokio::test]
    async fn async_fn_is_a_handler() {
        let reply = echo_query.invoke(data(json!({ "a": "1" }))).await.unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, json!({ "a": "1" }));
    }

    #[tokio::test]
    async fn closure_is_a_handler() {
        let handler = |data: RequestData| async move {
            anyhow::ensure!(data.query.get("fail").is_none(), "asked to fail");
            Ok(Reply::new(202, "accepted"))
        };

        let reply = handler.invoke(data(json!({}))).await.unwrap();
        assert_eq!(reply.status, 202);
        assert!(handler.invoke(data(json!({ "fail": "1" }))).await.is_err());
    }

    #[test]
    fn reply_headers_accumulate() {
        let mut cors = Headers::new();
        cors.insert("Access-Control-Allow-Origin", "*");

        let reply = Reply::ok(())
            .with_header("X-One", "1")
            .with_headers(&cors)
            .with_header("x-one", "2");

        let headers = reply.headers.unwrap();
        assert_eq!(headers.get("x-one"), Some("2"));
        assert_eq!(headers.get("access-control-allow-origin"), Some("*"));
        assert_eq!(headers.len(), 2);
    }
}
