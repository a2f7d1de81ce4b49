use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use crate::error::{Channel, ChannelFailure, EndpointError};
use crate::handler::{Handler, Reply, RequestData};
use crate::http::{is_valid_status, Response};
use crate::logging::RequestLog;
use crate::validator::{AcceptAll, ValidationResult, Validator};
use crate::web::{self, query_object, Request};

/// Per-endpoint configuration: one validator per channel.
///
/// `EndpointConfig` is a type-changing builder. Every channel starts with the
/// [`AcceptAll`] sentinel; setting a validator replaces it and changes the
/// type the handler receives for that channel. Finish with
/// [`handler`](Self::handler) to obtain an [`Endpoint`].
///
/// # Examples
///
/// ```
/// use schema_endpoint::{EndpointConfig, Reply, RequestData, Schema};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize)]
/// struct Greet {
///     name: String,
/// }
///
/// #[derive(Serialize, Deserialize)]
/// struct Greeting {
///     greeting: String,
/// }
///
/// async fn greet(data: RequestData<Greet>) -> anyhow::Result<Reply<Greeting>> {
///     Ok(Reply::ok(Greeting { greeting: format!("hi {}", data.query.name) }))
/// }
///
/// let endpoint = EndpointConfig::new()
///     .query(Schema::<Greet>::new())
///     .response(Schema::<Greeting>::new())
///     .handler(greet);
/// ```
#[derive(Debug, Clone)]
pub struct EndpointConfig<Q = AcceptAll, B = AcceptAll, F = AcceptAll, R = AcceptAll> {
    query: Q,
    body: B,
    form_data: F,
    response: R,
    form_data_configured: bool,
    expose_validation_details: bool,
}

impl EndpointConfig {
    /// Creates a configuration that accepts any input and any response.
    pub fn new() -> Self {
        Self {
            query: AcceptAll,
            body: AcceptAll,
            form_data: AcceptAll,
            response: AcceptAll,
            form_data_configured: false,
            expose_validation_details: false,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q, B, F, R> EndpointConfig<Q, B, F, R> {
    /// Sets the query-parameter validator.
    pub fn query<V: Validator>(self, validator: V) -> EndpointConfig<V, B, F, R> {
        EndpointConfig {
            query: validator,
            body: self.body,
            form_data: self.form_data,
            response: self.response,
            form_data_configured: self.form_data_configured,
            expose_validation_details: self.expose_validation_details,
        }
    }

    /// Sets the request-body validator.
    pub fn body<V: Validator>(self, validator: V) -> EndpointConfig<Q, V, F, R> {
        EndpointConfig {
            query: self.query,
            body: validator,
            form_data: self.form_data,
            response: self.response,
            form_data_configured: self.form_data_configured,
            expose_validation_details: self.expose_validation_details,
        }
    }

    /// Sets the form-data validator.
    ///
    /// Configuring one makes the endpoint decode form data on every body
    /// request: multipart and URL-encoded bodies are accepted, anything else
    /// is answered with `"No form data found"`.
    pub fn form_data<V: Validator>(self, validator: V) -> EndpointConfig<Q, B, V, R> {
        EndpointConfig {
            query: self.query,
            body: self.body,
            form_data: validator,
            response: self.response,
            form_data_configured: true,
            expose_validation_details: self.expose_validation_details,
        }
    }

    /// Sets the response-body validator.
    pub fn response<V: Validator>(self, validator: V) -> EndpointConfig<Q, B, F, V> {
        EndpointConfig {
            query: self.query,
            body: self.body,
            form_data: self.form_data,
            response: validator,
            form_data_configured: self.form_data_configured,
            expose_validation_details: self.expose_validation_details,
        }
    }

    /// Includes per-channel validation errors in `"Invalid request data"`
    /// responses. Off by default; status and `error` message are unchanged.
    pub fn expose_validation_details(mut self, expose: bool) -> Self {
        self.expose_validation_details = expose;
        self
    }

    /// Attaches the handler, producing a ready-to-serve endpoint.
    pub fn handler<H>(self, handler: H) -> Endpoint<Q, B, F, R, H>
    where
        Q: Validator,
        B: Validator,
        F: Validator,
        R: Validator,
        H: Handler<Q::Output, B::Output, F::Output>,
    {
        Endpoint {
            config: self,
            handler,
        }
    }
}

/// Builds an endpoint with no schemas: every channel accepts anything.
///
/// # Examples
///
/// ```
/// use schema_endpoint::{endpoint, web::Request, Reply, RequestData};
/// use serde_json::{json, Value};
///
/// async fn ping(_: RequestData) -> anyhow::Result<Reply<Value>> {
///     Ok(Reply::ok(json!({ "pong": true })))
/// }
///
/// let ping = endpoint(ping);
/// let response = futures::executor::block_on(ping.handle(Request::get("/ping").unwrap()));
/// assert_eq!(response.status(), 200);
/// assert_eq!(response.body_json().unwrap(), json!({ "pong": true }));
/// ```
pub fn endpoint<H>(handler: H) -> Endpoint<AcceptAll, AcceptAll, AcceptAll, AcceptAll, H>
where
    H: Handler<Value, Value, Value>,
{
    EndpointConfig::new().handler(handler)
}

/// A handler wrapped in request and response validation.
///
/// `Endpoint` is immutable once built and holds no per-request state, so a
/// single instance can serve any number of concurrent requests through
/// `&self`.
///
/// # Pipeline
///
/// ```text
/// Request
///   ↓ body extracted once, by content type      (400 Invalid JSON body / No form data found)
///   ↓ query, body, form data validated         (400 Invalid request data)
///   ↓ handler invoked exactly once             (500 Internal Server Error)
///   ↓ reply body validated                     (500 Invalid response data)
/// Response
/// ```
#[derive(Debug, Clone)]
pub struct Endpoint<Q, B, F, R, H> {
    config: EndpointConfig<Q, B, F, R>,
    handler: H,
}

impl<Q, B, F, R, H> Endpoint<Q, B, F, R, H>
where
    Q: Validator,
    B: Validator,
    F: Validator,
    R: Validator,
    R::Output: Serialize,
    H: Handler<Q::Output, B::Output, F::Output>,
{
    /// Runs the full pipeline for one request.
    ///
    /// Always produces exactly one response: every failure, including a
    /// panicking validator or handler, is mapped onto one of the fixed error
    /// bodies.
    pub async fn handle(&self, mut request: Request) -> Response {
        let log = RequestLog::new(request.method(), request.url().path(), request.headers());
        let span = log.span();

        async {
            // Panicking validators end up here; the handler is contained in `invoke`.
            let outcome = AssertUnwindSafe(self.run(&mut request, &log))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    log.error(format_args!("pipeline panicked: {}", panic_message(&*panic)));
                    Err(EndpointError::Internal)
                });

            match outcome {
                Ok(response) => response,
                Err(err) => Response::from_error(&err, self.config.expose_validation_details),
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: &mut Request, log: &RequestLog) -> Result<Response, EndpointError> {
        let extracted = web::extract(request, self.config.form_data_configured)
            .await
            .map_err(|err| {
                log.warn(format_args!("rejected request body: {err}"));
                err
            })?;

        // Every channel is validated before any result is inspected.
        let query = self
            .config
            .query
            .validate(Value::Object(query_object(request.url())));
        let body = validate_channel(&self.config.body, extracted.body);
        let form_data = validate_channel(&self.config.form_data, extracted.form_data);

        let (query, body, form_data) = match (query, body, form_data) {
            (Ok(query), Ok(body), Ok(form_data)) => (query, body, form_data),
            (query, body, form_data) => {
                let failures: Vec<ChannelFailure> = [
                    (Channel::Query, query.err()),
                    (Channel::Body, body.err()),
                    (Channel::FormData, form_data.err()),
                ]
                .into_iter()
                .filter_map(|(channel, failure)| {
                    failure.map(|failure| ChannelFailure {
                        channel,
                        errors: failure.into_errors(),
                    })
                })
                .collect();

                let channels: Vec<String> = failures.iter().map(|f| f.channel.to_string()).collect();
                log.warn(format_args!("invalid request data in {}", channels.join(", ")));
                return Err(EndpointError::InvalidRequestData(failures));
            }
        };

        let data = RequestData {
            params: request.params().clone(),
            query,
            body,
            form_data,
            headers: request.headers().to_map(),
        };

        let reply = self.invoke(data, log).await?;
        self.respond(reply, log)
    }

    async fn invoke(
        &self,
        data: RequestData<Q::Output, B::Output, F::Output>,
        log: &RequestLog,
    ) -> Result<Reply<H::Body>, EndpointError> {
        let outcome = AssertUnwindSafe(async { self.handler.invoke(data).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => {
                log.error(format_args!("handler failed: {err:#}"));
                Err(EndpointError::Internal)
            }
            Err(panic) => {
                log.error(format_args!("handler panicked: {}", panic_message(&*panic)));
                Err(EndpointError::Internal)
            }
        }
    }

    fn respond(&self, reply: Reply<H::Body>, log: &RequestLog) -> Result<Response, EndpointError> {
        let Reply {
            status,
            body,
            headers,
        } = reply;

        let body = serde_json::to_value(&body).map_err(|err| {
            log.error(format_args!("handler body is not serializable: {err}"));
            EndpointError::Internal
        })?;

        let body = self.config.response.validate(body).map_err(|failure| {
            log.error(format_args!("handler returned invalid response data: {failure}"));
            EndpointError::InvalidResponseData(failure.into_errors())
        })?;

        if !is_valid_status(status) {
            log.error(format_args!("handler returned invalid status {status}"));
            return Err(EndpointError::Internal);
        }

        let mut response = Response::json(status, &body).map_err(|err| {
            log.error(format_args!("validated response is not serializable: {err}"));
            EndpointError::Internal
        })?;
        if let Some(headers) = headers {
            response.headers_mut().merge(&headers);
        }

        log.debug(format_args!("responded with status {status}"));
        Ok(response)
    }
}

/// Validates a body-like channel; absent input goes through the sentinel path.
fn validate_channel<V: Validator>(validator: &V, input: Option<Value>) -> ValidationResult<V::Output> {
    match input {
        Some(value) => validator.validate(value),
        None => validator.validate_absent(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{from_fn, Schema, ValidationFailure};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct NameQuery {
        #[allow(dead_code)]
        name: String,
    }

    async fn echo(data: RequestData) -> anyhow::Result<Reply<Value>> {
        Ok(Reply::ok(json!({
            "query": data.query,
            "body": data.body,
            "formData": data.form_data,
        })))
    }

    #[test]
    fn validate_channel_uses_absent_path() {
        assert_eq!(validate_channel(&AcceptAll, None).unwrap(), json!({}));
        assert_eq!(validate_channel(&AcceptAll, Some(json!(1))).unwrap(), json!(1));
        assert!(validate_channel(&Schema::<NameQuery>::new(), None).is_err());
    }

    #[test]
    fn panic_message_handles_common_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*payload), "static");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*payload), "non-string panic payload");
    }

    #[tokio::test]
    async fn get_without_schemas_defaults_body_to_empty_object() {
        let response = endpoint(echo).handle(Request::get("/ep").unwrap()).await;

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.body_json().unwrap(),
            json!({ "query": {}, "body": {}, "formData": {} })
        );
    }

    #[tokio::test]
    async fn all_channels_are_validated_before_failing() {
        let body_calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = std::sync::Arc::clone(&body_calls);
        let body = from_fn(move |value: Value| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok::<_, ValidationFailure>(value)
        });

        let endpoint = EndpointConfig::new()
            .query(Schema::<NameQuery>::new())
            .body(body)
            .handler(|_: RequestData<NameQuery>| async { Ok::<_, anyhow::Error>(Reply::ok(())) });

        let response = endpoint.handle(Request::get("/ep").unwrap()).await;
        assert_eq!(response.status(), 400);
        assert_eq!(body_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn details_are_exposed_when_enabled() {
        let endpoint = EndpointConfig::new()
            .query(Schema::<NameQuery>::new())
            .expose_validation_details(true)
            .handler(|_: RequestData<NameQuery>| async { Ok::<_, anyhow::Error>(Reply::ok(())) });

        let response = endpoint.handle(Request::get("/ep").unwrap()).await;
        let body = response.body_json().unwrap();
        assert_eq!(body["error"], "Invalid request data");
        assert_eq!(body["details"][0]["channel"], "query");
        assert_eq!(body["details"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_status_is_internal_error() {
        let endpoint = endpoint(|_: RequestData| async { Ok::<_, anyhow::Error>(Reply::new(42, json!({}))) });

        let response = endpoint.handle(Request::get("/ep").unwrap()).await;
        assert_eq!(response.status(), 500);
        assert_eq!(
            response.body_json().unwrap(),
            json!({ "error": "Internal Server Error" })
        );
    }

    #[tokio::test]
    async fn handler_headers_override_defaults() {
        let endpoint = endpoint(|_: RequestData| async {
            Ok::<_, anyhow::Error>(
                Reply::ok(json!("hi"))
                    .with_header("Content-Type", "application/vnd.api+json")
                    .with_header("X-Trace", "1"),
            )
        });

        let response = endpoint.handle(Request::get("/ep").unwrap()).await;
        assert_eq!(
            response.headers().get("content-type"),
            Some("application/vnd.api+json")
        );
        assert_eq!(response.headers().get("x-trace"), Some("1"));
        assert_eq!(response.headers().get_all("content-type").count(), 1);
    }

    #[tokio::test]
    async fn params_and_headers_reach_handler() {
        let endpoint = endpoint(|data: RequestData| async move {
            Ok::<_, anyhow::Error>(Reply::ok(json!({
                "id": data.params.get("id"),
                "agent": data.headers.get("user-agent"),
            })))
        });

        let request = Request::get("/users/7")
            .unwrap()
            .with_param("id", "7")
            .with_header("User-Agent", "tests");
        let response = endpoint.handle(request).await;

        assert_eq!(
            response.body_json().unwrap(),
            json!({ "id": "7", "agent": "tests" })
        );
    }
}
