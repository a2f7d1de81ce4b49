use std::fmt;

use uuid::Uuid;

use crate::http::{Headers, Method};

/// Header that carries a caller-supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A request-scoped logging interface.
///
/// `RequestLog` is created once per [`Endpoint::handle`](crate::Endpoint::handle)
/// call and borrowed by every stage of the pipeline. Each message carries the
/// request id, method and path as structured `tracing` fields, so a single
/// request can be followed through extraction, validation and the handler.
///
/// The request id comes from the `x-request-id` header when the caller sent
/// one, otherwise a random UUID is generated.
///
/// # Examples
///
/// ```
/// use schema_endpoint::{Headers, Method, RequestLog};
///
/// let mut headers = Headers::new();
/// headers.insert("X-Request-Id", "req-123");
///
/// let log = RequestLog::new(Method::Get, "/users", &headers);
/// assert_eq!(log.request_id(), "req-123");
/// log.info(format_args!("listing users"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestLog {
    request_id: String,
    method: Method,
    path: String,
}

impl RequestLog {
    /// Creates a logger for one request.
    pub fn new(method: Method, path: &str, headers: &Headers) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            request_id,
            method,
            path: path.to_owned(),
        }
    }

    /// Returns the request id attached to every message.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns a span covering the whole request.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "endpoint",
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
        )
    }

    /// Logs an info-level message.
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, method = %self.method, path = %self.path, "{}", args);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, method = %self.method, path = %self.path, "{}", args);
    }

    /// Logs an error-level message.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(request_id = %self.request_id, method = %self.method, path = %self.path, "{}", args);
    }

    /// Logs a debug-level message.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, method = %self.method, path = %self.path, "{}", args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_from_header() {
        let headers: Headers = [("X-Request-ID", " abc ")].into_iter().collect();
        let log = RequestLog::new(Method::Post, "/", &headers);
        assert_eq!(log.request_id(), "abc");
    }

    #[test]
    fn request_id_generated_when_missing() {
        let log = RequestLog::new(Method::Get, "/", &Headers::new());
        assert!(Uuid::parse_str(log.request_id()).is_ok());
    }

    #[test]
    fn blank_request_id_is_replaced() {
        let headers: Headers = [("x-request-id", "   ")].into_iter().collect();
        let log = RequestLog::new(Method::Get, "/", &headers);
        assert!(Uuid::parse_str(log.request_id()).is_ok());
    }

    #[test]
    fn logging_with_subscriber_does_not_panic() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let log = RequestLog::new(Method::Get, "/health", &Headers::new());
            let _guard = log.span().entered();
            log.debug(format_args!("debug"));
            log.info(format_args!("info"));
            log.warn(format_args!("warn"));
            log.error(format_args!("error"));
        });
    }
}
