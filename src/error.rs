use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::validator::ErrorDetail;

const INVALID_JSON_BODY: &str = "Invalid JSON body";
const NO_FORM_DATA: &str = "No form data found";
const INVALID_REQUEST_DATA: &str = "Invalid request data";
const INVALID_RESPONSE_DATA: &str = "Invalid response data";
const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// Failures that terminate a request inside the endpoint adapter.
///
/// Every variant maps to a fixed status code and a fixed `error` message, so
/// callers only ever see one of five response shapes. Nothing about the raw
/// request or the handler internals leaks through the message.
///
/// # Examples
///
/// ```
/// use schema_endpoint::EndpointError;
///
/// let error = EndpointError::InvalidJsonBody;
/// assert_eq!(error.status(), 400);
/// assert_eq!(error.to_string(), "Invalid JSON body");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// The body declared JSON (or no content type) and failed to parse.
    #[error("{}", INVALID_JSON_BODY)]
    InvalidJsonBody,

    /// Form data was expected but could not be decoded.
    #[error("{}", NO_FORM_DATA)]
    NoFormData,

    /// One or more input channels were rejected by their validator.
    #[error("{}", INVALID_REQUEST_DATA)]
    InvalidRequestData(Vec<ChannelFailure>),

    /// The handler produced a body its response validator rejected.
    #[error("{}", INVALID_RESPONSE_DATA)]
    InvalidResponseData(Vec<ErrorDetail>),

    /// The handler failed, panicked, or returned something unsendable.
    #[error("{}", INTERNAL_SERVER_ERROR)]
    Internal,
}

impl EndpointError {
    /// Returns the HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidJsonBody | Self::NoFormData | Self::InvalidRequestData(_) => 400,
            Self::InvalidResponseData(_) | Self::Internal => 500,
        }
    }

    /// Builds the JSON error body.
    ///
    /// Validation details are only included for request-side failures and only
    /// when `expose_details` is set; the `error` message never changes.
    pub fn body(&self, expose_details: bool) -> ErrorBody<'_> {
        let details = match self {
            Self::InvalidRequestData(failures) if expose_details => Some(failures.as_slice()),
            _ => None,
        };

        ErrorBody {
            error: self.message(),
            details,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::InvalidJsonBody => INVALID_JSON_BODY,
            Self::NoFormData => NO_FORM_DATA,
            Self::InvalidRequestData(_) => INVALID_REQUEST_DATA,
            Self::InvalidResponseData(_) => INVALID_RESPONSE_DATA,
            Self::Internal => INTERNAL_SERVER_ERROR,
        }
    }
}

/// Serialized shape of every error response: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    /// Fixed, user-facing message
    pub error: &'static str,
    /// Per-channel validation failures, when exposure is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<&'a [ChannelFailure]>,
}

/// A request input that is validated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    /// URL query-string parameters
    Query,
    /// Request body
    Body,
    /// Decoded form fields
    FormData,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Query => write!(f, "query"),
            Channel::Body => write!(f, "body"),
            Channel::FormData => write!(f, "formData"),
        }
    }
}

/// Validation errors reported by a single channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelFailure {
    /// The channel that rejected its input
    pub channel: Channel,
    /// Errors reported by the channel's validator
    pub errors: Vec<ErrorDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_kind() {
        assert_eq!(EndpointError::InvalidJsonBody.status(), 400);
        assert_eq!(EndpointError::NoFormData.status(), 400);
        assert_eq!(EndpointError::InvalidRequestData(Vec::new()).status(), 400);
        assert_eq!(EndpointError::InvalidResponseData(Vec::new()).status(), 500);
        assert_eq!(EndpointError::Internal.status(), 500);
    }

    #[test]
    fn body_hides_details_by_default() {
        let error = EndpointError::InvalidRequestData(vec![ChannelFailure {
            channel: Channel::Query,
            errors: vec![ErrorDetail::new("name", "missing field")],
        }]);

        let json = serde_json::to_value(error.body(false)).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "Invalid request data" }));
    }

    #[test]
    fn body_exposes_request_details_when_enabled() {
        let error = EndpointError::InvalidRequestData(vec![ChannelFailure {
            channel: Channel::FormData,
            errors: vec![ErrorDetail::new("tags", "expected a sequence")],
        }]);

        let json = serde_json::to_value(error.body(true)).unwrap();
        assert_eq!(json["error"], "Invalid request data");
        assert_eq!(json["details"][0]["channel"], "formData");
        assert_eq!(json["details"][0]["errors"][0]["path"], "tags");
    }

    #[test]
    fn response_details_never_exposed() {
        let error = EndpointError::InvalidResponseData(vec![ErrorDetail::new("", "bad")]);
        let json = serde_json::to_value(error.body(true)).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "Invalid response data" }));
    }

    #[test]
    fn display_matches_error_body() {
        let errors = [
            EndpointError::InvalidJsonBody,
            EndpointError::NoFormData,
            EndpointError::InvalidRequestData(Vec::new()),
            EndpointError::InvalidResponseData(Vec::new()),
            EndpointError::Internal,
        ];

        for error in errors {
            assert_eq!(error.to_string(), error.body(false).error);
        }
        assert_eq!(EndpointError::NoFormData.to_string(), "No form data found");
    }

    #[test]
    fn channel_display() {
        assert_eq!(Channel::FormData.to_string(), "formData");
        assert_eq!(Channel::Query.to_string(), "query");
    }
}
