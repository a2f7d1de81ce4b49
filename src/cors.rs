use serde::Deserialize;

use crate::http::{Headers, Response};

/// Default value of `Access-Control-Allow-Headers`.
const DEFAULT_ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Requested-With";

/// CORS configuration.
///
/// Missing fields fall back to their defaults, both in code and when
/// deserialized from a config file.
///
/// # Examples
///
/// ```
/// use schema_endpoint::CorsOptions;
///
/// let options: CorsOptions = serde_json::from_str(r#"{ "origin": "https://app.example" }"#).unwrap();
/// assert_eq!(options.origin, "https://app.example");
/// assert_eq!(options.allow_headers, CorsOptions::default().allow_headers);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorsOptions {
    /// Value of `Access-Control-Allow-Origin`
    pub origin: String,
    /// Value of `Access-Control-Allow-Headers`
    pub allow_headers: String,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            origin: "*".to_owned(),
            allow_headers: DEFAULT_ALLOW_HEADERS.to_owned(),
        }
    }
}

/// Precomputed CORS headers plus a preflight responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cors {
    headers: Headers,
}

/// Builds the CORS header set for `options`.
///
/// The headers are meant to be merged into handler replies with
/// [`Reply::with_headers`](crate::Reply::with_headers); preflight requests are
/// answered by [`Cors::preflight`].
///
/// # Examples
///
/// ```
/// use schema_endpoint::{cors, CorsOptions};
///
/// let cors = cors(CorsOptions::default());
/// assert_eq!(cors.headers().get("access-control-allow-origin"), Some("*"));
///
/// let preflight = cors.preflight();
/// assert_eq!(preflight.status(), 200);
/// assert_eq!(preflight.body_json().unwrap(), serde_json::json!({}));
/// ```
pub fn cors(options: CorsOptions) -> Cors {
    let mut headers = Headers::new();
    headers.insert("Access-Control-Allow-Origin", options.origin);
    headers.insert("Access-Control-Allow-Headers", options.allow_headers);
    Cors { headers }
}

impl Cors {
    /// The `Access-Control-Allow-*` headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// A `200` response with an empty JSON object and the CORS headers.
    pub fn preflight(&self) -> Response {
        let mut response = Response::static_json(200, b"{}");
        response.headers_mut().merge(&self.headers);
        response
    }

    /// The preflight responder as a standalone function, for routers that
    /// register `OPTIONS` handlers as closures.
    pub fn preflight_fn(&self) -> impl Fn() -> Response + Send + Sync + 'static {
        let cors = self.clone();
        move || cors.preflight()
    }
}

impl Default for Cors {
    fn default() -> Self {
        cors(CorsOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_options() {
        let options = CorsOptions::default();
        assert_eq!(options.origin, "*");
        assert_eq!(options.allow_headers, "Content-Type, Authorization, X-Requested-With");
    }

    #[test]
    fn custom_origin_keeps_default_allow_headers() {
        let cors = cors(CorsOptions {
            origin: "https://example.com".to_owned(),
            ..CorsOptions::default()
        });

        assert_eq!(
            cors.headers().get("Access-Control-Allow-Origin"),
            Some("https://example.com")
        );
        assert_eq!(
            cors.headers().get("Access-Control-Allow-Headers"),
            Some(DEFAULT_ALLOW_HEADERS)
        );
        assert_eq!(cors.headers().len(), 2);
    }

    #[test]
    fn preflight_is_empty_object_with_cors_headers() {
        let response = Cors::default().preflight();
        assert_eq!(response.status(), 200);
        assert_eq!(response.body_json().unwrap(), json!({}));
        assert_eq!(response.headers().get("content-type"), Some("application/json"));
        assert_eq!(response.headers().get("access-control-allow-origin"), Some("*"));
    }

    #[test]
    fn preflight_fn_matches_preflight() {
        let cors = cors(CorsOptions::default());
        let respond = cors.preflight_fn();
        assert_eq!(respond(), cors.preflight());
    }

    #[test]
    fn deserializes_camel_case() {
        let options: CorsOptions =
            serde_json::from_value(json!({ "allowHeaders": "X-Custom" })).unwrap();
        assert_eq!(options.origin, "*");
        assert_eq!(options.allow_headers, "X-Custom");
    }
}
