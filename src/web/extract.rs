//! Content-type-aware extraction of query, body and form-data channels.

use std::collections::BTreeMap;
use std::convert::Infallible;

use base64::Engine as _;
use bytes::Bytes;
use futures::stream;
use serde_json::{json, Map, Value};
use url::Url;

use crate::error::EndpointError;

use super::Request;

/// How a request body is interpreted, derived from its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// `application/json`
    Json,
    /// `multipart/form-data`
    Multipart,
    /// `application/x-www-form-urlencoded`
    UrlEncoded,
    /// Any other declared content type
    Text,
    /// No content type was sent
    Absent,
}

impl ContentKind {
    /// Classifies a `content-type` header value.
    ///
    /// Matching is a case-insensitive substring check, so parameters such as
    /// `; charset=utf-8` or `; boundary=...` do not matter.
    ///
    /// # Examples
    ///
    /// ```
    /// use schema_endpoint::web::ContentKind;
    ///
    /// assert_eq!(ContentKind::of(Some("application/json; charset=utf-8")), ContentKind::Json);
    /// assert_eq!(ContentKind::of(Some("multipart/form-data; boundary=x")), ContentKind::Multipart);
    /// assert_eq!(ContentKind::of(Some("text/plain")), ContentKind::Text);
    /// assert_eq!(ContentKind::of(None), ContentKind::Absent);
    /// ```
    pub fn of(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return ContentKind::Absent;
        };

        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("application/json") {
            ContentKind::Json
        } else if content_type.contains("multipart/form-data") {
            ContentKind::Multipart
        } else if content_type.contains("application/x-www-form-urlencoded") {
            ContentKind::UrlEncoded
        } else {
            ContentKind::Text
        }
    }
}

/// Flattens a URL's query string into a JSON object of strings.
///
/// A key that appears more than once keeps its last value.
///
/// # Examples
///
/// ```
/// use schema_endpoint::web::query_object;
/// use url::Url;
///
/// let url = Url::parse("http://localhost/ep?name=alice&tag=a&tag=b").unwrap();
/// let query = query_object(&url);
/// assert_eq!(query["name"], "alice");
/// assert_eq!(query["tag"], "b");
/// ```
pub fn query_object(url: &Url) -> Map<String, Value> {
    url.query_pairs()
        .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
        .collect()
}

/// Folds form fields into an object, preserving repeated fields.
///
/// A field submitted once maps to its value. A field submitted several times
/// maps to an array of every value, in submission order.
///
/// # Examples
///
/// ```
/// use schema_endpoint::web::fold_fields;
/// use serde_json::{json, Value};
///
/// let fields = vec![
///     ("tag".to_string(), Value::from("a")),
///     ("name".to_string(), Value::from("alice")),
///     ("tag".to_string(), Value::from("b")),
/// ];
///
/// let object = fold_fields(fields);
/// assert_eq!(object["name"], json!("alice"));
/// assert_eq!(object["tag"], json!(["a", "b"]));
/// ```
pub fn fold_fields<I>(fields: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut grouped: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (name, value) in fields {
        grouped.entry(name).or_default().push(value);
    }

    grouped
        .into_iter()
        .map(|(name, mut values)| {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            };
            (name, value)
        })
        .collect()
}

/// Decodes a `multipart/form-data` body into a field object.
///
/// Text parts become strings. File parts become objects with `filename`,
/// `contentType`, `size` and base64 `data`.
///
/// # Errors
///
/// Returns an error if the boundary is missing or the body is malformed.
pub async fn decode_multipart(
    content_type: &str,
    body: Bytes,
) -> Result<Map<String, Value>, multer::Error> {
    let boundary = multer::parse_boundary(content_type)?;
    let source = stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(source, boundary);

    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        let value = match field.file_name().map(str::to_owned) {
            Some(filename) => {
                let content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await?;
                json!({
                    "filename": filename,
                    "contentType": content_type,
                    "size": data.len(),
                    "data": base64::engine::general_purpose::STANDARD.encode(&data),
                })
            }
            None => Value::String(field.text().await?),
        };
        fields.push((name, value));
    }

    Ok(fold_fields(fields))
}

/// Decodes an `application/x-www-form-urlencoded` body into a field object.
pub fn decode_urlencoded(body: &[u8]) -> Map<String, Value> {
    fold_fields(
        url::form_urlencoded::parse(body)
            .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned()))),
    )
}

/// Raw channel values pulled from a request, before validation.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Extracted {
    pub(crate) body: Option<Value>,
    pub(crate) form_data: Option<Value>,
}

/// Reads the body once and derives the body and form-data channels from it.
///
/// `wants_form` is set when a form-data validator is configured; multipart
/// bodies always populate the form channel.
pub(crate) async fn extract(
    request: &mut Request,
    wants_form: bool,
) -> Result<Extracted, EndpointError> {
    if !request.method().carries_body() {
        return Ok(Extracted::default());
    }

    let content_type = request.content_type().map(str::to_owned);
    let kind = ContentKind::of(content_type.as_deref());
    tracing::debug!(?kind, "extracting request body");

    match kind {
        ContentKind::Json => {
            let bytes = request
                .body_mut()
                .bytes()
                .await
                .map_err(|_| EndpointError::InvalidJsonBody)?;
            let body = parse_json(&bytes)?;
            if wants_form {
                return Err(EndpointError::NoFormData);
            }
            Ok(Extracted {
                body: Some(body),
                form_data: None,
            })
        }
        ContentKind::Absent => {
            let bytes = request
                .body_mut()
                .bytes()
                .await
                .map_err(|_| EndpointError::InvalidJsonBody)?;
            let body = if bytes.is_empty() {
                None
            } else {
                Some(parse_json(&bytes)?)
            };
            if wants_form {
                return Err(EndpointError::NoFormData);
            }
            Ok(Extracted {
                body,
                form_data: None,
            })
        }
        ContentKind::Multipart => {
            let content_type = content_type.unwrap_or_default();
            let bytes = request
                .body_mut()
                .bytes()
                .await
                .map_err(|_| EndpointError::NoFormData)?;
            let fields = decode_multipart(&content_type, bytes).await.map_err(|err| {
                tracing::debug!(error = %err, "multipart decoding failed");
                EndpointError::NoFormData
            })?;
            let fields = Value::Object(fields);
            Ok(Extracted {
                body: Some(fields.clone()),
                form_data: Some(fields),
            })
        }
        ContentKind::UrlEncoded => {
            let bytes = request.body_mut().bytes().await;
            if wants_form {
                let bytes = bytes.as_ref().map_err(|_| EndpointError::NoFormData)?;
                Ok(Extracted {
                    body: text(bytes),
                    form_data: Some(Value::Object(decode_urlencoded(bytes))),
                })
            } else {
                Ok(Extracted {
                    body: bytes.ok().as_ref().and_then(text),
                    form_data: None,
                })
            }
        }
        ContentKind::Text => {
            if wants_form {
                return Err(EndpointError::NoFormData);
            }
            let bytes = request.body_mut().bytes().await;
            Ok(Extracted {
                body: bytes.ok().as_ref().and_then(text),
                form_data: None,
            })
        }
    }
}

fn parse_json(bytes: &[u8]) -> Result<Value, EndpointError> {
    serde_json::from_slice(bytes).map_err(|err| {
        tracing::debug!(error = %err, "JSON body did not parse");
        EndpointError::InvalidJsonBody
    })
}

/// Text bodies are best effort: unreadable or non-UTF-8 input is absent.
fn text(bytes: &Bytes) -> Option<Value> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(Value::String(text.to_owned())),
        Err(_) => {
            tracing::debug!("text body is not valid UTF-8, treating as absent");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    const BOUNDARY: &str = "X-BOUNDARY";

    fn multipart_body(parts: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (name, value) in parts {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn multipart_request(body: String) -> Request {
        Request::post("/upload")
            .unwrap()
            .with_header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .with_body(body)
    }

    #[test]
    fn content_kind_is_case_insensitive() {
        assert_eq!(ContentKind::of(Some("Application/JSON")), ContentKind::Json);
        assert_eq!(
            ContentKind::of(Some("application/x-www-form-urlencoded")),
            ContentKind::UrlEncoded
        );
    }

    #[test]
    fn query_object_without_query_is_empty() {
        let url = Url::parse("http://localhost/ep").unwrap();
        assert!(query_object(&url).is_empty());
    }

    #[test]
    fn query_object_decodes_percent_encoding() {
        let url = Url::parse("http://localhost/ep?q=hello%20world&plus=a+b").unwrap();
        let query = query_object(&url);
        assert_eq!(query["q"], "hello world");
        assert_eq!(query["plus"], "a b");
    }

    #[test]
    fn decode_urlencoded_folds_repeats() {
        let fields = decode_urlencoded(b"a=1&b=2&a=3");
        assert_eq!(fields["a"], json!(["1", "3"]));
        assert_eq!(fields["b"], json!("2"));
    }

    #[tokio::test]
    async fn get_request_has_no_body() {
        let mut request = Request::new(Method::Get, "/ep")
            .unwrap()
            .with_header("Content-Type", "application/json")
            .with_body("not json");

        let extracted = extract(&mut request, false).await.unwrap();
        assert_eq!(extracted, Extracted::default());
        assert!(request.body_mut().is_buffered());
    }

    #[tokio::test]
    async fn json_body_is_parsed() {
        let mut request = Request::post("/ep")
            .unwrap()
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"n":1}"#);

        let extracted = extract(&mut request, false).await.unwrap();
        assert_eq!(extracted.body, Some(json!({ "n": 1 })));
        assert_eq!(extracted.form_data, None);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let mut request = Request::post("/ep")
            .unwrap()
            .with_header("Content-Type", "application/json")
            .with_body("{oops");

        let err = extract(&mut request, false).await.unwrap_err();
        assert_eq!(err, EndpointError::InvalidJsonBody);
    }

    #[tokio::test]
    async fn absent_content_type_parses_json() {
        let mut request = Request::post("/ep").unwrap().with_body("[1,2]");
        let extracted = extract(&mut request, false).await.unwrap();
        assert_eq!(extracted.body, Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn absent_content_type_and_empty_body_is_null() {
        let mut request = Request::post("/ep").unwrap();
        let extracted = extract(&mut request, false).await.unwrap();
        assert_eq!(extracted.body, None);
    }

    #[tokio::test]
    async fn text_body_is_kept_as_string() {
        let mut request = Request::post("/ep")
            .unwrap()
            .with_header("Content-Type", "text/plain")
            .with_body("hello");

        let extracted = extract(&mut request, false).await.unwrap();
        assert_eq!(extracted.body, Some(json!("hello")));
    }

    #[tokio::test]
    async fn non_utf8_text_body_is_tolerated() {
        let mut request = Request::post("/ep")
            .unwrap()
            .with_header("Content-Type", "application/octet-stream")
            .with_body(vec![0xff_u8, 0xfe, 0xfd]);

        let extracted = extract(&mut request, false).await.unwrap();
        assert_eq!(extracted.body, None);
    }

    #[tokio::test]
    async fn multipart_populates_body_and_form() {
        let body = multipart_body(&[("name", "alice"), ("tag", "a"), ("tag", "b")]);
        let mut request = multipart_request(body);

        let extracted = extract(&mut request, false).await.unwrap();
        let expected = json!({ "name": "alice", "tag": ["a", "b"] });
        assert_eq!(extracted.body, Some(expected.clone()));
        assert_eq!(extracted.form_data, Some(expected));
    }

    #[tokio::test]
    async fn multipart_without_boundary_is_rejected() {
        let mut request = Request::post("/upload")
            .unwrap()
            .with_header("Content-Type", "multipart/form-data")
            .with_body("garbage");

        let err = extract(&mut request, false).await.unwrap_err();
        assert_eq!(err, EndpointError::NoFormData);
    }

    #[tokio::test]
    async fn multipart_file_part_is_described() {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nhi\r\n--{BOUNDARY}--\r\n"
        );
        let mut request = multipart_request(body);

        let extracted = extract(&mut request, false).await.unwrap();
        let form = extracted.form_data.unwrap();
        let doc = &form["doc"];
        assert_eq!(doc["filename"], "a.txt");
        assert_eq!(doc["contentType"], "text/plain");
        assert_eq!(doc["size"], 2);
        assert_eq!(doc["data"], "aGk=");
    }

    #[tokio::test]
    async fn urlencoded_form_when_requested() {
        let mut request = Request::post("/ep")
            .unwrap()
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("a=1&a=2");

        let extracted = extract(&mut request, true).await.unwrap();
        assert_eq!(extracted.body, Some(json!("a=1&a=2")));
        assert_eq!(extracted.form_data, Some(json!({ "a": ["1", "2"] })));
    }

    #[tokio::test]
    async fn urlencoded_without_form_schema_is_text() {
        let mut request = Request::post("/ep")
            .unwrap()
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("a=1");

        let extracted = extract(&mut request, false).await.unwrap();
        assert_eq!(extracted.body, Some(json!("a=1")));
        assert_eq!(extracted.form_data, None);
    }

    #[tokio::test]
    async fn form_required_but_json_sent() {
        let mut request = Request::post("/ep")
            .unwrap()
            .with_header("Content-Type", "application/json")
            .with_body("{}");

        let err = extract(&mut request, true).await.unwrap_err();
        assert_eq!(err, EndpointError::NoFormData);
    }
}
