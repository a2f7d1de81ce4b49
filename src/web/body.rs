//! Single-consumption request body.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use thiserror::Error;

/// Boxed error type accepted from body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned when the request body cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BodyError {
    /// The underlying stream yielded an error.
    #[error("failed to read request body: {0}")]
    Read(String),
}

enum State {
    Buffered(Bytes),
    Streaming(BoxStream<'static, Result<Bytes, BoxError>>),
    Failed(BodyError),
}

/// A request body that is read from its source at most once.
///
/// A body is either already buffered or backed by a byte stream. The first
/// call to [`Body::bytes`] drains the stream and caches the result (or the
/// read error); later calls return the cached value without touching the
/// stream again. Several decoders can therefore share one body.
///
/// # Examples
///
/// ```
/// use schema_endpoint::web::Body;
/// use bytes::Bytes;
/// use futures::stream;
///
/// let chunks = vec![
///     Ok::<_, std::io::Error>(Bytes::from_static(b"{\"a\":")),
///     Ok(Bytes::from_static(b"1}")),
/// ];
/// let mut body = Body::from_stream(stream::iter(chunks));
///
/// futures::executor::block_on(async {
///     assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"{\"a\":1}"));
///     // Second read is served from the cache.
///     assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"{\"a\":1}"));
/// });
/// ```
pub struct Body {
    state: State,
}

impl Body {
    /// Creates an empty body.
    pub fn empty() -> Self {
        Self::from(Bytes::new())
    }

    /// Creates a body backed by a stream of byte chunks.
    pub fn from_stream<S, B, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
    {
        Self {
            state: State::Streaming(
                stream
                    .map_ok(Into::<Bytes>::into)
                    .map_err(Into::<BoxError>::into)
                    .boxed(),
            ),
        }
    }

    /// Returns the full body, reading the stream on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError`] if the stream failed. The failure is cached, so
    /// every later call reports the same error.
    pub async fn bytes(&mut self) -> Result<Bytes, BodyError> {
        if let State::Streaming(stream) = &mut self.state {
            self.state = match drain(stream).await {
                Ok(bytes) => State::Buffered(bytes),
                Err(err) => State::Failed(err),
            };
        }

        match &self.state {
            State::Buffered(bytes) => Ok(bytes.clone()),
            State::Failed(err) => Err(err.clone()),
            State::Streaming(_) => Err(BodyError::Read("body stream was not drained".into())),
        }
    }

    /// Returns `true` once the body no longer depends on its stream.
    pub fn is_buffered(&self) -> bool {
        !matches!(self.state, State::Streaming(_))
    }
}

async fn drain(stream: &mut BoxStream<'static, Result<Bytes, BoxError>>) -> Result<Bytes, BodyError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| BodyError::Read(err.to_string()))?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Buffered(bytes) => f.debug_tuple("Body").field(&bytes.len()).finish(),
            State::Streaming(_) => f.write_str("Body(<stream>)"),
            State::Failed(err) => f.debug_tuple("Body").field(err).finish(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self {
            state: State::Buffered(bytes),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}
