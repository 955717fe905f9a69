//! Received responses and their body decoding.
//!
//! A [`Response`] holds the status and headers of a reply together with its
//! body stream. The stream is read at most once: the first body accessor
//! buffers it completely and every later accessor decodes the same cached
//! bytes, so `text()`, `json()`, `xml()` and `preview()` can be combined freely.
//!
//! Body accessors report a [`StatusError`] for non-2xx responses but still
//! buffer the body, which stays available through [`Response::body`]. A
//! stream that breaks off mid-read is never served as a complete body.

use bytes::{Bytes, BytesMut};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::clients::errors::{HttpError, StatusError};
use crate::clients::xml;

/// Maximum length of a [`Response::preview`], in characters.
pub const PREVIEW_LIMIT: usize = 160;

/// A response received from the transport.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    method: Method,
    url: String,
    content_length: Option<u64>,
    /// Unread body stream, taken on first read.
    stream: Option<reqwest::Response>,
    /// Body bytes, once read.
    body: Option<Bytes>,
    /// Why the read of the stream stopped early, if it did.
    read_error: Option<String>,
}

impl Response {
    pub(crate) fn from_transport(method: Method, response: reqwest::Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            method,
            url: response.url().to_string(),
            content_length: response.content_length(),
            stream: Some(response),
            body: None,
            read_error: None,
        }
    }

    /// Creates a response around an in-memory body that has not been read yet.
    ///
    /// # Example
    ///
    /// ```rust
    /// use httpreq::Response;
    /// use reqwest::{header::HeaderMap, StatusCode};
    ///
    /// let response = Response::from_parts(StatusCode::OK, HeaderMap::new(), "hello");
    /// assert!(response.is_success());
    /// assert!(!response.is_consumed());
    /// ```
    #[must_use]
    pub fn from_parts(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let content_length = u64::try_from(body.len()).ok();
        let mut message = http::Response::new(body);
        *message.status_mut() = status;
        *message.headers_mut() = headers.clone();

        Self {
            status,
            headers,
            method: Method::GET,
            url: String::new(),
            content_length,
            stream: Some(reqwest::Response::from(message)),
            body: None,
            read_error: None,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status line, e.g. `404 Not Found`.
    #[must_use]
    pub fn status_text(&self) -> String {
        match self.status.canonical_reason() {
            Some(reason) => format!("{} {reason}", self.status.as_u16()),
            None => self.status.as_u16().to_string(),
        }
    }

    /// Returns `true` if the status code is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the first value of a header, if it is valid text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the final URL, after any redirects.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the method of the request that produced this response.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the announced body length, if known.
    #[must_use]
    pub const fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Returns the buffered body, or `None` if it has not been read yet.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns `true` once the body stream has been read and closed.
    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        self.stream.is_none()
    }

    /// Returns the error a body accessor reports for this status, if any.
    #[must_use]
    pub fn status_error(&self) -> Option<StatusError> {
        if self.is_success() {
            return None;
        }
        Some(StatusError {
            code: self.status.as_u16(),
            status: self.status_text(),
            method: self.method.clone(),
            url: self.url.clone(),
        })
    }

    /// Reads the body stream into the cache, once.
    ///
    /// A stream that fails mid-read keeps failing: the first call reports the
    /// transport error and every later call reports the body as incomplete.
    async fn buffer(&mut self) -> Result<(), HttpError> {
        let Some(mut stream) = self.stream.take() else {
            return match &self.read_error {
                Some(reason) => Err(HttpError::IncompleteBody {
                    received: self.body.as_ref().map_or(0, Bytes::len),
                    reason: reason.clone(),
                }),
                None => Ok(()),
            };
        };

        let mut buf = BytesMut::new();
        let outcome = loop {
            match stream.chunk().await {
                Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        tracing::debug!(bytes = buf.len(), url = %self.url, "buffered response body");
        self.body = Some(buf.freeze());
        outcome.map_err(|e| {
            tracing::warn!(url = %self.url, error = %e, "response body read failed");
            self.read_error = Some(e.to_string());
            HttpError::Transport(e)
        })
    }

    /// Returns the body bytes.
    ///
    /// The first call reads and closes the body stream; later calls return the
    /// cached bytes.
    ///
    /// # Errors
    ///
    /// - [`HttpError::Status`] for non-2xx responses (the body is still
    ///   cached and available through [`Response::body`])
    /// - [`HttpError::Transport`] if the stream fails mid-read, and
    ///   [`HttpError::IncompleteBody`] from every later call
    ///
    /// A status error is joined in front of a read error.
    pub async fn bytes(&mut self) -> Result<Bytes, HttpError> {
        let read = self.buffer().await.err();
        let error = match (self.status_error(), read) {
            (None, None) => return Ok(self.body.clone().unwrap_or_default()),
            (Some(status), None) => HttpError::from(status),
            (None, Some(read)) => read,
            (Some(status), Some(read)) => HttpError::from(status).join(read),
        };
        Err(error)
    }

    /// Returns the body as text alongside the first error that applies.
    ///
    /// Invalid UTF-8 sequences are replaced, so the text is always usable.
    async fn decode_text(&mut self) -> (String, Option<HttpError>) {
        let error = self.bytes().await.err();
        let body = self.body.clone().unwrap_or_default();
        match std::str::from_utf8(&body) {
            Ok(text) => (text.to_string(), error),
            Err(source) => (
                String::from_utf8_lossy(&body).into_owned(),
                error.or(Some(HttpError::InvalidUtf8 { source })),
            ),
        }
    }

    /// Returns the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Response::bytes`], or
    /// [`HttpError::InvalidUtf8`] if the body is not valid UTF-8. The raw
    /// bytes stay available through [`Response::body`].
    pub async fn text(&mut self) -> Result<String, HttpError> {
        match self.decode_text().await {
            (_, Some(error)) => Err(error),
            (text, None) => Ok(text),
        }
    }

    /// Decodes a JSON body into `T`.
    ///
    /// A body starting with `<` is reported as [`HttpError::JsonLooksLikeXml`]
    /// instead of a parse error, because it is usually an HTML or XML error
    /// page; use [`Response::preview`] to see it.
    ///
    /// # Errors
    ///
    /// - [`HttpError::EmptyBody`] for an empty body
    /// - [`HttpError::JsonLooksLikeXml`] for a body starting with `<`
    /// - [`HttpError::Json`] naming the failing field path
    ///
    /// A status or UTF-8 error from reading the body is joined in front of
    /// any of these, and returned on its own if decoding succeeds.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, HttpError> {
        let (text, read_error) = self.decode_text().await;

        let decoded = if text.is_empty() {
            Err(HttpError::EmptyBody)
        } else if text.starts_with('<') {
            Err(HttpError::JsonLooksLikeXml)
        } else {
            decode_json(&text)
        };

        match (decoded, read_error) {
            (Ok(value), None) => Ok(value),
            (Ok(_), Some(error)) | (Err(error), None) => Err(error),
            (Err(error), Some(first)) => Err(first.join(error)),
        }
    }

    /// Decodes an XML body into `T`.
    ///
    /// The declared document encoding may be UTF-8, `US-ASCII`, `ISO-8859-1`
    /// or `Windows-1252`. The body is buffered like every other accessor, so
    /// it can still be read afterwards.
    ///
    /// # Errors
    ///
    /// - the errors of [`Response::bytes`]
    /// - [`HttpError::EmptyBody`] for an empty body
    /// - [`HttpError::UnsupportedCharset`] for any other declared encoding
    /// - [`HttpError::InvalidUtf8`] for a UTF-8 document that is not
    /// - [`HttpError::Xml`] if the document does not match `T`
    pub async fn xml<T: DeserializeOwned>(&mut self) -> Result<T, HttpError> {
        let body = self.bytes().await?;
        if body.is_empty() {
            return Err(HttpError::EmptyBody);
        }
        let document = xml::decode_document(&body)?;
        Ok(quick_xml::de::from_str(&document)?)
    }

    /// Returns a short excerpt of the body for diagnostics.
    ///
    /// The excerpt is at most [`PREVIEW_LIMIT`] characters and stops at the
    /// first line break; a cut excerpt ends in `...`. Decoding errors are
    /// ignored.
    pub async fn preview(&mut self) -> String {
        let (text, _) = self.decode_text().await;
        abbreviate(&text)
    }
}

/// Decodes one JSON document, rejecting trailing content.
fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, HttpError> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let value =
        serde_path_to_error::deserialize(&mut deserializer).map_err(HttpError::from_json_path)?;
    deserializer.end().map_err(|source| HttpError::Json {
        path: ".".to_string(),
        source,
    })?;
    Ok(value)
}

/// Shortens text to its first line, at most [`PREVIEW_LIMIT`] characters.
pub(crate) fn abbreviate(text: &str) -> String {
    let mut cut = PREVIEW_LIMIT;
    if let Some(eol) = text.chars().position(|c| c == '\n') {
        if eol > 0 && eol < cut {
            cut = eol + 3;
        }
    }
    if cut < text.chars().count() {
        let mut preview: String = text.chars().take(cut - 3).collect();
        preview.push_str("...");
        preview
    } else {
        text.to_string()
    }
}
