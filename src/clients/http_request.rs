//! The [`Request`] type: URL, headers and body being prepared, plus the last
//! response received for them.
//!
//! Builder methods return `&mut Self` and never fail. A problem such as an
//! unparsable URL fragment is recorded on the request and reported by the
//! next [`send`](Request::send), so a chain of calls is never interrupted
//! halfway.
//!
//! # Example
//!
//! ```rust
//! use httpreq::Request;
//!
//! let mut api = Request::from_url("https://api.example.com/v2?format=json");
//! api.set_header("Accept", "application/json");
//!
//! // Each endpoint gets its own copy; `api` is not modified.
//! let mut users = api.new_url("users&page=2");
//! users.add_query("tag", "a&b");
//!
//! assert_eq!(
//!     users.url().unwrap().to_string(),
//!     "https://api.example.com/v2/users?format=json&page=2&tag=a%26b"
//! );
//! assert_eq!(api.url().unwrap().to_string(), "https://api.example.com/v2?format=json");
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::clients::errors::{BuildError, HttpError};
use crate::clients::http_response::Response;
use crate::clients::query::{encode_pair, QueryParams, QueryValue};
use crate::clients::retry::RetryPolicy;
use crate::clients::url_merge::{self, RequestUrl};
use crate::config::{self, ClientConfig};

/// A request body, with the content type it implies.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// Raw bytes, sent as `application/octet-stream`.
    Bytes(Bytes),
    /// Text, sent as `text/plain`.
    Text(String),
    /// A JSON document, sent as `application/json`.
    Json(serde_json::Value),
}

impl RequestBody {
    /// Returns the content type used when the request sets none.
    #[must_use]
    pub const fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Bytes(_) => Some("application/octet-stream"),
            Self::Text(_) => Some("text/plain"),
            Self::Json(_) => Some("application/json"),
        }
    }

    fn into_bytes(self) -> Result<Option<Bytes>, BuildError> {
        match self {
            Self::Empty => Ok(None),
            Self::Bytes(bytes) => Ok(Some(bytes)),
            Self::Text(text) => Ok(Some(Bytes::from(text))),
            Self::Json(value) => serde_json::to_vec(&value)
                .map(|encoded| Some(Bytes::from(encoded)))
                .map_err(|e| BuildError::InvalidBody {
                    reason: e.to_string(),
                }),
        }
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&[u8]> for RequestBody {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// An HTTP request under construction, and its last response.
///
/// Cloning copies everything except the response, so a clone can be adapted
/// and sent without affecting the original.
pub struct Request {
    pub(crate) client: reqwest::Client,
    pub(crate) timeout: Option<Duration>,
    pub(crate) method: Option<Method>,
    pub(crate) url: Option<RequestUrl>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
    /// First construction error, reported by the next send.
    pub(crate) error: Option<BuildError>,
    pub(crate) retry_policy: Option<Arc<dyn RetryPolicy>>,
    pub(crate) retry_delay: Duration,
    pub(crate) tries: u32,
    /// Attempts made since the last [`send`](Request::send).
    pub(crate) attempt: u32,
    pub(crate) response: Option<Response>,
}

// Verify Request is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Request>();
};

impl Request {
    /// Creates a request with the default client configuration and no URL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ClientConfig::default())
    }

    /// Creates a request seeded from a client configuration.
    #[must_use]
    pub fn with_config(config: &ClientConfig) -> Self {
        Self {
            client: config.client().clone(),
            timeout: config.timeout(),
            method: None,
            url: None,
            headers: config.headers().clone(),
            body: None,
            error: None,
            retry_policy: None,
            retry_delay: config.retry_delay(),
            tries: config.tries(),
            attempt: 0,
            response: None,
        }
    }

    /// Creates a request for a URL, or for a base URL to be extended later.
    ///
    /// A malformed URL is reported by the first send.
    #[must_use]
    pub fn from_url(reference: &str) -> Self {
        let mut request = Self::new();
        request.add_url(reference);
        request
    }

    /// Returns a copy of this request with `reference` merged into its URL.
    #[must_use]
    pub fn new_url(&self, reference: &str) -> Self {
        let mut request = self.clone();
        request.add_url(reference);
        request
    }

    fn record(&mut self, error: BuildError) {
        tracing::warn!(error = %error, "recording request construction error");
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Merges a URI reference into the URL.
    ///
    /// Components present in the reference replace those of the URL and a
    /// relative path is appended. An unescaped `&` in the reference's path
    /// starts parameters that are appended to the query instead:
    /// `"&page=2"` adds to the query, `"?page=2"` replaces it. See
    /// [`RequestUrl`] for the full rules.
    ///
    /// A malformed reference leaves the URL unchanged and is reported by the
    /// next send.
    pub fn add_url(&mut self, reference: &str) -> &mut Self {
        match url_merge::merge(self.url.as_ref(), reference) {
            Ok(url) => self.url = Some(url),
            Err(source) => self.record(BuildError::MalformedReference {
                reference: reference.to_string(),
                source,
            }),
        }
        self
    }

    /// Returns the URL, if one has been set.
    #[must_use]
    pub const fn url(&self) -> Option<&RequestUrl> {
        self.url.as_ref()
    }

    /// Returns the URL for direct modification, creating an empty one if needed.
    pub fn url_mut(&mut self) -> &mut RequestUrl {
        self.url.get_or_insert_with(RequestUrl::default)
    }

    /// Sets a header, replacing any previous values.
    ///
    /// The value is converted to text and trimmed.
    pub fn set_header(&mut self, name: &str, value: impl fmt::Display) -> &mut Self {
        match header_pair(name, &value) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(error) => self.record(error),
        }
        self
    }

    /// Adds a header value, keeping any previous ones.
    pub fn add_header(&mut self, name: &str, value: impl fmt::Display) -> &mut Self {
        match header_pair(name, &value) {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(error) => self.record(error),
        }
        self
    }

    /// Removes all values of a header.
    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.remove(name);
        self
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Replaces the query with the encoded parameters.
    pub fn set_query(&mut self, params: &QueryParams) -> &mut Self {
        self.url_mut().set_query(params.encode());
        self
    }

    /// Appends one parameter to the query, leaving existing ones in place.
    pub fn add_query(&mut self, key: &str, value: impl Into<QueryValue>) -> &mut Self {
        let pair = encode_pair(key, &value.into());
        self.url_mut().append_query(&pair);
        self
    }

    /// Appends a JSON value to the query.
    ///
    /// Scalars are added as text, `null` as a bare key, and an array of
    /// scalars as one parameter per element. Objects and nested arrays are
    /// recorded as an error.
    pub fn add_query_json(&mut self, key: &str, value: &serde_json::Value) -> &mut Self {
        match QueryValue::from_json(value) {
            Ok(values) => {
                for value in values {
                    self.add_query(key, value);
                }
            }
            Err(kind) => self.record(BuildError::UnsupportedParameterType {
                key: key.to_string(),
                kind,
            }),
        }
        self
    }

    /// Replaces every value of one parameter, keeping the others.
    ///
    /// The query is re-encoded, which normalizes its escaping.
    pub fn set_query_param(&mut self, key: &str, value: impl Into<QueryValue>) -> &mut Self {
        let mut params = self.query();
        params.set(key, value);
        self.set_query(&params)
    }

    /// Returns the decoded query parameters.
    #[must_use]
    pub fn query(&self) -> QueryParams {
        self.url
            .as_ref()
            .map(|url| QueryParams::parse(url.query()))
            .unwrap_or_default()
    }

    /// Sets the method; requests without one are sent as `GET`.
    pub fn set_method(&mut self, method: Method) -> &mut Self {
        self.method = Some(method);
        self
    }

    /// Returns the method the request will be sent with.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }

    /// Sets the per-attempt timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Routes this request through a proxy, using a new transport client.
    pub fn set_proxy_url(&mut self, url: &str) -> &mut Self {
        match config::build_client(Some(url)) {
            Ok(client) => self.client = client,
            Err(e) => self.record(BuildError::InvalidProxy {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
        self
    }

    /// Sets the request body.
    ///
    /// The method becomes `POST` unless one was set, and the body's content
    /// type is used unless a `Content-Type` header is already present. The
    /// body is sent with whatever method is set, including an explicit `GET`.
    pub fn post(&mut self, body: impl Into<RequestBody>) -> &mut Self {
        let body = body.into();
        if self.method.is_none() {
            self.method = Some(Method::POST);
        }
        if let Some(content_type) = body.content_type() {
            if !self.headers.contains_key(CONTENT_TYPE) {
                self.headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
        }
        match body.into_bytes() {
            Ok(bytes) => self.body = bytes,
            Err(error) => self.record(error),
        }
        self
    }

    /// Serializes a value as the JSON body. See [`Request::post`].
    pub fn post_json<T: Serialize + ?Sized>(&mut self, value: &T) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(value) => self.post(RequestBody::Json(value)),
            Err(e) => {
                self.record(BuildError::InvalidBody {
                    reason: e.to_string(),
                });
                self
            }
        }
    }

    /// Returns the encoded body, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Sets the attempt budget of a send. A budget of 0 is treated as 1.
    pub fn set_tries(&mut self, tries: u32) -> &mut Self {
        self.tries = tries;
        self
    }

    /// Allows `retries` attempts after the first.
    pub fn set_retry(&mut self, retries: u32) -> &mut Self {
        self.set_tries(retries.saturating_add(1))
    }

    /// Sets the sleep before the first retry; it doubles for each further one.
    pub fn set_retry_delay(&mut self, delay: Duration) -> &mut Self {
        self.retry_delay = delay;
        self
    }

    /// Replaces the default retry policy.
    pub fn set_retry_policy(&mut self, policy: impl RetryPolicy + 'static) -> &mut Self {
        self.retry_policy = Some(Arc::new(policy));
        self
    }

    /// Restores the default retry policy.
    pub fn clear_retry_policy(&mut self) -> &mut Self {
        self.retry_policy = None;
        self
    }

    /// Returns the attempt budget.
    #[must_use]
    pub const fn tries(&self) -> u32 {
        self.tries
    }

    /// Returns the number of attempts made since the last send.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the first construction error recorded, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&BuildError> {
        self.error.as_ref()
    }

    /// Returns the last response, if a send received one.
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Returns the last response for reading its body.
    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_mut()
    }

    /// Performs one transport call, storing the response.
    pub(crate) async fn attempt_once(&mut self) -> Result<(), HttpError> {
        self.response = None;

        let method = self.method();
        let url = self.url.as_ref().map(ToString::to_string).unwrap_or_default();
        tracing::debug!(
            attempt = self.attempt,
            tries = self.tries,
            method = %method,
            url = %url,
            "sending request"
        );

        let mut builder = self
            .client
            .request(method.clone(), url.as_str())
            .headers(self.headers.clone());
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        tracing::debug!(status = response.status().as_u16(), url = %url, "received response");
        self.response = Some(Response::from_transport(method, response));
        Ok(())
    }

    /// Returns the response, sending the request first if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::MissingResponse`] carrying the send error if the
    /// implicit send fails.
    pub async fn receive(&mut self) -> Result<&mut Response, HttpError> {
        if self.response.is_none() {
            if let Some(cause) = self.send().await.err() {
                return Err(HttpError::MissingResponse(Some(Box::new(cause))));
            }
        }
        self.response
            .as_mut()
            .ok_or(HttpError::MissingResponse(None))
    }

    /// Sends the request again from the first attempt.
    ///
    /// # Errors
    ///
    /// Same as [`Request::send`].
    pub async fn retry(&mut self) -> Result<&mut Response, HttpError> {
        self.send().await
    }

    /// Returns the body of the response. See [`Response::bytes`].
    ///
    /// # Errors
    ///
    /// The errors of [`Request::receive`] and [`Response::bytes`].
    pub async fn bytes(&mut self) -> Result<Bytes, HttpError> {
        self.receive().await?.bytes().await
    }

    /// Returns the body of the response as text. See [`Response::text`].
    ///
    /// # Errors
    ///
    /// The errors of [`Request::receive`] and [`Response::text`].
    pub async fn text(&mut self) -> Result<String, HttpError> {
        self.receive().await?.text().await
    }

    /// Decodes a JSON response. See [`Response::json`].
    ///
    /// # Errors
    ///
    /// The errors of [`Request::receive`] and [`Response::json`].
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, HttpError> {
        self.receive().await?.json().await
    }

    /// Decodes an XML response. See [`Response::xml`].
    ///
    /// # Errors
    ///
    /// The errors of [`Request::receive`] and [`Response::xml`].
    pub async fn xml<T: DeserializeOwned>(&mut self) -> Result<T, HttpError> {
        self.receive().await?.xml().await
    }

    /// Returns a short excerpt of the response body, or an empty string if
    /// there is no response.
    pub async fn preview(&mut self) -> String {
        match self.receive().await {
            Ok(response) => response.preview().await,
            Err(_) => String::new(),
        }
    }
}

fn header_pair(
    name: &str,
    value: &dyn fmt::Display,
) -> Result<(HeaderName, HeaderValue), BuildError> {
    let invalid = |reason: String| BuildError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let header_value =
        HeaderValue::from_str(value.to_string().trim()).map_err(|e| invalid(e.to_string()))?;
    Ok((header_name, header_value))
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Request {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            timeout: self.timeout,
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            error: self.error.clone(),
            retry_policy: self.retry_policy.clone(),
            retry_delay: self.retry_delay,
            tries: self.tries,
            attempt: self.attempt,
            response: None,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method())
            .field("url", &self.url.as_ref().map(ToString::to_string))
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .field("error", &self.error)
            .field("tries", &self.tries)
            .field("attempt", &self.attempt)
            .field("retry_delay", &self.retry_delay)
            .field("retry_policy", &self.retry_policy.is_some())
            .field("response", &self.response.as_ref().map(Response::status))
            .finish_non_exhaustive()
    }
}
