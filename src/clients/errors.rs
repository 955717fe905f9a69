//! Error types for preparing, sending and decoding requests.
//!
//! - [`ReferenceError`]: why a URI reference could not be parsed
//! - [`BuildError`]: construction problems recorded on a [`Request`](crate::Request)
//!   and reported by the next send
//! - [`StatusError`]: a non-2xx response
//! - [`HttpError`]: unified error type for everything a send or decode can return
//! - [`ErrorKind`]: fieldless kind of an [`HttpError`], for comparisons
//!
//! # Example
//!
//! ```rust,ignore
//! use httpreq::{ErrorKind, HttpError, Request};
//!
//! let mut request = Request::from_url("https://example.com/feed");
//! match request.json::<serde_json::Value>().await {
//!     Ok(value) => println!("{value}"),
//!     Err(e) if e.is(ErrorKind::JsonLooksLikeXml) => {
//!         println!("got markup instead: {}", request.preview().await);
//!     }
//!     Err(HttpError::Status(e)) => println!("server said {}", e.status),
//!     Err(e) => println!("failed: {e}"),
//! }
//! ```

use std::fmt;

use reqwest::Method;
use thiserror::Error;

/// Reasons a URI reference fails to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// The reference contains an ASCII control character.
    #[error("invalid control character in URL")]
    ControlCharacter,

    /// A `%` is not followed by two hexadecimal digits.
    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),

    /// The reference starts with `:`.
    #[error("missing protocol scheme")]
    MissingScheme,

    /// A relative path starts with a segment containing `:`.
    #[error("first path segment in URL cannot contain colon")]
    ColonInFirstSegment,

    /// The port after the host is not numeric.
    #[error("invalid port {0:?} after host")]
    InvalidPort(String),

    /// The host contains a character that is not allowed.
    #[error("invalid character {0:?} in host name")]
    InvalidHost(char),
}

/// A construction problem recorded on a request.
///
/// Builder calls never fail: they record the first problem on the request and
/// keep going, and the next [`send`](crate::Request::send) reports it without
/// touching the network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A URI reference passed to the URL merger could not be parsed.
    #[error("malformed URL reference '{reference}': {source}")]
    MalformedReference {
        /// The reference as given.
        reference: String,
        /// The parse failure.
        source: ReferenceError,
    },

    /// A query parameter value cannot be turned into text.
    #[error("unsupported {kind} value for parameter '{key}'")]
    UnsupportedParameterType {
        /// The parameter name.
        key: String,
        /// The kind of value that was rejected.
        kind: &'static str,
    },

    /// A header name or value is not valid.
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader {
        /// The header name that was provided.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The request body could not be serialized.
    #[error("invalid request body: {reason}")]
    InvalidBody {
        /// The serializer's explanation.
        reason: String,
    },

    /// The proxy URL could not be used.
    #[error("invalid proxy URL '{url}': {reason}")]
    InvalidProxy {
        /// The proxy URL that was provided.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Error returned by body accessors when the response status is not 2xx.
///
/// The body is still read and cached, so it stays available through
/// [`Response::body`](crate::Response::body) for inspecting error pages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsuccessful response code {status} ({method} {url})")]
pub struct StatusError {
    /// The HTTP status code.
    pub code: u16,
    /// The status line, e.g. `404 Not Found`.
    pub status: String,
    /// The request method.
    pub method: Method,
    /// The final request URL.
    pub url: String,
}

/// Unified error type for sending requests and decoding responses.
#[derive(Debug, Error)]
pub enum HttpError {
    /// A construction problem recorded before sending.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// DNS, connection, timeout or other transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// The body is not valid UTF-8.
    #[error("response body contains invalid UTF-8")]
    InvalidUtf8 {
        /// Where decoding failed.
        #[source]
        source: std::str::Utf8Error,
    },

    /// The body stream failed during an earlier read; only part of the body
    /// was received.
    #[error("response body is incomplete after {received} bytes: {reason}")]
    IncompleteBody {
        /// Bytes received before the stream failed.
        received: usize,
        /// The transport failure of the earlier read.
        reason: String,
    },

    /// An empty body was received where JSON or XML was expected.
    #[error("empty body")]
    EmptyBody,

    /// A JSON decode was asked of a body starting with `<`.
    #[error("initial '<' indicates xml not json")]
    JsonLooksLikeXml,

    /// The JSON body does not match the target type.
    #[error("cannot decode JSON at '{path}': {source}")]
    Json {
        /// Path of the field that failed, `.` for the document root.
        path: String,
        /// The decoder's error.
        #[source]
        source: serde_json::Error,
    },

    /// The XML body does not match the target type.
    #[error("cannot decode XML: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// The XML declaration names an encoding that cannot be decoded.
    #[error("unsupported XML encoding '{0}'")]
    UnsupportedCharset(String),

    /// No response is available, optionally because sending failed.
    #[error("missing response{}", .0.as_ref().map(|e| format!(": {e}")).unwrap_or_default())]
    MissingResponse(Option<Box<HttpError>>),

    /// A retry policy asked for another attempt.
    #[error("{reason}")]
    Retryable {
        /// Why the attempt should be repeated.
        reason: String,
    },

    /// Several errors that apply at once, in the order they occurred.
    #[error("{}", JoinedDisplay(.0))]
    Joined(Vec<HttpError>),
}

struct JoinedDisplay<'a>(&'a [HttpError]);

impl fmt::Display for JoinedDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// The kind of an [`HttpError`] or [`BuildError`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// [`BuildError::MalformedReference`]
    MalformedReference,
    /// [`BuildError::UnsupportedParameterType`]
    UnsupportedParameterType,
    /// [`BuildError::InvalidHeader`]
    InvalidHeader,
    /// [`BuildError::InvalidBody`]
    InvalidBody,
    /// [`BuildError::InvalidProxy`]
    InvalidProxy,
    /// [`HttpError::Transport`]
    Transport,
    /// [`HttpError::Status`]
    Status,
    /// [`HttpError::InvalidUtf8`]
    InvalidUtf8,
    /// [`HttpError::IncompleteBody`]
    IncompleteBody,
    /// [`HttpError::EmptyBody`]
    EmptyBody,
    /// [`HttpError::JsonLooksLikeXml`]
    JsonLooksLikeXml,
    /// [`HttpError::Json`]
    StructuredDecode,
    /// [`HttpError::Xml`]
    Xml,
    /// [`HttpError::UnsupportedCharset`]
    UnsupportedCharset,
    /// [`HttpError::MissingResponse`]
    MissingResponse,
    /// [`HttpError::Retryable`]
    Retryable,
    /// [`HttpError::Joined`]
    Joined,
}

impl BuildError {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedReference { .. } => ErrorKind::MalformedReference,
            Self::UnsupportedParameterType { .. } => ErrorKind::UnsupportedParameterType,
            Self::InvalidHeader { .. } => ErrorKind::InvalidHeader,
            Self::InvalidBody { .. } => ErrorKind::InvalidBody,
            Self::InvalidProxy { .. } => ErrorKind::InvalidProxy,
        }
    }
}

impl HttpError {
    /// Creates the error a retry policy returns to ask for another attempt.
    #[must_use]
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::Retryable {
            reason: reason.into(),
        }
    }

    /// Returns the kind of the outermost error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Build(e) => e.kind(),
            Self::Transport(_) => ErrorKind::Transport,
            Self::Status(_) => ErrorKind::Status,
            Self::InvalidUtf8 { .. } => ErrorKind::InvalidUtf8,
            Self::IncompleteBody { .. } => ErrorKind::IncompleteBody,
            Self::EmptyBody => ErrorKind::EmptyBody,
            Self::JsonLooksLikeXml => ErrorKind::JsonLooksLikeXml,
            Self::Json { .. } => ErrorKind::StructuredDecode,
            Self::Xml(_) => ErrorKind::Xml,
            Self::UnsupportedCharset(_) => ErrorKind::UnsupportedCharset,
            Self::MissingResponse(_) => ErrorKind::MissingResponse,
            Self::Retryable { .. } => ErrorKind::Retryable,
            Self::Joined(_) => ErrorKind::Joined,
        }
    }

    /// Returns `true` if this error, a joined member, or the cause of a
    /// missing response is of the given kind.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        if self.kind() == kind {
            return true;
        }
        match self {
            Self::Joined(errors) => errors.iter().any(|e| e.is(kind)),
            Self::MissingResponse(Some(cause)) => cause.is(kind),
            _ => false,
        }
    }

    /// Finds the first [`StatusError`] in this error or its joined members.
    #[must_use]
    pub fn status(&self) -> Option<&StatusError> {
        match self {
            Self::Status(e) => Some(e),
            Self::Joined(errors) => errors.iter().find_map(Self::status),
            Self::MissingResponse(Some(cause)) => cause.status(),
            _ => None,
        }
    }

    /// Combines two errors that both apply, keeping `self` first.
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        let mut errors = match self {
            Self::Joined(errors) => errors,
            single => vec![single],
        };
        match other {
            Self::Joined(more) => errors.extend(more),
            single => errors.push(single),
        }
        Self::Joined(errors)
    }

    pub(crate) fn from_json_path(error: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path = error.path().to_string();
        Self::Json {
            path,
            source: error.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(code: u16) -> StatusError {
        StatusError {
            code,
            status: format!("{code} Not Found"),
            method: Method::GET,
            url: "http://localhost/missing".to_string(),
        }
    }

    #[test]
    fn test_status_error_message_includes_status_and_url() {
        let message = status_error(404).to_string();
        assert_eq!(
            message,
            "unsuccessful response code 404 Not Found (GET http://localhost/missing)"
        );
    }

    #[test]
    fn test_build_error_is_transparent_in_http_error() {
        let error = HttpError::from(BuildError::InvalidBody {
            reason: "key must be a string".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "invalid request body: key must be a string"
        );
        assert_eq!(error.kind(), ErrorKind::InvalidBody);
    }

    #[test]
    fn test_malformed_reference_message() {
        let error = BuildError::MalformedReference {
            reference: "%zz".to_string(),
            source: ReferenceError::InvalidEscape("%zz".to_string()),
        };
        let message = error.to_string();
        assert!(message.contains("'%zz'"));
        assert!(message.contains("invalid URL escape"));
    }

    #[test]
    fn test_join_flattens_and_keeps_order() {
        let joined = HttpError::EmptyBody
            .join(HttpError::JsonLooksLikeXml)
            .join(HttpError::EmptyBody.join(HttpError::retryable("again")));

        let HttpError::Joined(errors) = &joined else {
            panic!("expected joined error");
        };
        let kinds: Vec<_> = errors.iter().map(HttpError::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::EmptyBody,
                ErrorKind::JsonLooksLikeXml,
                ErrorKind::EmptyBody,
                ErrorKind::Retryable
            ]
        );
        assert_eq!(
            joined.to_string(),
            "empty body\ninitial '<' indicates xml not json\nempty body\nagain"
        );
    }

    #[test]
    fn test_is_searches_joined_members() {
        let joined = HttpError::Status(status_error(500)).join(HttpError::EmptyBody);

        assert_eq!(joined.kind(), ErrorKind::Joined);
        assert!(joined.is(ErrorKind::Status));
        assert!(joined.is(ErrorKind::EmptyBody));
        assert!(!joined.is(ErrorKind::InvalidUtf8));
        assert_eq!(joined.status().map(|e| e.code), Some(500));
    }

    #[test]
    fn test_is_searches_missing_response_cause() {
        let error = HttpError::MissingResponse(Some(Box::new(HttpError::from(
            BuildError::InvalidHeader {
                name: "X Bad".to_string(),
                reason: "invalid HTTP header name".to_string(),
            },
        ))));

        assert_eq!(error.kind(), ErrorKind::MissingResponse);
        assert!(error.is(ErrorKind::InvalidHeader));
        assert!(error.to_string().starts_with("missing response: invalid header"));
        assert_eq!(HttpError::MissingResponse(None).to_string(), "missing response");
    }

    #[test]
    fn test_error_types_implement_std_error() {
        let _: &dyn std::error::Error = &HttpError::EmptyBody;
        let _: &dyn std::error::Error = &status_error(404);
        let _: &dyn std::error::Error = &ReferenceError::MissingScheme;
    }

    #[test]
    fn test_http_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpError>();
    }
}
