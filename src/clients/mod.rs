//! Request preparation, sending and response decoding.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`Request`]: URL, headers and body being prepared, and the last response
//! - [`RequestUrl`]: a URL assembled by merging URI references
//! - [`QueryParams`]: an ordered multi-map of query parameters
//! - [`RetryPolicy`]: decides whether an attempt is repeated
//! - [`Response`]: a received response with a cached, decodable body
//! - [`HttpError`]: everything a send or decode can fail with
//!
//! # Example
//!
//! ```rust,ignore
//! use httpreq::Request;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Release {
//!     tag_name: String,
//! }
//!
//! let mut request = Request::from_url("https://api.github.com/repos/tokio-rs/tokio");
//! request.set_retry(2);
//!
//! let mut latest = request.new_url("releases/latest");
//! let release: Release = latest.json().await?;
//! println!("{}", release.tag_name);
//! ```
//!
//! # Retry Behavior
//!
//! A request makes one attempt unless given a larger budget with
//! [`Request::set_tries`] or [`Request::set_retry`]. Without a custom policy,
//! transport errors and 5xx responses are retried; anything else ends the send.
//! The delay before the first retry is 1 second by default and doubles for
//! each following retry.

mod errors;
mod http_request;
mod http_response;
mod query;
mod retry;
mod url_merge;
mod xml;

pub use errors::{BuildError, ErrorKind, HttpError, ReferenceError, StatusError};
pub use http_request::{Request, RequestBody};
pub use http_response::{Response, PREVIEW_LIMIT};
pub use query::{encode_pair, QueryParams, QueryValue};
pub use retry::{backoff_delay, DefaultRetryPolicy, RetryPolicy};
pub use url_merge::{merge, RequestUrl, UserInfo};
