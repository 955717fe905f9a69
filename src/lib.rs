//! # httpreq
//!
//! An HTTP request/response convenience layer over `reqwest`: build requests
//! incrementally from URL fragments, send them with retries, and decode the
//! response body as bytes, text, JSON or XML.
//!
//! ## Overview
//!
//! This crate provides:
//! - Incremental URLs via [`RequestUrl`]: merge `"users"`, `"?page=2"` or
//!   `"&page=2"` into a base URL
//! - Ordered, repeatable query parameters via [`QueryParams`]
//! - Deferred construction errors: builder calls never fail, the next send
//!   reports the first problem
//! - Retries with exponential backoff and a pluggable [`RetryPolicy`]
//! - Cached response bodies that can be decoded repeatedly, with helpful
//!   errors for empty bodies, invalid UTF-8 and markup where JSON was expected
//! - Client defaults via [`ClientConfig`] and [`ClientConfigBuilder`]
//!
//! ## Quick Start
//!
//! ```rust
//! use httpreq::{ClientConfig, Request};
//!
//! let config = ClientConfig::builder()
//!     .user_agent("my-tool/1.0")
//!     .tries(3)
//!     .build()
//!     .unwrap();
//!
//! let mut request = Request::with_config(&config);
//! request.add_url("https://example.com/api").add_url("items&limit=10");
//! assert_eq!(
//!     request.url().unwrap().to_string(),
//!     "https://example.com/api/items?limit=10"
//! );
//! ```
//!
//! ## Sending and Decoding
//!
//! ```rust,ignore
//! use httpreq::{ErrorKind, Request};
//!
//! let mut request = Request::from_url("https://example.com/api/items");
//! request.set_retry(2);
//!
//! match request.json::<Vec<String>>().await {
//!     Ok(items) => println!("{} items", items.len()),
//!     Err(e) if e.is(ErrorKind::JsonLooksLikeXml) => {
//!         eprintln!("not JSON: {}", request.preview().await);
//!     }
//!     Err(e) => eprintln!("request failed: {e}"),
//! }
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: configuration is instance-based and passed explicitly
//! - **Independent copies**: cloning a request never shares headers or URL
//! - **Thread-safe**: all types are `Send + Sync`; a request is used by one task at a time
//! - **Async-first**: designed for use with the Tokio runtime

pub mod clients;
pub mod config;
pub mod error;

// Re-export public types at crate root for convenience
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::ConfigError;

// Re-export request and response types
pub use clients::{
    BuildError, DefaultRetryPolicy, ErrorKind, HttpError, QueryParams, QueryValue,
    ReferenceError, Request, RequestBody, RequestUrl, Response, RetryPolicy, StatusError,
};
