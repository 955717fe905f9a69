//! Client configuration shared by every [`Request`](crate::Request).
//!
//! A [`ClientConfig`] carries the transport client together with the defaults
//! new requests start from: user agent, timeout, attempt budget, backoff base
//! delay and extra headers. It is built once and then seeds any number of
//! requests via [`Request::with_config`](crate::Request::with_config).
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use httpreq::{ClientConfig, Request};
//!
//! let config = ClientConfig::builder()
//!     .user_agent("my-tool/1.0")
//!     .timeout(Duration::from_secs(30))
//!     .tries(3)
//!     .header("Accept", "application/json")
//!     .build()
//!     .unwrap();
//!
//! let request = Request::with_config(&config);
//! assert_eq!(request.tries(), 3);
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::error::ConfigError;

/// Crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("httpreq/", env!("CARGO_PKG_VERSION"));

/// Base delay before the first retry; doubled for every following retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Transport client and request defaults.
///
/// # Thread Safety
///
/// `ClientConfig` is `Clone`, `Send`, and `Sync`. Cloning is cheap: the
/// transport's connection pool is shared between clones.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    client: reqwest::Client,
    headers: HeaderMap,
    timeout: Option<Duration>,
    tries: u32,
    retry_delay: Duration,
    proxy_url: Option<String>,
}

// Verify ClientConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ClientConfig>();
};

impl Default for ClientConfig {
    fn default() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        Self {
            client: reqwest::Client::new(),
            headers,
            timeout: None,
            tries: 1,
            retry_delay: DEFAULT_RETRY_DELAY,
            proxy_url: None,
        }
    }
}

impl ClientConfig {
    /// Creates a new builder for constructing a `ClientConfig`.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the transport client.
    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Returns the headers every new request starts with, including `User-Agent`.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the configured user agent.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get(USER_AGENT).and_then(|v| v.to_str().ok())
    }

    /// Returns the default per-attempt timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the default attempt budget (always at least 1).
    #[must_use]
    pub const fn tries(&self) -> u32 {
        self.tries
    }

    /// Returns the backoff base delay.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Returns the proxy URL, if configured.
    #[must_use]
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }
}

/// Builds a transport client routed through `proxy_url`, if given.
pub(crate) fn build_client(proxy_url: Option<&str>) -> Result<reqwest::Client, ConfigError> {
    let mut builder = reqwest::Client::builder();
    if let Some(url) = proxy_url {
        let proxy = reqwest::Proxy::all(url).map_err(|e| ConfigError::InvalidProxyUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        builder = builder.proxy(proxy);
    }
    builder.build().map_err(|e| ConfigError::ClientBuild {
        reason: e.to_string(),
    })
}

/// Builder for constructing [`ClientConfig`] instances.
///
/// # Defaults
///
/// - `user_agent`: [`DEFAULT_USER_AGENT`]
/// - `timeout`: `None` (the transport's own default)
/// - `tries`: 1 (no retries)
/// - `retry_delay`: [`DEFAULT_RETRY_DELAY`]
/// - `proxy_url`: `None`
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    user_agent: Option<String>,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    tries: Option<u32>,
    retry_delay: Option<Duration>,
    proxy_url: Option<String>,
}

impl ClientConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `User-Agent` header value.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the default per-attempt timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the attempt budget. A budget of 0 is treated as 1.
    #[must_use]
    pub const fn tries(mut self, tries: u32) -> Self {
        self.tries = Some(tries);
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Routes all requests through the given proxy.
    #[must_use]
    pub fn proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    /// Builds the [`ClientConfig`], validating headers and creating the transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the user agent or a header is not a valid
    /// header value, if the proxy URL is rejected, or if the transport client
    /// cannot be created.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let mut headers = HeaderMap::new();

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let agent_value = HeaderValue::from_str(&user_agent)
            .map_err(|_| ConfigError::InvalidUserAgent { value: user_agent })?;
        headers.insert(USER_AGENT, agent_value);

        for (name, value) in self.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(&value).map_err(|e| ConfigError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            headers.append(header_name, header_value);
        }

        let client = build_client(self.proxy_url.as_deref())?;

        Ok(ClientConfig {
            client,
            headers,
            timeout: self.timeout,
            tries: self.tries.unwrap_or(1).max(1),
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
            proxy_url: self.proxy_url,
        })
    }
}
