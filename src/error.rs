//! Configuration error types.
//!
//! [`ConfigError`] is returned eagerly by [`ClientConfigBuilder::build`](crate::ClientConfigBuilder::build).
//! Errors raised while preparing or sending individual requests live in
//! [`crate::clients`] instead.
//!
//! # Example
//!
//! ```rust
//! use httpreq::{ClientConfig, ConfigError};
//!
//! let result = ClientConfig::builder().user_agent("bad\nagent").build();
//! assert!(matches!(result, Err(ConfigError::InvalidUserAgent { .. })));
//! ```

use thiserror::Error;

/// Errors that can occur while building a [`ClientConfig`](crate::ClientConfig).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The user agent is not a valid header value.
    #[error("Invalid user agent '{value}'. User agents must be visible ASCII without line breaks.")]
    InvalidUserAgent {
        /// The rejected user agent.
        value: String,
    },

    /// A default header has an invalid name or value.
    #[error("Invalid default header '{name}': {reason}")]
    InvalidHeader {
        /// The header name that was provided.
        name: String,
        /// Why the header was rejected.
        reason: String,
    },

    /// The proxy URL could not be used.
    #[error("Invalid proxy URL '{url}': {reason}")]
    InvalidProxyUrl {
        /// The proxy URL that was provided.
        url: String,
        /// Why the proxy was rejected.
        reason: String,
    },

    /// The underlying transport client could not be created.
    #[error("Failed to create HTTP client: {reason}")]
    ClientBuild {
        /// The transport's explanation.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_user_agent_error_message() {
        let error = ConfigError::InvalidUserAgent {
            value: "bad\nagent".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("Invalid user agent"));
        assert!(message.contains("line breaks"));
    }

    #[test]
    fn test_invalid_proxy_error_message() {
        let error = ConfigError::InvalidProxyUrl {
            url: "::nope".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("::nope"));
        assert!(message.contains("relative URL"));
    }

    #[test]
    fn test_error_implements_std_error() {
        let error = ConfigError::ClientBuild {
            reason: "tls".to_string(),
        };
        let _: &dyn std::error::Error = &error;
    }
}
