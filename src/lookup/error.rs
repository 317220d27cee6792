//! Error types for lookup service calls.
//!
//! These errors never abort a processing pass: transport failures feed the
//! retry executor, and construction failures surface before a pass starts.

use thiserror::Error;

/// Errors that can occur while talking to the lookup service.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error calling {url}: {source}")]
    Network {
        /// The service endpoint.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before the service answered.
    #[error("timeout calling {url}")]
    Timeout {
        /// The service endpoint.
        url: String,
    },

    /// Transport failure reported by a non-HTTP service implementation.
    #[error("transport failure: {reason}")]
    Transport {
        /// Why the call failed.
        reason: String,
    },

    /// The configured service endpoint is not a usable URL.
    #[error("invalid lookup service URL '{url}': {reason}\n  Suggestion: {suggestion}")]
    InvalidServiceUrl {
        /// The configured URL.
        url: String,
        /// Why the URL was rejected.
        reason: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// The HTTP client could not be constructed.
    #[error("lookup HTTP client construction failed: {reason}")]
    ClientBuild {
        /// Why construction failed.
        reason: String,
    },
}

impl LookupError {
    /// Creates a network error, mapping reqwest timeouts to [`LookupError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a generic transport failure.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Creates an invalid service URL error.
    pub fn invalid_service_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidServiceUrl {
            url: url.into(),
            reason: reason.into(),
            suggestion: "Set `lookup_url` to an absolute http:// or https:// URL".to_string(),
        }
    }

    /// Creates a client construction error.
    pub fn client_build(reason: impl Into<String>) -> Self {
        Self::ClientBuild {
            reason: reason.into(),
        }
    }
}
