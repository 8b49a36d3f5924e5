//! Error types for the chatrelay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; configuration and telemetry
//! errors live next to their crates.

use thiserror::Error;

/// Coarse classification of a completion failure.
///
/// `Request` covers everything that went wrong before a usable body came
/// back (transport, timeout, non-success status). `Response` covers a body
/// that arrived but cannot be turned into a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    Request,
    Response,
}

impl FailureClass {
    /// Stable lowercase label, used as a metric label value.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Request => "request",
            FailureClass::Response => "response",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider (status: 429)")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider returned an error: {0}")]
    Remote(String),

    #[error("No choices in response")]
    NoChoices,

    #[error("Failed to parse response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Which side of the exchange failed.
    pub fn class(&self) -> FailureClass {
        match self {
            ProviderError::Remote(_)
            | ProviderError::NoChoices
            | ProviderError::InvalidResponse(_) => FailureClass::Response,
            ProviderError::ApiError { .. }
            | ProviderError::RateLimited
            | ProviderError::AuthenticationFailed(_)
            | ProviderError::Timeout { .. }
            | ProviderError::Network(_)
            | ProviderError::NotConfigured(_) => FailureClass::Request,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel API call {method} failed: {reason}")]
    Api { method: String, reason: String },

    #[error("Invalid update payload: {0}")]
    InvalidPayload(String),
}
