//! Provider trait — the abstraction over the completion backend.
//!
//! A Provider takes the chronological turn list of one user and returns the
//! model's next reply. It is stateless: the caller owns the history.

use async_trait::async_trait;
use crate::error::ProviderError;
use crate::message::Turn;

/// The core Provider trait.
///
/// The router calls `complete()` without knowing which backend answers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// The model identifier requests are sent with.
    fn model(&self) -> &str;

    /// Send the conversation and return the text of the first completion.
    ///
    /// Exactly one network exchange; implementations never retry.
    async fn complete(&self, history: &[Turn]) -> std::result::Result<String, ProviderError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
