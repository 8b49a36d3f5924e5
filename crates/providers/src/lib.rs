//! Completion API clients for chatrelay.
//!
//! All providers implement the `chatrelay_core::Provider` trait.

pub mod openrouter;

pub use openrouter::{OpenRouterProvider, RoutingPreferences};
