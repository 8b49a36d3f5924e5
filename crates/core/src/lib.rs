//! # Chatrelay Core
//!
//! Domain types, traits, and error definitions for the chatrelay bot.
//! This crate has **no transport dependencies**: it defines the domain model
//! that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in their
//! respective crates:
//! - [`Channel`] — the chat platform (Telegram in `chatrelay-channels`)
//! - [`Provider`] — the completion API (OpenRouter in `chatrelay-providers`)
//! - [`HistoryStore`] — per-user conversation history (`chatrelay-memory`)
//!
//! Tests swap any of them for scripted stand-ins.

pub mod error;
pub mod message;
pub mod provider;
pub mod channel;
pub mod history;

// Re-export key types at crate root for ergonomics
pub use error::{ChannelError, FailureClass, ProviderError};
pub use message::{Role, Turn};
pub use provider::Provider;
pub use channel::{Channel, ChatId, InboundMessage, MessageId, OutboundMessage, UserId};
pub use history::HistoryStore;
