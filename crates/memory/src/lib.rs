//! In-process state for chatrelay.
//!
//! Nothing here survives a restart:
//! - [`InMemoryHistory`] — bounded per-user turn history
//! - [`ActivationRegistry`] — the set of chats the bot is talking in

pub mod activation;
pub mod in_memory;

pub use activation::ActivationRegistry;
pub use in_memory::InMemoryHistory;
