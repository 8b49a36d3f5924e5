//! Chat transport adapters for chatrelay.
//!
//! Each channel connects to a chat platform, yields inbound messages and
//! delivers replies. Channels implement `chatrelay_core::Channel`.
//!
//! Available channels:
//! - **Telegram** — Bot API over long polling

pub mod telegram;

pub use telegram::{TelegramChannel, TelegramConfig};
