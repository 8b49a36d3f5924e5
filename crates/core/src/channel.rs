//! Channel trait — the abstraction over the chat platform.
//!
//! A Channel connects chatrelay to a messaging platform. It yields inbound
//! messages as a stream and delivers outbound replies. Polling, webhooks and
//! rate limiting are the implementation's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// Platform chat identifier (negative for Telegram groups).
pub type ChatId = i64;

/// Platform user identifier.
pub type UserId = i64;

/// Platform message identifier, unique within a chat.
pub type MessageId = i64;

/// A message received from the chat platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The chat the message was posted in
    pub chat_id: ChatId,

    /// Whether the chat is a one-to-one conversation with the bot
    pub chat_is_private: bool,

    /// Sender identifier
    pub sender_id: UserId,

    /// Sender handle without the leading `@` (if the platform exposes one)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,

    /// Identifier of this message, used to address replies
    pub message_id: MessageId,

    /// Raw message text
    pub text: String,

    /// Lower-cased command name when the text is a command invocation
    /// (`/start@my_bot args` → `start`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// A reply to be delivered to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub chat_id: ChatId,

    pub text: String,

    /// When set, the platform renders the message as a reply to this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

impl OutboundMessage {
    /// A plain message to the chat.
    pub fn new(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
        }
    }

    /// A message addressed as a reply to `message_id`.
    pub fn reply(chat_id: ChatId, message_id: MessageId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: Some(message_id),
        }
    }
}

/// The core Channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram").
    fn name(&self) -> &str;

    /// How users address the bot in group chats, e.g. `@relay_bot`.
    fn mention(&self) -> &str;

    /// Start listening for incoming messages.
    ///
    /// Returns a receiver that yields incoming messages. Transient transport
    /// failures are delivered as `Err` items; the stream ends when the
    /// channel is stopped.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<InboundMessage, ChannelError>>,
        ChannelError,
    >;

    /// Deliver a message to a chat.
    async fn send(&self, message: &OutboundMessage) -> std::result::Result<(), ChannelError>;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check — is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
