//! Shared test doubles for router and dispatcher tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chatrelay_core::channel::{Channel, ChatId, InboundMessage, OutboundMessage, UserId};
use chatrelay_core::error::{ChannelError, ProviderError};
use chatrelay_core::message::Turn;
use chatrelay_core::provider::Provider;
use tokio::sync::mpsc;

/// A provider that answers from a script and records every history it saw.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<Vec<Vec<Turn>>>,
    delay: Duration,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn replies<const N: usize>(texts: [&str; N]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Vec<Turn>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, history: &[Turn]) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(history.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Remote("script exhausted".into())))
    }
}

/// A channel that records outbound messages and can be told to fail sends.
pub struct RecordingChannel {
    sent: Mutex<Vec<OutboundMessage>>,
    fail_sends: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_sends: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn mention(&self) -> &str {
        "@relay_bot"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<InboundMessage, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        if self.fail_sends {
            return Err(ChannelError::DeliveryFailed {
                channel: "recording".into(),
                reason: "send disabled".into(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

static NEXT_MESSAGE_ID: AtomicI64 = AtomicI64::new(1);

/// A text message. Chats whose id equals the sender's are private.
pub fn inbound(chat: ChatId, user: UserId, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id: chat,
        chat_is_private: chat == user,
        sender_id: user,
        sender_username: None,
        message_id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
        text: text.into(),
        command: None,
    }
}

/// A command message as the transport delivers it: `/name` with `command` set.
pub fn command(chat: ChatId, user: UserId, name: &str) -> InboundMessage {
    let mut message = inbound(chat, user, &format!("/{name}"));
    message.command = Some(name.into());
    message
}
