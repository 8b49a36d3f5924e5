//! Message router — turns one inbound message into at most one reply.
//!
//! Runs the gate, executes `/start` and `/stop`, and for accepted text drives
//! the history → completion → history exchange for the sender.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chatrelay_core::channel::{InboundMessage, OutboundMessage, UserId};
use chatrelay_core::history::HistoryStore;
use chatrelay_core::message::Role;
use chatrelay_core::provider::Provider;
use chatrelay_memory::ActivationRegistry;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::gate::{self, Command, GateDecision, GateInput};
use crate::replies;

/// Long-lived router shared by all dispatch tasks.
pub struct MessageRouter {
    provider: Arc<dyn Provider>,
    history: Arc<dyn HistoryStore>,
    activation: Arc<ActivationRegistry>,
    admins: HashSet<UserId>,
    mention: String,
    /// Serializes history mutation per user. Entries are dropped once
    /// nobody holds or waits on them.
    user_locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl MessageRouter {
    pub fn new(
        provider: Arc<dyn Provider>,
        history: Arc<dyn HistoryStore>,
        activation: Arc<ActivationRegistry>,
        admins: impl IntoIterator<Item = UserId>,
        mention: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            history,
            activation,
            admins: admins.into_iter().collect(),
            mention: mention.into(),
            user_locks: DashMap::new(),
        }
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub fn activation(&self) -> &Arc<ActivationRegistry> {
        &self.activation
    }

    /// Handle one inbound message. `None` means stay silent.
    pub async fn handle(&self, message: &InboundMessage) -> Option<OutboundMessage> {
        chatrelay_telemetry::record_message();

        let decision = gate::evaluate(&GateInput {
            chat_is_private: message.chat_is_private,
            sender_is_admin: self.is_admin(message.sender_id),
            chat_is_active: self.activation.is_active(message.chat_id),
            text: &message.text,
            command: message.command.as_deref(),
            mention: &self.mention,
        });

        match decision {
            GateDecision::Command(command) => Some(self.run_command(command, message).await),
            GateDecision::Accept(text) => Some(self.converse(message, &text).await),
            GateDecision::Reject(reason) => {
                debug!(
                    chat_id = message.chat_id,
                    user_id = message.sender_id,
                    reason = ?reason,
                    "Message not accepted"
                );
                reason
                    .notice()
                    .map(|notice| OutboundMessage::new(message.chat_id, notice))
            }
        }
    }

    async fn run_command(&self, command: Command, message: &InboundMessage) -> OutboundMessage {
        let chat = message.chat_id;
        let user = message.sender_id;
        let is_admin = self.is_admin(user);

        let text = match command {
            Command::Start if !is_admin => {
                warn!(chat_id = chat, user_id = user, "Non-admin tried to activate the bot");
                replies::ADMIN_ONLY_START.to_string()
            }
            Command::Start => {
                self.activation.activate(chat);
                chatrelay_telemetry::set_active_chats(self.activation.len());
                info!(chat_id = chat, user_id = user, "Chat activated");
                let mention = (!message.chat_is_private).then_some(self.mention.as_str());
                replies::activated(mention)
            }
            Command::Stop if !is_admin => {
                warn!(chat_id = chat, user_id = user, "Non-admin tried to deactivate the bot");
                replies::ADMIN_ONLY_STOP.to_string()
            }
            Command::Stop => {
                self.activation.deactivate(chat);
                // Waits for an in-flight exchange so its reply cannot outlive the reset.
                self.serialized(user, async { self.history.reset(user) }).await;
                chatrelay_telemetry::set_active_chats(self.activation.len());
                info!(chat_id = chat, user_id = user, "Chat deactivated");
                replies::DEACTIVATED.to_string()
            }
        };

        OutboundMessage::new(chat, text)
    }

    /// Run `work` while holding `user`'s lock.
    async fn serialized<T>(&self, user: UserId, work: impl Future<Output = T>) -> T {
        let lock = self.user_locks.entry(user).or_default().clone();
        let output = {
            let _turn = lock.lock().await;
            work.await
        };
        // Drop the entry when only the table and `lock` still reference it.
        self.user_locks
            .remove_if(&user, |_, held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
        output
    }

    async fn converse(&self, message: &InboundMessage, text: &str) -> OutboundMessage {
        self.serialized(message.sender_id, self.exchange(message, text)).await
    }

    async fn exchange(&self, message: &InboundMessage, text: &str) -> OutboundMessage {
        let user = message.sender_id;
        self.history.append(user, Role::User, text);
        let turns = self.history.get(user);

        debug!(
            chat_id = message.chat_id,
            user_id = user,
            turns = turns.len(),
            provider = self.provider.name(),
            "Requesting completion"
        );

        match self.provider.complete(&turns).await {
            Ok(reply) => {
                self.history.append(user, Role::Assistant, &reply);
                OutboundMessage::reply(message.chat_id, message.message_id, reply)
            }
            Err(e) => {
                let class = e.class();
                chatrelay_telemetry::record_api_error(class);
                error!(
                    chat_id = message.chat_id,
                    user_id = user,
                    class = %class,
                    error = %e,
                    "Completion failed"
                );
                OutboundMessage::reply(message.chat_id, message.message_id, replies::FAILURE)
            }
        }
    }
}
