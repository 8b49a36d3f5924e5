//! Telegram channel adapter.
//!
//! Talks to the Telegram Bot API over plain HTTPS: `getMe` once at connect
//! time to learn the bot's handle, `getUpdates` long polling in a background
//! task, and `sendMessage` for replies.

use std::time::Duration;

use async_trait::async_trait;
use chatrelay_core::channel::{Channel, ChatId, InboundMessage, MessageId, OutboundMessage, UserId};
use chatrelay_core::error::ChannelError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default Bot API root.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Maximum length of one `sendMessage` text, in characters.
pub const MESSAGE_LIMIT: usize = 4096;

const CALL_TIMEOUT: Duration = Duration::from_secs(30);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Bot API root, without trailing slash.
    pub api_base: String,
    /// Server-side wait of each `getUpdates` call.
    pub poll_timeout_secs: u64,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.into(),
            poll_timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

/// Thin Bot API client. Cloned into the polling task.
#[derive(Clone)]
struct BotApi {
    client: reqwest::Client,
    // "{api_base}/bot{token}"; never logged.
    endpoint: String,
}

impl BotApi {
    fn new(config: &TelegramConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ChannelError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }

    async fn call<P, T>(&self, method: &str, payload: &P, timeout: Duration) -> Result<T, ChannelError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.endpoint, method);
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            // The URL embeds the token.
            .map_err(|e| ChannelError::Api {
                method: method.into(),
                reason: e.without_url().to_string(),
            })?;

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(format!("{method}: {}", e.without_url())))?;

        if !envelope.ok {
            return Err(ChannelError::Api {
                method: method.into(),
                reason: envelope
                    .description
                    .unwrap_or_else(|| "request rejected".into()),
            });
        }

        envelope
            .result
            .ok_or_else(|| ChannelError::InvalidPayload(format!("{method}: missing result")))
    }
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    api: BotApi,
    mention: String,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl TelegramChannel {
    /// Verify the token with `getMe` and learn the bot's `@handle`.
    pub async fn connect(config: TelegramConfig) -> Result<Self, ChannelError> {
        let api = BotApi::new(&config)?;
        let me: ApiUser = api.call("getMe", &serde_json::json!({}), CALL_TIMEOUT).await?;
        let username = me
            .username
            .ok_or_else(|| ChannelError::NotConfigured("bot account has no username".into()))?;

        info!(bot = %username, "Connected to Telegram");

        Ok(Self {
            config,
            api,
            mention: format!("@{username}"),
            poller: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn mention(&self) -> &str {
        &self.mention
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<InboundMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(poll_updates(
            self.api.clone(),
            self.config.poll_timeout_secs,
            tx,
        ));

        if let Some(previous) = self.poller.lock().await.replace(task) {
            warn!("Telegram polling restarted");
            previous.abort();
        }

        info!(poll_timeout_secs = self.config.poll_timeout_secs, "Telegram channel started");
        Ok(rx)
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        if message.text.is_empty() {
            return Err(ChannelError::DeliveryFailed {
                channel: "telegram".into(),
                reason: "empty message text".into(),
            });
        }

        for (index, chunk) in split_message(&message.text, MESSAGE_LIMIT).into_iter().enumerate() {
            let payload = SendMessage {
                chat_id: message.chat_id,
                text: chunk,
                reply_to_message_id: if index == 0 { message.reply_to } else { None },
            };
            let _sent: serde_json::Value = self
                .api
                .call("sendMessage", &payload, CALL_TIMEOUT)
                .await
                .map_err(|e| ChannelError::DeliveryFailed {
                    channel: "telegram".into(),
                    reason: e.to_string(),
                })?;
        }

        debug!(chat_id = message.chat_id, len = message.text.len(), "Message sent");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        if let Some(task) = self.poller.lock().await.take() {
            task.abort();
            info!("Telegram channel stopped");
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        let _me: ApiUser = self
            .api
            .call("getMe", &serde_json::json!({}), CALL_TIMEOUT)
            .await?;
        Ok(true)
    }
}

/// Long-poll `getUpdates` until the receiver is dropped.
async fn poll_updates(
    api: BotApi,
    poll_timeout_secs: u64,
    tx: mpsc::Sender<Result<InboundMessage, ChannelError>>,
) {
    let mut offset: i64 = 0;
    let mut backoff = INITIAL_BACKOFF;
    let call_timeout = Duration::from_secs(poll_timeout_secs) + CALL_TIMEOUT;

    while !tx.is_closed() {
        let request = GetUpdates {
            offset,
            timeout: poll_timeout_secs,
            allowed_updates: &["message"],
        };

        match api.call::<_, Vec<Update>>("getUpdates", &request, call_timeout).await {
            Ok(updates) => {
                backoff = INITIAL_BACKOFF;
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    debug!(update = ?update, "Received update");

                    let Some(message) = update.into_inbound() else {
                        continue;
                    };
                    if tx.send(Ok(message)).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, retry_in = ?backoff, "getUpdates failed");
                if tx.send(Err(e)).await.is_err() {
                    return;
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

/// Split `text` into pieces of at most `limit` characters, never inside a
/// multi-byte character.
fn split_message(text: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(limit)
            .map_or(rest.len(), |(index, _)| index);
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}

/// Lower-cased command name of a message that starts with a `bot_command`
/// entity: `/Start@relay_bot now` → `start`.
fn command_name(text: &str, entities: &[ApiEntity]) -> Option<String> {
    let entity = entities
        .iter()
        .find(|e| e.kind == "bot_command" && e.offset == 0)?;
    let command = utf16_prefix(text, entity.length).strip_prefix('/')?;
    let name = command.split('@').next().unwrap_or(command);
    (!name.is_empty()).then(|| name.to_lowercase())
}

/// Entity offsets count UTF-16 code units.
fn utf16_prefix(text: &str, units: usize) -> &str {
    let mut consumed = 0;
    for (index, ch) in text.char_indices() {
        if consumed >= units {
            return &text[..index];
        }
        consumed += ch.len_utf16();
    }
    text
}

// --- Bot API types (internal) ---

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<MessageId>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message_id: MessageId,
    #[serde(default)]
    from: Option<ApiUser>,
    chat: ApiChat,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    entities: Vec<ApiEntity>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: UserId,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChat {
    id: ChatId,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ApiEntity {
    #[serde(rename = "type")]
    kind: String,
    offset: usize,
    length: usize,
}

impl Update {
    /// Text messages with a sender; everything else is skipped.
    fn into_inbound(self) -> Option<InboundMessage> {
        let message = self.message?;
        let sender = message.from?;
        let text = message.text?;
        let command = command_name(&text, &message.entities);

        Some(InboundMessage {
            chat_id: message.chat.id,
            chat_is_private: message.chat.kind == "private",
            sender_id: sender.id,
            sender_username: sender.username,
            message_id: message.message_id,
            text,
            command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Arc;

    const TOKEN: &str = "test-token";

    fn update(json: Value) -> Update {
        serde_json::from_value(json).unwrap()
    }

    fn text_update(update_id: i64, chat: Value, from: i64, text: &str) -> Value {
        json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id * 10,
                "from": {"id": from, "is_bot": false, "first_name": "A", "username": "alice"},
                "chat": chat,
                "date": 0,
                "text": text
            }
        })
    }

    #[derive(Default)]
    struct MockBot {
        batches: std::sync::Mutex<VecDeque<Value>>,
        offsets: std::sync::Mutex<Vec<i64>>,
        sent: std::sync::Mutex<Vec<Value>>,
        reject_sends: bool,
    }

    async fn get_me() -> Json<Value> {
        Json(json!({
            "ok": true,
            "result": {"id": 1, "is_bot": true, "first_name": "Relay", "username": "relay_bot"}
        }))
    }

    async fn get_updates(State(bot): State<Arc<MockBot>>, Json(body): Json<Value>) -> Json<Value> {
        bot.offsets
            .lock()
            .unwrap()
            .push(body["offset"].as_i64().unwrap_or(-1));
        let batch = bot.batches.lock().unwrap().pop_front();
        match batch {
            Some(batch) => Json(json!({"ok": true, "result": batch})),
            None => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Json(json!({"ok": true, "result": []}))
            }
        }
    }

    async fn send_message(State(bot): State<Arc<MockBot>>, Json(body): Json<Value>) -> Json<Value> {
        if bot.reject_sends {
            return Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}));
        }
        bot.sent.lock().unwrap().push(body);
        Json(json!({"ok": true, "result": {"message_id": 1}}))
    }

    async fn spawn_bot(bot: MockBot) -> (TelegramConfig, Arc<MockBot>) {
        let bot = Arc::new(bot);
        let app = Router::new()
            .route(&format!("/bot{TOKEN}/getMe"), post(get_me))
            .route(&format!("/bot{TOKEN}/getUpdates"), post(get_updates))
            .route(&format!("/bot{TOKEN}/sendMessage"), post(send_message))
            .with_state(bot.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = TelegramConfig {
            bot_token: TOKEN.into(),
            api_base: format!("http://{addr}"),
            poll_timeout_secs: 1,
        };
        (config, bot)
    }

    #[test]
    fn debug_redacts_token() {
        let config = TelegramConfig::new("123456:SECRET");
        let debug = format!("{config:?}");
        assert!(!debug.contains("SECRET"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn private_text_message_is_converted() {
        let inbound = update(text_update(1, json!({"id": 42, "type": "private"}), 42, "hello"))
            .into_inbound()
            .unwrap();
        assert_eq!(inbound.chat_id, 42);
        assert!(inbound.chat_is_private);
        assert_eq!(inbound.sender_id, 42);
        assert_eq!(inbound.sender_username.as_deref(), Some("alice"));
        assert_eq!(inbound.message_id, 10);
        assert_eq!(inbound.text, "hello");
        assert!(inbound.command.is_none());
    }

    #[test]
    fn group_chat_is_not_private() {
        let inbound = update(text_update(2, json!({"id": -100, "type": "supergroup", "title": "G"}), 7, "hi"))
            .into_inbound()
            .unwrap();
        assert!(!inbound.chat_is_private);
        assert_eq!(inbound.chat_id, -100);
    }

    #[test]
    fn updates_without_text_or_sender_are_skipped() {
        let photo = update(json!({
            "update_id": 3,
            "message": {
                "message_id": 1,
                "from": {"id": 1, "is_bot": false, "first_name": "A"},
                "chat": {"id": 1, "type": "private"},
                "date": 0,
                "photo": []
            }
        }));
        assert!(photo.into_inbound().is_none());

        let channel_post = update(json!({
            "update_id": 4,
            "message": {"message_id": 1, "chat": {"id": -5, "type": "channel"}, "date": 0, "text": "x"}
        }));
        assert!(channel_post.into_inbound().is_none());

        let edited = update(json!({"update_id": 5, "edited_message": {}}));
        assert!(edited.into_inbound().is_none());
    }

    #[test]
    fn command_is_lowercased_and_suffix_stripped() {
        let entities = vec![ApiEntity { kind: "bot_command".into(), offset: 0, length: 16 }];
        assert_eq!(
            command_name("/Start@relay_bot please", &entities).as_deref(),
            Some("start")
        );
    }

    #[test]
    fn command_requires_entity_at_offset_zero() {
        let later = vec![ApiEntity { kind: "bot_command".into(), offset: 4, length: 6 }];
        assert!(command_name("hey /start", &later).is_none());

        let mention = vec![ApiEntity { kind: "mention".into(), offset: 0, length: 10 }];
        assert!(command_name("@relay_bot hi", &mention).is_none());

        assert!(command_name("/start", &[]).is_none());
    }

    #[test]
    fn utf16_prefix_handles_astral_chars() {
        // "😀" is two UTF-16 units.
        assert_eq!(utf16_prefix("😀ab", 2), "😀");
        assert_eq!(utf16_prefix("/stop", 5), "/stop");
        assert_eq!(utf16_prefix("/stop", 50), "/stop");
    }

    #[test]
    fn split_respects_limit_and_char_boundaries() {
        assert!(split_message("", 10).is_empty());
        assert_eq!(split_message("short", 10), vec!["short"]);

        let text = "ж".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks[2].chars().count(), 5);
        assert_eq!(chunks.concat(), text);
    }

    #[tokio::test]
    async fn connect_learns_mention() {
        let (config, _bot) = spawn_bot(MockBot::default()).await;
        let channel = TelegramChannel::connect(config).await.unwrap();
        assert_eq!(channel.name(), "telegram");
        assert_eq!(channel.mention(), "@relay_bot");
        assert!(channel.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn connect_with_unreachable_api_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = TelegramConfig {
            api_base: format!("http://{addr}"),
            ..TelegramConfig::new("SECRET-TOKEN")
        };
        let err = TelegramChannel::connect(config).await.err().unwrap();
        assert!(matches!(err, ChannelError::Api { .. }));
        assert!(!err.to_string().contains("SECRET-TOKEN"));
    }

    #[tokio::test]
    async fn polling_yields_text_messages_and_advances_offset() {
        let bot = MockBot::default();
        bot.batches.lock().unwrap().push_back(json!([
            text_update(100, json!({"id": 1, "type": "private"}), 1, "/start"),
            {"update_id": 101, "message": {"message_id": 5, "chat": {"id": 1, "type": "private"}, "date": 0}},
            text_update(102, json!({"id": -9, "type": "group"}), 2, "@relay_bot hello")
        ]));
        let (config, bot) = spawn_bot(bot).await;
        let channel = TelegramChannel::connect(config).await.unwrap();
        let mut rx = channel.start().await.unwrap();

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.text, "/start");
        let second = rx.recv().await.unwrap().unwrap();
        assert_eq!(second.chat_id, -9);
        assert_eq!(second.text, "@relay_bot hello");

        for _ in 0..100 {
            if bot.offsets.lock().unwrap().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let offsets = bot.offsets.lock().unwrap().clone();
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[1], 103);

        channel.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_ends_the_stream() {
        let (config, _bot) = spawn_bot(MockBot::default()).await;
        let channel = TelegramChannel::connect(config).await.unwrap();
        let mut rx = channel.start().await.unwrap();
        channel.stop().await.unwrap();

        let end = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn send_splits_long_replies() {
        let (config, bot) = spawn_bot(MockBot::default()).await;
        let channel = TelegramChannel::connect(config).await.unwrap();

        let text = "a".repeat(MESSAGE_LIMIT + 10);
        channel
            .send(&OutboundMessage::reply(-9, 77, text))
            .await
            .unwrap();

        let sent = bot.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["chat_id"], -9);
        assert_eq!(sent[0]["reply_to_message_id"], 77);
        assert_eq!(sent[0]["text"].as_str().unwrap().len(), MESSAGE_LIMIT);
        assert!(sent[1].get("reply_to_message_id").is_none());
        assert_eq!(sent[1]["text"].as_str().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn rejected_send_is_delivery_failure() {
        let (config, _bot) = spawn_bot(MockBot {
            reject_sends: true,
            ..MockBot::default()
        })
        .await;
        let channel = TelegramChannel::connect(config).await.unwrap();

        let err = channel
            .send(&OutboundMessage::new(1, "hello"))
            .await
            .unwrap_err();
        match err {
            ChannelError::DeliveryFailed { channel, reason } => {
                assert_eq!(channel, "telegram");
                assert!(reason.contains("chat not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_text_is_not_sent() {
        let (config, bot) = spawn_bot(MockBot::default()).await;
        let channel = TelegramChannel::connect(config).await.unwrap();
        assert!(channel.send(&OutboundMessage::new(1, "")).await.is_err());
        assert!(bot.sent.lock().unwrap().is_empty());
    }
}
