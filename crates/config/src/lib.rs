//! Configuration loading, validation, and management for chatrelay.
//!
//! Loads configuration from `./chatrelay.toml` (or `$CHATRELAY_CONFIG`),
//! then applies environment variable overrides, which is how the bot is
//! normally deployed. A `.env` file in the working directory is honoured.
//! Validates all settings at startup; the result is immutable afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `chatrelay.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Telegram Bot API settings
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Completion API settings
    #[serde(default)]
    pub openrouter: OpenRouterSettings,

    /// Access control and conversation behaviour
    #[serde(default)]
    pub bot: BotSettings,

    /// Prometheus endpoint
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Long-polling timeout passed to `getUpdates`
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".into()
}
fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &redact(&self.bot_token))
            .field("api_base", &self.api_base)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenRouterSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "deepseek/deepseek-r1-0528-qwen3-8b:free".into()
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for OpenRouterSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for OpenRouterSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterSettings")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Telegram user IDs allowed to run `/start` and `/stop` and to talk to
    /// the bot in private chats
    #[serde(default)]
    pub admin_ids: Vec<i64>,

    /// Turns kept per user (user and assistant turns both count)
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Messages processed concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Verbose logging of transport traffic
    #[serde(default)]
    pub debug: bool,
}

fn default_max_history() -> usize {
    10
}
fn default_workers() -> usize {
    8
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            admin_ids: Vec::new(),
            max_history: default_max_history(),
            workers: default_workers(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metrics_listen")]
    pub listen: String,
}

fn default_true() -> bool {
    true
}
fn default_metrics_listen() -> String {
    "0.0.0.0:2112".into()
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_metrics_listen(),
        }
    }
}

impl AppConfig {
    /// Load configuration the way the binary does:
    /// `.env` → config file → environment overrides → validation.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("CHATRELAY_CONFIG").map(PathBuf::from))
            .unwrap_or_else(Self::default_path);

        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path. Not validated: environment
    /// overrides may still replace file values.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Default config file location (working directory).
    pub fn default_path() -> PathBuf {
        PathBuf::from("chatrelay.toml")
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in
    /// production and a map in tests.
    ///
    /// Unparseable numeric or boolean values are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty()) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(base) = lookup("TELEGRAM_API_BASE").filter(|v| !v.is_empty()) {
            self.telegram.api_base = base;
        }
        if let Some(key) = lookup("OPENROUTER_API_KEY").filter(|v| !v.is_empty()) {
            self.openrouter.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENROUTER_BASE_URL").filter(|v| !v.is_empty()) {
            self.openrouter.base_url = url;
        }
        if let Some(model) = lookup("MODEL_NAME").filter(|v| !v.is_empty()) {
            self.openrouter.model = model;
        }
        if let Some(raw) = lookup("REQUEST_TIMEOUT_SECS") {
            override_parsed("REQUEST_TIMEOUT_SECS", &raw, &mut self.openrouter.request_timeout_secs);
        }
        if let Some(raw) = lookup("ADMIN_IDS") {
            self.bot.admin_ids = parse_admin_ids(&raw);
        }
        if let Some(raw) = lookup("MAX_HISTORY_SIZE") {
            override_parsed("MAX_HISTORY_SIZE", &raw, &mut self.bot.max_history);
        }
        if let Some(raw) = lookup("WORKER_COUNT") {
            override_parsed("WORKER_COUNT", &raw, &mut self.bot.workers);
        }
        if let Some(raw) = lookup("BOT_DEBUG") {
            override_flag("BOT_DEBUG", &raw, &mut self.bot.debug);
        }
        if let Some(listen) = lookup("METRICS_ADDR").filter(|v| !v.is_empty()) {
            self.metrics.listen = listen;
        }
        if let Some(raw) = lookup("METRICS_ENABLED") {
            override_flag("METRICS_ENABLED", &raw, &mut self.metrics.enabled);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.max_history == 0 {
            return Err(ConfigError::ValidationError(
                "bot.max_history must be at least 1".into(),
            ));
        }

        if self.bot.workers == 0 {
            return Err(ConfigError::ValidationError(
                "bot.workers must be at least 1".into(),
            ));
        }

        if self.openrouter.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "openrouter.request_timeout_secs must be at least 1".into(),
            ));
        }

        // Telegram caps long polling at 50 seconds.
        if self.telegram.poll_timeout_secs > 50 {
            return Err(ConfigError::ValidationError(
                "telegram.poll_timeout_secs must be 50 or less".into(),
            ));
        }

        if self.openrouter.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "openrouter.model must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// The Telegram bot token, or the error that aborts startup.
    pub fn telegram_token(&self) -> Result<&str, ConfigError> {
        self.telegram
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingCredential("TELEGRAM_BOT_TOKEN"))
    }

    /// The completion API key, or the error that aborts startup.
    pub fn openrouter_key(&self) -> Result<&str, ConfigError> {
        self.openrouter
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential("OPENROUTER_API_KEY"))
    }

    /// Generate a TOML rendering of the configuration without secrets.
    pub fn redacted_toml(&self) -> String {
        let mut copy = self.clone();
        copy.telegram.bot_token = copy.telegram.bot_token.map(|_| "[REDACTED]".into());
        copy.openrouter.api_key = copy.openrouter.api_key.map(|_| "[REDACTED]".into());
        toml::to_string_pretty(&copy).unwrap_or_default()
    }
}

/// Parse a comma-separated list of user IDs. Invalid entries are skipped
/// with a warning.
pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!("Invalid admin ID: {s}");
                None
            }
        })
        .collect()
}

fn override_parsed<T: std::str::FromStr>(key: &str, raw: &str, slot: &mut T) {
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!("Ignoring {key}={raw:?}: not a valid number"),
    }
}

fn override_flag(key: &str, raw: &str, slot: &mut bool) {
    match parse_flag(raw) {
        Some(value) => *slot = value,
        None => tracing::warn!("Ignoring {key}={raw:?}: expected true or false"),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("{0} must be set")]
    MissingCredential(&'static str),
}
