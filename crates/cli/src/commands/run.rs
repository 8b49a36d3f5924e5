//! `chatrelay run` — Start the bot.
//!
//! Wires the Telegram channel, the OpenRouter provider, the in-memory stores
//! and the metrics gateway together, then dispatches until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use chatrelay_agent::{Dispatcher, MessageRouter};
use chatrelay_channels::{TelegramChannel, TelegramConfig};
use chatrelay_config::AppConfig;
use chatrelay_core::{Channel, HistoryStore, Provider};
use chatrelay_gateway::GatewayState;
use chatrelay_memory::{ActivationRegistry, InMemoryHistory};
use chatrelay_providers::OpenRouterProvider;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// How long in-flight messages may run after shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bot_token = config.telegram_token()?.to_string();
    let api_key = config.openrouter_key()?;

    let metrics = if config.metrics.enabled {
        Some(chatrelay_telemetry::install_recorder()?)
    } else {
        None
    };

    let provider: Arc<dyn Provider> = Arc::new(
        OpenRouterProvider::new(api_key, config.openrouter.model.as_str())?
            .with_base_url(config.openrouter.base_url.as_str())
            .with_timeout(config.openrouter.request_timeout_secs),
    );

    let channel = Arc::new(
        TelegramChannel::connect(TelegramConfig {
            bot_token,
            api_base: config.telegram.api_base.clone(),
            poll_timeout_secs: config.telegram.poll_timeout_secs,
        })
        .await?,
    );

    let history: Arc<dyn HistoryStore> = Arc::new(InMemoryHistory::new(config.bot.max_history));
    let activation = Arc::new(ActivationRegistry::new());
    chatrelay_telemetry::set_active_chats(0);

    if config.bot.admin_ids.is_empty() {
        warn!("No admin IDs configured; nobody can activate the bot");
    }

    let router = Arc::new(MessageRouter::new(
        provider.clone(),
        history.clone(),
        activation.clone(),
        config.bot.admin_ids.iter().copied(),
        channel.mention(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let gateway = metrics.map(|handle| {
        let state = Arc::new(GatewayState::new(handle, activation.clone(), history.clone()));
        let addr = config.metrics.listen.clone();
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let stopped = async move {
                let _ = shutdown.changed().await;
            };
            if let Err(e) = chatrelay_gateway::start(&addr, state, stopped).await {
                error!(addr = %addr, error = %e, "Metrics gateway failed");
            }
        })
    });

    let inbound = channel.start().await?;
    let dispatcher = Dispatcher::new(router, channel.clone(), config.bot.workers);
    let mut dispatch = tokio::spawn(async move { dispatcher.run(inbound).await });

    info!(
        bot = channel.mention(),
        model = provider.model(),
        admins = config.bot.admin_ids.len(),
        max_history = config.bot.max_history,
        "chatrelay running"
    );

    let stream_ended = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "Failed to listen for Ctrl-C; shutting down"),
            }
            false
        }
        _ = &mut dispatch => {
            warn!("Inbound stream ended");
            true
        }
    };

    channel.stop().await?;
    if !stream_ended && tokio::time::timeout(SHUTDOWN_GRACE, dispatch).await.is_err() {
        warn!("Abandoning in-flight messages");
    }

    let _ = shutdown_tx.send(true);
    if let Some(gateway) = gateway {
        let _ = gateway.await;
    }

    info!("chatrelay stopped");
    Ok(())
}
