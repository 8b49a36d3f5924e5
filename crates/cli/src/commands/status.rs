//! `chatrelay status` — Show the effective configuration.

use chatrelay_channels::{TelegramChannel, TelegramConfig};
use chatrelay_config::AppConfig;
use chatrelay_core::{Channel, Provider};
use chatrelay_providers::OpenRouterProvider;

pub async fn run(config: &AppConfig, probe: bool) -> Result<(), Box<dyn std::error::Error>> {
    let telegram_token = config.telegram_token();
    let openrouter_key = config.openrouter_key();

    println!("chatrelay status");
    println!("================");
    println!("  Telegram token:  {}", if telegram_token.is_ok() { "set" } else { "missing" });
    println!("  OpenRouter key:  {}", if openrouter_key.is_ok() { "set" } else { "missing" });
    println!("  Model:           {}", config.openrouter.model);
    println!("  Admins:          {}", config.bot.admin_ids.len());
    println!("  Max history:     {}", config.bot.max_history);
    println!("  Workers:         {}", config.bot.workers);
    println!(
        "  Metrics:         {}",
        if config.metrics.enabled {
            config.metrics.listen.as_str()
        } else {
            "disabled"
        }
    );

    println!("\n{}", config.redacted_toml());

    if !probe {
        return Ok(());
    }

    println!("Probing APIs...");

    match telegram_token {
        Ok(token) => {
            let connected = TelegramChannel::connect(TelegramConfig {
                bot_token: token.to_string(),
                api_base: config.telegram.api_base.clone(),
                poll_timeout_secs: config.telegram.poll_timeout_secs,
            })
            .await;
            match connected {
                Ok(channel) => println!("  ✅ Telegram: connected as {}", channel.mention()),
                Err(e) => println!("  ❌ Telegram: {e}"),
            }
        }
        Err(e) => println!("  ⚠️  Telegram: {e}"),
    }

    match openrouter_key {
        Ok(key) => {
            let provider = OpenRouterProvider::new(key, config.openrouter.model.as_str())?
                .with_base_url(config.openrouter.base_url.as_str())
                .with_timeout(config.openrouter.request_timeout_secs);
            match provider.health_check().await {
                Ok(true) => println!("  ✅ OpenRouter: reachable"),
                Ok(false) => println!("  ❌ OpenRouter: credentials rejected"),
                Err(e) => println!("  ❌ OpenRouter: {e}"),
            }
        }
        Err(e) => println!("  ⚠️  OpenRouter: {e}"),
    }

    Ok(())
}
