//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, EmberConfig, GatewaySettings, LogOutput, LoggingConfig};

/// Adapter names `EmberRuntime` knows how to build.
pub const KNOWN_ADAPTERS: &[&str] = &["kook"];

/// Validates the entire configuration.
pub fn validate_config(config: &EmberConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_gateway_settings(&config.gateway)?;
    validate_bots_config(&config.bots)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_gateway_settings(gateway: &GatewaySettings) -> ConfigResult<()> {
    let intervals = [
        ("gateway.heartbeat_interval", gateway.heartbeat_interval),
        ("gateway.ack_timeout", gateway.ack_timeout),
        ("gateway.reconnect_delay", gateway.reconnect_delay),
    ];
    for (field, secs) in intervals {
        if secs == 0 {
            return Err(ConfigError::validation(format!(
                "{field} must be greater than 0"
            )));
        }
    }

    if gateway.max_in_flight == 0 {
        return Err(ConfigError::validation(
            "gateway.max_in_flight must be greater than 0",
        ));
    }
    if gateway.queue_capacity == 0 {
        return Err(ConfigError::validation(
            "gateway.queue_capacity must be greater than 0",
        ));
    }

    Ok(())
}

/// Validates all bot configurations.
fn validate_bots_config(bots: &[BotConfig]) -> ConfigResult<()> {
    let mut seen_ids = HashSet::new();

    for bot in bots {
        if !seen_ids.insert(bot.id.as_str()) {
            return Err(ConfigError::DuplicateBotId(bot.id.clone()));
        }

        validate_bot_config(bot)?;
    }

    Ok(())
}

/// Validates a single bot configuration.
fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.id.is_empty() {
        return Err(ConfigError::missing_field("bots.id"));
    }

    if bot.id.contains(char::is_whitespace) {
        return Err(ConfigError::validation(format!(
            "Bot id `{}` cannot contain whitespace",
            bot.id
        )));
    }

    if !KNOWN_ADAPTERS.contains(&bot.adapter.as_str()) {
        return Err(ConfigError::InvalidAdapterType(bot.adapter.clone()));
    }

    // Disabled bots may keep a placeholder token.
    if bot.enabled && bot.token.trim().is_empty() {
        return Err(ConfigError::missing_field(format!("bots[{}].token", bot.id)));
    }

    if let Some(url) = &bot.base_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        return Err(ConfigError::validation(format!(
            "base_url must start with http:// or https://, got `{url}`"
        )));
    }

    Ok(())
}
