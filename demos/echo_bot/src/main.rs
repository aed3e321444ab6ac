//! Echo Bot Example
//!
//! Registers a handful of handlers on one shared registry and runs every
//! bot configured in `ember.toml`:
//!
//! ```toml
//! [[bots]]
//! id = "1234567890"
//! token = "your-bot-token"
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --config ember.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use ember::prelude::*;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(about = "Echo bot built on Ember")]
struct Args {
    /// Configuration file; searched in the current directory when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production, ...).
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn ping(_ctx: MessageContext) -> &'static str {
    "Pong!"
}

/// Replies with the captured text of `/echo <text>`.
async fn echo(ctx: MessageContext) -> HandlerResult<Reply> {
    let Some(Keypoint::Captures(groups)) = ctx.keypoint() else {
        return Err(HandlerFault::invalid_input("echo needs text"));
    };
    let text = groups
        .get(1)
        .cloned()
        .flatten()
        .ok_or_else(|| HandlerFault::invalid_input("echo needs text"))?;
    Ok(Reply::text(text).quoted())
}

async fn help(_ctx: MessageContext) -> &'static str {
    "/echo <text> - Echo text\n/ping - Pong!\n/info - Message info\n/help - This help"
}

async fn message_info(ctx: MessageContext) -> String {
    let msg = &ctx.message;
    format!(
        "Message Info\n• Platform: {}\n• From: {} ({})\n• Channel: {}\n• Direct: {}",
        msg.platform, msg.sender.nickname, msg.sender.user_id, msg.channel_id, msg.is_direct
    )
}

/// Answers anything that mentions the bot and nothing else matched.
async fn mentioned(ctx: MessageContext) -> Option<Reply> {
    ctx.message
        .mentions
        .at_me
        .then(|| Reply::text("Try /help").mention(ctx.message.sender.user_id.clone()))
}

fn greeter_plugin() -> PluginInstance {
    let plugin = PluginInstance::new(
        PluginMetadata::new("greeter", "0.1.0")
            .with_name("Greeter")
            .with_description("Welcomes new guild members"),
    )
    .on_install(|| async {
        info!("Greeter installed");
        Ok(())
    });
    plugin.on_event(["joined_guild"], |ctx: EventContext| async move {
        info!(bot_id = %ctx.event.bot_id, payload = ?ctx.event.payload, "Someone joined a guild");
        let user_id = ctx
            .event
            .get("user_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let target = Target::from_ids("", user_id)?;
        ctx.bot
            .send_to(&target, &Reply::text("Welcome! Send /help to see what I can do."))
            .await?;
        Ok::<(), HandlerFault>(())
    });
    plugin
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let registry = Arc::new(HandlerRegistry::new());
    registry.add_prefix_keywords(["/"]);
    registry
        .on_message(
            on_message()
                .name("ping")
                .keyword(Keyword::Equals("ping".into()))
                .check_prefix(true)
                .handler(ping),
        )
        .on_message(
            on_message()
                .name("echo")
                .keyword(Keyword::pattern(r"^echo\s+(.+)$")?)
                .check_prefix(true)
                .handler(echo),
        )
        .on_message(
            on_message()
                .name("help")
                .keyword(Keyword::Equals("help".into()))
                .check_prefix(true)
                .handler(help),
        )
        .on_message(
            on_message()
                .name("info")
                .keyword(Keyword::Equals("info".into()))
                .check_prefix(true)
                .handler(message_info),
        )
        .on_message(on_message().name("mentioned").handler(mentioned));

    registry.on_exception([FaultKind::InvalidInput], |ctx: FaultContext| async move {
        if let Some(message) = &ctx.message {
            let _ = ctx.bot.send(message, &Reply::text(ctx.fault.to_string())).await;
        }
    });
    registry.on_exception([FaultKind::Any], |ctx: FaultContext| async move {
        warn!(fault = %ctx.fault, "Handler failed");
    });

    registry.install_plugin(Arc::new(greeter_plugin())).await?;

    let mut builder = EmberRuntime::builder().registry(registry);
    if let Some(path) = args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }

    builder.build()?.run().await?;
    Ok(())
}
