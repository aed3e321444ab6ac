//! Outbound side of a KOOK account.
//!
//! Replies are rendered as one KMarkdown message carrying the mentions and
//! text, followed by one image message per image. Only the first message
//! quotes the original when the reply is quoted.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::debug;

use ember_core::{Bot, ControlPlaneError, ControlPlaneResult, NormalizedMessage, Reply, Target};

use crate::api::{KookApi, KookMessageType};

// =============================================================================
// BotIdentity
// =============================================================================

/// The account id, configured up front and confirmed once by `/user/me`.
#[derive(Debug)]
pub struct BotIdentity {
    configured: String,
    resolved: OnceLock<String>,
}

impl BotIdentity {
    pub fn new(configured: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            configured: configured.into(),
            resolved: OnceLock::new(),
        })
    }

    /// The reported id if known, else the configured one.
    pub fn id(&self) -> &str {
        self.resolved.get().unwrap_or(&self.configured)
    }

    /// Records the id reported by the backend. Later calls are ignored.
    pub fn resolve(&self, id: impl Into<String>) {
        let _ = self.resolved.set(id.into());
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}

// =============================================================================
// KookBot
// =============================================================================

/// [`Bot`] implementation for KOOK.
pub struct KookBot {
    identity: Arc<BotIdentity>,
    api: KookApi,
}

impl KookBot {
    pub fn new(identity: Arc<BotIdentity>, api: KookApi) -> Self {
        Self { identity, api }
    }

    pub fn api(&self) -> &KookApi {
        &self.api
    }

    /// Sends the KMarkdown part, then one message per image.
    async fn deliver(
        &self,
        target: &Target,
        reply: &Reply,
        mut quote: Option<&str>,
    ) -> ControlPlaneResult<Option<String>> {
        let mut last = None;

        let content = render_kmarkdown(reply);
        if !content.is_empty() {
            last = self
                .create(target, KookMessageType::KMarkdown, &content, quote.take())
                .await?;
        }
        for image in &reply.images {
            last = self
                .create(target, KookMessageType::Image, image, quote.take())
                .await?;
        }
        Ok(last)
    }

    async fn create(
        &self,
        target: &Target,
        msg_type: KookMessageType,
        content: &str,
        quote: Option<&str>,
    ) -> ControlPlaneResult<Option<String>> {
        match target {
            Target::User(id) => {
                let id = non_empty(id, "user_id")?;
                self.api
                    .create_direct_message(id, msg_type, content, quote)
                    .await
            }
            Target::Channel(id) => {
                let id = non_empty(id, "channel_id")?;
                self.api.create_message(id, msg_type, content, quote).await
            }
        }
    }
}

fn non_empty<'a>(value: &'a str, name: &'static str) -> ControlPlaneResult<&'a str> {
    if value.is_empty() {
        Err(ControlPlaneError::MissingTarget(name))
    } else {
        Ok(value)
    }
}

/// Renders mentions and text as KMarkdown.
pub fn render_kmarkdown(reply: &Reply) -> String {
    let mut content: String = reply
        .mentions
        .iter()
        .map(|id| format!("(met){id}(met) "))
        .collect();
    content.push_str(&reply.text);
    content.trim_end().to_string()
}

#[async_trait]
impl Bot for KookBot {
    fn id(&self) -> &str {
        self.identity.id()
    }

    fn platform(&self) -> &str {
        "kook"
    }

    async fn send(
        &self,
        message: &NormalizedMessage,
        reply: &Reply,
    ) -> ControlPlaneResult<Option<String>> {
        let quote = reply
            .quote
            .then_some(message.message_id.as_str())
            .filter(|id| !id.is_empty());
        let last = self.deliver(&Target::reply_to(message), reply, quote).await?;

        debug!(
            bot_id = %self.id(),
            target = %message.reply_target(),
            images = reply.images.len(),
            "Reply delivered"
        );
        Ok(last)
    }

    async fn send_to(&self, target: &Target, reply: &Reply) -> ControlPlaneResult<Option<String>> {
        let last = self.deliver(target, reply, None).await?;
        debug!(
            bot_id = %self.id(),
            target = %target.id(),
            direct = target.is_direct(),
            "Message delivered"
        );
        Ok(last)
    }

    async fn recall(&self, message_id: &str) -> ControlPlaneResult<()> {
        self.api.delete_message(message_id).await
    }
}
