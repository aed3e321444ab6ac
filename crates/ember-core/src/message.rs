//! Canonical inbound message and generic outbound reply.
//!
//! Every backend normalizer converts its platform payloads into a
//! [`NormalizedMessage`]. Handlers answer with a [`Reply`], which the
//! backend's [`Bot`](crate::bot::Bot) renders into its own wire format.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::verify::VerifyResult;

// =============================================================================
// Text
// =============================================================================

/// The text of a message in the variants handlers match against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageText {
    /// Text exactly as received from the platform.
    pub original: String,
    /// Text after platform markup and mentions were stripped.
    pub normalized: String,
    /// `normalized` with punctuation and symbols removed.
    pub unsigned: String,
    /// ASCII digits found in `normalized`, in order.
    pub digits: String,
    /// Whitespace-separated tokens of `normalized`.
    pub words: Vec<String>,
}

impl MessageText {
    /// Builds the derived variants from the original and normalized text.
    pub fn new(original: impl Into<String>, normalized: impl Into<String>) -> Self {
        let original = original.into();
        let normalized = normalized.into().trim().to_string();

        let unsigned = normalized
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let digits = normalized.chars().filter(char::is_ascii_digit).collect();
        let words = normalized.split_whitespace().map(str::to_string).collect();

        Self {
            original,
            normalized,
            unsigned,
            digits,
            words,
        }
    }

    /// Shorthand for text that needs no normalization.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(text.clone(), text)
    }

    /// Returns `true` if the normalized text is empty.
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

impl fmt::Display for MessageText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

// =============================================================================
// Attachments, Mentions, Sender
// =============================================================================

/// A media attachment referenced by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Attachment {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// Attachments grouped by media type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachments {
    pub images: Vec<Attachment>,
    pub files: Vec<Attachment>,
    pub voice: Vec<Attachment>,
    pub audio: Vec<Attachment>,
    pub video: Vec<Attachment>,
}

impl Attachments {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
            && self.files.is_empty()
            && self.voice.is_empty()
            && self.audio.is_empty()
            && self.video.is_empty()
    }
}

/// Who a message mentions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mentions {
    /// Mentioned user ids.
    pub targets: Vec<String>,
    /// The message mentions everyone.
    pub all: bool,
    /// The receiving bot itself is among the targets.
    pub at_me: bool,
}

/// The author of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub user_id: String,
    pub nickname: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
}

// =============================================================================
// NormalizedMessage
// =============================================================================

/// Backend-agnostic inbound message.
///
/// `channel_id` and `guild_id` are empty for direct messages. `verify` is
/// filled in by the dispatcher once the winning handler has been resolved.
#[derive(Debug, Clone)]
pub struct NormalizedMessage {
    pub bot_id: String,
    pub platform: String,
    pub message_id: String,
    pub message_type: String,
    pub text: MessageText,
    pub attachments: Attachments,
    pub mentions: Mentions,
    pub sender: Sender,
    pub channel_id: String,
    pub guild_id: String,
    pub is_direct: bool,
    pub received_at: SystemTime,
    pub verify: Option<VerifyResult>,
    /// Original payload, kept for handlers that need platform specifics.
    pub raw: Option<Value>,
}

impl NormalizedMessage {
    /// Creates a message with the given bot, sender and text. Everything else
    /// starts empty.
    pub fn new(
        bot_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            platform: String::new(),
            message_id: String::new(),
            message_type: String::new(),
            text: MessageText::plain(text),
            attachments: Attachments::default(),
            mentions: Mentions::default(),
            sender: Sender {
                user_id: user_id.into(),
                ..Sender::default()
            },
            channel_id: String::new(),
            guild_id: String::new(),
            is_direct: false,
            received_at: SystemTime::now(),
            verify: None,
            raw: None,
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>, guild_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self.guild_id = guild_id.into();
        self.is_direct = false;
        self
    }

    /// Marks the message as direct and clears the channel and guild.
    pub fn direct(mut self) -> Self {
        self.is_direct = true;
        self.channel_id.clear();
        self.guild_id.clear();
        self
    }

    /// Convenience accessor for the normalized text.
    pub fn text(&self) -> &str {
        &self.text.normalized
    }

    /// Id of the conversation a reply should go to.
    pub fn reply_target(&self) -> &str {
        if self.is_direct {
            &self.sender.user_id
        } else {
            &self.channel_id
        }
    }
}

impl fmt::Display for NormalizedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bot:{} Channel:{} User:{}{}{} {}: {}",
            self.bot_id,
            self.channel_id,
            self.sender.user_id,
            if self.sender.is_admin { "(admin)" } else { "" },
            if self.is_direct { "(direct)" } else { "" },
            self.sender.nickname,
            self.text.normalized.replace('\n', " "),
        )?;
        for _ in &self.attachments.images {
            f.write_str("[image]")?;
        }
        Ok(())
    }
}

// =============================================================================
// Reply
// =============================================================================

/// Generic outbound reply, rendered by the backend's bot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub images: Vec<String>,
    /// User ids to mention ahead of the text.
    pub mentions: Vec<String>,
    /// Quote the message being answered.
    pub quote: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.images.push(url.into());
        self
    }

    pub fn mention(mut self, user_id: impl Into<String>) -> Self {
        self.mentions.push(user_id.into());
        self
    }

    pub fn quoted(mut self) -> Self {
        self.quote = true;
        self
    }

    /// Returns `true` if nothing would be sent.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty() && self.mentions.is_empty()
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::text(text)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::text(text)
    }
}
