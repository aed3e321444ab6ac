//! KOOK event payloads to [`Inbound`] items.
//!
//! Payload shape (the `d` field of a data frame):
//!
//! ```json
//! {
//!   "channel_type": "GROUP",
//!   "type": 9,
//!   "target_id": "channel id",
//!   "author_id": "user id",
//!   "content": "(met)bot(met) hello",
//!   "msg_id": "...",
//!   "msg_timestamp": 1700000000000,
//!   "extra": {
//!     "guild_id": "...",
//!     "author": { "id": "...", "username": "...", "nickname": "...", "avatar": "..." },
//!     "mention": ["bot"],
//!     "mention_all": false,
//!     "attachments": { "type": "image", "url": "...", "name": "..." }
//!   }
//! }
//! ```
//!
//! System messages (`type == 255`) become events named after `extra.type`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};
use tracing::trace;

use ember_core::{
    Attachment, Inbound, MessageText, NormalizeError, NormalizedEvent, NormalizedMessage,
};
use ember_gateway::Normalizer;

use crate::bot::BotIdentity;

const PLATFORM: &str = "kook";
const SYSTEM_MESSAGE: i64 = 255;
const IMAGE_MESSAGE: i64 = 2;

/// Maps KOOK payloads for one bot account.
pub struct KookNormalizer {
    identity: Arc<BotIdentity>,
}

impl KookNormalizer {
    pub fn new(identity: Arc<BotIdentity>) -> Self {
        Self { identity }
    }

    fn event(&self, payload: &Value) -> NormalizedEvent {
        let extra = payload.get("extra");
        let event_name = extra
            .and_then(|e| e.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        let mut fields = extra
            .and_then(|e| e.get("body"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new);
        for key in ["channel_type", "target_id", "msg_id", "msg_timestamp"] {
            if let Some(value) = payload.get(key) {
                fields.entry(key).or_insert_with(|| value.clone());
            }
        }

        NormalizedEvent::new(self.identity.id(), PLATFORM, event_name).with_payload(fields)
    }

    fn message(&self, payload: &Value, msg_type: i64, author_id: &str) -> NormalizedMessage {
        let self_id = self.identity.id();
        let extra = payload.get("extra").cloned().unwrap_or(Value::Null);
        let content = str_field(payload, "content");
        let is_direct = str_field(payload, "channel_type") == "PERSON";

        let mut message = NormalizedMessage::new(self_id, author_id, "")
            .with_platform(PLATFORM)
            .with_message_id(str_field(payload, "msg_id"));
        message.message_type = str_field(payload, "channel_type").to_lowercase();
        message.is_direct = is_direct;
        if !is_direct {
            message.channel_id = str_field(payload, "target_id").to_string();
        }
        message.guild_id = str_field(&extra, "guild_id").to_string();

        if let Some(ms) = payload.get("msg_timestamp").and_then(Value::as_u64) {
            message.received_at = UNIX_EPOCH + Duration::from_millis(ms);
        } else {
            message.received_at = SystemTime::now();
        }

        let author = extra.get("author").cloned().unwrap_or(Value::Null);
        message.sender.nickname = Some(str_field(&author, "nickname"))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| str_field(&author, "username"))
            .to_string();
        message.sender.avatar = author
            .get("avatar")
            .and_then(Value::as_str)
            .map(str::to_string);

        let (text, inline_mentions) = strip_mentions(content);
        let mut targets: Vec<String> = extra
            .get("mention")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(id_string).collect())
            .unwrap_or_default();
        for id in inline_mentions {
            if !targets.contains(&id) {
                targets.push(id);
            }
        }
        message.mentions.at_me = targets.iter().any(|id| id == self_id);
        message.mentions.all = bool_field(&extra, "mention_all") || bool_field(&extra, "mention_here");
        message.mentions.targets = targets;

        if msg_type == IMAGE_MESSAGE {
            message.attachments.images.push(Attachment::new(content));
            message.text = MessageText::new(content, "");
        } else {
            message.text = MessageText::new(content, text);
        }

        if let Some(attachment) = extra.get("attachments") {
            let url = str_field(attachment, "url");
            if !url.is_empty() && msg_type != IMAGE_MESSAGE {
                let mut item = Attachment::new(url);
                let name = str_field(attachment, "name");
                if !name.is_empty() {
                    item = item.with_filename(name);
                }
                match str_field(attachment, "type") {
                    "image" => message.attachments.images.push(item),
                    "video" => message.attachments.video.push(item),
                    "audio" => message.attachments.audio.push(item),
                    _ => message.attachments.files.push(item),
                }
            }
        }

        message.raw = Some(payload.clone());
        message
    }
}

impl Normalizer for KookNormalizer {
    fn normalize(&self, payload: &Value) -> Result<Option<Inbound>, NormalizeError> {
        let msg_type = payload
            .get("type")
            .and_then(Value::as_i64)
            .ok_or_else(|| NormalizeError::new("missing field `type`"))?;

        if msg_type == SYSTEM_MESSAGE {
            return Ok(Some(self.event(payload).into()));
        }

        let author_id = payload
            .get("author_id")
            .and_then(id_string)
            .ok_or_else(|| NormalizeError::new("missing field `author_id`"))?;
        if author_id == self.identity.id() {
            trace!(msg_id = %str_field(payload, "msg_id"), "Dropping own message");
            return Ok(None);
        }

        Ok(Some(self.message(payload, msg_type, &author_id).into()))
    }
}

/// Removes `(met)id(met)` tokens and returns the remaining text with the ids.
pub fn strip_mentions(content: &str) -> (String, Vec<String>) {
    const TAG: &str = "(met)";
    let mut text = String::with_capacity(content.len());
    let mut ids = Vec::new();
    let mut rest = content;

    while let Some(start) = rest.find(TAG) {
        let after = &rest[start + TAG.len()..];
        let Some(end) = after.find(TAG) else {
            break;
        };
        text.push_str(&rest[..start]);
        ids.push(after[..end].to_string());
        rest = &after[end + TAG.len()..];
    }
    text.push_str(rest);

    (text.split_whitespace().collect::<Vec<_>>().join(" "), ids)
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn bool_field(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// KOOK ids are strings, but some payloads carry them as numbers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn normalizer() -> KookNormalizer {
        let identity = BotIdentity::new("configured");
        identity.resolve("999");
        KookNormalizer::new(identity)
    }

    fn group_text(content: &str) -> Value {
        json!({
            "channel_type": "GROUP",
            "type": 9,
            "target_id": "c1",
            "author_id": "42",
            "content": content,
            "msg_id": "m1",
            "msg_timestamp": 1_700_000_000_000u64,
            "extra": {
                "guild_id": "g1",
                "author": {"id": "42", "username": "doctor", "nickname": "Dr", "avatar": "https://a/1.png"},
                "mention": ["999"],
                "mention_all": false
            }
        })
    }

    fn message(inbound: Option<Inbound>) -> NormalizedMessage {
        match inbound {
            Some(Inbound::Message(message)) => message,
            other => panic!("expected a message, got {other:?}"),
        }
    }

    #[test]
    fn group_kmarkdown_message() {
        let msg = message(normalizer().normalize(&group_text("(met)999(met) hello  there")).unwrap());

        assert_eq!(msg.bot_id, "999");
        assert_eq!(msg.platform, "kook");
        assert_eq!(msg.text(), "hello there");
        assert_eq!(msg.text.original, "(met)999(met) hello  there");
        assert!(msg.mentions.at_me);
        assert_eq!(msg.mentions.targets, vec!["999"]);
        assert_eq!(msg.channel_id, "c1");
        assert_eq!(msg.guild_id, "g1");
        assert!(!msg.is_direct);
        assert_eq!(msg.sender.nickname, "Dr");
        assert_eq!(msg.sender.avatar.as_deref(), Some("https://a/1.png"));
        assert_eq!(
            msg.received_at,
            UNIX_EPOCH + Duration::from_millis(1_700_000_000_000)
        );
        assert!(msg.raw.is_some());
    }

    #[test]
    fn direct_message_has_no_channel() {
        let mut payload = group_text("hi");
        payload["channel_type"] = json!("PERSON");
        payload["extra"]["mention"] = json!([]);

        let msg = message(normalizer().normalize(&payload).unwrap());
        assert!(msg.is_direct);
        assert!(msg.channel_id.is_empty());
        assert!(!msg.mentions.at_me);
        assert_eq!(msg.reply_target(), "42");
    }

    #[test]
    fn own_messages_are_dropped() {
        let mut payload = group_text("echo");
        payload["author_id"] = json!("999");
        assert!(normalizer().normalize(&payload).unwrap().is_none());
    }

    #[test]
    fn image_message_becomes_attachment() {
        let mut payload = group_text("https://img/1.png");
        payload["type"] = json!(2);
        payload["extra"]["attachments"] = json!({"type": "image", "url": "https://img/1.png"});

        let msg = message(normalizer().normalize(&payload).unwrap());
        assert!(msg.text().is_empty());
        assert_eq!(msg.attachments.images, vec![Attachment::new("https://img/1.png")]);
    }

    #[test]
    fn file_attachment_keeps_name() {
        let mut payload = group_text("report");
        payload["type"] = json!(4);
        payload["extra"]["attachments"] =
            json!({"type": "file", "url": "https://f/r.pdf", "name": "r.pdf"});

        let msg = message(normalizer().normalize(&payload).unwrap());
        assert_eq!(
            msg.attachments.files,
            vec![Attachment::new("https://f/r.pdf").with_filename("r.pdf")]
        );
    }

    #[test]
    fn system_message_becomes_event() {
        let payload = json!({
            "channel_type": "GROUP",
            "type": 255,
            "target_id": "g1",
            "author_id": "1",
            "content": "[系统消息]",
            "msg_id": "m2",
            "extra": {"type": "joined_guild", "body": {"user_id": "42"}}
        });

        match normalizer().normalize(&payload).unwrap() {
            Some(Inbound::Event(event)) => {
                assert_eq!(event.event_name, "joined_guild");
                assert_eq!(event.bot_id, "999");
                assert_eq!(event.get("user_id"), Some(&json!("42")));
                assert_eq!(event.get("target_id"), Some(&json!("g1")));
            }
            other => panic!("expected an event, got {other:?}"),
        }
    }

    #[test]
    fn missing_type_is_an_error() {
        assert!(normalizer().normalize(&json!({"author_id": "1"})).is_err());
        assert!(normalizer().normalize(&json!({"type": 1})).is_err());
    }

    #[test]
    fn strips_every_mention_token() {
        let (text, ids) = strip_mentions("(met)1(met)hi (met)2(met) there (met)unclosed");
        assert_eq!(text, "hi there (met)unclosed");
        assert_eq!(ids, vec!["1", "2"]);
    }
}
