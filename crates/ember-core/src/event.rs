//! Out-of-band events and the normalizer output type.

use std::fmt;

use serde_json::{Map, Value};

use crate::message::NormalizedMessage;

/// Backend-agnostic signal that is not a chat message (session lifecycle,
/// platform pushes such as member joins).
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub bot_id: String,
    pub platform: String,
    pub event_name: String,
    pub payload: Map<String, Value>,
}

impl NormalizedEvent {
    pub fn new(
        bot_id: impl Into<String>,
        platform: impl Into<String>,
        event_name: impl Into<String>,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            platform: platform.into(),
            event_name: event_name.into(),
            payload: Map::new(),
        }
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Looks up a top-level payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

impl fmt::Display for NormalizedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bot:{} Event:{}", self.bot_id, self.event_name)
    }
}

/// What a normalizer yields for one data frame.
#[derive(Debug, Clone)]
pub enum Inbound {
    Message(NormalizedMessage),
    Event(NormalizedEvent),
}

impl Inbound {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::Message(_) => "message",
            Inbound::Event(_) => "event",
        }
    }
}

impl From<NormalizedMessage> for Inbound {
    fn from(message: NormalizedMessage) -> Self {
        Inbound::Message(message)
    }
}

impl From<NormalizedEvent> for Inbound {
    fn from(event: NormalizedEvent) -> Self {
        Inbound::Event(event)
    }
}
