//! Gateway wire frames.
//!
//! Every frame is a JSON object `{ "s": kind, "d": payload, "sn": sequence }`.
//! `d` and `sn` are optional; an unknown `s` makes the frame malformed.

use serde::Deserialize;
use serde_json::{Map, Value};

use ember_core::{GatewayError, GatewayResult};

/// Frame kinds, keyed by the `s` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Data frame carrying one platform event.
    Event = 0,
    /// Handshake result; `d.code == 0` means success.
    Hello = 1,
    /// Heartbeat sent by the client.
    Ping = 2,
    /// Heartbeat acknowledgement.
    Pong = 3,
    /// Resume request sent by the client.
    Resume = 4,
    /// The backend requires a fresh session.
    Reconnect = 5,
    /// The backend accepted a resume.
    ResumeAck = 6,
}

impl FrameKind {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FrameKind::Event => "event",
            FrameKind::Hello => "hello",
            FrameKind::Ping => "ping",
            FrameKind::Pong => "pong",
            FrameKind::Resume => "resume",
            FrameKind::Reconnect => "reconnect",
            FrameKind::ResumeAck => "resume_ack",
        }
    }
}

impl TryFrom<u8> for FrameKind {
    type Error = GatewayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => FrameKind::Event,
            1 => FrameKind::Hello,
            2 => FrameKind::Ping,
            3 => FrameKind::Pong,
            4 => FrameKind::Resume,
            5 => FrameKind::Reconnect,
            6 => FrameKind::ResumeAck,
            other => {
                return Err(GatewayError::MalformedFrame(format!(
                    "unknown frame kind {other}"
                )));
            }
        })
    }
}

#[derive(Deserialize)]
struct RawFrame {
    s: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    sn: Option<u64>,
    #[serde(default)]
    extra: Option<Value>,
}

/// One decoded gateway frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub d: Value,
    pub sn: Option<u64>,
    pub extra: Option<Value>,
}

impl Frame {
    pub fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            d: Value::Null,
            sn: None,
            extra: None,
        }
    }

    pub fn with_data(mut self, d: Value) -> Self {
        self.d = d;
        self
    }

    pub fn with_sn(mut self, sn: Option<u64>) -> Self {
        self.sn = sn;
        self
    }

    /// Heartbeat carrying the last received sequence.
    pub fn ping(sn: Option<u64>) -> Self {
        Self::new(FrameKind::Ping).with_sn(sn)
    }

    /// Resume request carrying the last received sequence.
    pub fn resume(sn: Option<u64>) -> Self {
        Self::new(FrameKind::Resume).with_sn(sn)
    }

    /// Decodes a text frame.
    pub fn decode(text: &str) -> GatewayResult<Self> {
        let raw: RawFrame = serde_json::from_str(text)
            .map_err(|e| GatewayError::MalformedFrame(e.to_string()))?;
        Ok(Self {
            kind: FrameKind::try_from(raw.s)?,
            d: raw.d,
            sn: raw.sn,
            extra: raw.extra,
        })
    }

    /// Encodes the frame, omitting empty `d`, `sn` and `extra`.
    pub fn encode(&self) -> String {
        let mut object = Map::new();
        object.insert("s".into(), Value::from(self.kind.as_u8()));
        if !self.d.is_null() {
            object.insert("d".into(), self.d.clone());
        }
        if let Some(sn) = self.sn {
            object.insert("sn".into(), Value::from(sn));
        }
        if let Some(extra) = &self.extra {
            object.insert("extra".into(), extra.clone());
        }
        Value::Object(object).to_string()
    }

    /// `d.code` of a handshake frame, `0` when absent.
    pub fn code(&self) -> i64 {
        self.d.get("code").and_then(Value::as_i64).unwrap_or(0)
    }

    /// `d.session_id` if present.
    pub fn session_id(&self) -> Option<&str> {
        self.d.get("session_id").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_event_frame() {
        let frame = Frame::decode(r#"{"s":0,"d":{"content":"hi"},"sn":7}"#).unwrap();
        assert_eq!(frame.kind, FrameKind::Event);
        assert_eq!(frame.sn, Some(7));
        assert_eq!(frame.d, json!({"content": "hi"}));
    }

    #[test]
    fn decode_hello_without_sn() {
        let frame = Frame::decode(r#"{"s":1,"d":{"code":0,"session_id":"abc"}}"#).unwrap();
        assert_eq!(frame.kind, FrameKind::Hello);
        assert_eq!(frame.sn, None);
        assert_eq!(frame.code(), 0);
        assert_eq!(frame.session_id(), Some("abc"));
    }

    #[test]
    fn unknown_kind_and_bad_json_are_malformed() {
        assert!(matches!(
            Frame::decode(r#"{"s":9}"#),
            Err(GatewayError::MalformedFrame(_))
        ));
        assert!(matches!(
            Frame::decode("not json"),
            Err(GatewayError::MalformedFrame(_))
        ));
    }

    #[test]
    fn encode_omits_empty_fields() {
        assert_eq!(Frame::ping(Some(12)).encode(), r#"{"s":2,"sn":12}"#);
        assert_eq!(Frame::ping(None).encode(), r#"{"s":2}"#);
        assert_eq!(Frame::resume(Some(3)).encode(), r#"{"s":4,"sn":3}"#);
    }
}
