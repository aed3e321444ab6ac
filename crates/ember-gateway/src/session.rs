//! Per-connection session bookkeeping.

use std::fmt;

/// Lifecycle state of a gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Handshaking,
    Active,
    Resuming,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Active => "active",
            ConnectionState::Resuming => "resuming",
            ConnectionState::Reconnecting => "reconnecting",
        })
    }
}

/// What survives between connection attempts: the cached endpoint, the
/// resume token and the last received sequence number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub gateway_url: Option<String>,
    pub session_id: Option<String>,
    pub last_sequence: Option<u64>,
}

/// Outcome of [`SessionState::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed {
    /// The sequence advanced (or was the first one seen).
    Advanced,
    /// Same sequence as before.
    Repeated,
    /// Lower than the last sequence; the stored value was kept.
    Stale { last: u64 },
}

impl SessionState {
    /// Records a received sequence number. The stored value never decreases.
    pub fn observe(&mut self, sn: u64) -> Observed {
        match self.last_sequence {
            Some(last) if sn < last => Observed::Stale { last },
            Some(last) if sn == last => Observed::Repeated,
            _ => {
                self.last_sequence = Some(sn);
                Observed::Advanced
            }
        }
    }

    /// Forgets everything so the next attempt rediscovers the endpoint and
    /// performs a fresh handshake.
    pub fn reset(&mut self) {
        self.gateway_url = None;
        self.session_id = None;
        self.last_sequence = None;
    }

    /// Returns `true` if the next handshake should be followed by a resume.
    pub fn can_resume(&self) -> bool {
        self.last_sequence.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_is_monotonic() {
        let mut session = SessionState::default();
        assert_eq!(session.observe(1), Observed::Advanced);
        assert_eq!(session.observe(4), Observed::Advanced);
        assert_eq!(session.observe(4), Observed::Repeated);
        assert_eq!(session.observe(2), Observed::Stale { last: 4 });
        assert_eq!(session.last_sequence, Some(4));
    }

    #[test]
    fn reset_clears_resume_state() {
        let mut session = SessionState {
            gateway_url: Some("wss://gw".into()),
            session_id: Some("s1".into()),
            last_sequence: Some(10),
        };
        assert!(session.can_resume());
        session.reset();
        assert_eq!(session, SessionState::default());
        assert!(!session.can_resume());
    }
}
