//! Dispatch faults and their generalization chain.
//!
//! A [`HandlerFault`] is anything raised while running the dispatch pipeline.
//! Exception handlers are keyed by [`FaultKind`]; when no handler is
//! registered for a fault's own kind, resolution walks [`FaultKind::chain`]
//! towards [`FaultKind::Any`].

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ControlPlaneError, NormalizeError, TransportError};

/// Closed set of fault kinds, each declaring its parent.
///
/// ```text
/// Any
/// ├── Io
/// │   ├── Timeout
/// │   └── Connection
/// ├── ControlPlane
/// ├── InvalidInput
/// │   └── Parse
/// ├── NotFound
/// ├── Permission
/// └── Other
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Universal catch-all.
    Any,
    Io,
    Timeout,
    Connection,
    ControlPlane,
    InvalidInput,
    Parse,
    NotFound,
    Permission,
    Other,
}

impl FaultKind {
    /// The declared parent kind, `None` only for [`FaultKind::Any`].
    pub const fn parent(self) -> Option<FaultKind> {
        match self {
            FaultKind::Any => None,
            FaultKind::Timeout | FaultKind::Connection => Some(FaultKind::Io),
            FaultKind::Parse => Some(FaultKind::InvalidInput),
            FaultKind::Io
            | FaultKind::ControlPlane
            | FaultKind::InvalidInput
            | FaultKind::NotFound
            | FaultKind::Permission
            | FaultKind::Other => Some(FaultKind::Any),
        }
    }

    /// Iterates from `self` up to and including [`FaultKind::Any`].
    pub fn chain(self) -> impl Iterator<Item = FaultKind> {
        std::iter::successors(Some(self), |kind| kind.parent())
    }

    /// Returns `true` if `self` equals `other` or descends from it.
    pub fn is_a(self, other: FaultKind) -> bool {
        self.chain().any(|kind| kind == other)
    }

    /// Short lowercase name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            FaultKind::Any => "any",
            FaultKind::Io => "io",
            FaultKind::Timeout => "timeout",
            FaultKind::Connection => "connection",
            FaultKind::ControlPlane => "control_plane",
            FaultKind::InvalidInput => "invalid_input",
            FaultKind::Parse => "parse",
            FaultKind::NotFound => "not_found",
            FaultKind::Permission => "permission",
            FaultKind::Other => "other",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised by middleware, a hook or a handler.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct HandlerFault {
    /// Kind used for exception-handler lookup.
    pub kind: FaultKind,
    /// Human readable description.
    pub message: String,
}

impl HandlerFault {
    /// Creates a fault of the given kind.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a fault of kind [`FaultKind::Other`].
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Other, message)
    }

    /// Creates a fault of kind [`FaultKind::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidInput, message)
    }

    /// Creates a fault of kind [`FaultKind::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FaultKind::NotFound, message)
    }
}

impl From<ControlPlaneError> for HandlerFault {
    fn from(err: ControlPlaneError) -> Self {
        let kind = match &err {
            ControlPlaneError::Decode(_) => FaultKind::Parse,
            ControlPlaneError::MissingTarget(_) => FaultKind::InvalidInput,
            ControlPlaneError::Transport(_) => FaultKind::Connection,
            ControlPlaneError::Api { .. } | ControlPlaneError::Http(_) => FaultKind::ControlPlane,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<TransportError> for HandlerFault {
    fn from(err: TransportError) -> Self {
        Self::new(FaultKind::Connection, err.to_string())
    }
}

impl From<NormalizeError> for HandlerFault {
    fn from(err: NormalizeError) -> Self {
        Self::new(FaultKind::Parse, err.to_string())
    }
}

impl From<serde_json::Error> for HandlerFault {
    fn from(err: serde_json::Error) -> Self {
        Self::new(FaultKind::Parse, err.to_string())
    }
}

impl From<io::Error> for HandlerFault {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::TimedOut => FaultKind::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => FaultKind::Connection,
            io::ErrorKind::NotFound => FaultKind::NotFound,
            io::ErrorKind::PermissionDenied => FaultKind::Permission,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => FaultKind::InvalidInput,
            _ => FaultKind::Io,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<String> for HandlerFault {
    fn from(message: String) -> Self {
        Self::other(message)
    }
}

impl From<&str> for HandlerFault {
    fn from(message: &str) -> Self {
        Self::other(message)
    }
}

/// Result type for everything that runs inside the dispatch pipeline.
pub type HandlerResult<T> = Result<T, HandlerFault>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_walks_to_any() {
        let chain: Vec<_> = FaultKind::Timeout.chain().collect();
        assert_eq!(chain, vec![FaultKind::Timeout, FaultKind::Io, FaultKind::Any]);

        let chain: Vec<_> = FaultKind::Any.chain().collect();
        assert_eq!(chain, vec![FaultKind::Any]);
    }

    #[test]
    fn every_kind_terminates_at_any() {
        let all = [
            FaultKind::Any,
            FaultKind::Io,
            FaultKind::Timeout,
            FaultKind::Connection,
            FaultKind::ControlPlane,
            FaultKind::InvalidInput,
            FaultKind::Parse,
            FaultKind::NotFound,
            FaultKind::Permission,
            FaultKind::Other,
        ];
        for kind in all {
            assert_eq!(kind.chain().last(), Some(FaultKind::Any), "{kind}");
            assert!(kind.is_a(FaultKind::Any));
        }
        assert!(FaultKind::Parse.is_a(FaultKind::InvalidInput));
        assert!(!FaultKind::Io.is_a(FaultKind::Timeout));
    }

    #[test]
    fn io_errors_map_to_specific_kinds() {
        let fault: HandlerFault = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert_eq!(fault.kind, FaultKind::Timeout);

        let fault: HandlerFault = io::Error::other("boom").into();
        assert_eq!(fault.kind, FaultKind::Io);
    }

    #[test]
    fn control_plane_api_error_is_control_plane_fault() {
        let fault: HandlerFault = ControlPlaneError::Api {
            code: 40100,
            message: "unauthorized".into(),
        }
        .into();
        assert_eq!(fault.kind, FaultKind::ControlPlane);
        assert!(fault.message.contains("40100"));
    }
}
