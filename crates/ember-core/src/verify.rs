//! Outcome of a handler match attempt.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque capture describing what made a match succeed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Keypoint {
    /// The keyword that matched.
    Keyword(String),
    /// Capture groups of a matching pattern; group 0 is the whole match.
    Captures(Vec<Option<String>>),
    /// Anything a custom verify function wants to hand to its handler.
    Value(Value),
}

/// Result of verifying a message against one handler.
///
/// When `matched` is `false` the weight carries no meaning and the resolver
/// ignores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub matched: bool,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypoint: Option<Keypoint>,
}

impl VerifyResult {
    pub fn matched(weight: f64) -> Self {
        Self {
            matched: true,
            weight,
            keypoint: None,
        }
    }

    pub fn unmatched() -> Self {
        Self {
            matched: false,
            weight: 0.0,
            keypoint: None,
        }
    }

    pub fn with_keypoint(mut self, keypoint: Keypoint) -> Self {
        self.keypoint = Some(keypoint);
        self
    }

    /// Weight used for ranking, `None` when unmatched.
    pub fn rank_weight(&self) -> Option<f64> {
        self.matched.then_some(self.weight)
    }
}

impl Default for VerifyResult {
    fn default() -> Self {
        Self::unmatched()
    }
}

impl From<bool> for VerifyResult {
    fn from(matched: bool) -> Self {
        if matched {
            Self::matched(0.0)
        } else {
            Self::unmatched()
        }
    }
}
