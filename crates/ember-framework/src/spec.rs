//! Message handler specifications and keyword verification.
//!
//! A [`HandlerSpec`] pairs a predicate (keywords, a custom verify function or
//! nothing at all for a catch-all) with the handler to run and the options
//! that decide whether it is a candidate for a given message: its group,
//! level, directness flags and prefix policy.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use ember_core::{Keypoint, NormalizedMessage, VerifyResult};

use crate::handler::{
    BoxedMessageHandler, BoxedVerify, IntoReply, MessageContext, into_message_handler, into_verify,
};

/// Weight of a keyword match.
pub const KEYWORD_WEIGHT: f64 = 1.0;

/// Weight of a handler without keywords or verify function.
pub const CATCH_ALL_WEIGHT: f64 = 0.0;

// ============================================================================
// Keywords
// ============================================================================

/// One keyword a handler responds to.
#[derive(Debug, Clone)]
pub enum Keyword {
    /// Text contains the keyword.
    Contains(String),
    /// Text equals the keyword after trimming.
    Equals(String),
    /// Text matches the pattern anywhere.
    Pattern(Regex),
}

impl Keyword {
    /// Compiles a pattern keyword.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Keyword::Pattern(Regex::new(pattern)?))
    }

    /// Returns what matched, or `None`.
    pub fn find(&self, text: &str) -> Option<Keypoint> {
        match self {
            Keyword::Contains(keyword) => text
                .contains(keyword.as_str())
                .then(|| Keypoint::Keyword(keyword.clone())),
            Keyword::Equals(keyword) => {
                (text.trim() == keyword).then(|| Keypoint::Keyword(keyword.clone()))
            }
            Keyword::Pattern(regex) => regex.captures(text).map(|caps| {
                Keypoint::Captures(
                    caps.iter()
                        .map(|group| group.map(|m| m.as_str().to_string()))
                        .collect(),
                )
            }),
        }
    }
}

impl From<&str> for Keyword {
    fn from(keyword: &str) -> Self {
        Keyword::Contains(keyword.to_string())
    }
}

impl From<String> for Keyword {
    fn from(keyword: String) -> Self {
        Keyword::Contains(keyword)
    }
}

impl From<Regex> for Keyword {
    fn from(regex: Regex) -> Self {
        Keyword::Pattern(regex)
    }
}

// ============================================================================
// Prefix policy and groups
// ============================================================================

/// Whether a message must start with a prefix keyword.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckPrefix {
    /// Use the group's policy, disabled when the group has none.
    #[default]
    Inherit,
    Disabled,
    /// Require one of the owner's prefix keywords.
    Enabled,
    /// Require one of these prefixes.
    Custom(Vec<String>),
}

impl From<bool> for CheckPrefix {
    fn from(enabled: bool) -> Self {
        if enabled {
            CheckPrefix::Enabled
        } else {
            CheckPrefix::Disabled
        }
    }
}

impl From<&str> for CheckPrefix {
    fn from(prefix: &str) -> Self {
        CheckPrefix::Custom(vec![prefix.to_string()])
    }
}

impl From<Vec<String>> for CheckPrefix {
    fn from(prefixes: Vec<String>) -> Self {
        CheckPrefix::Custom(prefixes)
    }
}

impl<const N: usize> From<[&str; N]> for CheckPrefix {
    fn from(prefixes: [&str; N]) -> Self {
        CheckPrefix::Custom(prefixes.iter().map(|p| p.to_string()).collect())
    }
}

/// Options shared by every handler registered with the same group id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub group_id: String,
    #[serde(default = "default_true")]
    pub allow_direct: bool,
    #[serde(default)]
    pub direct_only: bool,
    #[serde(default)]
    pub check_prefix: Option<CheckPrefix>,
}

fn default_true() -> bool {
    true
}

impl GroupConfig {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            allow_direct: true,
            direct_only: false,
            check_prefix: None,
        }
    }

    pub fn allow_direct(mut self, allow: bool) -> Self {
        self.allow_direct = allow;
        self
    }

    pub fn direct_only(mut self, direct_only: bool) -> Self {
        self.direct_only = direct_only;
        self
    }

    pub fn check_prefix(mut self, policy: impl Into<CheckPrefix>) -> Self {
        self.check_prefix = Some(policy.into());
        self
    }
}

// ============================================================================
// HandlerSpec
// ============================================================================

/// How a handler decides whether a message is for it.
#[derive(Clone, Default)]
pub enum Predicate {
    /// Matches every message with [`CATCH_ALL_WEIGHT`].
    #[default]
    CatchAll,
    Keywords(Vec<Keyword>),
    Verify(BoxedVerify),
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::CatchAll => f.write_str("CatchAll"),
            Predicate::Keywords(keywords) => f.debug_tuple("Keywords").field(keywords).finish(),
            Predicate::Verify(_) => f.write_str("Verify(..)"),
        }
    }
}

/// One registered message handler. Immutable once built.
pub struct HandlerSpec {
    pub name: Option<String>,
    pub predicate: Predicate,
    pub group_id: Option<String>,
    pub level: i32,
    pub allow_direct: Option<bool>,
    pub direct_only: bool,
    pub check_prefix: CheckPrefix,
    pub(crate) handler: BoxedMessageHandler,
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("name", &self.name)
            .field("predicate", &self.predicate)
            .field("group_id", &self.group_id)
            .field("level", &self.level)
            .field("allow_direct", &self.allow_direct)
            .field("direct_only", &self.direct_only)
            .field("check_prefix", &self.check_prefix)
            .finish_non_exhaustive()
    }
}

impl HandlerSpec {
    pub fn builder() -> HandlerSpecBuilder {
        HandlerSpecBuilder::default()
    }

    /// Name used in logs.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Applies the directness filter.
    ///
    /// `direct_only` handlers need a direct message. For direct messages an
    /// explicit `allow_direct` wins, then the group's setting; without
    /// either the handler is permissive.
    pub fn accepts(&self, is_direct: bool, group: Option<&GroupConfig>) -> bool {
        let direct_only = self.direct_only || group.is_some_and(|g| g.direct_only);
        if direct_only && !is_direct {
            return false;
        }
        if is_direct {
            return self
                .allow_direct
                .or(group.map(|g| g.allow_direct))
                .unwrap_or(true);
        }
        true
    }

    /// Resolves [`CheckPrefix::Inherit`] against the group.
    pub fn prefix_policy(&self, group: Option<&GroupConfig>) -> CheckPrefix {
        match &self.check_prefix {
            CheckPrefix::Inherit => match group.and_then(|g| g.check_prefix.clone()) {
                Some(CheckPrefix::Inherit) | None => CheckPrefix::Disabled,
                Some(policy) => policy,
            },
            policy => policy.clone(),
        }
    }

    /// Verifies `message` against this handler.
    ///
    /// `prefixes` is the prefix keyword set of the handler's owner.
    pub async fn verify(
        &self,
        message: &NormalizedMessage,
        prefixes: &Arc<[String]>,
        group: Option<&GroupConfig>,
    ) -> VerifyResult {
        if let Predicate::Verify(verify) = &self.predicate {
            return verify(message.clone(), prefixes.clone()).await;
        }

        let text = match self.prefix_policy(group) {
            CheckPrefix::Disabled | CheckPrefix::Inherit => Some(message.text()),
            CheckPrefix::Enabled => strip_prefix(message, prefixes),
            CheckPrefix::Custom(custom) => strip_prefix(message, &custom),
        };
        let Some(text) = text else {
            return VerifyResult::unmatched();
        };

        match &self.predicate {
            Predicate::Keywords(keywords) => keywords
                .iter()
                .find_map(|keyword| keyword.find(text))
                .map(|keypoint| VerifyResult::matched(KEYWORD_WEIGHT).with_keypoint(keypoint))
                .unwrap_or_else(VerifyResult::unmatched),
            _ => VerifyResult::matched(CATCH_ALL_WEIGHT),
        }
    }
}

/// Returns the text after the longest matching prefix.
///
/// Mentioning the bot satisfies the check without a textual prefix, and an
/// empty prefix set has nothing to require.
fn strip_prefix<'a>(message: &'a NormalizedMessage, prefixes: &[String]) -> Option<&'a str> {
    let text = message.text();
    let matched = prefixes
        .iter()
        .filter(|p| !p.is_empty() && text.starts_with(p.as_str()))
        .max_by_key(|p| p.len());

    match matched {
        Some(prefix) => Some(text[prefix.len()..].trim_start()),
        None if message.mentions.at_me || prefixes.is_empty() => Some(text),
        None => None,
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`HandlerSpec`], finished with [`handler`](Self::handler).
#[derive(Default)]
pub struct HandlerSpecBuilder {
    name: Option<String>,
    predicate: Predicate,
    group_id: Option<String>,
    level: i32,
    allow_direct: Option<bool>,
    direct_only: bool,
    check_prefix: CheckPrefix,
}

impl HandlerSpecBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the keyword predicate, replacing a verify function.
    pub fn keywords<I, K>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Keyword>,
    {
        if matches!(self.predicate, Predicate::Verify(_)) {
            warn!(handler = ?self.name, "Keywords replace the previously set verify function");
        }
        self.predicate = Predicate::Keywords(keywords.into_iter().map(Into::into).collect());
        self
    }

    /// Adds one keyword.
    pub fn keyword(self, keyword: impl Into<Keyword>) -> Self {
        let mut keywords = match self.predicate {
            Predicate::Keywords(ref existing) => existing.clone(),
            _ => Vec::new(),
        };
        keywords.push(keyword.into());
        self.keywords(keywords)
    }

    /// Sets a custom verify function, replacing keywords.
    pub fn verify<F, Fut>(mut self, verify: F) -> Self
    where
        F: Fn(NormalizedMessage, Arc<[String]>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = VerifyResult> + Send + 'static,
    {
        if matches!(self.predicate, Predicate::Keywords(_)) {
            warn!(handler = ?self.name, "Verify function replaces the previously set keywords");
        }
        self.predicate = Predicate::Verify(into_verify(verify));
        self
    }

    pub fn group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn allow_direct(mut self, allow: bool) -> Self {
        self.allow_direct = Some(allow);
        self
    }

    pub fn direct_only(mut self, direct_only: bool) -> Self {
        self.direct_only = direct_only;
        self
    }

    pub fn check_prefix(mut self, policy: impl Into<CheckPrefix>) -> Self {
        self.check_prefix = policy.into();
        self
    }

    /// Finishes the spec with its handler.
    pub fn handler<F, Fut, R>(self, handler: F) -> HandlerSpec
    where
        F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply + 'static,
    {
        HandlerSpec {
            name: self.name,
            predicate: self.predicate,
            group_id: self.group_id,
            level: self.level,
            allow_direct: self.allow_direct,
            direct_only: self.direct_only,
            check_prefix: self.check_prefix,
            handler: into_message_handler(handler),
        }
    }
}
