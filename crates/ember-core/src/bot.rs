//! Bot, adapter and inbound-handler traits.
//!
//! An [`Adapter`] owns the connection to one backend account and pushes every
//! normalized [`Inbound`] item into an [`InboundHandler`] (normally the
//! framework's dispatcher). Handlers answer through the adapter's [`Bot`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ControlPlaneError, ControlPlaneResult, GatewayResult};
use crate::event::Inbound;
use crate::message::{NormalizedMessage, Reply};

/// Destination of a message sent without an inbound message to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A group channel.
    Channel(String),
    /// A direct conversation with a user.
    User(String),
}

impl Target {
    pub fn channel(id: impl Into<String>) -> Self {
        Self::Channel(id.into())
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// Picks the channel when one is given, else a direct conversation with
    /// the user.
    pub fn from_ids(channel_id: &str, user_id: &str) -> ControlPlaneResult<Self> {
        match (channel_id.is_empty(), user_id.is_empty()) {
            (false, _) => Ok(Self::channel(channel_id)),
            (true, false) => Ok(Self::user(user_id)),
            (true, true) => Err(ControlPlaneError::MissingTarget("channel_id or user_id")),
        }
    }

    /// The conversation a reply to `message` belongs to.
    pub fn reply_to(message: &NormalizedMessage) -> Self {
        if message.is_direct {
            Self::user(message.sender.user_id.as_str())
        } else {
            Self::channel(message.channel_id.as_str())
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Channel(id) | Self::User(id) => id,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

/// Outbound side of one backend account.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Returns the bot's account id.
    fn id(&self) -> &str;

    /// Returns the platform name (e.g. `"kook"`).
    fn platform(&self) -> &str;

    /// Sends `reply` to the conversation `message` came from.
    ///
    /// Returns the id of the last message created, if the backend reports one.
    async fn send(
        &self,
        message: &NormalizedMessage,
        reply: &Reply,
    ) -> ControlPlaneResult<Option<String>>;

    /// Sends `reply` to `target` without an inbound message to answer.
    ///
    /// Quoting is ignored since there is nothing to quote.
    async fn send_to(&self, target: &Target, reply: &Reply) -> ControlPlaneResult<Option<String>>;

    /// Deletes a previously sent message.
    async fn recall(&self, message_id: &str) -> ControlPlaneResult<()>;
}

/// Type alias for a shared bot.
pub type BoxedBot = Arc<dyn Bot>;

/// Receives normalized inbound traffic.
///
/// Called from worker tasks, never from the receive loop itself, so an
/// implementation may take as long as it needs.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, inbound: Inbound);
}

/// Type alias for a shared inbound handler.
pub type BoxedInboundHandler = Arc<dyn InboundHandler>;

/// A backend account with a supervised gateway connection.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Returns the adapter name (e.g. `"kook"`).
    fn name(&self) -> &str;

    /// Returns the outbound bot for this account.
    fn bot(&self) -> BoxedBot;

    /// Runs the supervised connection loop until [`Adapter::close`] is called.
    async fn connect(&self, handler: BoxedInboundHandler) -> GatewayResult<()>;

    /// Stops the connection loop and closes the live connection.
    async fn close(&self);
}

/// Type alias for a shared adapter.
pub type BoxedAdapter = Arc<dyn Adapter>;
