//! # Ember Framework
//!
//! Handler registration, plugins and dispatch for Ember bots.
//!
//! This layer provides:
//! - [`HandlerFactory`]: message, event and exception handlers, reply hooks,
//!   middleware, prefix keywords and group configuration of one registrant
//! - [`HandlerRegistry`]: the host factory merged with installed [`Plugin`]s
//! - [`Dispatcher`]: weighted handler resolution and the reply pipeline,
//!   with exception routing along the [`FaultKind`](ember_core::FaultKind)
//!   hierarchy

pub mod dispatcher;
pub mod error;
pub mod factory;
pub mod handler;
pub mod plugin;
pub mod registry;
pub mod spec;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatcher::{BoundDispatcher, DispatchOutcome, Dispatcher, Resolved};
pub use error::{RegistryError, RegistryResult};
pub use factory::HandlerFactory;
pub use handler::{
    BoxedAfterHook, BoxedBeforeHook, BoxedEventHandler, BoxedFaultHandler, BoxedMessageHandler,
    BoxedMiddleware, BoxedVerify, EventContext, FaultContext, IntoHandled, IntoReply,
    MessageContext,
};
pub use plugin::{BoxedPlugin, Plugin, PluginInstance, PluginMetadata};
pub use registry::{Candidate, FACTORY_SLOT, HandlerRegistry, Owner};
pub use spec::{
    CATCH_ALL_WEIGHT, CheckPrefix, GroupConfig, HandlerSpec, HandlerSpecBuilder, KEYWORD_WEIGHT,
    Keyword, Predicate,
};
