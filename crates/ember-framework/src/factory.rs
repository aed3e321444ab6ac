//! Handler collections owned by one registrant (the host or a plugin).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use ember_core::{FaultKind, HandlerResult, NormalizedMessage, Reply};

use crate::handler::{
    BoxedAfterHook, BoxedBeforeHook, BoxedEventHandler, BoxedFaultHandler, BoxedMiddleware,
    EventContext, FaultContext, IntoHandled, MessageContext, into_after_hook, into_before_hook,
    into_event_handler, into_fault_handler, into_middleware,
};
use crate::spec::{GroupConfig, HandlerSpec};

/// The registration surface shared by the host and every plugin.
///
/// Each collection is private to its factory. Merged views across the host
/// and installed plugins are built by
/// [`HandlerRegistry`](crate::registry::HandlerRegistry) without mutating
/// any factory.
#[derive(Default)]
pub struct HandlerFactory {
    prefix_keywords: RwLock<Vec<String>>,
    message_handlers: RwLock<Vec<Arc<HandlerSpec>>>,
    event_handlers: RwLock<HashMap<String, Vec<BoxedEventHandler>>>,
    exception_handlers: RwLock<HashMap<FaultKind, Vec<BoxedFaultHandler>>>,
    before_reply: RwLock<Vec<BoxedBeforeHook>>,
    after_reply: RwLock<Vec<BoxedAfterHook>>,
    middleware: RwLock<Vec<BoxedMiddleware>>,
    group_config: RwLock<HashMap<String, GroupConfig>>,
}

impl HandlerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// Registers a message handler.
    pub fn on_message(&self, spec: HandlerSpec) -> &Self {
        debug!(handler = %spec.display_name(), level = spec.level, "Registered message handler");
        self.message_handlers.write().push(Arc::new(spec));
        self
    }

    /// Registers an event handler for each of `events`.
    pub fn on_event<I, S, F, Fut, R>(&self, events: I, handler: F) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandled + 'static,
    {
        let handler = into_event_handler(handler);
        let mut map = self.event_handlers.write();
        for event in events {
            map.entry(event.into()).or_default().push(handler.clone());
        }
        self
    }

    /// Registers an exception handler for each of `kinds`.
    pub fn on_exception<I, F, Fut, R>(&self, kinds: I, handler: F) -> &Self
    where
        I: IntoIterator<Item = FaultKind>,
        F: Fn(FaultContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandled + 'static,
    {
        let handler = into_fault_handler(handler);
        let mut map = self.exception_handlers.write();
        for kind in kinds {
            map.entry(kind).or_default().push(handler.clone());
        }
        self
    }

    /// Registers a hook that runs before the handler; `Ok(false)` cancels.
    pub fn before_reply<F, Fut>(&self, hook: F) -> &Self
    where
        F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<bool>> + Send + 'static,
    {
        self.before_reply.write().push(into_before_hook(hook));
        self
    }

    /// Registers a hook that runs after the handler with its reply.
    pub fn after_reply<F, Fut, R>(&self, hook: F) -> &Self
    where
        F: Fn(MessageContext, Option<Reply>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoHandled + 'static,
    {
        self.after_reply.write().push(into_after_hook(hook));
        self
    }

    /// Registers a middleware that may enrich or replace inbound messages.
    pub fn middleware<F, Fut>(&self, middleware: F) -> &Self
    where
        F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<NormalizedMessage>> + Send + 'static,
    {
        self.middleware.write().push(into_middleware(middleware));
        self
    }

    pub fn set_group_config(&self, config: GroupConfig) -> &Self {
        self.group_config
            .write()
            .insert(config.group_id.clone(), config);
        self
    }

    /// Appends prefix keywords; duplicates are ignored.
    pub fn add_prefix_keywords<I, S>(&self, keywords: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes = self.prefix_keywords.write();
        for keyword in keywords {
            let keyword = keyword.into();
            if !prefixes.contains(&keyword) {
                prefixes.push(keyword);
            }
        }
        self
    }

    // ─── Snapshots ───────────────────────────────────────────────────────────

    pub fn prefix_keywords(&self) -> Vec<String> {
        self.prefix_keywords.read().clone()
    }

    pub fn message_handlers(&self) -> Vec<Arc<HandlerSpec>> {
        self.message_handlers.read().clone()
    }

    pub fn event_handlers(&self, event: &str) -> Vec<BoxedEventHandler> {
        self.event_handlers
            .read()
            .get(event)
            .cloned()
            .unwrap_or_default()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.event_handlers.read().keys().cloned().collect()
    }

    pub fn exception_handlers(&self, kind: FaultKind) -> Vec<BoxedFaultHandler> {
        self.exception_handlers
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn exception_kinds(&self) -> Vec<FaultKind> {
        self.exception_handlers.read().keys().copied().collect()
    }

    pub fn before_reply_hooks(&self) -> Vec<BoxedBeforeHook> {
        self.before_reply.read().clone()
    }

    pub fn after_reply_hooks(&self) -> Vec<BoxedAfterHook> {
        self.after_reply.read().clone()
    }

    pub fn middlewares(&self) -> Vec<BoxedMiddleware> {
        self.middleware.read().clone()
    }

    pub fn group_config(&self, group_id: &str) -> Option<GroupConfig> {
        self.group_config.read().get(group_id).cloned()
    }

    pub fn group_configs(&self) -> Vec<GroupConfig> {
        self.group_config.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_keywords_are_deduplicated() {
        let factory = HandlerFactory::new();
        factory.add_prefix_keywords(["!", "/"]);
        factory.add_prefix_keywords(vec!["/".to_string(), "#".to_string()]);
        assert_eq!(factory.prefix_keywords(), vec!["!", "/", "#"]);
    }

    #[test]
    fn keyed_handlers_register_under_every_key() {
        let factory = HandlerFactory::new();
        factory
            .on_event(["joined", "left"], |_ctx: EventContext| async {})
            .on_exception([FaultKind::Io, FaultKind::Parse], |_ctx: FaultContext| async {});

        assert_eq!(factory.event_handlers("joined").len(), 1);
        assert_eq!(factory.event_handlers("left").len(), 1);
        assert!(factory.event_handlers("other").is_empty());
        assert_eq!(factory.exception_handlers(FaultKind::Parse).len(), 1);
        assert!(factory.exception_handlers(FaultKind::Any).is_empty());
    }
}
