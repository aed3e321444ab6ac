//! Host handler collections merged with installed plugins.
//!
//! Merge rules:
//!
//! | Collection | Shape | Merged view |
//! |---|---|---|
//! | message handlers, reply hooks, middleware, prefix keywords | sequence | host first, then each plugin in install order |
//! | event handlers, exception handlers | keyed multimap | union of keys, host entries first per key |
//! | group configs | keyed | host wins, then plugins in install order |
//!
//! Views are computed on demand from snapshots, so installing or uninstalling
//! a plugin immediately grows or shrinks them and no factory is ever mutated
//! by the merge itself.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use ember_core::{FaultKind, RegistrationConflict};

use crate::error::{RegistryError, RegistryResult};
use crate::factory::HandlerFactory;
use crate::handler::{
    BoxedAfterHook, BoxedBeforeHook, BoxedEventHandler, BoxedFaultHandler, BoxedMiddleware,
};
use crate::plugin::{BoxedPlugin, CombinedFactory, PluginMetadata};
use crate::spec::{GroupConfig, HandlerSpec};

/// Reserved plugin slot used by [`HandlerRegistry::combine_factory`].
pub const FACTORY_SLOT: &str = "__factory__";

/// Who registered a handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    Host,
    Plugin(String),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Host => f.write_str("host"),
            Owner::Plugin(id) => f.write_str(id),
        }
    }
}

/// A message handler in the merged view.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub owner: Owner,
    /// Position in the merged view; lower means registered earlier.
    pub index: usize,
    pub spec: Arc<HandlerSpec>,
    /// Prefix keywords of the owning factory.
    pub prefixes: Arc<[String]>,
    /// Group configuration resolved for `spec.group_id`.
    pub group: Option<GroupConfig>,
}

/// Handler collections of one bot: its own factory plus installed plugins.
///
/// Derefs to the host [`HandlerFactory`] for registration.
pub struct HandlerRegistry {
    host: Arc<HandlerFactory>,
    plugins: RwLock<Vec<BoxedPlugin>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for HandlerRegistry {
    type Target = HandlerFactory;

    fn deref(&self) -> &Self::Target {
        &self.host
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::with_factory(Arc::new(HandlerFactory::new()))
    }

    pub fn with_factory(host: Arc<HandlerFactory>) -> Self {
        Self {
            host,
            plugins: RwLock::new(Vec::new()),
        }
    }

    /// The host's own factory.
    pub fn host(&self) -> &Arc<HandlerFactory> {
        &self.host
    }

    // ─── Plugins ─────────────────────────────────────────────────────────────

    /// Installs a plugin.
    ///
    /// The plugin first receives the current merged prefix keywords, then its
    /// install hook runs; only after that does it appear in merged views.
    pub async fn install_plugin(&self, plugin: BoxedPlugin) -> RegistryResult<()> {
        let id = plugin.id().to_string();
        if id == FACTORY_SLOT {
            return Err(RegistrationConflict::ReservedSlot(id).into());
        }
        if self.contains(&id) {
            return Err(RegistrationConflict::DuplicatePlugin(id).into());
        }

        plugin.factory().add_prefix_keywords(self.prefix_keywords());
        if let Err(fault) = plugin.install().await {
            warn!(plugin = %id, error = %fault, "Plugin install hook failed");
            return Err(RegistryError::InstallFailed { id, fault });
        }

        let metadata = plugin.metadata();
        {
            let mut plugins = self.plugins.write();
            if plugins.iter().any(|p| p.id() == id) {
                return Err(RegistrationConflict::DuplicatePlugin(id).into());
            }
            plugins.push(plugin);
        }
        info!(plugin = %id, name = %metadata.name, version = %metadata.version, "Plugin installed");
        Ok(())
    }

    /// Uninstalls a plugin after running its uninstall hook.
    pub async fn uninstall_plugin(&self, id: &str) -> RegistryResult<()> {
        if id == FACTORY_SLOT {
            return Err(RegistrationConflict::ReservedSlot(id.to_string()).into());
        }
        let plugin = self
            .plugin(id)
            .ok_or_else(|| RegistrationConflict::UnknownPlugin(id.to_string()))?;

        if let Err(fault) = plugin.uninstall().await {
            warn!(plugin = %id, error = %fault, "Plugin uninstall hook failed, removing anyway");
        }
        self.plugins.write().retain(|p| p.id() != id);
        info!(plugin = %id, "Plugin uninstalled");
        Ok(())
    }

    /// Merges a bare factory under the reserved slot, replacing any previous one.
    pub fn combine_factory(&self, factory: Arc<HandlerFactory>) {
        let combined: BoxedPlugin = Arc::new(CombinedFactory {
            id: FACTORY_SLOT,
            factory,
        });
        let mut plugins = self.plugins.write();
        match plugins.iter_mut().find(|p| p.id() == FACTORY_SLOT) {
            Some(slot) => *slot = combined,
            None => plugins.push(combined),
        }
        info!("Factory combined into registry");
    }

    pub fn contains(&self, id: &str) -> bool {
        self.plugins.read().iter().any(|p| p.id() == id)
    }

    pub fn plugin(&self, id: &str) -> Option<BoxedPlugin> {
        self.plugins.read().iter().find(|p| p.id() == id).cloned()
    }

    /// Installed plugin ids in install order.
    pub fn plugin_ids(&self) -> Vec<String> {
        self.plugins.read().iter().map(|p| p.id().to_string()).collect()
    }

    /// Metadata of installed plugins, excluding the combined factory.
    pub fn plugin_metadata(&self) -> Vec<PluginMetadata> {
        self.snapshot()
            .iter()
            .filter(|p| p.id() != FACTORY_SLOT)
            .map(|p| p.metadata())
            .collect()
    }

    fn snapshot(&self) -> Vec<BoxedPlugin> {
        self.plugins.read().clone()
    }

    /// Host factory followed by each plugin's factory, with owners.
    fn factories(&self) -> Vec<(Owner, FactoryRef)> {
        let mut factories = vec![(Owner::Host, FactoryRef::Host(self.host.clone()))];
        factories.extend(
            self.snapshot()
                .into_iter()
                .map(|p| (Owner::Plugin(p.id().to_string()), FactoryRef::Plugin(p))),
        );
        factories
    }

    // ─── Merged views ────────────────────────────────────────────────────────

    /// Prefix keywords of the host and every plugin, deduplicated in order.
    pub fn prefix_keywords(&self) -> Vec<String> {
        let mut merged: Vec<String> = Vec::new();
        for (_, factory) in self.factories() {
            for keyword in factory.get().prefix_keywords() {
                if !merged.contains(&keyword) {
                    merged.push(keyword);
                }
            }
        }
        merged
    }

    /// Message handlers in scan order.
    pub fn candidates(&self) -> Vec<Candidate> {
        let host_prefixes: Arc<[String]> = Arc::from(self.prefix_keywords());
        let mut candidates = Vec::new();

        for (owner, factory) in self.factories() {
            let factory = factory.get();
            let prefixes = match owner {
                Owner::Host => host_prefixes.clone(),
                Owner::Plugin(_) => Arc::from(factory.prefix_keywords()),
            };
            for spec in factory.message_handlers() {
                let group = spec.group_id.as_deref().and_then(|group_id| {
                    factory
                        .group_config(group_id)
                        .or_else(|| self.group_config(group_id))
                });
                candidates.push(Candidate {
                    owner: owner.clone(),
                    index: candidates.len(),
                    spec,
                    prefixes: prefixes.clone(),
                    group,
                });
            }
        }
        candidates
    }

    pub fn event_handlers(&self, event: &str) -> Vec<BoxedEventHandler> {
        self.factories()
            .iter()
            .flat_map(|(_, f)| f.get().event_handlers(event))
            .collect()
    }

    /// Every event name with at least one handler.
    pub fn event_names(&self) -> BTreeSet<String> {
        self.factories()
            .iter()
            .flat_map(|(_, f)| f.get().event_names())
            .collect()
    }

    pub fn exception_handlers(&self, kind: FaultKind) -> Vec<BoxedFaultHandler> {
        self.factories()
            .iter()
            .flat_map(|(_, f)| f.get().exception_handlers(kind))
            .collect()
    }

    /// Every fault kind with at least one handler.
    pub fn exception_kinds(&self) -> BTreeSet<FaultKind> {
        self.factories()
            .iter()
            .flat_map(|(_, f)| f.get().exception_kinds())
            .collect()
    }

    pub fn before_reply_hooks(&self) -> Vec<BoxedBeforeHook> {
        self.factories()
            .iter()
            .flat_map(|(_, f)| f.get().before_reply_hooks())
            .collect()
    }

    pub fn after_reply_hooks(&self) -> Vec<BoxedAfterHook> {
        self.factories()
            .iter()
            .flat_map(|(_, f)| f.get().after_reply_hooks())
            .collect()
    }

    pub fn middlewares(&self) -> Vec<BoxedMiddleware> {
        self.factories()
            .iter()
            .flat_map(|(_, f)| f.get().middlewares())
            .collect()
    }

    /// Group configuration, host first.
    pub fn group_config(&self, group_id: &str) -> Option<GroupConfig> {
        self.factories()
            .iter()
            .find_map(|(_, f)| f.get().group_config(group_id))
    }
}

/// Borrowable handle on either the host factory or a plugin's factory.
enum FactoryRef {
    Host(Arc<HandlerFactory>),
    Plugin(BoxedPlugin),
}

impl FactoryRef {
    fn get(&self) -> &HandlerFactory {
        match self {
            FactoryRef::Host(factory) => factory,
            FactoryRef::Plugin(plugin) => plugin.factory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use ember_core::HandlerFault;

    use super::*;
    use crate::handler::{EventContext, FaultContext, MessageContext};
    use crate::plugin::{PluginInstance, PluginMetadata};

    fn named(name: &str) -> HandlerSpec {
        HandlerSpec::builder()
            .name(name)
            .handler(|_ctx: MessageContext| async {})
    }

    fn names(registry: &HandlerRegistry) -> Vec<String> {
        registry
            .candidates()
            .iter()
            .map(|c| c.spec.display_name().to_string())
            .collect()
    }

    fn plugin(id: &str) -> PluginInstance {
        PluginInstance::new(PluginMetadata::new(id, "1.0.0"))
    }

    #[tokio::test]
    async fn sequences_concatenate_host_first_in_install_order() {
        let registry = HandlerRegistry::new();
        registry.on_message(named("host-a"));

        let first = plugin("first");
        first.on_message(named("first-a"));
        let second = plugin("second");
        second.on_message(named("second-a")).on_message(named("second-b"));

        registry.install_plugin(Arc::new(second)).await.unwrap();
        registry.install_plugin(Arc::new(first)).await.unwrap();
        registry.on_message(named("host-b"));

        assert_eq!(
            names(&registry),
            vec!["host-a", "host-b", "second-a", "second-b", "first-a"]
        );
        let indices: Vec<_> = registry.candidates().iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn keyed_collections_union_keys_and_concatenate_values() {
        let registry = HandlerRegistry::new();
        registry.on_event(["joined"], |_ctx: EventContext| async {});
        registry.on_exception([FaultKind::Any], |_ctx: FaultContext| async {});

        let extra = plugin("extra");
        extra
            .on_event(["joined", "left"], |_ctx: EventContext| async {})
            .on_exception([FaultKind::Io], |_ctx: FaultContext| async {});
        registry.install_plugin(Arc::new(extra)).await.unwrap();

        assert_eq!(registry.event_handlers("joined").len(), 2);
        assert_eq!(registry.event_handlers("left").len(), 1);
        assert_eq!(
            registry.event_names().into_iter().collect::<Vec<_>>(),
            vec!["joined", "left"]
        );
        assert_eq!(
            registry.exception_kinds().into_iter().collect::<Vec<_>>(),
            vec![FaultKind::Any, FaultKind::Io]
        );
    }

    #[tokio::test]
    async fn install_then_uninstall_restores_views() {
        let registry = HandlerRegistry::new();
        registry.on_message(named("host"));
        registry.on_event(["joined"], |_ctx: EventContext| async {});
        registry.add_prefix_keywords(["!"]);
        registry.on_exception([FaultKind::Io], |_ctx: FaultContext| async {});
        registry.middleware(|ctx: MessageContext| async move { Ok(ctx.message) });

        let before_names = names(&registry);
        let before_events = registry.event_names();
        let before_prefixes = registry.prefix_keywords();
        let before_kinds = registry.exception_kinds();

        let extra = plugin("extra");
        extra.on_message(named("plugin"));
        extra.on_event(["joined", "left"], |_ctx: EventContext| async {});
        extra.add_prefix_keywords(["/"]);
        extra.before_reply(|_ctx: MessageContext| async { Ok(true) });
        extra.after_reply(|_ctx: MessageContext, _reply: Option<ember_core::Reply>| async {});
        extra.middleware(|ctx: MessageContext| async move { Ok(ctx.message) });
        extra.on_exception([FaultKind::Timeout, FaultKind::Io], |_ctx: FaultContext| async {});
        registry.install_plugin(Arc::new(extra)).await.unwrap();

        assert_eq!(names(&registry).len(), 2);
        assert_eq!(registry.prefix_keywords(), vec!["!", "/"]);
        assert_eq!(registry.before_reply_hooks().len(), 1);
        assert_eq!(registry.after_reply_hooks().len(), 1);
        assert_eq!(registry.middlewares().len(), 2);
        assert_eq!(registry.exception_handlers(FaultKind::Io).len(), 2);
        assert_eq!(
            registry.exception_kinds().into_iter().collect::<Vec<_>>(),
            vec![FaultKind::Io, FaultKind::Timeout]
        );

        registry.uninstall_plugin("extra").await.unwrap();

        assert_eq!(names(&registry), before_names);
        assert_eq!(registry.event_names(), before_events);
        assert_eq!(registry.event_handlers("joined").len(), 1);
        assert_eq!(registry.prefix_keywords(), before_prefixes);
        assert!(registry.before_reply_hooks().is_empty());
        assert!(registry.after_reply_hooks().is_empty());
        assert_eq!(registry.middlewares().len(), 1);
        assert_eq!(registry.exception_kinds(), before_kinds);
        assert_eq!(registry.exception_handlers(FaultKind::Io).len(), 1);
        assert!(registry.exception_handlers(FaultKind::Timeout).is_empty());
    }

    #[tokio::test]
    async fn plugin_receives_host_prefixes_and_install_hook_runs() {
        let registry = HandlerRegistry::new();
        registry.add_prefix_keywords(["!", "amiya"]);

        let installed = Arc::new(AtomicBool::new(false));
        let flag = installed.clone();
        let extra = Arc::new(plugin("extra").on_install(move || {
            let flag = flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        }));
        extra.add_prefix_keywords(["/"]);

        registry.install_plugin(extra.clone()).await.unwrap();

        assert!(installed.load(Ordering::SeqCst));
        assert_eq!(extra.prefix_keywords(), vec!["/", "!", "amiya"]);
        let plugin_candidate_prefixes = {
            extra.on_message(named("p"));
            registry.candidates()[0].prefixes.clone()
        };
        assert_eq!(&*plugin_candidate_prefixes, &["/", "!", "amiya"]);
    }

    #[tokio::test]
    async fn failing_install_hook_keeps_plugin_out() {
        let registry = HandlerRegistry::new();
        let broken = plugin("broken").on_install(|| async { Err(HandlerFault::other("nope")) });

        let err = registry.install_plugin(Arc::new(broken)).await.unwrap_err();
        assert!(matches!(err, RegistryError::InstallFailed { .. }));
        assert!(!registry.contains("broken"));
    }

    #[test]
    fn conflicts_are_rejected() {
        tokio_test::block_on(async {
            let registry = HandlerRegistry::new();
            registry.install_plugin(Arc::new(plugin("dup"))).await.unwrap();

            let err = registry.install_plugin(Arc::new(plugin("dup"))).await.unwrap_err();
            assert!(matches!(
                err,
                RegistryError::Conflict(RegistrationConflict::DuplicatePlugin(_))
            ));

            let err = registry.uninstall_plugin("missing").await.unwrap_err();
            assert!(matches!(
                err,
                RegistryError::Conflict(RegistrationConflict::UnknownPlugin(_))
            ));

            registry.combine_factory(Arc::new(HandlerFactory::new()));
            let err = registry.uninstall_plugin(FACTORY_SLOT).await.unwrap_err();
            assert!(matches!(
                err,
                RegistryError::Conflict(RegistrationConflict::ReservedSlot(_))
            ));
            assert!(registry.contains(FACTORY_SLOT));
        });
    }

    #[test]
    fn combine_factory_replaces_in_place() {
        let registry = HandlerRegistry::new();
        let first = Arc::new(HandlerFactory::new());
        first.on_message(named("first"));
        let second = Arc::new(HandlerFactory::new());
        second.on_message(named("second"));

        registry.combine_factory(first);
        tokio_test::block_on(registry.install_plugin(Arc::new(plugin("late")))).unwrap();
        registry.combine_factory(second);

        assert_eq!(registry.plugin_ids(), vec![FACTORY_SLOT, "late"]);
        assert_eq!(names(&registry), vec!["second"]);
        assert_eq!(registry.plugin_metadata().len(), 1);
    }

    #[test]
    fn plugin_group_config_takes_precedence_for_its_handlers() {
        let registry = HandlerRegistry::new();
        registry.set_group_config(GroupConfig::new("g").allow_direct(false));

        let extra = plugin("extra");
        extra.set_group_config(GroupConfig::new("g"));
        extra.on_message(HandlerSpec::builder().group("g").handler(|_ctx: MessageContext| async {}));
        registry.on_message(HandlerSpec::builder().group("g").handler(|_ctx: MessageContext| async {}));
        tokio_test::block_on(registry.install_plugin(Arc::new(extra))).unwrap();

        let candidates = registry.candidates();
        assert_eq!(candidates[0].owner, Owner::Host);
        assert_eq!(candidates[0].group.as_ref().map(|g| g.allow_direct), Some(false));
        assert_eq!(candidates[1].owner, Owner::Plugin("extra".into()));
        assert_eq!(candidates[1].group.as_ref().map(|g| g.allow_direct), Some(true));
    }
}
