//! Installable plugins.
//!
//! A plugin is a statically linked unit with a unique id, its own
//! [`HandlerFactory`] and an `install`/`uninstall` pair. Plugins are handed to
//! [`HandlerRegistry::install_plugin`](crate::registry::HandlerRegistry::install_plugin)
//! explicitly at startup; nothing is loaded from disk.
//!
//! ```rust,ignore
//! let plugin = PluginInstance::new(PluginMetadata::new("weather", "0.1.0"));
//! plugin.on_message(
//!     HandlerSpec::builder()
//!         .keywords(["weather"])
//!         .handler(|_ctx: MessageContext| async { "sunny" }),
//! );
//! registry.install_plugin(Arc::new(plugin)).await?;
//! ```

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ember_core::HandlerResult;

use crate::factory::HandlerFactory;
use crate::handler::{BoxedLifecycleHook, into_lifecycle_hook};

/// Descriptive information about a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique identifier used by install/uninstall.
    pub plugin_id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub plugin_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Usage documentation shown to users.
    #[serde(default)]
    pub document: Option<String>,
}

impl PluginMetadata {
    /// Creates metadata whose name equals its id.
    pub fn new(plugin_id: impl Into<String>, version: impl Into<String>) -> Self {
        let plugin_id = plugin_id.into();
        Self {
            name: plugin_id.clone(),
            plugin_id,
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_type(mut self, plugin_type: impl Into<String>) -> Self {
        self.plugin_type = Some(plugin_type.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }
}

/// The contract every installable unit implements.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique identifier.
    fn id(&self) -> &str;

    /// Descriptive metadata.
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(self.id(), "")
    }

    /// The plugin's own handler collections.
    fn factory(&self) -> &HandlerFactory;

    /// Runs before the plugin becomes visible in merged views.
    async fn install(&self) -> HandlerResult<()> {
        Ok(())
    }

    /// Runs before the plugin is removed from merged views.
    async fn uninstall(&self) -> HandlerResult<()> {
        Ok(())
    }
}

/// Type alias for a shared plugin.
pub type BoxedPlugin = Arc<dyn Plugin>;

/// Ready-made [`Plugin`] built from metadata and optional lifecycle hooks.
///
/// Derefs to its [`HandlerFactory`] so handlers can be registered directly.
pub struct PluginInstance {
    metadata: PluginMetadata,
    factory: HandlerFactory,
    on_install: Option<BoxedLifecycleHook>,
    on_uninstall: Option<BoxedLifecycleHook>,
}

impl PluginInstance {
    pub fn new(metadata: PluginMetadata) -> Self {
        Self {
            metadata,
            factory: HandlerFactory::new(),
            on_install: None,
            on_uninstall: None,
        }
    }

    pub fn on_install<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.on_install = Some(into_lifecycle_hook(hook));
        self
    }

    pub fn on_uninstall<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<()>> + Send + 'static,
    {
        self.on_uninstall = Some(into_lifecycle_hook(hook));
        self
    }
}

impl Deref for PluginInstance {
    type Target = HandlerFactory;

    fn deref(&self) -> &Self::Target {
        &self.factory
    }
}

#[async_trait]
impl Plugin for PluginInstance {
    fn id(&self) -> &str {
        &self.metadata.plugin_id
    }

    fn metadata(&self) -> PluginMetadata {
        self.metadata.clone()
    }

    fn factory(&self) -> &HandlerFactory {
        &self.factory
    }

    async fn install(&self) -> HandlerResult<()> {
        match &self.on_install {
            Some(hook) => hook().await,
            None => Ok(()),
        }
    }

    async fn uninstall(&self) -> HandlerResult<()> {
        match &self.on_uninstall {
            Some(hook) => hook().await,
            None => Ok(()),
        }
    }
}

/// A bare factory installed under the reserved host slot.
pub(crate) struct CombinedFactory {
    pub(crate) id: &'static str,
    pub(crate) factory: Arc<HandlerFactory>,
}

#[async_trait]
impl Plugin for CombinedFactory {
    fn id(&self) -> &str {
        self.id
    }

    fn factory(&self) -> &HandlerFactory {
        &self.factory
    }
}
