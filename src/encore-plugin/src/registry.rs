use async_trait::async_trait;
use encore_core::{Event, EventBus, EventKind, HandlerResult};
use encore_player::StateStore;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a plugin could not be loaded or initialized.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin `{0}` is already registered")]
    Duplicate(String),
}

pub type PluginResult<T> = Result<T, PluginError>;

/// Handles a plugin receives when it is built.
#[derive(Clone)]
pub struct PluginContext {
    pub bus: EventBus,
    pub store: Arc<StateStore>,
}

/// Name, version and the event kinds a plugin handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    /// Event kinds delivered to [`Plugin::on_event`].
    pub capabilities: Vec<EventKind>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn capability(mut self, kind: EventKind) -> Self {
        if !self.capabilities.contains(&kind) {
            self.capabilities.push(kind);
        }
        self
    }
}

/// An extension driven by bus events.
#[async_trait]
pub trait Plugin: Send + Sync {
    async fn initialize(&self) -> HandlerResult {
        Ok(())
    }

    async fn on_event(&self, event: &Event) -> HandlerResult;

    async fn cleanup(&self) -> HandlerResult {
        Ok(())
    }
}

/// Builds a plugin instance for one context.
pub type PluginFactory = Arc<dyn Fn(&PluginContext) -> Box<dyn Plugin> + Send + Sync>;

/// Name-keyed set of known plugins.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    entries: BTreeMap<String, (PluginDescriptor, PluginFactory)>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the plugins shipped with encore.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register(&mut registry);
        registry
    }

    /// Adds a plugin under its descriptor's name; a second registration of a name fails.
    pub fn register<F>(&mut self, descriptor: PluginDescriptor, factory: F) -> PluginResult<()>
    where
        F: Fn(&PluginContext) -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        if self.entries.contains_key(&descriptor.name) {
            return Err(PluginError::Duplicate(descriptor.name));
        }
        self.entries
            .insert(descriptor.name.clone(), (descriptor, Arc::new(factory)));
        Ok(())
    }

    pub fn descriptor(&self, name: &str) -> Option<&PluginDescriptor> {
        self.entries.get(name).map(|(descriptor, _)| descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.entries.values().map(|(descriptor, _)| descriptor)
    }

    pub(crate) fn entry(&self, name: &str) -> Option<(&PluginDescriptor, &PluginFactory)> {
        self.entries
            .get(name)
            .map(|(descriptor, factory)| (descriptor, factory))
    }
}
