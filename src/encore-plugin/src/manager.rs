use crate::registry::{Plugin, PluginContext, PluginDescriptor, PluginRegistry};
use async_trait::async_trait;
use encore_core::{Event, EventHandler, EventKind, HandlerResult, SubscriptionId};
use std::sync::Arc;

/// Routes bus events to a plugin.
struct PluginHandler(Arc<dyn Plugin>);

#[async_trait]
impl EventHandler for PluginHandler {
    async fn handle(&self, event: &Event) -> HandlerResult {
        self.0.on_event(event).await
    }
}

struct LoadedPlugin {
    descriptor: PluginDescriptor,
    plugin: Arc<dyn Plugin>,
    subscriptions: Vec<(EventKind, SubscriptionId)>,
}

/// Owns the running plugin instances.
pub struct PluginManager {
    registry: PluginRegistry,
    context: PluginContext,
    loaded: Vec<LoadedPlugin>,
}

impl PluginManager {
    /// A manager with nothing loaded yet.
    pub fn new(registry: PluginRegistry, context: PluginContext) -> Self {
        Self {
            registry,
            context,
            loaded: Vec::new(),
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Names of loaded plugins, in load order.
    pub fn loaded(&self) -> Vec<&str> {
        self.loaded
            .iter()
            .map(|loaded| loaded.descriptor.name.as_str())
            .collect()
    }

    /// Builds, initializes and subscribes each named plugin.
    ///
    /// Unknown names, already-loaded plugins and plugins whose `initialize`
    /// fails are logged and skipped. Returns how many were loaded.
    pub async fn load_enabled<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let mut count = 0;
        for name in names.iter().map(AsRef::as_ref) {
            if self.loaded.iter().any(|loaded| loaded.descriptor.name == name) {
                tracing::debug!(plugin = name, "plugin already loaded");
                continue;
            }
            let Some((descriptor, factory)) = self.registry.entry(name) else {
                tracing::warn!(plugin = name, "unknown plugin; skipping");
                continue;
            };
            let descriptor = descriptor.clone();
            let plugin: Arc<dyn Plugin> = Arc::from(factory(&self.context));

            if let Err(e) = plugin.initialize().await {
                tracing::warn!(plugin = name, error = %e, "plugin failed to initialize; skipping");
                continue;
            }

            let subscriptions = descriptor
                .capabilities
                .iter()
                .map(|&kind| {
                    let handler = Arc::new(PluginHandler(Arc::clone(&plugin)));
                    (kind, self.context.bus.subscribe(kind, handler))
                })
                .collect();
            tracing::info!(plugin = name, version = %descriptor.version, "loaded plugin");
            self.loaded.push(LoadedPlugin {
                descriptor,
                plugin,
                subscriptions,
            });
            count += 1;
        }
        count
    }

    /// Unsubscribes and cleans up every plugin, most recently loaded first.
    pub async fn unload_all(&mut self) {
        while let Some(loaded) = self.loaded.pop() {
            for (kind, id) in loaded.subscriptions {
                self.context.bus.unsubscribe(kind, id);
            }
            let name = loaded.descriptor.name;
            if let Err(e) = loaded.plugin.cleanup().await {
                tracing::warn!(plugin = %name, error = %e, "plugin cleanup failed");
            } else {
                tracing::debug!(plugin = %name, "unloaded plugin");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::{EventBus, EventPayload};
    use encore_player::StateStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        events: AtomicUsize,
        cleanups: AtomicUsize,
    }

    struct Counting {
        counters: Arc<Counters>,
        fail_init: bool,
        fail_cleanup: bool,
    }

    #[async_trait]
    impl Plugin for Counting {
        async fn initialize(&self) -> HandlerResult {
            if self.fail_init {
                return Err("no config".into());
            }
            Ok(())
        }

        async fn on_event(&self, _event: &Event) -> HandlerResult {
            self.counters.events.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn cleanup(&self) -> HandlerResult {
            self.counters.cleanups.fetch_add(1, Ordering::SeqCst);
            if self.fail_cleanup {
                return Err("cleanup exploded".into());
            }
            Ok(())
        }
    }

    fn register(
        registry: &mut PluginRegistry,
        name: &str,
        counters: &Arc<Counters>,
        fail_init: bool,
        fail_cleanup: bool,
    ) {
        let counters = Arc::clone(counters);
        registry
            .register(
                PluginDescriptor::new(name, "0.1.0").capability(EventKind::QueueCleared),
                move |_: &PluginContext| {
                    Box::new(Counting {
                        counters: Arc::clone(&counters),
                        fail_init,
                        fail_cleanup,
                    }) as Box<dyn Plugin>
                },
            )
            .unwrap();
    }

    fn context(bus: &EventBus) -> PluginContext {
        PluginContext {
            bus: bus.clone(),
            store: Arc::new(StateStore::new()),
        }
    }

    #[tokio::test]
    async fn enabled_plugins_receive_their_events() {
        let bus = EventBus::new();
        let counters = Arc::new(Counters::default());
        let mut registry = PluginRegistry::new();
        register(&mut registry, "a", &counters, false, false);
        register(&mut registry, "b", &counters, false, false);

        let mut manager = PluginManager::new(registry, context(&bus));
        assert_eq!(manager.load_enabled(&["a", "a", "missing"]).await, 1);
        assert_eq!(manager.loaded(), ["a"]);
        assert_eq!(bus.handler_count(EventKind::QueueCleared), 1);

        bus.emit(EventPayload::QueueCleared);
        bus.emit(EventPayload::QueueUpdated { length: 1 });
        bus.stop();
        bus.process().await.unwrap();
        assert_eq!(counters.events.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_initialize_is_skipped() {
        let bus = EventBus::new();
        let counters = Arc::new(Counters::default());
        let mut registry = PluginRegistry::new();
        register(&mut registry, "broken", &counters, true, false);
        register(&mut registry, "fine", &counters, false, false);

        let mut manager = PluginManager::new(registry, context(&bus));
        assert_eq!(manager.load_enabled(&["broken", "fine"]).await, 1);
        assert_eq!(manager.loaded(), ["fine"]);
    }

    #[tokio::test]
    async fn unload_runs_every_cleanup_and_unsubscribes() {
        let bus = EventBus::new();
        let counters = Arc::new(Counters::default());
        let mut registry = PluginRegistry::new();
        register(&mut registry, "grumpy", &counters, false, true);
        register(&mut registry, "tidy", &counters, false, false);

        let mut manager = PluginManager::new(registry, context(&bus));
        manager.load_enabled(&["grumpy", "tidy"]).await;
        manager.unload_all().await;

        assert_eq!(counters.cleanups.load(Ordering::SeqCst), 2);
        assert_eq!(bus.handler_count(EventKind::QueueCleared), 0);
        assert!(manager.loaded().is_empty());
    }
}
