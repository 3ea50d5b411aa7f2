//! In-process plugins.
//!
//! Plugins are registered explicitly: a [`PluginDescriptor`] names the plugin
//! and the event kinds it wants, and a factory builds the instance from a
//! [`PluginContext`]. [`PluginManager`] instantiates the enabled ones and wires
//! them to the event bus.

mod builtin;
mod manager;
mod registry;

pub use builtin::{NowPlaying, NOW_PLAYING};
pub use manager::PluginManager;
pub use registry::{
    Plugin, PluginContext, PluginDescriptor, PluginError, PluginFactory, PluginRegistry,
    PluginResult,
};
