//! C9 — Plugin Host: install/uninstall add-ons that subscribe to the event
//! bus and call back into the facade. Two reference plugins ship with the
//! core.

pub mod export;
pub mod virtual_window;

use std::collections::HashSet;

use tracing::warn;

use crate::event_bus::{EngineEvent, EventKind};
use crate::facade::EngineHandle;

/// A plugin receives the facade's [`EngineHandle`] at install time and may
/// subscribe to any event or call any facade operation through it —
/// plugins never reach into engine internals directly.
pub trait Plugin<T>: Send + Sync {
    fn name(&self) -> &str;
    fn install(&mut self, handle: &EngineHandle<T>);
    fn uninstall(&mut self, handle: &EngineHandle<T>);
}

/// Tracks which plugin names are currently installed so `use(plugin)` can
/// reject duplicates, and calls `uninstall` on every plugin at `destroy`.
pub struct PluginHost<T> {
    plugins: Vec<Box<dyn Plugin<T>>>,
    names: HashSet<String>,
}

impl<T> Default for PluginHost<T> {
    fn default() -> Self {
        PluginHost {
            plugins: Vec::new(),
            names: HashSet::new(),
        }
    }
}

impl<T> PluginHost<T> {
    pub fn new() -> Self {
        PluginHost {
            plugins: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Installs `plugin` once per name; a duplicate name is logged and
    /// ignored.
    pub fn install(&mut self, mut plugin: Box<dyn Plugin<T>>, handle: &EngineHandle<T>) {
        let name = plugin.name().to_string();
        if !self.names.insert(name.clone()) {
            warn!(target: "datatable::plugins", %name, "duplicate plugin name, ignoring");
            return;
        }
        plugin.install(handle);
        self.plugins.push(plugin);
    }

    pub fn uninstall_all(&mut self, handle: &EngineHandle<T>) {
        for plugin in self.plugins.iter_mut() {
            plugin.uninstall(handle);
        }
        self.plugins.clear();
        self.names.clear();
    }
}

/// Matches an event against a kind, used by plugins wiring themselves up to
/// [`crate::event_bus::EventBus::on`].
pub fn is_kind<T>(event: &EngineEvent<T>, kind: EventKind) -> bool {
    event.kind() == kind
}
