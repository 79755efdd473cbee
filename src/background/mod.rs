//! Window-level side: one [`Coordinator`] per logical window.

pub mod coordinator;
pub mod tabs;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::store::PreferenceStore;
use crate::config::Preferences;
use crate::host::{TabHost, WindowId};
pub use coordinator::{Coordinator, CoordinatorHandle};

/// Spawns coordinators on demand and hands out their handles.
pub struct Background {
    store: Arc<dyn PreferenceStore>,
    tabs: Arc<dyn TabHost>,
    windows: HashMap<WindowId, CoordinatorHandle>,
}

impl Background {
    pub fn new(store: Arc<dyn PreferenceStore>, tabs: Arc<dyn TabHost>) -> Self {
        Self {
            store,
            tabs,
            windows: HashMap::new(),
        }
    }

    /// The coordinator for `window`, started if there is none yet.
    pub fn window(&mut self, window: WindowId) -> anyhow::Result<CoordinatorHandle> {
        if let Some(handle) = self.windows.get(&window) {
            return Ok(handle.clone());
        }
        let prefs = Preferences::load(Arc::clone(&self.store))?;
        let handle = Coordinator::new(window, prefs, Arc::clone(&self.tabs)).spawn();
        self.windows.insert(window, handle.clone());
        Ok(handle)
    }

    /// Forget the coordinator for `window`. Its task stops once the ports
    /// of the contexts that used it are gone; a later attach starts a fresh
    /// one. Returns false if `window` had no coordinator.
    pub fn release(&mut self, window: WindowId) -> bool {
        let released = self.windows.remove(&window).is_some();
        if released {
            debug!(%window, "Coordinator released");
        }
        released
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}
