//! Add-on lifecycle: startup, per-context attach/detach, shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::background::Background;
use crate::config::store::PreferenceStore;
use crate::content::ContentScript;
use crate::host::{BrowsingContext, ContextId, TabHost};

/// Why the add-on is being shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownReason {
    /// The whole application is exiting.
    AppShutdown,
    AddonDisable,
    AddonUninstall,
    AddonUpgrade,
    AddonDowngrade,
}

/// Running add-on instance. Created once by [`Extension::startup`].
pub struct Extension {
    background: Background,
    scripts: HashMap<ContextId, ContentScript>,
}

impl Extension {
    /// Explicit initialisation: nothing runs before this is called, and
    /// everything it sets up hangs off the returned handle.
    pub fn startup(
        store: Arc<dyn PreferenceStore>,
        tabs: Arc<dyn TabHost>,
    ) -> anyhow::Result<Self> {
        // Fail early on an unreadable store rather than on the first attach.
        crate::config::Preferences::load(Arc::clone(&store))?;
        info!("Extension started");
        Ok(Self {
            background: Background::new(store, tabs),
            scripts: HashMap::new(),
        })
    }

    /// Attach gesture support to a new browsing context. Must run inside a
    /// tokio runtime.
    pub fn attach(&mut self, context: BrowsingContext) -> anyhow::Result<ContextId> {
        let coordinator = self.background.window(context.window)?;
        let id = context.id;
        let script = ContentScript::attach(context, &coordinator);
        // Re-attaching the same context replaces (and detaches) the old script.
        if let Some(old) = self.scripts.insert(id, script) {
            old.detach();
        }
        Ok(id)
    }

    /// Returns false if `context` was not attached. Detaching the last
    /// context of a window releases that window's coordinator.
    pub fn detach(&mut self, context: ContextId) -> bool {
        let Some(script) = self.scripts.remove(&context) else {
            return false;
        };
        let window = script.window();
        script.detach();
        if !self.scripts.values().any(|s| s.window() == window) {
            self.background.release(window);
        }
        true
    }

    pub fn script(&self, context: ContextId) -> Option<&ContentScript> {
        self.scripts.get(&context)
    }

    pub fn attached(&self) -> usize {
        self.scripts.len()
    }

    pub fn shutdown(&mut self, reason: ShutdownReason) {
        // Don't bother cleaning up when the application is exiting.
        if reason == ShutdownReason::AppShutdown {
            return;
        }
        info!(?reason, count = self.scripts.len(), "Shutting down extension");
        for (_, script) in self.scripts.drain() {
            self.background.release(script.window());
            script.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::store::{LocalStorage, PrefMap};
    use crate::config::PREF_GESTURE_BUTTON;
    use crate::host::sim::{NavDirection, SimElement, SimEvent, SimHost};
    use crate::host::{MouseEvent, MouseEventKind, TabId, WindowId};
    use std::time::Duration;
    use tokio::sync::mpsc;

    const W: WindowId = WindowId(1);

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    fn setup() -> (
        Extension,
        SimHost,
        mpsc::UnboundedReceiver<SimEvent>,
        Arc<LocalStorage>,
    ) {
        let store = Arc::new(LocalStorage::in_memory());
        let (host, events) = SimHost::new();
        let ext = Extension::startup(store.clone(), host.tabs()).unwrap();
        (ext, host, events, store)
    }

    fn fire(host: &SimHost, tab: TabId, event: MouseEvent) -> MouseEvent {
        let mut event = event;
        host.document(tab).unwrap().dispatch(&mut event);
        event
    }

    fn rocker_back() -> MouseEvent {
        MouseEvent::new(MouseEventKind::MouseDown, SimElement::body())
            .with_buttons(1 | 2)
            .with_button(0)
    }

    fn click() -> MouseEvent {
        MouseEvent::new(MouseEventKind::Click, SimElement::body())
    }

    #[tokio::test]
    async fn rocker_navigates_and_suppresses_click() {
        let (mut ext, host, mut events, _) = setup();
        let ctx = host.open_tab(W, TabId(1), true);
        let id = ext.attach(ctx).unwrap();
        // Let the initial state query settle.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!ext.script(id).unwrap().performing_gesture());

        let ev = fire(&host, TabId(1), rocker_back());
        assert!(ev.default_prevented());
        assert!(fire(&host, TabId(1), click()).default_prevented());

        let mut saw_back = false;
        while let Ok(e) = events.try_recv() {
            if let SimEvent::Navigated { direction, .. } = e {
                saw_back = direction == NavDirection::Back;
            }
        }
        assert!(saw_back);
    }

    #[tokio::test]
    async fn flag_is_replicated_to_other_tabs() {
        let (mut ext, host, _events, _) = setup();
        let a = ext.attach(host.open_tab(W, TabId(1), true)).unwrap();
        let b = ext.attach(host.open_tab(W, TabId(2), false)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        fire(&host, TabId(1), rocker_back());
        assert!(ext.script(a).unwrap().performing_gesture());
        eventually(|| ext.script(b).unwrap().performing_gesture()).await;

        // The release happens in tab B: its click is swallowed too.
        assert!(fire(&host, TabId(2), click()).default_prevented());

        // A fresh press in B clears the flag everywhere.
        fire(
            &host,
            TabId(2),
            MouseEvent::new(MouseEventKind::MouseDown, SimElement::body())
                .with_buttons(1)
                .with_button(0),
        );
        eventually(|| !ext.script(a).unwrap().performing_gesture()).await;
    }

    #[tokio::test]
    async fn late_context_picks_up_current_state() {
        let (mut ext, host, _events, _) = setup();
        ext.attach(host.open_tab(W, TabId(1), true)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        fire(&host, TabId(1), rocker_back());

        let late = ext.attach(host.open_tab(W, TabId(2), false)).unwrap();
        eventually(|| ext.script(late).unwrap().performing_gesture()).await;
    }

    #[tokio::test]
    async fn windows_do_not_share_state() {
        let (mut ext, host, _events, _) = setup();
        let a = ext.attach(host.open_tab(W, TabId(1), true)).unwrap();
        let other = ext
            .attach(host.open_tab(WindowId(2), TabId(2), true))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        fire(&host, TabId(1), rocker_back());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ext.script(a).unwrap().performing_gesture());
        assert!(!ext.script(other).unwrap().performing_gesture());
    }

    #[tokio::test]
    async fn wheel_gesture_cycles_tabs() {
        let (mut ext, host, _events, _) = setup();
        ext.attach(host.open_tab(W, TabId(1), true)).unwrap();
        host.open_tab(W, TabId(2), false);
        host.open_tab(W, TabId(3), false);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let wheel = |delta: f64| {
            MouseEvent::new(MouseEventKind::Wheel, SimElement::body())
                .with_buttons(2)
                .with_delta_y(delta)
        };
        let tabs = host.tabs();

        assert!(fire(&host, TabId(1), wheel(-3.0)).default_prevented());
        eventually(|| tabs.active(W) == Some(TabId(3))).await;

        fire(&host, TabId(1), wheel(3.0));
        eventually(|| tabs.active(W) == Some(TabId(1))).await;
    }

    #[tokio::test]
    async fn gesture_button_preference_reaches_contexts() {
        let (mut ext, host, _events, store) = setup();
        let id = ext.attach(host.open_tab(W, TabId(1), true)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut items = PrefMap::new();
        items.insert(PREF_GESTURE_BUTTON.into(), serde_json::json!(1));
        store.set(items).unwrap();
        eventually(|| ext.script(id).unwrap().settings().gesture_button == 1).await;

        let ev = fire(
            &host,
            TabId(1),
            MouseEvent::new(MouseEventKind::Wheel, SimElement::body())
                .with_buttons(4)
                .with_delta_y(1.0),
        );
        assert!(ev.default_prevented());
    }

    #[tokio::test]
    async fn last_detach_in_a_window_releases_its_coordinator() {
        let (mut ext, host, _events, _) = setup();
        let a = ext.attach(host.open_tab(W, TabId(1), true)).unwrap();
        let b = ext.attach(host.open_tab(W, TabId(2), false)).unwrap();
        let other = ext
            .attach(host.open_tab(WindowId(2), TabId(3), true))
            .unwrap();
        assert_eq!(ext.background.window_count(), 2);

        ext.detach(a);
        assert_eq!(ext.background.window_count(), 2);
        ext.detach(b);
        assert_eq!(ext.background.window_count(), 1);

        // Re-attaching starts a fresh coordinator with the flag cleared.
        let c = ext.attach(host.open_tab(W, TabId(4), true)).unwrap();
        assert_eq!(ext.background.window_count(), 2);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!ext.script(c).unwrap().performing_gesture());
        assert!(ext.script(other).is_some());
    }

    #[tokio::test]
    async fn detach_and_shutdown() {
        let (mut ext, host, _events, _) = setup();
        let a = ext.attach(host.open_tab(W, TabId(1), true)).unwrap();
        ext.attach(host.open_tab(W, TabId(2), false)).unwrap();
        assert_eq!(ext.attached(), 2);

        assert!(ext.detach(a));
        assert!(!ext.detach(a));
        assert_eq!(host.document(TabId(1)).unwrap().listener_count(), 0);
        assert!(!fire(&host, TabId(1), rocker_back()).default_prevented());

        ext.shutdown(ShutdownReason::AppShutdown);
        assert_eq!(ext.attached(), 1);

        ext.shutdown(ShutdownReason::AddonDisable);
        assert_eq!(ext.attached(), 0);
        assert_eq!(ext.background.window_count(), 0);
        assert_eq!(host.document(TabId(2)).unwrap().listener_count(), 0);
    }
}
