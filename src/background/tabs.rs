//! Relative tab activation.

use anyhow::bail;
use tracing::debug;

use crate::host::{TabHost, TabId, WindowId};

/// Activate the tab `offset` places after the active tab of `window`,
/// wrapping around at either end. With no active tab the count starts
/// before the first tab.
///
/// Returns the activated tab. A window without tabs is an error.
pub fn cycle_tab(tabs: &dyn TabHost, window: WindowId, offset: i32) -> anyhow::Result<TabId> {
    let list = tabs.query(window)?;
    if list.is_empty() {
        bail!("{} has no tabs", window);
    }

    let count = list.len() as i64;
    let index = list
        .iter()
        .position(|t| t.active)
        .map_or(-1, |i| i as i64);
    let next_index = (index + i64::from(offset)).rem_euclid(count) as usize;
    let next = list[next_index].id;

    debug!(%window, offset, from = index, to = next_index, "Cycling tab");
    tabs.activate(next)?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::SimTabs;
    use tokio::sync::mpsc;

    const W: WindowId = WindowId(1);

    /// Tabs A(1), B(2), C(3) with `active` marked active (if any).
    fn three_tabs(active: Option<u32>) -> SimTabs {
        let (tx, _rx) = mpsc::unbounded_channel();
        let tabs = SimTabs::new(tx);
        for id in 1..=3 {
            tabs.open(W, TabId(id), active == Some(id));
        }
        tabs
    }

    #[test]
    fn next_tab() {
        let tabs = three_tabs(Some(1));
        assert_eq!(cycle_tab(&tabs, W, 1).unwrap(), TabId(2));
        assert_eq!(tabs.active(W), Some(TabId(2)));
    }

    #[test]
    fn previous_tab_wraps() {
        let tabs = three_tabs(Some(1));
        assert_eq!(cycle_tab(&tabs, W, -1).unwrap(), TabId(3));
    }

    #[test]
    fn next_tab_wraps() {
        let tabs = three_tabs(Some(3));
        assert_eq!(cycle_tab(&tabs, W, 1).unwrap(), TabId(1));
    }

    #[test]
    fn no_active_tab() {
        let tabs = three_tabs(None);
        assert_eq!(cycle_tab(&tabs, W, 1).unwrap(), TabId(1));
        let tabs = three_tabs(None);
        assert_eq!(cycle_tab(&tabs, W, -1).unwrap(), TabId(2));
    }

    #[test]
    fn large_offsets_wrap() {
        let tabs = three_tabs(Some(1));
        assert_eq!(cycle_tab(&tabs, W, -7).unwrap(), TabId(3));
    }

    #[test]
    fn empty_window_is_an_error() {
        let tabs = three_tabs(Some(1));
        let err = cycle_tab(&tabs, WindowId(2), 1).unwrap_err();
        assert!(err.to_string().contains("no tabs"));
    }
}
