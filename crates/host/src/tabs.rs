//! Tab lifecycle and focus management.
//!
//! The manager owns an ordered tab collection plus a single focused index and
//! drives the shell through the [`ViewHost`] trait - view creation, attach,
//! detach, bounds and window teardown are thin wrappers around host APIs and
//! live behind that seam. Every tab and view carries a stable id assigned at
//! creation; child-to-parent notifications (title changes, navigation) resolve
//! the originating view back to its tab by id, never by reference identity or
//! assumed index stability.
//!
//! After every mutation the manager pushes the full
//! [`TabsSnapshot`] to the main surface and to every tab's view. Always a
//! complete snapshot: observers that miss one update converge on the next.

use std::fmt;

use graphdock_protocol::{TabLabel, TabsSnapshot, actions};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

/// Stable identifier of a tab, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(Uuid);

impl TabId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stable identifier of a view surface, assigned by the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(Uuid);

impl ViewId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Window-content rectangle applied to the attached view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Shell surface operations the manager needs. Implementations are thin
/// wrappers around the host windowing APIs.
pub trait ViewHost: Send {
    fn create_view(&mut self, url: &str) -> ViewId;
    fn attach(&mut self, view: ViewId);
    fn detach(&mut self, view: ViewId);
    fn destroy_view(&mut self, view: ViewId);
    fn set_bounds(&mut self, view: ViewId, bounds: Bounds);
    fn close_window(&mut self);
    fn send_to_main(&mut self, event: &str, payload: JsonValue);
    fn send_to_view(&mut self, view: ViewId, event: &str, payload: JsonValue);
}

#[derive(Debug, Clone)]
pub struct Tab {
    pub id: TabId,
    pub title: String,
    pub url: String,
    pub view: ViewId,
}

pub struct TabManager {
    host: Box<dyn ViewHost>,
    tabs: Vec<Tab>,
    /// Focused index; `None` only when the collection is empty.
    current: Option<usize>,
    window_closed: bool,
}

impl TabManager {
    pub fn new(host: Box<dyn ViewHost>) -> Self {
        Self {
            host,
            tabs: Vec::new(),
            current: None,
            window_closed: false,
        }
    }

    /// Appends a tab bound to `url` and focuses it.
    pub fn open_tab(&mut self, url: &str) {
        let view = self.host.create_view(url);
        if let Some(old) = self.current {
            self.host.detach(self.tabs[old].view);
        }
        let id = TabId::fresh();
        self.tabs.push(Tab {
            id,
            title: url.to_string(),
            url: url.to_string(),
            view,
        });
        self.current = Some(self.tabs.len() - 1);
        self.host.attach(view);
        debug!(target = "graphdock.tabs", tab = %id, url, index = self.tabs.len() - 1, "tab opened");
        self.broadcast();
    }

    /// Focuses the tab at `index`. Selecting the already-focused tab is a
    /// no-op; an out-of-range index is ignored.
    pub fn select_tab(&mut self, index: usize) {
        if index >= self.tabs.len() {
            warn!(target = "graphdock.tabs", index, "select for out-of-range index ignored");
            return;
        }
        if self.current == Some(index) {
            return;
        }
        if let Some(old) = self.current {
            self.host.detach(self.tabs[old].view);
        }
        self.current = Some(index);
        self.host.attach(self.tabs[index].view);
        self.broadcast();
    }

    /// Removes the tab at `index`.
    ///
    /// When the focused tab closes, focus moves to the tab that shifted into
    /// the same index, or to the previous tab when the last one closed. An
    /// empty collection tears the window down, exactly once.
    pub fn close_tab(&mut self, index: usize) {
        if index >= self.tabs.len() {
            warn!(target = "graphdock.tabs", index, "close for out-of-range index ignored");
            return;
        }
        let was_focused = self.current == Some(index);
        let tab = self.tabs.remove(index);
        if was_focused {
            self.host.detach(tab.view);
        }
        self.host.destroy_view(tab.view);

        if self.tabs.is_empty() {
            self.current = None;
        } else if was_focused {
            let next = index.min(self.tabs.len() - 1);
            self.current = Some(next);
            self.host.attach(self.tabs[next].view);
        } else if let Some(focused) = self.current {
            if focused > index {
                self.current = Some(focused - 1);
            }
        }

        debug!(target = "graphdock.tabs", tab = %tab.id, index, remaining = self.tabs.len(), "tab closed");
        self.broadcast();

        if self.tabs.is_empty() && !self.window_closed {
            self.window_closed = true;
            self.host.close_window();
        }
    }

    pub fn set_tab_title(&mut self, index: usize, title: &str) {
        let Some(tab) = self.tabs.get_mut(index) else {
            warn!(target = "graphdock.tabs", index, "title for out-of-range index ignored");
            return;
        };
        tab.title = title.to_string();
        self.broadcast();
    }

    pub fn set_tab_url(&mut self, index: usize, url: &str) {
        let Some(tab) = self.tabs.get_mut(index) else {
            warn!(target = "graphdock.tabs", index, "navigation for out-of-range index ignored");
            return;
        };
        tab.url = url.to_string();
        self.broadcast();
    }

    /// Reloads the tab at `index` by tearing down its view and creating a
    /// fresh one bound to the same url. The tab id is untouched, so id-based
    /// lookups stay valid across the reload; only the view id changes.
    pub fn refresh_tab(&mut self, index: usize) {
        let Some(tab) = self.tabs.get(index) else {
            warn!(target = "graphdock.tabs", index, "refresh for out-of-range index ignored");
            return;
        };
        let focused = self.current == Some(index);
        let old_view = tab.view;
        let url = tab.url.clone();

        if focused {
            self.host.detach(old_view);
        }
        self.host.destroy_view(old_view);
        let view = self.host.create_view(&url);
        self.tabs[index].view = view;
        if focused {
            self.host.attach(view);
        }
        debug!(target = "graphdock.tabs", tab = %self.tabs[index].id, index, "tab refreshed");
        self.broadcast();
    }

    /// Resolves a view back to its current tab index by id.
    pub fn tab_index_for_view(&self, view: ViewId) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.view == view)
    }

    /// Stable id of the tab at `index`.
    pub fn tab_id(&self, index: usize) -> Option<TabId> {
        self.tabs.get(index).map(|tab| tab.id)
    }

    /// Title change reported by a view (child-to-parent notification).
    pub fn view_title_changed(&mut self, view: ViewId, title: &str) {
        match self.tab_index_for_view(view) {
            Some(index) => self.set_tab_title(index, title),
            None => warn!(target = "graphdock.tabs", %view, "title change from unknown view"),
        }
    }

    /// Navigation reported by a view. The tab id stays stable across
    /// navigation, so id-based lookups remain valid afterwards.
    pub fn view_navigated(&mut self, view: ViewId, url: &str) {
        match self.tab_index_for_view(view) {
            Some(index) => self.set_tab_url(index, url),
            None => warn!(target = "graphdock.tabs", %view, "navigation from unknown view"),
        }
    }

    /// Window resize. Only the maximized layout mode is propagated to the
    /// attached view; other resizes are ignored.
    pub fn handle_resize(&mut self, maximized: bool, bounds: Bounds) {
        if !maximized {
            return;
        }
        if let Some(index) = self.current {
            self.host.set_bounds(self.tabs[index].view, bounds);
        }
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Focused index as exposed on the wire: -1 when empty.
    pub fn current_index(&self) -> i64 {
        self.current.map_or(-1, |index| index as i64)
    }

    pub fn snapshot(&self) -> TabsSnapshot {
        TabsSnapshot {
            current_index: self.current_index(),
            tabs: self
                .tabs
                .iter()
                .map(|tab| TabLabel {
                    title: tab.title.clone(),
                })
                .collect(),
        }
    }

    fn broadcast(&mut self) {
        let snapshot = self.snapshot();
        debug_assert!(
            snapshot.current_index == -1
                || (snapshot.current_index as usize) < snapshot.tabs.len(),
            "focused index out of range for snapshot"
        );
        let payload = match serde_json::to_value(&snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target = "graphdock.tabs", error = %err, "failed to serialize snapshot");
                return;
            }
        };
        let Self { host, tabs, .. } = self;
        host.send_to_main(actions::TABS_BROADCAST, payload.clone());
        for tab in tabs.iter() {
            host.send_to_view(tab.view, actions::TABS_BROADCAST, payload.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingViewHost, ShellCall};

    fn manager() -> (RecordingViewHost, TabManager) {
        let host = RecordingViewHost::new();
        let manager = TabManager::new(Box::new(host.clone()));
        (host, manager)
    }

    fn assert_snapshots_valid(host: &RecordingViewHost) {
        for payload in host.main_broadcasts() {
            let snapshot: TabsSnapshot = serde_json::from_value(payload).unwrap();
            if snapshot.tabs.is_empty() {
                assert_eq!(snapshot.current_index, -1);
            } else {
                assert!(snapshot.current_index >= 0);
                assert!((snapshot.current_index as usize) < snapshot.tabs.len());
            }
        }
    }

    #[test]
    fn opening_tabs_appends_and_focuses() {
        let (host, mut manager) = manager();
        manager.open_tab("graphdock://start");
        for n in 0..3 {
            manager.open_tab(&format!("graphdock://tab/{n}"));
        }

        assert_eq!(manager.len(), 4);
        assert_eq!(manager.current_index(), 3);
        assert_snapshots_valid(&host);
    }

    #[test]
    fn closing_the_last_tab_refocuses_the_previous() {
        let (host, mut manager) = manager();
        for n in 0..4 {
            manager.open_tab(&format!("graphdock://tab/{n}"));
        }

        manager.close_tab(3);
        assert_eq!(manager.len(), 3);
        assert_eq!(manager.current_index(), 2);
        assert_snapshots_valid(&host);
    }

    #[test]
    fn closing_a_focused_middle_tab_refocuses_the_successor() {
        let (host, mut manager) = manager();
        manager.open_tab("graphdock://a");
        manager.open_tab("graphdock://b");
        manager.open_tab("graphdock://c");
        manager.select_tab(1);

        manager.close_tab(1);

        // The tab formerly at index 2 ("c") shifted into index 1 and takes
        // focus, not the previous tab.
        assert_eq!(manager.current_index(), 1);
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.tabs[1].title, "graphdock://c");
        assert_snapshots_valid(&host);
    }

    #[test]
    fn closing_an_unfocused_earlier_tab_keeps_focus_on_the_same_tab() {
        let (_host, mut manager) = manager();
        manager.open_tab("graphdock://a");
        manager.open_tab("graphdock://b");
        manager.open_tab("graphdock://c");
        assert_eq!(manager.current_index(), 2);

        manager.close_tab(0);

        assert_eq!(manager.current_index(), 1);
        assert_eq!(manager.snapshot().tabs[1].title, "graphdock://c");
    }

    #[test]
    fn emptying_the_collection_closes_the_window_exactly_once() {
        let (host, mut manager) = manager();
        manager.open_tab("graphdock://a");
        manager.open_tab("graphdock://b");

        manager.close_tab(1);
        manager.close_tab(0);
        // Out-of-range closes afterwards must not fire another close signal.
        manager.close_tab(0);

        assert_eq!(manager.current_index(), -1);
        assert_eq!(host.window_closes(), 1);
        assert_snapshots_valid(&host);
    }

    #[test]
    fn selecting_the_focused_tab_is_a_no_op() {
        let (host, mut manager) = manager();
        manager.open_tab("graphdock://a");
        let broadcasts_before = host.main_broadcasts().len();

        manager.select_tab(0);

        assert_eq!(host.main_broadcasts().len(), broadcasts_before);
    }

    #[test]
    fn selection_swaps_attached_views() {
        let (host, mut manager) = manager();
        manager.open_tab("graphdock://a");
        manager.open_tab("graphdock://b");

        manager.select_tab(0);

        let views = host.created_views();
        let calls = host.calls();
        let swap = calls
            .windows(2)
            .any(|pair| pair == [ShellCall::Detach(views[1]), ShellCall::Attach(views[0])]);
        assert!(swap, "expected detach of b directly followed by attach of a: {calls:?}");
    }

    #[test]
    fn view_notifications_resolve_by_id_after_reindexing() {
        let (host, mut manager) = manager();
        manager.open_tab("graphdock://a");
        manager.open_tab("graphdock://b");
        let view_b = host.created_views()[1];
        let id_b = manager.tab_id(1).unwrap();

        // Removing "a" shifts "b" to index 0; the view id still finds it.
        manager.close_tab(0);
        manager.view_title_changed(view_b, "Movies");
        assert_eq!(manager.snapshot().tabs[0].title, "Movies");

        // Navigation leaves both ids intact.
        manager.view_navigated(view_b, "graphdock://b/movies");
        assert_eq!(manager.tab_index_for_view(view_b), Some(0));
        assert_eq!(manager.tab_id(0), Some(id_b));
    }

    #[test]
    fn refresh_recreates_the_view_but_keeps_the_tab_id() {
        let (host, mut manager) = manager();
        manager.open_tab("graphdock://a");
        manager.open_tab("graphdock://b");
        let old_view = host.created_views()[1];
        let id = manager.tab_id(1).unwrap();

        manager.refresh_tab(1);

        let new_view = *host.created_views().last().unwrap();
        assert_ne!(new_view, old_view);
        assert_eq!(manager.tab_id(1), Some(id));
        assert_eq!(manager.tab_index_for_view(new_view), Some(1));
        assert_eq!(manager.tab_index_for_view(old_view), None);

        let calls = host.calls();
        assert!(calls.contains(&ShellCall::DestroyView(old_view)));
        // The refreshed tab was focused, so the fresh view is reattached.
        assert!(calls.contains(&ShellCall::Attach(new_view)));
        assert_eq!(manager.current_index(), 1);
    }

    #[test]
    fn refreshing_an_unfocused_tab_does_not_steal_focus() {
        let (host, mut manager) = manager();
        manager.open_tab("graphdock://a");
        manager.open_tab("graphdock://b");

        manager.refresh_tab(0);

        assert_eq!(manager.current_index(), 1);
        let new_view = *host.created_views().last().unwrap();
        assert!(!host.calls().contains(&ShellCall::Attach(new_view)));
    }

    #[test]
    fn broadcasts_reach_every_tab_view_with_the_same_snapshot() {
        let (host, mut manager) = manager();
        manager.open_tab("graphdock://a");
        manager.open_tab("graphdock://b");
        manager.open_tab("graphdock://c");

        manager.set_tab_title(1, "Bravo");

        let last_main = host.main_broadcasts().into_iter().last().unwrap();
        let snapshot: TabsSnapshot = serde_json::from_value(last_main.clone()).unwrap();
        assert_eq!(snapshot.tabs[1].title, "Bravo");

        for view in host.created_views() {
            let to_view = host.view_broadcasts(view);
            assert_eq!(
                to_view.last(),
                Some(&last_main),
                "view {view} missed the post-mutation snapshot"
            );
        }
    }

    #[test]
    fn resize_applies_only_when_maximized() {
        let (host, mut manager) = manager();
        manager.open_tab("graphdock://a");
        let bounds = Bounds {
            x: 0,
            y: 38,
            width: 1920,
            height: 1042,
        };

        manager.handle_resize(false, bounds);
        assert!(!host.calls().iter().any(|c| matches!(c, ShellCall::SetBounds { .. })));

        manager.handle_resize(true, bounds);
        let views = host.created_views();
        assert!(host.calls().contains(&ShellCall::SetBounds {
            view: views[0],
            bounds
        }));
    }

    #[test]
    fn every_broadcast_is_a_full_snapshot_of_post_mutation_state() {
        let (host, mut manager) = manager();
        manager.open_tab("graphdock://a");
        manager.open_tab("graphdock://b");
        manager.set_tab_title(0, "Alpha");
        manager.select_tab(0);
        manager.close_tab(1);
        manager.close_tab(0);

        assert_snapshots_valid(&host);
        let last_main = host.main_broadcasts().into_iter().last().unwrap();
        let snapshot: TabsSnapshot = serde_json::from_value(last_main).unwrap();
        assert_eq!(snapshot.current_index, -1);
        assert!(snapshot.tabs.is_empty());
    }
}
