//! List presenter: turns controller snapshots into frames and user gestures
//! into [`ListIntent`]s. It never mutates controller state itself.

use std::{
    collections::HashMap,
    ops::Range,
    sync::{Arc, Mutex, MutexGuard},
};

use shared::domain::ItemId;
use tracing::debug;

use crate::controller::{ListIntent, ListSnapshot};

pub const EMPTY_PLACEHOLDER: &str = "No items found";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub index: usize,
    pub id: ItemId,
    pub value: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Placeholder(&'static str),
    Rows(Vec<Row>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub body: Body,
    pub status_line: String,
    pub loading: bool,
}

impl Frame {
    pub fn rows(&self) -> &[Row] {
        match &self.body {
            Body::Rows(rows) => rows,
            Body::Placeholder(_) => &[],
        }
    }
}

/// End of a drag gesture. `destination` is `None` when dropped outside the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragEnd {
    pub source: usize,
    pub destination: Option<usize>,
}

/// Tracks which items currently have a visibility watch attached.
#[derive(Debug, Clone, Default)]
pub struct WatchRegistry {
    watched: Arc<Mutex<HashMap<ItemId, usize>>>,
}

impl WatchRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<ItemId, usize>> {
        self.watched.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn watch(&self, target: ItemId) -> VisibilityWatch {
        *self.lock().entry(target).or_insert(0) += 1;
        VisibilityWatch {
            registry: self.clone(),
            target,
        }
    }

    pub fn is_watching(&self, target: ItemId) -> bool {
        self.lock().contains_key(&target)
    }

    pub fn active_watches(&self) -> usize {
        self.lock().values().sum()
    }

    fn release(&self, target: ItemId) {
        let mut watched = self.lock();
        if let Some(count) = watched.get_mut(&target) {
            *count -= 1;
            if *count == 0 {
                watched.remove(&target);
            }
        }
    }
}

/// Scoped subscription on one item's visibility; released on drop.
#[derive(Debug)]
pub struct VisibilityWatch {
    registry: WatchRegistry,
    target: ItemId,
}

impl VisibilityWatch {
    pub fn target(&self) -> ItemId {
        self.target
    }
}

impl Drop for VisibilityWatch {
    fn drop(&mut self) {
        self.registry.release(self.target);
    }
}

/// Scroll window over the rendered rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub offset: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(height: usize) -> Self {
        Self {
            offset: 0,
            height: height.max(1),
        }
    }

    pub fn visible_range(&self, len: usize) -> Range<usize> {
        let start = self.offset.min(len);
        start..(start + self.height).min(len)
    }

    pub fn scroll_by(&mut self, delta: isize, len: usize) {
        let max_offset = len.saturating_sub(self.height);
        self.offset = self.offset.saturating_add_signed(delta).min(max_offset);
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

#[derive(Debug, Default)]
pub struct ListPresenter {
    registry: WatchRegistry,
    last_item_watch: Option<VisibilityWatch>,
}

impl ListPresenter {
    pub fn new(registry: WatchRegistry) -> Self {
        Self {
            registry,
            last_item_watch: None,
        }
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn watched_item(&self) -> Option<ItemId> {
        self.last_item_watch.as_ref().map(VisibilityWatch::target)
    }

    pub fn render(&mut self, snapshot: &ListSnapshot) -> Frame {
        self.rebind_last_item_watch(snapshot);

        let loading = snapshot.is_loading();
        let body = if snapshot.items.is_empty() && !loading {
            Body::Placeholder(EMPTY_PLACEHOLDER)
        } else {
            Body::Rows(
                snapshot
                    .items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| Row {
                        index,
                        id: item.id,
                        value: item.value.clone(),
                        selected: snapshot.is_selected(item.id),
                    })
                    .collect(),
            )
        };

        Frame {
            body,
            status_line: format!(
                "{} items selected | Total results: {}",
                snapshot.selected_ids.len(),
                snapshot.total_count
            ),
            loading,
        }
    }

    /// Emits `LoadMore` once the watched last item is within `visible`. Stays
    /// quiet while the last request is failed so a failure is not retried on
    /// every redraw; see [`ListPresenter::scrolled`].
    pub fn viewport_changed(
        &self,
        visible: Range<usize>,
        snapshot: &ListSnapshot,
    ) -> Option<ListIntent> {
        if snapshot.last_error.is_some() {
            return None;
        }
        self.scrolled(visible, snapshot)
    }

    /// Like [`ListPresenter::viewport_changed`], for an explicit user scroll.
    /// A user gesture may retry after a failure.
    pub fn scrolled(&self, visible: Range<usize>, snapshot: &ListSnapshot) -> Option<ListIntent> {
        let target = self.watched_item()?;
        if !snapshot.has_more || snapshot.is_loading() {
            return None;
        }
        let last_index = snapshot.items.len().checked_sub(1)?;
        if snapshot.items[last_index].id != target || !visible.contains(&last_index) {
            return None;
        }
        Some(ListIntent::LoadMore)
    }

    pub fn drag_end(&self, gesture: DragEnd) -> Option<ListIntent> {
        let destination = gesture.destination?;
        if destination == gesture.source {
            return None;
        }
        Some(ListIntent::Reorder {
            source: gesture.source,
            destination,
        })
    }

    pub fn toggle(&self, index: usize, snapshot: &ListSnapshot) -> Option<ListIntent> {
        snapshot
            .items
            .get(index)
            .map(|item| ListIntent::ToggleSelect(item.id))
    }

    pub fn search(&self, term: &str) -> ListIntent {
        ListIntent::Search(term.to_string())
    }

    /// Drops the watch on teardown; rendering again re-acquires it.
    pub fn detach(&mut self) {
        self.last_item_watch = None;
    }

    fn rebind_last_item_watch(&mut self, snapshot: &ListSnapshot) {
        let target = if snapshot.is_loading() {
            None
        } else {
            snapshot.items.last().map(|item| item.id)
        };
        if self.watched_item() == target {
            return;
        }

        // Release before acquiring so at most one watch is ever live.
        drop(self.last_item_watch.take());
        if let Some(id) = target {
            debug!(item = %id, "watching last item");
            self.last_item_watch = Some(self.registry.watch(id));
        }
    }
}

#[cfg(test)]
#[path = "tests/presenter_tests.rs"]
mod tests;
