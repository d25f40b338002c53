//! List controller: the single owner of client-side list state.
//!
//! Item fetches run as spawned tasks and report back through a channel, so a
//! response may arrive after the state it was requested for has moved on.
//! Every fetch carries a generation number; completions for anything but the
//! latest generation are discarded.

use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::{Item, ItemId},
    protocol::{ItemsPage, ItemsQuery, PAGE_SIZE},
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    api::ListApi,
    config::{PersistenceMode, Settings},
    error::ApiResult,
    persistence::{PersistenceSync, Resource},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PaginationCursor {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
}

/// User intent reported by the presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListIntent {
    Search(String),
    LoadMore,
    ToggleSelect(ItemId),
    Reorder { source: usize, destination: usize },
}

/// Result of an item fetch, tagged with the generation that issued it.
#[derive(Debug)]
pub struct FetchCompletion {
    generation: u64,
    query: ItemsQuery,
    result: ApiResult<ItemsPage>,
}

impl FetchCompletion {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query(&self) -> &ItemsQuery {
        &self.query
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied,
    Failed,
    /// Superseded by a newer fetch; state untouched.
    Discarded,
}

/// Read-only view handed to the presenter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSnapshot {
    pub items: Vec<Item>,
    pub selected_ids: Vec<ItemId>,
    pub sort_order: Vec<ItemId>,
    pub search_term: String,
    pub cursor: PaginationCursor,
    pub total_count: u64,
    pub has_more: bool,
    pub status: FetchStatus,
    pub last_error: Option<String>,
}

impl ListSnapshot {
    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    pub fn is_selected(&self, id: ItemId) -> bool {
        self.selected_ids.contains(&id)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerOptions {
    pub persistence: PersistenceMode,
    pub restore_sort_order: bool,
}

impl From<&Settings> for ControllerOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            persistence: settings.persistence,
            restore_sort_order: settings.restore_sort_order,
        }
    }
}

struct ListState {
    items: Vec<Item>,
    // Kept in toggle order so the persisted payload mirrors what the user did.
    selected_ids: Vec<ItemId>,
    sort_order: Vec<ItemId>,
    search_term: String,
    cursor: PaginationCursor,
    total_count: u64,
    has_more: bool,
    // False until page 1 of the current term has been applied.
    first_page_loaded: bool,
    status: FetchStatus,
    generation: u64,
    last_error: Option<String>,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected_ids: Vec::new(),
            sort_order: Vec::new(),
            search_term: String::new(),
            cursor: PaginationCursor::default(),
            total_count: 0,
            has_more: true,
            first_page_loaded: false,
            status: FetchStatus::Idle,
            generation: 0,
            last_error: None,
        }
    }
}

pub struct ListController {
    api: Arc<dyn ListApi>,
    state: ListState,
    restore_sort_order: bool,
    selection_sync: PersistenceSync,
    sort_sync: PersistenceSync,
    completions_tx: mpsc::UnboundedSender<FetchCompletion>,
    completions_rx: mpsc::UnboundedReceiver<FetchCompletion>,
}

impl ListController {
    /// Must be called inside a tokio runtime; fetches and persistence are spawned onto it.
    pub fn new(api: Arc<dyn ListApi>, options: ControllerOptions) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            selection_sync: PersistenceSync::new(
                options.persistence,
                Resource::Selection,
                Arc::clone(&api),
            ),
            sort_sync: PersistenceSync::new(
                options.persistence,
                Resource::SortOrder,
                Arc::clone(&api),
            ),
            api,
            state: ListState::default(),
            restore_sort_order: options.restore_sort_order,
            completions_tx,
            completions_rx,
        }
    }

    pub fn from_settings(api: Arc<dyn ListApi>, settings: &Settings) -> Self {
        Self::new(api, ControllerOptions::from(settings))
    }

    /// Seeds selection and sort order from the server, then loads the first
    /// unfiltered page. A failed state fetch degrades to empty state.
    pub async fn initialize(&mut self) {
        match self.api.fetch_state().await {
            Ok(persisted) => {
                let mut selected = Vec::with_capacity(persisted.selected_ids.len());
                for id in persisted.selected_ids {
                    if !selected.contains(&id) {
                        selected.push(id);
                    }
                }
                info!(
                    selected = selected.len(),
                    sorted = persisted.sort_order.len(),
                    "loaded persisted list state"
                );
                self.state.selected_ids = selected;
                self.state.sort_order = persisted.sort_order;
            }
            Err(err) => {
                error!("error fetching initial data: {err}");
                self.state.selected_ids.clear();
                self.state.sort_order.clear();
                self.state.last_error = Some(err.to_string());
            }
        }

        self.state.search_term.clear();
        self.state.cursor.page = 1;
        self.state.first_page_loaded = false;
        self.issue_fetch();
        self.settle().await;
    }

    /// Restarts pagination for `term`. Any fetch still in flight is superseded.
    pub fn search(&mut self, term: impl Into<String>) {
        self.state.search_term = term.into();
        self.state.cursor.page = 1;
        self.state.items.clear();
        self.state.first_page_loaded = false;
        self.issue_fetch();
    }

    /// Requests the next page. Returns `false` without issuing a request while
    /// a fetch is in flight or once the server reported no more pages. If the
    /// first page of the current term never arrived, page 1 is requested again.
    pub fn load_more(&mut self) -> bool {
        if self.state.status == FetchStatus::Loading {
            return false;
        }
        if !self.state.first_page_loaded {
            self.state.cursor.page = 1;
            self.issue_fetch();
            return true;
        }
        if !self.state.has_more {
            return false;
        }
        self.state.cursor.page += 1;
        self.issue_fetch();
        true
    }

    /// Flips `id` in the selection set and returns whether it is now selected.
    pub fn toggle_select(&mut self, id: ItemId) -> bool {
        let selected = match self.state.selected_ids.iter().position(|v| *v == id) {
            Some(pos) => {
                self.state.selected_ids.remove(pos);
                false
            }
            None => {
                self.state.selected_ids.push(id);
                true
            }
        };
        self.selection_sync.push(self.state.selected_ids.clone());
        selected
    }

    /// Moves the item at `source` to `destination` and records the resulting
    /// window order as the sort order. Returns whether anything moved.
    pub fn reorder(&mut self, source: usize, destination: usize) -> bool {
        if source == destination {
            return false;
        }
        let len = self.state.items.len();
        if source >= len || destination >= len {
            warn!(source, destination, len, "ignoring reorder outside the item window");
            return false;
        }

        let moved = self.state.items.remove(source);
        self.state.items.insert(destination, moved);
        self.state.sort_order = self.state.items.iter().map(|item| item.id).collect();
        self.sort_sync.push(self.state.sort_order.clone());
        true
    }

    pub fn dispatch(&mut self, intent: ListIntent) {
        match intent {
            ListIntent::Search(term) => self.search(term),
            ListIntent::LoadMore => {
                self.load_more();
            }
            ListIntent::ToggleSelect(id) => {
                self.toggle_select(id);
            }
            ListIntent::Reorder {
                source,
                destination,
            } => {
                self.reorder(source, destination);
            }
        }
    }

    pub fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            items: self.state.items.clone(),
            selected_ids: self.state.selected_ids.clone(),
            sort_order: self.state.sort_order.clone(),
            search_term: self.state.search_term.clone(),
            cursor: self.state.cursor,
            total_count: self.state.total_count,
            has_more: self.state.has_more,
            status: self.state.status,
            last_error: self.state.last_error.clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state.status == FetchStatus::Loading
    }

    pub fn persistence_mode(&self) -> PersistenceMode {
        self.selection_sync.mode()
    }

    /// Waits for the next fetch completion. Cancel-safe.
    pub async fn next_completion(&mut self) -> FetchCompletion {
        match self.completions_rx.recv().await {
            Some(completion) => completion,
            // The controller owns a sender, so the channel never closes.
            None => std::future::pending().await,
        }
    }

    pub fn apply_completion(&mut self, completion: FetchCompletion) -> CompletionOutcome {
        let FetchCompletion {
            generation,
            query,
            result,
        } = completion;

        if generation != self.state.generation {
            debug!(
                generation,
                current = self.state.generation,
                page = query.page,
                search = %query.search,
                "discarding stale item page"
            );
            return CompletionOutcome::Discarded;
        }

        self.state.status = FetchStatus::Idle;
        match result {
            Ok(page) => {
                if query.page == 1 {
                    self.state.items = page.items;
                    self.state.first_page_loaded = true;
                } else {
                    self.state.items.extend(page.items);
                }
                self.state.total_count = page.total_count;
                self.state.has_more = page.has_more;
                self.state.last_error = None;
                if self.restore_sort_order {
                    arrange_by_sort_order(&mut self.state.items, &self.state.sort_order);
                }
                CompletionOutcome::Applied
            }
            Err(err) => {
                error!(page = query.page, search = %query.search, "error fetching items: {err}");
                // Keep the cursor on the last page that actually loaded.
                if query.page > 1 && self.state.cursor.page == query.page {
                    self.state.cursor.page = query.page - 1;
                }
                self.state.last_error = Some(err.to_string());
                CompletionOutcome::Failed
            }
        }
    }

    /// Applies completions until the latest fetch has finished.
    pub async fn settle(&mut self) {
        while self.state.status == FetchStatus::Loading {
            let completion = self.next_completion().await;
            self.apply_completion(completion);
        }
    }

    fn issue_fetch(&mut self) -> u64 {
        self.state.generation += 1;
        self.state.status = FetchStatus::Loading;
        let generation = self.state.generation;
        let query = ItemsQuery::new(self.state.cursor.page, self.state.search_term.clone());
        debug!(generation, page = query.page, search = %query.search, "fetching items");

        let api = Arc::clone(&self.api);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_items(&query).await;
            let _ = completions.send(FetchCompletion {
                generation,
                query,
                result,
            });
        });
        generation
    }
}

/// Reorders, in place, the items named in `sort_order` so they follow its
/// ranking. Only the slots those items already occupy are reused; every other
/// item keeps its position.
pub fn arrange_by_sort_order(items: &mut [Item], sort_order: &[ItemId]) {
    if sort_order.is_empty() || items.is_empty() {
        return;
    }

    let mut rank = HashMap::with_capacity(sort_order.len());
    for (pos, id) in sort_order.iter().enumerate() {
        rank.entry(*id).or_insert(pos);
    }

    let slots: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| rank.contains_key(&item.id))
        .map(|(pos, _)| pos)
        .collect();
    let mut ranked: Vec<Item> = slots.iter().map(|&pos| items[pos].clone()).collect();
    ranked.sort_by_key(|item| rank[&item.id]);

    for (slot, item) in slots.into_iter().zip(ranked) {
        items[slot] = item;
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
