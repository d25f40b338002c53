use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use reqwest::StatusCode as ReqwestStatus;
use shared::{
    domain::{Item, ItemId},
    error::ApiError,
    protocol::{ItemsPage, ItemsQuery, PersistedState, SelectionUpdate, SortOrderUpdate},
};
use tokio::{net::TcpListener, sync::oneshot};

use crate::{
    api::ListApi,
    error::{ApiClientError, ApiResult},
};

pub fn dataset(count: i64) -> Vec<Item> {
    (1..=count).map(|id| Item::new(id, format!("Item {id}"))).collect()
}

pub fn ids(raw: &[i64]) -> Vec<ItemId> {
    raw.iter().copied().map(ItemId).collect()
}

pub fn page_of(dataset: &[Item], query: &ItemsQuery) -> ItemsPage {
    let needle = query.search.to_ascii_lowercase();
    let matching: Vec<&Item> = dataset
        .iter()
        .filter(|item| needle.is_empty() || item.value.to_ascii_lowercase().contains(&needle))
        .collect();
    let start = (query.page.saturating_sub(1) as usize) * query.limit as usize;
    let end = (start + query.limit as usize).min(matching.len());
    let items = matching
        .get(start..end)
        .unwrap_or_default()
        .iter()
        .map(|item| (*item).clone())
        .collect();
    ItemsPage {
        items,
        total_count: matching.len() as u64,
        has_more: end < matching.len(),
    }
}

fn server_error(endpoint: &'static str) -> ApiClientError {
    ApiClientError::Status {
        endpoint,
        status: ReqwestStatus::INTERNAL_SERVER_ERROR,
        detail: Some("scripted failure".into()),
    }
}

#[derive(Default)]
struct FakeState {
    persisted: Option<PersistedState>,
    dataset: Vec<Item>,
    fail_items: bool,
    fail_persistence: bool,
    gates: HashMap<String, oneshot::Receiver<()>>,
    persist_delays: VecDeque<Duration>,
    item_queries: Vec<ItemsQuery>,
    selection_posts: Vec<Vec<ItemId>>,
    sort_posts: Vec<Vec<ItemId>>,
    persist_in_flight: usize,
    max_persist_in_flight: usize,
}

/// In-process `ListApi` with a scripted dataset and recorded traffic.
#[derive(Clone, Default)]
pub struct FakeListApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeListApi {
    pub fn with_dataset(dataset: Vec<Item>) -> Self {
        let api = Self::default();
        {
            let mut state = api.lock();
            state.dataset = dataset;
            state.persisted = Some(PersistedState::default());
        }
        api
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state")
    }

    pub fn with_persisted(self, persisted: PersistedState) -> Self {
        self.lock().persisted = Some(persisted);
        self
    }

    pub fn failing_state(self) -> Self {
        self.lock().persisted = None;
        self
    }

    pub fn set_fail_items(&self, fail: bool) {
        self.lock().fail_items = fail;
    }

    pub fn set_fail_persistence(&self, fail: bool) {
        self.lock().fail_persistence = fail;
    }

    /// Holds the next `fetch_items` for `search` until the returned sender fires.
    pub fn gate_search(&self, search: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().gates.insert(search.to_string(), rx);
        tx
    }

    /// Delays applied to successive persistence calls, in call order.
    pub fn set_persist_delays(&self, delays: impl IntoIterator<Item = Duration>) {
        self.lock().persist_delays = delays.into_iter().collect();
    }

    pub fn item_queries(&self) -> Vec<ItemsQuery> {
        self.lock().item_queries.clone()
    }

    pub fn selection_posts(&self) -> Vec<Vec<ItemId>> {
        self.lock().selection_posts.clone()
    }

    pub fn sort_posts(&self) -> Vec<Vec<ItemId>> {
        self.lock().sort_posts.clone()
    }

    pub fn max_persist_in_flight(&self) -> usize {
        self.lock().max_persist_in_flight
    }

    pub async fn wait_for_selection_posts(&self, count: usize) -> Vec<Vec<ItemId>> {
        wait_until(|| self.selection_posts().len() >= count).await;
        self.selection_posts()
    }

    pub async fn wait_for_sort_posts(&self, count: usize) -> Vec<Vec<ItemId>> {
        wait_until(|| self.sort_posts().len() >= count).await;
        self.sort_posts()
    }

    async fn record_persist(
        &self,
        endpoint: &'static str,
        value: &[ItemId],
        pick: fn(&mut FakeState) -> &mut Vec<Vec<ItemId>>,
    ) -> ApiResult<()> {
        let delay = {
            let mut state = self.lock();
            state.persist_in_flight += 1;
            state.max_persist_in_flight = state.max_persist_in_flight.max(state.persist_in_flight);
            state.persist_delays.pop_front()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.persist_in_flight -= 1;
        pick(&mut state).push(value.to_vec());
        if state.fail_persistence {
            return Err(server_error(endpoint));
        }
        Ok(())
    }
}

pub async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..400 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}

#[async_trait]
impl ListApi for FakeListApi {
    async fn fetch_state(&self) -> ApiResult<PersistedState> {
        self.lock().persisted.clone().ok_or_else(|| server_error("/state"))
    }

    async fn fetch_items(&self, query: &ItemsQuery) -> ApiResult<ItemsPage> {
        let gate = {
            let mut state = self.lock();
            state.item_queries.push(query.clone());
            state.gates.remove(&query.search)
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let state = self.lock();
        if state.fail_items {
            return Err(server_error("/items"));
        }
        Ok(page_of(&state.dataset, query))
    }

    async fn save_selection(&self, selected_ids: &[ItemId]) -> ApiResult<()> {
        self.record_persist("/selection", selected_ids, |state| &mut state.selection_posts)
            .await
    }

    async fn save_sort_order(&self, sort_order: &[ItemId]) -> ApiResult<()> {
        self.record_persist("/sort", sort_order, |state| &mut state.sort_posts)
            .await
    }
}

/// State of the axum stand-in for the remote list API.
#[derive(Clone, Default)]
pub struct MockServerState {
    pub dataset: Arc<Vec<Item>>,
    pub persisted: Arc<tokio::sync::Mutex<PersistedState>>,
    pub item_queries: Arc<tokio::sync::Mutex<Vec<ItemsQuery>>>,
    pub fail_state: bool,
}

async fn handle_state(
    State(state): State<MockServerState>,
) -> Result<Json<PersistedState>, (StatusCode, Json<ApiError>)> {
    if state.fail_state {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new("state store offline")),
        ));
    }
    Ok(Json(state.persisted.lock().await.clone()))
}

async fn handle_items(
    State(state): State<MockServerState>,
    Query(query): Query<ItemsQuery>,
) -> Json<ItemsPage> {
    state.item_queries.lock().await.push(query.clone());
    Json(page_of(&state.dataset, &query))
}

async fn handle_selection(
    State(state): State<MockServerState>,
    Json(update): Json<SelectionUpdate>,
) -> Json<serde_json::Value> {
    state.persisted.lock().await.selected_ids = update.selected_ids;
    Json(serde_json::json!({ "success": true }))
}

async fn handle_sort(
    State(state): State<MockServerState>,
    Json(update): Json<SortOrderUpdate>,
) -> Json<serde_json::Value> {
    state.persisted.lock().await.sort_order = update.sort_order;
    Json(serde_json::json!({ "success": true }))
}

pub async fn spawn_list_server(state: MockServerState) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/api/state", get(handle_state))
        .route("/api/items", get(handle_items))
        .route("/api/selection", post(handle_selection))
        .route("/api/sort", post(handle_sort))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}
