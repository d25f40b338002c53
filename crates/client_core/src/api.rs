use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::ItemId,
    error::ApiError,
    protocol::{ItemsPage, ItemsQuery, PersistedState, SelectionUpdate, SortOrderUpdate},
};
use url::Url;

use crate::error::{ApiClientError, ApiResult};

const STATE_ENDPOINT: &str = "/state";
const ITEMS_ENDPOINT: &str = "/items";
const SELECTION_ENDPOINT: &str = "/selection";
const SORT_ENDPOINT: &str = "/sort";

/// Remote contract the list controller talks to.
#[async_trait]
pub trait ListApi: Send + Sync {
    async fn fetch_state(&self) -> ApiResult<PersistedState>;
    async fn fetch_items(&self, query: &ItemsQuery) -> ApiResult<ItemsPage>;
    async fn save_selection(&self, selected_ids: &[ItemId]) -> ApiResult<()>;
    async fn save_sort_order(&self, sort_order: &[ItemId]) -> ApiResult<()>;
}

pub struct HttpListApi {
    http: Client,
    base_url: String,
}

impl HttpListApi {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiClientError::Transport {
                endpoint: "client",
                source,
            })?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = base_url.into();
        Url::parse(&base_url).map_err(|source| ApiClientError::InvalidBaseUrl {
            url: base_url.clone(),
            source,
        })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }
}

async fn ensure_success(endpoint: &'static str, res: Response) -> ApiResult<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let detail = match res.text().await {
        Ok(body) if !body.trim().is_empty() => Some(
            serde_json::from_str::<ApiError>(&body)
                .map(|err| err.message)
                .unwrap_or(body),
        ),
        _ => None,
    };
    Err(ApiClientError::Status {
        endpoint,
        status,
        detail,
    })
}

fn transport(endpoint: &'static str) -> impl FnOnce(reqwest::Error) -> ApiClientError {
    move |source| ApiClientError::Transport { endpoint, source }
}

fn decode(endpoint: &'static str) -> impl FnOnce(reqwest::Error) -> ApiClientError {
    move |source| ApiClientError::Decode { endpoint, source }
}

#[async_trait]
impl ListApi for HttpListApi {
    async fn fetch_state(&self) -> ApiResult<PersistedState> {
        let res = self
            .http
            .get(self.url(STATE_ENDPOINT))
            .send()
            .await
            .map_err(transport(STATE_ENDPOINT))?;
        ensure_success(STATE_ENDPOINT, res)
            .await?
            .json()
            .await
            .map_err(decode(STATE_ENDPOINT))
    }

    async fn fetch_items(&self, query: &ItemsQuery) -> ApiResult<ItemsPage> {
        let res = self
            .http
            .get(self.url(ITEMS_ENDPOINT))
            .query(query)
            .send()
            .await
            .map_err(transport(ITEMS_ENDPOINT))?;
        ensure_success(ITEMS_ENDPOINT, res)
            .await?
            .json()
            .await
            .map_err(decode(ITEMS_ENDPOINT))
    }

    async fn save_selection(&self, selected_ids: &[ItemId]) -> ApiResult<()> {
        let res = self
            .http
            .post(self.url(SELECTION_ENDPOINT))
            .json(&SelectionUpdate {
                selected_ids: selected_ids.to_vec(),
            })
            .send()
            .await
            .map_err(transport(SELECTION_ENDPOINT))?;
        ensure_success(SELECTION_ENDPOINT, res).await?;
        Ok(())
    }

    async fn save_sort_order(&self, sort_order: &[ItemId]) -> ApiResult<()> {
        let res = self
            .http
            .post(self.url(SORT_ENDPOINT))
            .json(&SortOrderUpdate {
                sort_order: sort_order.to_vec(),
            })
            .send()
            .await
            .map_err(transport(SORT_ENDPOINT))?;
        ensure_success(SORT_ENDPOINT, res).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
