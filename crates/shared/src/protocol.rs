use serde::{Deserialize, Serialize};

use crate::domain::{Item, ItemId};

/// Number of items requested per page.
pub const PAGE_SIZE: u32 = 20;

/// Response of `GET /state`: selection and manual order persisted server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub selected_ids: Vec<ItemId>,
    #[serde(default)]
    pub sort_order: Vec<ItemId>,
}

/// Query string of `GET /items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub search: String,
}

impl ItemsQuery {
    pub fn new(page: u32, search: impl Into<String>) -> Self {
        Self {
            page,
            limit: PAGE_SIZE,
            search: search.into(),
        }
    }
}

/// Response of `GET /items`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsPage {
    pub items: Vec<Item>,
    pub total_count: u64,
    pub has_more: bool,
}

/// Body of `POST /selection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionUpdate {
    pub selected_ids: Vec<ItemId>,
}

/// Body of `POST /sort`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOrderUpdate {
    pub sort_order: Vec<ItemId>,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
