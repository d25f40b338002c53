//! Client-side state for a paginated, searchable, selectable and reorderable
//! remote list.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod persistence;
pub mod presenter;

#[cfg(test)]
mod test_support;

pub use api::{HttpListApi, ListApi};
pub use config::{load_settings, Environment, PersistenceMode, Settings};
pub use controller::{
    CompletionOutcome, ControllerOptions, FetchCompletion, FetchStatus, ListController,
    ListIntent, ListSnapshot, PaginationCursor,
};
pub use error::{ApiClientError, ApiResult};
pub use presenter::{DragEnd, Frame, ListPresenter, Viewport, WatchRegistry};
