//! Pushes locally-authoritative selection and sort state to the server.
//!
//! Local state never waits on these calls and is never rolled back; a failed
//! push is logged and forgotten.

use std::{fmt, sync::Arc};

use shared::domain::ItemId;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error};

use crate::{api::ListApi, config::PersistenceMode, error::ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Selection,
    SortOrder,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selection => f.write_str("selection"),
            Self::SortOrder => f.write_str("sort order"),
        }
    }
}

async fn persist(api: &dyn ListApi, resource: Resource, ids: &[ItemId]) -> ApiResult<()> {
    match resource {
        Resource::Selection => api.save_selection(ids).await,
        Resource::SortOrder => api.save_sort_order(ids).await,
    }
}

async fn persist_logged(api: &dyn ListApi, resource: Resource, ids: &[ItemId]) {
    if let Err(err) = persist(api, resource, ids).await {
        error!(resource = %resource, count = ids.len(), "error updating {resource}: {err}");
    }
}

enum Strategy {
    FireAndForget,
    Coalescing {
        latest: watch::Sender<Option<Vec<ItemId>>>,
        _worker: JoinHandle<()>,
    },
}

/// Sync channel for one persisted resource.
///
/// Must be created inside a tokio runtime.
pub struct PersistenceSync {
    api: Arc<dyn ListApi>,
    resource: Resource,
    strategy: Strategy,
}

impl PersistenceSync {
    pub fn new(mode: PersistenceMode, resource: Resource, api: Arc<dyn ListApi>) -> Self {
        let strategy = match mode {
            PersistenceMode::FireAndForget => Strategy::FireAndForget,
            PersistenceMode::Coalescing => {
                let (latest, rx) = watch::channel(None);
                let worker = tokio::spawn(run_coalescing_worker(Arc::clone(&api), resource, rx));
                Strategy::Coalescing {
                    latest,
                    _worker: worker,
                }
            }
        };
        Self {
            api,
            resource,
            strategy,
        }
    }

    pub fn mode(&self) -> PersistenceMode {
        match self.strategy {
            Strategy::FireAndForget => PersistenceMode::FireAndForget,
            Strategy::Coalescing { .. } => PersistenceMode::Coalescing,
        }
    }

    /// Queues `ids` as the new server-side value. Returns immediately.
    pub fn push(&self, ids: Vec<ItemId>) {
        match &self.strategy {
            Strategy::FireAndForget => {
                let api = Arc::clone(&self.api);
                let resource = self.resource;
                tokio::spawn(async move {
                    persist_logged(api.as_ref(), resource, &ids).await;
                });
            }
            Strategy::Coalescing { latest, .. } => {
                debug!(resource = %self.resource, count = ids.len(), "queued latest value");
                latest.send_replace(Some(ids));
            }
        }
    }
}

/// Sends the newest queued value, one request at a time. Values queued while a
/// request is in flight are collapsed; only the last one is sent afterwards.
/// Exits once the owning `PersistenceSync` is dropped and the last value is flushed.
async fn run_coalescing_worker(
    api: Arc<dyn ListApi>,
    resource: Resource,
    mut latest: watch::Receiver<Option<Vec<ItemId>>>,
) {
    while latest.changed().await.is_ok() {
        let Some(ids) = latest.borrow_and_update().clone() else {
            continue;
        };
        persist_logged(api.as_ref(), resource, &ids).await;
    }
    debug!(resource = %resource, "persistence worker stopped");
}

#[cfg(test)]
#[path = "tests/persistence_tests.rs"]
mod tests;
