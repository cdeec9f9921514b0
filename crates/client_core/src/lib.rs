use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use shared::{
    domain::{RequestHandle, RequestState, StatePath},
    entity::{EntityMap, EntityUpdates},
    error::{ErrorCode, RequestError},
    protocol::StoreNotification,
};
use store::{merge_entities, ClaimOutcome, StateStore};

pub mod config;
pub mod transport;

/// The remote API behind the cache. `get` reads the resource at a path,
/// `put` replaces it and returns the stored result.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn get(&self, path: &StatePath) -> Result<Value, RequestError>;
    async fn put(&self, path: &StatePath, body: Value) -> Result<Value, RequestError>;
}

pub struct MissingDataSource;

#[async_trait]
impl DataSource for MissingDataSource {
    async fn get(&self, path: &StatePath) -> Result<Value, RequestError> {
        Err(RequestError::new(
            ErrorCode::Unavailable,
            format!("no data source configured for {path}"),
        ))
    }

    async fn put(&self, path: &StatePath, _body: Value) -> Result<Value, RequestError> {
        Err(RequestError::new(
            ErrorCode::Unavailable,
            format!("no data source configured for {path}"),
        ))
    }
}

/// Fetches the resource at `existing_data_path`, deduplicated per
/// `request_state_path`.
///
/// A path that is already loading or loaded is served from the data tree
/// without touching the source or emitting notifications. Otherwise the
/// path is claimed, `get_data` runs, and the outcome is recorded as
/// loading → promise/loaded on success or loading → error on failure.
/// A failed source call never surfaces to the caller: the previous value
/// (or `None`) comes back and the error lives in the request state.
pub async fn fetch_data<F, Fut>(
    store: &StateStore,
    request_state_path: &StatePath,
    existing_data_path: &StatePath,
    get_data: F,
) -> Option<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, RequestError>>,
{
    match store.claim(request_state_path) {
        ClaimOutcome::AlreadyInFlight | ClaimOutcome::AlreadyLoaded => {
            debug!(path = %request_state_path, "fetch served from cache");
            store.data_at(existing_data_path)
        }
        ClaimOutcome::Granted => {
            let handle = RequestHandle::issue();
            match get_data().await {
                Ok(data) => {
                    store.put_data(existing_data_path, data.clone());
                    store.apply(StoreNotification::SetRequestPromise {
                        path: request_state_path.clone(),
                        handle,
                    });
                    store.apply(StoreNotification::SetRequestLoaded {
                        path: request_state_path.clone(),
                    });
                    Some(data)
                }
                Err(error) => {
                    warn!(path = %request_state_path, %error, "fetch failed, serving cached data");
                    store.apply(StoreNotification::SetRequestError {
                        path: request_state_path.clone(),
                        error,
                    });
                    store.data_at(existing_data_path)
                }
            }
        }
    }
}

/// Pushes a mutation through `put_data` and records its lifecycle at
/// `request_state_path`. Never deduplicated: the mutation runs no matter
/// what state the path is in.
///
/// On failure the previous value at `existing_data_path` is preserved and
/// returned; the error is recorded in the request state.
pub async fn update_data<F, Fut>(
    store: &StateStore,
    request_state_path: &StatePath,
    existing_data_path: &StatePath,
    put_data: F,
) -> Option<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, RequestError>>,
{
    store.apply(StoreNotification::SetRequestLoading {
        path: request_state_path.clone(),
    });
    let handle = RequestHandle::issue();
    match put_data().await {
        Ok(data) => {
            store.put_data(existing_data_path, data.clone());
            store.apply(StoreNotification::SetRequestPromise {
                path: request_state_path.clone(),
                handle,
            });
            store.apply(StoreNotification::SetRequestLoaded {
                path: request_state_path.clone(),
            });
            Some(data)
        }
        Err(error) => {
            warn!(path = %request_state_path, %error, "update failed, keeping previous data");
            store.apply(StoreNotification::SetRequestError {
                path: request_state_path.clone(),
                error,
            });
            store.data_at(existing_data_path)
        }
    }
}

/// Ties a [`StateStore`] to a [`DataSource`]; what UI-facing code holds.
pub struct CacheClient {
    store: Arc<StateStore>,
    source: Arc<dyn DataSource>,
}

impl CacheClient {
    pub fn new(source: Arc<dyn DataSource>) -> Arc<Self> {
        Self::with_store(Arc::new(StateStore::new()), source)
    }

    pub fn with_store(store: Arc<StateStore>, source: Arc<dyn DataSource>) -> Arc<Self> {
        Arc::new(Self { store, source })
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreNotification> {
        self.store.subscribe()
    }

    pub fn cached(&self, path: &StatePath) -> Option<Value> {
        self.store.data_at(path)
    }

    pub fn request_state(&self, path: &StatePath) -> RequestState {
        self.store.request_state(path)
    }

    pub async fn fetch(
        &self,
        request_state_path: &StatePath,
        existing_data_path: &StatePath,
    ) -> Option<Value> {
        fetch_data(&self.store, request_state_path, existing_data_path, || {
            self.source.get(existing_data_path)
        })
        .await
    }

    pub async fn update(
        &self,
        request_state_path: &StatePath,
        existing_data_path: &StatePath,
        body: Value,
    ) -> Option<Value> {
        update_data(&self.store, request_state_path, existing_data_path, || {
            self.source.put(existing_data_path, body)
        })
        .await
    }

    /// Fetches an incremental entity update set from the source and merges
    /// it into the normalized map at `existing_data_path`. Returns the
    /// post-merge map (or the cached one on a deduplicated call).
    pub async fn fetch_entities(
        &self,
        request_state_path: &StatePath,
        existing_data_path: &StatePath,
    ) -> Option<EntityMap> {
        let merged = fetch_data(&self.store, request_state_path, existing_data_path, || async move {
            let payload = self.source.get(existing_data_path).await?;
            let updates: EntityUpdates = serde_json::from_value(payload).map_err(|err| {
                RequestError::new(
                    ErrorCode::Validation,
                    format!("malformed entity update payload: {err}"),
                )
            })?;
            let existing = self.store.entities_at(existing_data_path);
            serde_json::to_value(merge_entities(&existing, updates)).map_err(|err| {
                RequestError::new(
                    ErrorCode::Internal,
                    format!("entity map is not serializable: {err}"),
                )
            })
        })
        .await?;
        serde_json::from_value(merged).ok()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
