use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

use shared::{
    domain::{PathSegment, RequestState, StatePath},
    entity::EntityMap,
    protocol::StoreNotification,
};

mod entities;
pub use entities::merge_entities;

const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

/// Process-wide state store: the per-path request lifecycle map plus the
/// nested data tree, both behind one lock.
///
/// All mutation goes through [`StateStore::apply`] or [`StateStore::claim`];
/// every applied notification is rebroadcast to subscribers so external
/// observers see the same stream the store consumed.
pub struct StateStore {
    inner: Mutex<StoreInner>,
    notifications: broadcast::Sender<StoreNotification>,
}

struct StoreInner {
    requests: HashMap<StatePath, RequestState>,
    data: Value,
}

/// Result of the atomic check-then-mark on a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller now owns the fetch; the path moved to `Loading`.
    Granted,
    /// Another caller's fetch is in flight.
    AlreadyInFlight,
    /// The path already settled successfully.
    AlreadyLoaded,
}

impl ClaimOutcome {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(StoreInner {
                requests: HashMap::new(),
                data: Value::Object(serde_json::Map::new()),
            }),
            notifications,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreNotification> {
        self.notifications.subscribe()
    }

    pub fn request_state(&self, path: &StatePath) -> RequestState {
        self.lock().requests.get(path).cloned().unwrap_or_default()
    }

    /// Atomically checks the request state at `path` and, unless a fetch is
    /// already in flight or settled, marks it `Loading`.
    ///
    /// Check and mark happen under one lock, so two callers can never both
    /// be granted the same path.
    pub fn claim(&self, path: &StatePath) -> ClaimOutcome {
        {
            let mut inner = self.lock();
            match inner.requests.get(path) {
                Some(RequestState::Loading { .. }) => return ClaimOutcome::AlreadyInFlight,
                Some(RequestState::Loaded) => return ClaimOutcome::AlreadyLoaded,
                Some(RequestState::Idle) | Some(RequestState::Error { .. }) | None => {}
            }
            inner
                .requests
                .insert(path.clone(), RequestState::Loading { handle: None });
        }
        let _ = self.notifications.send(StoreNotification::SetRequestLoading {
            path: path.clone(),
        });
        ClaimOutcome::Granted
    }

    /// Applies a notification to the request map and rebroadcasts it.
    ///
    /// Out-of-order notifications are logged and still applied
    /// (last writer wins); a path holds exactly one state at any instant.
    pub fn apply(&self, notification: StoreNotification) {
        {
            let mut inner = self.lock();
            apply_to_requests(&mut inner.requests, &notification);
        }
        let _ = self.notifications.send(notification);
    }

    pub fn data_at(&self, path: &StatePath) -> Option<Value> {
        let inner = self.lock();
        lookup(&inner.data, path.segments()).cloned()
    }

    /// Writes `value` at `path`, creating intermediate objects. Numeric
    /// segments become stringified object keys, matching how normalized
    /// maps are stored.
    pub fn put_data(&self, path: &StatePath, value: Value) {
        let mut inner = self.lock();
        insert_at(&mut inner.data, path.segments(), value);
    }

    /// Typed read of the normalized entity map at `path`; absent or
    /// malformed data reads as empty.
    pub fn entities_at(&self, path: &StatePath) -> EntityMap {
        self.data_at(path)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A poisoned lock still holds consistent state: every transition
        // completes before the guard is released.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply_to_requests(
    requests: &mut HashMap<StatePath, RequestState>,
    notification: &StoreNotification,
) {
    let path = notification.path();
    let loading = matches!(
        requests.get(path),
        Some(RequestState::Loading { .. })
    );
    let next = match notification {
        StoreNotification::SetRequestLoading { .. } => RequestState::Loading { handle: None },
        StoreNotification::SetRequestPromise { handle, .. } => {
            if !loading {
                warn!(path = %path, %handle, "handle attached to a request that is not loading");
            }
            RequestState::Loading {
                handle: Some(*handle),
            }
        }
        StoreNotification::SetRequestLoaded { .. } => {
            if !loading {
                warn!(path = %path, "request marked loaded without a loading transition");
            }
            RequestState::Loaded
        }
        StoreNotification::SetRequestError { error, .. } => {
            if !loading {
                warn!(path = %path, "request marked errored without a loading transition");
            }
            RequestState::Error {
                error: error.clone(),
            }
        }
    };
    requests.insert(path.clone(), next);
}

fn lookup<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value);
    };
    let child = match (value, head) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Object(map), PathSegment::Id(id)) => map.get(&id.to_string()),
        (Value::Array(items), PathSegment::Id(id)) => {
            usize::try_from(*id).ok().and_then(|index| items.get(index))
        }
        _ => None,
    }?;
    lookup(child, rest)
}

fn insert_at(node: &mut Value, segments: &[PathSegment], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !matches!(node, Value::Object(_)) {
        *node = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(child_key(head)).or_insert(Value::Null);
        insert_at(child, rest, value);
    }
}

fn child_key(segment: &PathSegment) -> String {
    match segment {
        PathSegment::Key(key) => key.clone(),
        PathSegment::Id(id) => id.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
