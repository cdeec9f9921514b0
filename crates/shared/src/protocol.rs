use serde::{Deserialize, Serialize};

use crate::{
    domain::{RequestHandle, StatePath},
    error::RequestError,
};

/// Payloads of the store notification channel.
///
/// The serialized tags are the wire names consumed by external store
/// observers; the core treats them as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreNotification {
    SetRequestLoading {
        path: StatePath,
    },
    SetRequestPromise {
        path: StatePath,
        handle: RequestHandle,
    },
    SetRequestLoaded {
        path: StatePath,
    },
    SetRequestError {
        path: StatePath,
        error: RequestError,
    },
}

impl StoreNotification {
    pub fn path(&self) -> &StatePath {
        match self {
            Self::SetRequestLoading { path }
            | Self::SetRequestPromise { path, .. }
            | Self::SetRequestLoaded { path }
            | Self::SetRequestError { path, .. } => path,
        }
    }
}
