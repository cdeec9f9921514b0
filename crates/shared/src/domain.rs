use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::RequestError;

/// One step of a [`StatePath`]: a string key or a numeric identifier.
///
/// Untagged on the wire, so `"tables"` and `17` both parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Id(i64),
    Key(String),
}

impl From<i64> for PathSegment {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Key(key) => write!(f, "{key}"),
        }
    }
}

/// Ordered key sequence locating a value inside the nested state tree.
///
/// Two paths are equal iff they have the same segments in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatePath(Vec<PathSegment>);

impl StatePath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builder-style append, used when deriving sibling paths.
    pub fn segment(mut self, segment: impl Into<PathSegment>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        self.0.push(segment.into());
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PathSegment> for StatePath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("empty segment in path '{0}'")]
pub struct ParsePathError(pub String);

impl FromStr for StatePath {
    type Err = ParsePathError;

    /// Parses a dotted path such as `databases.1.tables`; all-digit
    /// segments become numeric identifiers.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.is_empty() {
            return Ok(Self::new());
        }
        let mut segments = Vec::new();
        for part in raw.split('.') {
            if part.is_empty() {
                return Err(ParsePathError(raw.to_string()));
            }
            match part.parse::<i64>() {
                Ok(id) => segments.push(PathSegment::Id(id)),
                Err(_) => segments.push(PathSegment::Key(part.to_string())),
            }
        }
        Ok(Self(segments))
    }
}

#[macro_export]
macro_rules! state_path {
    () => { $crate::domain::StatePath::new() };
    ($($segment:expr),+ $(,)?) => {
        <$crate::domain::StatePath as ::std::iter::FromIterator<_>>::from_iter(
            [$($crate::domain::PathSegment::from($segment)),+],
        )
    };
}

/// Identifies one source call from loading through completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestHandle(pub Uuid);

impl RequestHandle {
    pub fn issue() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fetch lifecycle marker for one path.
///
/// Transitions: Idle → Loading → Loaded | Error, and Error → Loading on a
/// fresh fetch. A path holds exactly one state at any instant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RequestState {
    #[default]
    Idle,
    Loading {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        handle: Option<RequestHandle>,
    },
    Loaded,
    Error {
        error: RequestError,
    },
}

impl RequestState {
    /// A fetch for a path in this state is served from cache instead of
    /// reaching the data source.
    pub fn in_flight_or_loaded(&self) -> bool {
        matches!(self, Self::Loading { .. } | Self::Loaded)
    }
}
