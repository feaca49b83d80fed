use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snowflake::SnowflakeId;

/// Identifier of a dial. Opaque to callers; dial and board identifiers
/// are drawn from independent namespaces and never collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialId(String);

/// Identifier of a board.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(String);

impl DialId {
    pub(crate) fn generate(id: SnowflakeId) -> Self {
        Self(format!("d-{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl BoardId {
    pub(crate) fn generate(id: SnowflakeId) -> Self {
        Self(format!("b-{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DialId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DialId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for BoardId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BoardId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A user-controlled scalar with a display name.
///
/// The token is fixed at creation and is the sole credential for later
/// value updates. It is persisted with the record; boundary layers own
/// keeping it out of externally-visible representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dial {
    pub id: DialId,
    pub token: String,
    pub name: String,
    pub value: f64,
    pub updated_at: DateTime<Utc>,
}

/// A named, ordered collection of dial references.
///
/// Only `dial_refs` is persisted; `dials` is re-resolved from current
/// dial state on every read and may be shorter than `dial_refs` when a
/// referenced dial no longer resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub token: String,
    pub name: String,
    pub dial_refs: Vec<DialId>,
    #[serde(skip)]
    pub dials: Vec<Dial>,
    pub updated_at: DateTime<Utc>,
}
