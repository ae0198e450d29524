// Certvault — Store data models
//
// Row shapes shared by the repository and its callers. None of them carry
// key material; listing never touches the variant tables.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::{ArtifactKind, Source};

/// Opaque identifier of a persisted artifact. Assigned once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey(Uuid);

impl StoreKey {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for StoreKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(StoreKey)
    }
}

/// Generic metadata of one `items` row, used for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRow {
    pub key: StoreKey,
    pub kind: ArtifactKind,
    pub name: String,
    pub comment: String,
    pub source: Source,
    pub created_at: DateTime<Utc>,
    pub content_hash: u32,
    pub parent: Option<StoreKey>,
}

impl fmt::Display for ItemRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} ({})",
            self.key,
            self.kind.label(),
            self.name,
            self.source.label()
        )
    }
}

/// One entry of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub item: StoreKey,
    pub action: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub details: Option<String>,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} by {}", self.timestamp.to_rfc3339(), self.action, self.actor)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}
