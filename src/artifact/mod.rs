// Certvault — Artifact Module
//
// The polymorphic artifact abstraction. Every managed object (certificate,
// key, request, revocation list, template) implements the `Artifact` trait;
// `ArtifactNode` wraps one of them together with user metadata.
// Identity is a pure function of the canonical encoding.

mod calendar;
mod hash;
mod naming;
mod node;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::crypto::CryptoError;
use crate::store::{StoreError, StoreKey};
use crate::token::TokenResidency;

pub use calendar::ics_vevent;
pub use hash::content_hash;
pub use naming::{dump_filename, strip_path_and_extension, underline};
pub use node::ArtifactNode;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Tag identifying the concrete artifact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Certificate,
    Key,
    Request,
    RevocationList,
    Template,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Key,
        ArtifactKind::Request,
        ArtifactKind::Certificate,
        ArtifactKind::Template,
        ArtifactKind::RevocationList,
    ];

    /// Tag stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Certificate => "certificate",
            ArtifactKind::Key => "key",
            ArtifactKind::Request => "request",
            ArtifactKind::RevocationList => "crl",
            ArtifactKind::Template => "template",
        }
    }

    /// Human readable type string. Participates in filter matching.
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Certificate => "Certificate",
            ArtifactKind::Key => "Key",
            ArtifactKind::Request => "Certificate request",
            ArtifactKind::RevocationList => "Revocation list",
            ArtifactKind::Template => "Template",
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            ArtifactKind::Certificate => "Certificate",
            ArtifactKind::Key => "KeyPair",
            ArtifactKind::Request => "Request",
            ArtifactKind::RevocationList => "RevocationList",
            ArtifactKind::Template => "Template",
        }
    }

    /// File extension used by default export names.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Certificate => ".crt",
            ArtifactKind::Key => ".pem",
            ArtifactKind::Request => ".csr",
            ArtifactKind::RevocationList => ".crl",
            ArtifactKind::Template => ".xca",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "certificate" => Ok(ArtifactKind::Certificate),
            "key" => Ok(ArtifactKind::Key),
            "request" => Ok(ArtifactKind::Request),
            "crl" => Ok(ArtifactKind::RevocationList),
            "template" => Ok(ArtifactKind::Template),
            other => Err(format!("unknown artifact kind '{}'", other)),
        }
    }
}

// ─── Source ──────────────────────────────────────────────────────────────────

/// Provenance of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    #[default]
    Unknown,
    Imported,
    Generated,
    Transformed,
    Token,
    LegacyDb,
    Renewed,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Unknown => "unknown",
            Source::Imported => "imported",
            Source::Generated => "generated",
            Source::Transformed => "transformed",
            Source::Token => "token",
            Source::LegacyDb => "legacy_db",
            Source::Renewed => "renewed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Source::Unknown => "Unknown",
            Source::Imported => "Imported",
            Source::Generated => "Generated",
            Source::Transformed => "Transformed",
            Source::Token => "Token",
            Source::LegacyDb => "Legacy Database",
            Source::Renewed => "Renewed",
        }
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Source::Unknown),
            "imported" => Ok(Source::Imported),
            "generated" => Ok(Source::Generated),
            "transformed" => Ok(Source::Transformed),
            "token" => Ok(Source::Token),
            "legacy_db" => Ok(Source::LegacyDb),
            "renewed" => Ok(Source::Renewed),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

/// Output representation produced by `ArtifactNode::render`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    /// Multi-line human readable dump of the structure.
    Dump,
    /// PEM armor around the canonical encoding.
    Pem,
    /// One-line colourised summary for terminals.
    Colored,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Prefix PEM output with `# ` lines carrying the name and comment.
    pub pem_comment: bool,
}

/// User-facing notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Import,
    Delete,
    DeleteMultiple,
    Create,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Contract every artifact variant implements.
///
/// Persistence and token hooks are required: a variant that has nothing to
/// do says so explicitly in its implementation.
pub trait Artifact: fmt::Debug + Send + Sync {
    fn kind(&self) -> ArtifactKind;

    /// Canonical (DER-equivalent) encoding. Deterministic for equal content.
    fn canonical(&self) -> &[u8];

    /// Label used between the PEM `BEGIN`/`END` markers.
    fn pem_label(&self) -> &'static str;

    /// Multi-line human readable dump.
    fn dump(&self) -> Result<String, CryptoError>;

    /// Short identity summary (subject, key type, ...).
    fn summary(&self) -> String;

    /// Display name derived from the artifact's own identity, if it has one.
    fn suggested_name(&self) -> Option<String>;

    /// Extra identity-relevant text matched by view filters.
    fn search_text(&self) -> Vec<String>;

    fn collect_properties(&self, props: &mut BTreeMap<String, String>)
        -> Result<(), CryptoError>;

    /// Point in time after which the artifact is no longer valid.
    fn expires(&self) -> Option<DateTime<Utc>>;

    fn residency(&self) -> Option<&TokenResidency>;

    fn residency_mut(&mut self) -> Option<&mut TokenResidency>;

    /// Write the variant-specific row for `key`. Runs inside the save transaction.
    fn save_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError>;

    /// Remove the variant-specific row for `key`. Runs inside the delete transaction.
    fn delete_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError>;

    /// Rebuild the variant from its row. `Ok(None)` when the row is missing.
    fn restore_data(conn: &Connection, key: &StoreKey) -> Result<Option<Self>, StoreError>
    where
        Self: Sized;

    /// PEM armored canonical encoding.
    fn pem(&self) -> String {
        crate::codec::armor(self.pem_label(), self.canonical())
    }
}
