// Certvault — Artifact variants
//
// One concrete type per artifact kind, gathered in the `Payload` sum type.
// `Payload` forwards the `Artifact` contract with an exhaustive match so
// adding a kind is a compile error everywhere it matters.

mod certificate;
mod crl;
mod key;
mod request;
mod template;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::artifact::{Artifact, ArtifactKind};
use crate::crypto::CryptoError;
use crate::store::{StoreError, StoreKey};
use crate::token::TokenResidency;

pub use certificate::Certificate;
pub use crl::RevocationList;
pub use key::KeyPair;
pub use request::Request;
pub use template::{Template, TemplateBody};

/// The concrete artifact carried by an `ArtifactNode`.
#[derive(Debug)]
pub enum Payload {
    Certificate(Certificate),
    Key(KeyPair),
    Request(Request),
    RevocationList(RevocationList),
    Template(Template),
}

macro_rules! dispatch {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            Payload::Certificate($v) => $body,
            Payload::Key($v) => $body,
            Payload::Request($v) => $body,
            Payload::RevocationList($v) => $body,
            Payload::Template($v) => $body,
        }
    };
}

impl Payload {
    pub fn kind(&self) -> ArtifactKind {
        dispatch!(self, v => v.kind())
    }

    pub fn canonical(&self) -> &[u8] {
        dispatch!(self, v => v.canonical())
    }

    pub fn pem_label(&self) -> &'static str {
        dispatch!(self, v => v.pem_label())
    }

    pub fn pem(&self) -> String {
        dispatch!(self, v => v.pem())
    }

    pub fn dump(&self) -> Result<String, CryptoError> {
        dispatch!(self, v => v.dump())
    }

    pub fn summary(&self) -> String {
        dispatch!(self, v => v.summary())
    }

    pub fn suggested_name(&self) -> Option<String> {
        dispatch!(self, v => v.suggested_name())
    }

    pub fn search_text(&self) -> Vec<String> {
        dispatch!(self, v => v.search_text())
    }

    pub fn collect_properties(
        &self,
        props: &mut BTreeMap<String, String>,
    ) -> Result<(), CryptoError> {
        dispatch!(self, v => v.collect_properties(props))
    }

    pub fn expires(&self) -> Option<DateTime<Utc>> {
        dispatch!(self, v => v.expires())
    }

    pub fn residency(&self) -> Option<&TokenResidency> {
        dispatch!(self, v => v.residency())
    }

    pub fn residency_mut(&mut self) -> Option<&mut TokenResidency> {
        dispatch!(self, v => v.residency_mut())
    }

    /// Mark the artifact as living on a token. Returns false for kinds that
    /// cannot be token-backed.
    pub fn set_residency(&mut self, residency: TokenResidency) -> bool {
        match self {
            Payload::Certificate(c) => {
                c.set_residency(Some(residency));
                true
            }
            Payload::Key(k) => {
                k.set_residency(Some(residency));
                true
            }
            Payload::Request(_) | Payload::RevocationList(_) | Payload::Template(_) => false,
        }
    }

    pub(crate) fn save_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError> {
        dispatch!(self, v => v.save_data(conn, key))
    }

    pub(crate) fn delete_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError> {
        dispatch!(self, v => v.delete_data(conn, key))
    }

    /// Rebuild the variant of `kind` stored under `key`.
    pub(crate) fn restore(
        kind: ArtifactKind,
        conn: &Connection,
        key: &StoreKey,
    ) -> Result<Option<Payload>, StoreError> {
        Ok(match kind {
            ArtifactKind::Certificate => {
                Certificate::restore_data(conn, key)?.map(Payload::Certificate)
            }
            ArtifactKind::Key => KeyPair::restore_data(conn, key)?.map(Payload::Key),
            ArtifactKind::Request => Request::restore_data(conn, key)?.map(Payload::Request),
            ArtifactKind::RevocationList => {
                RevocationList::restore_data(conn, key)?.map(Payload::RevocationList)
            }
            ArtifactKind::Template => Template::restore_data(conn, key)?.map(Payload::Template),
        })
    }

    pub fn as_certificate(&self) -> Option<&Certificate> {
        match self {
            Payload::Certificate(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&KeyPair> {
        match self {
            Payload::Key(k) => Some(k),
            _ => None,
        }
    }

    pub(crate) fn as_key_mut(&mut self) -> Option<&mut KeyPair> {
        match self {
            Payload::Key(k) => Some(k),
            _ => None,
        }
    }
}

impl From<Certificate> for Payload {
    fn from(v: Certificate) -> Self {
        Payload::Certificate(v)
    }
}

impl From<KeyPair> for Payload {
    fn from(v: KeyPair) -> Self {
        Payload::Key(v)
    }
}

impl From<Request> for Payload {
    fn from(v: Request) -> Self {
        Payload::Request(v)
    }
}

impl From<RevocationList> for Payload {
    fn from(v: RevocationList) -> Self {
        Payload::RevocationList(v)
    }
}

impl From<Template> for Payload {
    fn from(v: Template) -> Self {
        Payload::Template(v)
    }
}

/// Map a parse failure on stored bytes to a corruption error for `key`.
pub(crate) fn corrupt(key: &StoreKey, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt {
        key: key.clone(),
        reason: err.to_string(),
    }
}
