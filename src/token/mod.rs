// Certvault — Token Module
//
// Residency of artifacts on a hardware security token. The concrete driver
// (PKCS#11 or anything else) sits behind the `TokenDriver` trait; this module
// only maps artifact identities onto slot objects and interprets the outcome.
// "Not found" is never fatal: delete and rename treat it as already satisfied.

mod error;
mod memory;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactKind, ArtifactNode};

pub use error::TokenError;
pub use memory::MemoryToken;

// ─── Types ───────────────────────────────────────────────────────────────────

/// Opaque slot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a token-backed artifact lives on the hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResidency {
    pub slot: SlotId,
    pub label: String,
    /// CKA_ID style object identifier.
    pub object_id: Vec<u8>,
}

impl TokenResidency {
    pub fn new(slot: SlotId, label: impl Into<String>, object_id: impl Into<Vec<u8>>) -> Self {
        Self {
            slot,
            label: label.into(),
            object_id: object_id.into(),
        }
    }

    /// Split into the nullable `token_*` columns of a variant row.
    pub(crate) fn to_columns(
        residency: Option<&TokenResidency>,
    ) -> (Option<i64>, Option<String>, Option<Vec<u8>>) {
        match residency {
            Some(r) => (
                Some(r.slot.0 as i64),
                Some(r.label.clone()),
                Some(r.object_id.clone()),
            ),
            None => (None, None, None),
        }
    }

    /// Inverse of `to_columns`. A row without a slot is not resident.
    pub(crate) fn from_columns(
        slot: Option<i64>,
        label: Option<String>,
        object_id: Option<Vec<u8>>,
    ) -> Option<TokenResidency> {
        let slot = slot?;
        Some(TokenResidency {
            slot: SlotId(slot as u64),
            label: label.unwrap_or_default(),
            object_id: object_id.unwrap_or_default(),
        })
    }
}

// ─── Driver boundary ─────────────────────────────────────────────────────────

/// Handle of one object inside a slot, as returned by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u64);

/// The hardware-facing side. Implementations own timeouts and retries; every
/// call may block.
pub trait TokenDriver: Send + Sync {
    /// Slot used when the caller does not name one.
    fn default_slot(&self) -> Result<SlotId, TokenError>;

    /// Objects in `slot` of the given kind whose identity matches `identity`
    /// (the canonical encoding of the artifact).
    fn find_objects(
        &self,
        slot: SlotId,
        kind: ArtifactKind,
        identity: &[u8],
    ) -> Result<Vec<ObjectHandle>, TokenError>;

    fn destroy_object(&self, slot: SlotId, object: ObjectHandle) -> Result<(), TokenError>;

    fn set_label(&self, slot: SlotId, object: ObjectHandle, label: &str) -> Result<(), TokenError>;
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// This many matching objects were destroyed.
    Deleted(usize),
    /// Nothing matched; the delete is already satisfied.
    AlreadyAbsent,
    /// The artifact is not token-backed; nothing to do.
    NotResident,
}

/// Result of a relabel. Partial failures are reported here, not as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    NotFound,
    LabelTooLong,
    ReadOnly,
}

impl RenameOutcome {
    /// Numeric result code: zero when the rename is satisfied.
    pub fn code(&self) -> i32 {
        match self {
            RenameOutcome::Renamed | RenameOutcome::NotFound => 0,
            RenameOutcome::LabelTooLong => 1,
            RenameOutcome::ReadOnly => 2,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code() == 0
    }
}

// ─── Gateway ─────────────────────────────────────────────────────────────────

/// Token operations on artifact nodes.
#[derive(Clone)]
pub struct TokenGateway {
    driver: Arc<dyn TokenDriver>,
}

impl TokenGateway {
    pub fn new(driver: Arc<dyn TokenDriver>) -> Self {
        Self { driver }
    }

    /// Remove the node's hardware object from the slot it is recorded in, or
    /// from the driver's default slot when the residency names none.
    pub fn delete_from_token(&self, node: &ArtifactNode) -> Result<DeleteOutcome, TokenError> {
        let Some(residency) = node.payload().residency() else {
            return Ok(DeleteOutcome::NotResident);
        };
        let slot = residency.slot;
        self.delete_from_token_in(node, slot)
    }

    pub fn delete_from_token_in(
        &self,
        node: &ArtifactNode,
        slot: SlotId,
    ) -> Result<DeleteOutcome, TokenError> {
        if node.payload().residency().is_none() {
            return Ok(DeleteOutcome::NotResident);
        }

        let objects = match self.driver.find_objects(slot, node.kind(), node.canonical_encode()) {
            Ok(objects) => objects,
            Err(TokenError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut deleted = 0;
        for object in objects {
            match self.driver.destroy_object(slot, object) {
                Ok(()) => deleted += 1,
                Err(TokenError::NotFound(_)) => {
                    tracing::debug!(slot = %slot, node = %node, "Token object vanished before delete");
                }
                Err(e) => return Err(e),
            }
        }

        if deleted == 0 {
            tracing::debug!(slot = %slot, node = %node, "Nothing to delete on token");
            return Ok(DeleteOutcome::AlreadyAbsent);
        }

        tracing::info!(slot = %slot, node = %node, deleted, "Deleted token objects");
        Ok(DeleteOutcome::Deleted(deleted))
    }

    /// Same as `delete_from_token_in` using the driver's default slot.
    pub fn delete_from_default_slot(
        &self,
        node: &ArtifactNode,
    ) -> Result<DeleteOutcome, TokenError> {
        let slot = self.driver.default_slot()?;
        self.delete_from_token_in(node, slot)
    }

    /// Relabel the hardware object. Communication failures are errors; label
    /// and permission problems come back as a non-zero `RenameOutcome`.
    /// On success the node's recorded residency label is updated too.
    pub fn rename_on_token(
        &self,
        node: &mut ArtifactNode,
        slot: SlotId,
        label: &str,
    ) -> Result<RenameOutcome, TokenError> {
        if node.payload().residency().is_none() {
            return Ok(RenameOutcome::NotFound);
        }

        let objects = match self.driver.find_objects(slot, node.kind(), node.canonical_encode()) {
            Ok(objects) => objects,
            Err(TokenError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        if objects.is_empty() {
            tracing::debug!(slot = %slot, node = %node, "Nothing to rename on token");
            return Ok(RenameOutcome::NotFound);
        }

        for object in objects {
            match self.driver.set_label(slot, object, label) {
                Ok(()) => {}
                Err(TokenError::NotFound(_)) => {}
                Err(TokenError::LabelTooLong { max }) => {
                    tracing::warn!(slot = %slot, max, "Token label too long");
                    return Ok(RenameOutcome::LabelTooLong);
                }
                Err(TokenError::ReadOnly) => {
                    tracing::warn!(slot = %slot, node = %node, "Token object is read-only");
                    return Ok(RenameOutcome::ReadOnly);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(residency) = node.payload_mut().residency_mut() {
            residency.label = label.to_string();
        }
        tracing::info!(slot = %slot, label, "Renamed token object");
        Ok(RenameOutcome::Renamed)
    }
}

impl fmt::Debug for TokenGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGateway").finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    const LEAF_PEM: &[u8] = include_bytes!("../../tests/fixtures/leaf_cert.pem");
    const KEY_PEM: &[u8] = include_bytes!("../../tests/fixtures/leaf_key.pem");

    const SLOT: SlotId = SlotId(1);

    fn resident(bytes: &[u8], token: &MemoryToken) -> ArtifactNode {
        let mut node = codec::decode(bytes, "").unwrap();
        token.store(SLOT, &node, "leaf");
        assert!(node
            .payload_mut()
            .set_residency(TokenResidency::new(SLOT, "leaf", vec![1])));
        node
    }

    #[test]
    fn test_delete_resident_object() {
        let token = Arc::new(MemoryToken::new(SLOT));
        let gateway = TokenGateway::new(token.clone());
        let node = resident(LEAF_PEM, &token);

        assert_eq!(gateway.delete_from_token(&node).unwrap(), DeleteOutcome::Deleted(1));
        assert_eq!(token.object_count(SLOT), 0);
    }

    #[test]
    fn test_delete_twice_is_idempotent() {
        let token = Arc::new(MemoryToken::new(SLOT));
        let gateway = TokenGateway::new(token.clone());
        let node = resident(KEY_PEM, &token);

        gateway.delete_from_token(&node).unwrap();
        assert_eq!(
            gateway.delete_from_token(&node).unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
    }

    #[test]
    fn test_non_resident_is_noop() {
        let token = Arc::new(MemoryToken::new(SLOT));
        let gateway = TokenGateway::new(token);
        let node = codec::decode(LEAF_PEM, "").unwrap();
        assert_eq!(gateway.delete_from_token(&node).unwrap(), DeleteOutcome::NotResident);
    }

    #[test]
    fn test_unreachable_slot_is_access_error() {
        let token = Arc::new(MemoryToken::new(SLOT));
        let gateway = TokenGateway::new(token.clone());
        let node = resident(LEAF_PEM, &token);
        let err = gateway.delete_from_token_in(&node, SlotId(99)).unwrap_err();
        assert!(matches!(err, TokenError::Access { .. }));
    }

    #[test]
    fn test_rename_updates_label() {
        let token = Arc::new(MemoryToken::new(SLOT));
        let gateway = TokenGateway::new(token.clone());
        let mut node = resident(LEAF_PEM, &token);

        let outcome = gateway.rename_on_token(&mut node, SLOT, "web server").unwrap();
        assert_eq!(outcome, RenameOutcome::Renamed);
        assert_eq!(outcome.code(), 0);
        assert_eq!(token.labels(SLOT), vec!["web server".to_string()]);
        assert_eq!(node.payload().residency().unwrap().label, "web server");
    }

    #[test]
    fn test_rename_partial_failures_return_codes() {
        let token = Arc::new(MemoryToken::new(SLOT).with_max_label(4));
        let gateway = TokenGateway::new(token.clone());
        let mut node = resident(LEAF_PEM, &token);

        let outcome = gateway.rename_on_token(&mut node, SLOT, "much too long").unwrap();
        assert_eq!(outcome, RenameOutcome::LabelTooLong);
        assert_ne!(outcome.code(), 0);
        assert_eq!(node.payload().residency().unwrap().label, "leaf");

        token.set_read_only(true);
        let outcome = gateway.rename_on_token(&mut node, SLOT, "ok").unwrap();
        assert_eq!(outcome, RenameOutcome::ReadOnly);
        assert_eq!(outcome.code(), 2);
    }

    #[test]
    fn test_rename_missing_object_is_satisfied() {
        let token = Arc::new(MemoryToken::new(SLOT));
        let gateway = TokenGateway::new(token.clone());
        let mut node = resident(LEAF_PEM, &token);
        gateway.delete_from_token(&node).unwrap();

        let outcome = gateway.rename_on_token(&mut node, SLOT, "x").unwrap();
        assert_eq!(outcome, RenameOutcome::NotFound);
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_residency_columns() {
        let r = TokenResidency::new(SlotId(3), "label", vec![9, 8]);
        let (slot, label, id) = TokenResidency::to_columns(Some(&r));
        assert_eq!(TokenResidency::from_columns(slot, label, id), Some(r));
        assert_eq!(TokenResidency::from_columns(None, None, None), None);
    }
}
