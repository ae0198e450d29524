// Certvault — Store error types

use thiserror::Error;

use super::StoreKey;
use crate::artifact::ArtifactKind;
use crate::crypto::CryptoError;
use crate::tree::TreeError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The row behind a store key vanished between listing and fetch.
    #[error("Row not found for {key}: {description}")]
    RowNotFound { key: StoreKey, description: String },

    #[error("Stored data for {key} is corrupt: {reason}")]
    Corrupt { key: StoreKey, reason: String },

    /// The node's store key belongs to a row of a different kind.
    #[error("Store key {key} belongs to a {found} row, not a {expected}")]
    Ownership {
        key: StoreKey,
        expected: ArtifactKind,
        found: String,
    },

    #[error("{0} has never been saved")]
    Unsaved(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Invalid database key — wrong passphrase or not a certvault database")]
    InvalidKey,
}
