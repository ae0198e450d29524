// Certvault — Codec error types

use thiserror::Error;

use crate::artifact::ArtifactKind;
use crate::crypto::CryptoError;

/// Input could not be turned into an artifact. No partial node exists when
/// this is returned.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Input is empty")]
    Empty,

    #[error("Malformed PEM armor: {0}")]
    Armor(String),

    #[error("Unrecognized PEM label '{0}'")]
    UnknownLabel(String),

    #[error("Encrypted PEM blocks are not supported")]
    Encrypted,

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unrecognized DER structure")]
    Unrecognized,

    #[error("Malformed {kind}: {source}")]
    Malformed {
        kind: ArtifactKind,
        #[source]
        source: CryptoError,
    },

    #[error("Malformed template: {0}")]
    Template(#[from] serde_json::Error),
}

impl DecodeError {
    pub(crate) fn malformed(kind: ArtifactKind) -> impl FnOnce(CryptoError) -> DecodeError {
        move |source| DecodeError::Malformed { kind, source }
    }

    /// Human readable reason, for reporting to the caller.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}
