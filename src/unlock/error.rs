// Certvault — Unlock error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnlockError {
    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Passphrase must not be empty")]
    EmptyPassphrase,
}
