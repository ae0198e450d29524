// Certvault — Top-level error types
//
// Aggregates the errors of every module into a single enum for the
// application boundary. None of them is fatal to the process.

use thiserror::Error;

/// Top-level error type for all certvault operations.
#[derive(Debug, Error)]
pub enum CertvaultError {
    #[error("Decode error: {0}")]
    Decode(#[from] crate::codec::DecodeError),

    #[error("Hierarchy error: {0}")]
    Tree(#[from] crate::tree::TreeError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Token error: {0}")]
    Token(#[from] crate::token::TokenError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crate::crypto::CryptoError),

    #[error("Unlock error: {0}")]
    Unlock(#[from] crate::unlock::UnlockError),

    #[error("Invalid filter: {0}")]
    Filter(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not available: {0}")]
    NotAvailable(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CertvaultError>;
