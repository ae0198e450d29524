// Certvault — Token error types

use thiserror::Error;

use super::SlotId;

#[derive(Debug, Error)]
pub enum TokenError {
    /// The slot could not be reached or the driver failed to talk to it.
    #[error("Token access error on slot {slot}: {reason}")]
    Access { slot: SlotId, reason: String },

    /// No object with the requested identity lives in the slot.
    #[error("Object not found on token slot {0}")]
    NotFound(SlotId),

    #[error("Label too long for token (maximum {max} bytes)")]
    LabelTooLong { max: usize },

    #[error("Token object is read-only")]
    ReadOnly,
}
