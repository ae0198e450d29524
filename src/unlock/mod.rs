// Certvault — Unlock Module
//
// Turns a user passphrase into the SQLCipher key for one database file.
// Derivation is Argon2id with a salt bound to the database file name, so the
// same passphrase opens the same vault and nothing else.

mod error;
mod passphrase;

pub use error::UnlockError;
pub use passphrase::{key_to_hex, DatabaseKeySource, KdfCost, PassphraseKeySource};
