// Certvault — Store Module
//
// Artifact persistence on SQLite, optionally SQLCipher-encrypted. Every
// create, update, re-parent and delete is written to the audit log in the
// same transaction as the change itself.

mod db;
mod error;
mod models;
mod repository;

pub use db::Database;
pub use error::StoreError;
pub use models::{AuditEntry, ItemRow, StoreKey};
pub use repository::{ArtifactStore, SqliteArtifactStore};
