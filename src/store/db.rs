// Certvault — SQLCipher Database Management
//
// Opens and initializes the artifact database. With a key the file is
// SQLCipher-encrypted and the key is set via PRAGMA before any table is
// touched; without one it is a plain SQLite file. Foreign keys are enforced
// so an item row can never outlive its parent's children.

use std::path::Path;

use rusqlite::Connection;

use super::StoreError;

/// Wrapper around the artifact database connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) an encrypted database at the given path.
    /// The `hex_key` must be the hex-encoded 32-byte key derived from the passphrase.
    pub fn open(path: &Path, hex_key: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "key", format!("x'{}'", hex_key))?;

        // A wrong key surfaces here as "file is not a database"
        conn.execute_batch("SELECT count(*) FROM sqlite_master;")
            .map_err(|_| StoreError::InvalidKey)?;

        Self::init(conn)
    }

    /// Open (or create) an unencrypted database at the given path.
    pub fn open_plain(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("SELECT count(*) FROM sqlite_master;")
            .map_err(|_| StoreError::InvalidKey)?;
        Self::init(conn)
    }

    /// Open an in-memory database (unencrypted, for testing only).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run schema migrations to create or update tables.
    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS items (
                id              TEXT PRIMARY KEY,
                kind            TEXT NOT NULL,
                name            TEXT NOT NULL DEFAULT '',
                comment         TEXT NOT NULL DEFAULT '',
                source          TEXT NOT NULL DEFAULT 'unknown',
                created_at      TEXT NOT NULL,
                content_hash    INTEGER NOT NULL,
                file_hint       TEXT,
                parent          TEXT REFERENCES items(id)
            );

            CREATE TABLE IF NOT EXISTS certificates (
                item            TEXT PRIMARY KEY REFERENCES items(id),
                der             BLOB NOT NULL,
                token_slot      INTEGER,
                token_label     TEXT,
                token_object_id BLOB
            );

            CREATE TABLE IF NOT EXISTS keys (
                item            TEXT PRIMARY KEY REFERENCES items(id),
                public_der      BLOB NOT NULL,
                private_der     BLOB,
                token_slot      INTEGER,
                token_label     TEXT,
                token_object_id BLOB
            );

            CREATE TABLE IF NOT EXISTS requests (
                item            TEXT PRIMARY KEY REFERENCES items(id),
                der             BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS revocations (
                item            TEXT PRIMARY KEY REFERENCES items(id),
                der             BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS templates (
                item            TEXT PRIMARY KEY REFERENCES items(id),
                body            TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                item            TEXT NOT NULL,
                action          TEXT NOT NULL,
                actor           TEXT NOT NULL,
                timestamp       TEXT NOT NULL,
                details         TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_items_kind ON items(kind);
            CREATE INDEX IF NOT EXISTS idx_items_hash ON items(content_hash);
            CREATE INDEX IF NOT EXISTS idx_items_parent ON items(parent);
            CREATE INDEX IF NOT EXISTS idx_audit_item ON audit_log(item);
            ",
        )?;

        tracing::debug!("Database migrations completed successfully");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
