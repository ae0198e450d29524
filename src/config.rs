// Certvault — Configuration
//
// Resolved from the global CLI arguments (each with an environment
// fallback). Decides where the database lives and whether it is encrypted.

use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::error::Result;
use crate::store::Database;
use crate::unlock::{key_to_hex, DatabaseKeySource, KdfCost, PassphraseKeySource};

/// Default directory for certvault data files.
pub fn data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("certvault")
}

/// Path of the database when none is configured.
pub fn default_db_path() -> PathBuf {
    data_dir().join("certvault.db")
}

pub struct Config {
    pub db_path: PathBuf,
    passphrase: Option<Zeroizing<String>>,
    pub kdf_cost: KdfCost,
    /// Prefix PEM exports with `#` name and comment lines.
    pub pem_comment: bool,
}

impl Config {
    pub fn new(db_path: Option<PathBuf>, passphrase: Option<String>, pem_comment: bool) -> Self {
        Self {
            db_path: db_path.unwrap_or_else(default_db_path),
            passphrase: passphrase.filter(|p| !p.is_empty()).map(Zeroizing::new),
            kdf_cost: KdfCost::default(),
            pem_comment,
        }
    }

    pub fn with_kdf_cost(mut self, cost: KdfCost) -> Self {
        self.kdf_cost = cost;
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.passphrase.is_some()
    }

    /// Open (creating if needed) the configured database. With a passphrase
    /// the file is SQLCipher-encrypted.
    pub fn open_database(&self) -> Result<Database> {
        if let Some(dir) = self.db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        match self.passphrase {
            Some(ref passphrase) => {
                let source = PassphraseKeySource::with_cost(passphrase.as_str(), self.kdf_cost)?;
                let key = source.derive_db_key(&self.db_path)?;
                let hex_key = key_to_hex(&key);
                tracing::debug!(path = %self.db_path.display(), "Opening encrypted database");
                Ok(Database::open(&self.db_path, &hex_key)?)
            }
            None => {
                tracing::debug!(path = %self.db_path.display(), "Opening plain database");
                Ok(Database::open_plain(&self.db_path)?)
            }
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("db_path", &self.db_path)
            .field("encrypted", &self.is_encrypted())
            .field("pem_comment", &self.pem_comment)
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
