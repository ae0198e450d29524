// Certvault — Passphrase Key Source
//
// Flow:
//   1. The passphrase arrives from the CLI or the environment
//   2. `derive_db_key()` runs Argon2id over it with a per-database salt
//   3. The derived key is hex encoded, passed to SQLCipher via `PRAGMA key`
//      and then zeroized

use std::path::Path;

use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::UnlockError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Length of the derived database key in bytes (256-bit for AES-256).
const DERIVED_KEY_LEN: usize = 32;

/// Domain separator mixed into every salt.
const SALT_DOMAIN: &str = "certvault";

// ─── Cost ────────────────────────────────────────────────────────────────────

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfCost {
    /// Memory in KiB.
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfCost {
    /// m=65536 (64 MiB), t=3, p=4
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl KdfCost {
    /// Minimal cost. Only for tests and throwaway vaults.
    pub fn fast() -> Self {
        Self {
            m_cost: 256,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Source of the SQLCipher key for a database file.
pub trait DatabaseKeySource {
    fn derive_db_key(&self, db_path: &Path) -> Result<Zeroizing<Vec<u8>>, UnlockError>;
}

// ─── Passphrase Implementation ───────────────────────────────────────────────

pub struct PassphraseKeySource {
    passphrase: Zeroizing<String>,
    cost: KdfCost,
}

impl PassphraseKeySource {
    pub fn new(passphrase: impl Into<String>) -> Result<Self, UnlockError> {
        Self::with_cost(passphrase, KdfCost::default())
    }

    pub fn with_cost(passphrase: impl Into<String>, cost: KdfCost) -> Result<Self, UnlockError> {
        let passphrase = Zeroizing::new(passphrase.into());
        if passphrase.is_empty() {
            return Err(UnlockError::EmptyPassphrase);
        }
        Ok(Self { passphrase, cost })
    }

    /// Salt = SHA-256("certvault" || "::" || database file name)
    fn build_salt(db_path: &Path) -> Vec<u8> {
        let name = db_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(SALT_DOMAIN.as_bytes());
        hasher.update(b"::");
        hasher.update(name.as_bytes());
        hasher.finalize().to_vec()
    }
}

impl DatabaseKeySource for PassphraseKeySource {
    fn derive_db_key(&self, db_path: &Path) -> Result<Zeroizing<Vec<u8>>, UnlockError> {
        let salt = Self::build_salt(db_path);

        let params = Params::new(
            self.cost.m_cost,
            self.cost.t_cost,
            self.cost.p_cost,
            Some(DERIVED_KEY_LEN),
        )
        .map_err(|e| UnlockError::Derivation(format!("invalid Argon2 params: {}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut derived_key = Zeroizing::new(vec![0u8; DERIVED_KEY_LEN]);
        argon2
            .hash_password_into(self.passphrase.as_bytes(), &salt, &mut derived_key)
            .map_err(|e| UnlockError::Derivation(format!("Argon2id hash failed: {}", e)))?;

        tracing::debug!("Derived database key from passphrase");
        Ok(derived_key)
    }
}

impl std::fmt::Debug for PassphraseKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassphraseKeySource")
            .field("passphrase", &"[REDACTED]")
            .field("cost", &self.cost)
            .finish()
    }
}

/// Lower-case hex, in a buffer that is wiped on drop.
pub fn key_to_hex(key: &[u8]) -> Zeroizing<String> {
    let mut out = Zeroizing::new(String::with_capacity(key.len() * 2));
    for b in key {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn source(passphrase: &str) -> PassphraseKeySource {
        PassphraseKeySource::with_cost(passphrase, KdfCost::fast()).unwrap()
    }

    #[test]
    fn test_argon2id_derivation_deterministic() {
        let path = Path::new("/data/vault.db");
        let key1 = source("correct horse").derive_db_key(path).unwrap();
        let key2 = source("correct horse").derive_db_key(path).unwrap();
        assert_eq!(
            key1.as_slice(),
            key2.as_slice(),
            "Same passphrase must produce the same derived key"
        );
    }

    #[test]
    fn test_different_passphrases_produce_different_keys() {
        let path = Path::new("/data/vault.db");
        let a = source("one").derive_db_key(path).unwrap();
        let b = source("two").derive_db_key(path).unwrap();
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_salt_depends_on_file_name_only() {
        let s = source("same");
        let a = s.derive_db_key(Path::new("/one/vault.db")).unwrap();
        let b = s.derive_db_key(Path::new("/two/vault.db")).unwrap();
        let c = s.derive_db_key(Path::new("/one/other.db")).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
        assert_ne!(a.as_slice(), c.as_slice());
    }

    #[test]
    fn test_derived_key_length() {
        let key = source("x").derive_db_key(Path::new("v.db")).unwrap();
        assert_eq!(key.len(), DERIVED_KEY_LEN);
        assert_eq!(key_to_hex(&key).len(), DERIVED_KEY_LEN * 2);
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(matches!(
            PassphraseKeySource::new(""),
            Err(UnlockError::EmptyPassphrase)
        ));
    }

    #[test]
    fn test_invalid_cost_is_derivation_error() {
        let s = PassphraseKeySource::with_cost(
            "x",
            KdfCost {
                m_cost: 1,
                t_cost: 0,
                p_cost: 0,
            },
        )
        .unwrap();
        assert!(matches!(
            s.derive_db_key(Path::new("v.db")),
            Err(UnlockError::Derivation(_))
        ));
    }

    #[test]
    fn test_key_to_hex() {
        assert_eq!(key_to_hex(&[0x00, 0xab, 0x10]).as_str(), "00ab10");
    }

    #[test]
    fn test_debug_redacts_passphrase() {
        let debug = format!("{:?}", source("hunter2"));
        assert!(!debug.contains("hunter2"));
    }
}
