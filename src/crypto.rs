// Certvault — Crypto library error wrapping
//
// Every failure reported by OpenSSL is wrapped together with the operation
// that invoked it and the source location, then propagated. Nothing here
// swallows an error stack.

use chrono::{DateTime, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::x509::X509NameRef;
use thiserror::Error;

/// A failure inside the cryptographic library, annotated with the
/// operation and source location that triggered it.
#[derive(Debug, Error)]
#[error("{context}: {source}")]
pub struct CryptoError {
    pub context: String,
    #[source]
    pub source: ErrorStack,
}

impl CryptoError {
    pub fn new(context: impl Into<String>, source: ErrorStack) -> Self {
        Self {
            context: context.into(),
            source,
        }
    }
}

/// Build a `map_err` adapter that wraps an `ErrorStack` with the given
/// operation name and the caller's `file:line`.
///
/// ```ignore
/// let der = x509.to_der().map_err(crypto_context!("encode certificate"))?;
/// ```
#[macro_export]
macro_rules! crypto_context {
    ($op:expr) => {
        |e: openssl::error::ErrorStack| {
            $crate::crypto::CryptoError::new(format!("{} ({}:{})", $op, file!(), line!()), e)
        }
    };
}

/// Render an X.509 name as `CN=foo, O=bar`.
pub fn name_oneline(name: &X509NameRef) -> Result<String, ErrorStack> {
    let mut parts = Vec::new();
    for entry in name.entries() {
        let field = entry.object().nid().short_name()?;
        let value = entry.data().to_string()?;
        parts.push(format!("{}={}", field, value));
    }
    Ok(parts.join(", "))
}

/// First common name of an X.509 name, if any.
pub fn common_name(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|e| e.data().to_string().ok())
}

/// Convert an ASN.1 time to UTC by diffing against the Unix epoch.
pub fn asn1_to_utc(time: &Asn1TimeRef) -> Result<DateTime<Utc>, ErrorStack> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    Ok(DateTime::from_timestamp(secs, 0).unwrap_or_default())
}

/// Colon separated upper-case hex, as fingerprints are usually shown.
pub fn colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
