// Certvault — Codec Module
//
// Import and export of artifacts in their standard encodings. Input may be
// PEM armored, raw DER, or template JSON; the concrete variant is picked from
// the PEM label or, for raw DER, by trying each structure in turn.
// `decode(encode(node))` is always `equals` to `node`.

mod error;
mod pem;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509Crl, X509Req, X509};

use crate::artifact::{ArtifactKind, ArtifactNode};
use crate::crypto_context;
use crate::variants::{Certificate, KeyPair, Payload, Request, RevocationList, Template};

pub use error::DecodeError;
pub use pem::{armor, parse_blocks, PemBlock};

// ─── Decoding ────────────────────────────────────────────────────────────────

/// Decode a single artifact. For PEM input the first block is used.
/// `hint` is the originating file name (may be empty); it names nodes whose
/// identity carries no name of its own.
pub fn decode(bytes: &[u8], hint: &str) -> Result<ArtifactNode, DecodeError> {
    let payload = decode_payload(bytes)?;
    let node = ArtifactNode::imported(payload, hint);
    tracing::debug!(kind = %node.kind(), hint, "Decoded artifact");
    Ok(node)
}

/// Decode every artifact in `bytes`: each armored block of a PEM bundle, or
/// the single DER/JSON artifact otherwise.
pub fn decode_bundle(bytes: &[u8], hint: &str) -> Result<Vec<ArtifactNode>, DecodeError> {
    if !is_pem(bytes) {
        return Ok(vec![decode(bytes, hint)?]);
    }
    let text = pem_text(bytes)?;
    parse_blocks(text)?
        .iter()
        .map(|block| payload_from_block(block).map(|p| ArtifactNode::imported(p, hint)))
        .collect()
}

/// Decode the artifact itself, without node metadata.
pub fn decode_payload(bytes: &[u8]) -> Result<Payload, DecodeError> {
    let trimmed = bytes.trim_ascii();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }

    if is_pem(bytes) {
        let text = pem_text(bytes)?;
        let blocks = parse_blocks(text)?;
        let first = blocks
            .first()
            .ok_or_else(|| DecodeError::Armor("no complete block".to_string()))?;
        return payload_from_block(first);
    }

    if trimmed.starts_with(b"{") {
        return Ok(Template::from_json(trimmed)?.into());
    }

    sniff_der(bytes)
}

fn is_pem(bytes: &[u8]) -> bool {
    bytes.windows(11).any(|w| w == b"-----BEGIN ")
}

fn pem_text(bytes: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(bytes).map_err(|e| DecodeError::Armor(e.to_string()))
}

fn payload_from_block(block: &PemBlock) -> Result<Payload, DecodeError> {
    let der = block.der.as_slice();
    match block.label.as_str() {
        "CERTIFICATE" | "X509 CERTIFICATE" => certificate(der),
        "CERTIFICATE REQUEST" | "NEW CERTIFICATE REQUEST" => request(der),
        "X509 CRL" => revocation_list(der),
        "PRIVATE KEY" => {
            let key = PKey::private_key_from_pkcs8(der)
                .map_err(crypto_context!("parse PKCS#8 private key"))
                .map_err(DecodeError::malformed(ArtifactKind::Key))?;
            key_payload(KeyPair::from_private(key))
        }
        "RSA PRIVATE KEY" | "EC PRIVATE KEY" => {
            let key = PKey::private_key_from_der(der)
                .map_err(crypto_context!("parse private key"))
                .map_err(DecodeError::malformed(ArtifactKind::Key))?;
            key_payload(KeyPair::from_private(key))
        }
        "PUBLIC KEY" => {
            let key = PKey::public_key_from_der(der)
                .map_err(crypto_context!("parse public key"))
                .map_err(DecodeError::malformed(ArtifactKind::Key))?;
            key_payload(KeyPair::from_public(key))
        }
        "RSA PUBLIC KEY" => {
            let key = Rsa::public_key_from_der_pkcs1(der)
                .and_then(PKey::from_rsa)
                .map_err(crypto_context!("parse PKCS#1 public key"))
                .map_err(DecodeError::malformed(ArtifactKind::Key))?;
            key_payload(KeyPair::from_public(key))
        }
        "XCA TEMPLATE" => Ok(Template::from_json(der)?.into()),
        other => Err(DecodeError::UnknownLabel(other.to_string())),
    }
}

fn certificate(der: &[u8]) -> Result<Payload, DecodeError> {
    Certificate::from_der(der)
        .map(Payload::from)
        .map_err(DecodeError::malformed(ArtifactKind::Certificate))
}

fn request(der: &[u8]) -> Result<Payload, DecodeError> {
    Request::from_der(der)
        .map(Payload::from)
        .map_err(DecodeError::malformed(ArtifactKind::Request))
}

fn revocation_list(der: &[u8]) -> Result<Payload, DecodeError> {
    RevocationList::from_der(der)
        .map(Payload::from)
        .map_err(DecodeError::malformed(ArtifactKind::RevocationList))
}

fn key_payload(
    key: Result<KeyPair, crate::crypto::CryptoError>,
) -> Result<Payload, DecodeError> {
    key.map(Payload::from)
        .map_err(DecodeError::malformed(ArtifactKind::Key))
}

/// Raw DER carries no label: try each structure, most common first.
fn sniff_der(der: &[u8]) -> Result<Payload, DecodeError> {
    if X509::from_der(der).is_ok() {
        return certificate(der);
    }
    if X509Req::from_der(der).is_ok() {
        return request(der);
    }
    if X509Crl::from_der(der).is_ok() {
        return revocation_list(der);
    }
    if let Ok(key) = PKey::private_key_from_pkcs8(der) {
        return key_payload(KeyPair::from_private(key));
    }
    if let Ok(key) = PKey::private_key_from_der(der) {
        return key_payload(KeyPair::from_private(key));
    }
    if let Ok(key) = PKey::public_key_from_der(der) {
        return key_payload(KeyPair::from_public(key));
    }
    Err(DecodeError::Unrecognized)
}

// ─── Encoding ────────────────────────────────────────────────────────────────

/// Canonical encoding of `node` (DER for every ASN.1 kind).
pub fn encode(node: &ArtifactNode) -> Vec<u8> {
    node.canonical_encode().to_vec()
}

pub fn encode_pem(node: &ArtifactNode) -> String {
    node.payload().pem()
}

/// Single-line transport form of the canonical encoding.
pub fn to_base64(node: &ArtifactNode) -> String {
    STANDARD.encode(node.canonical_encode())
}

pub fn from_base64(text: &str, hint: &str) -> Result<ArtifactNode, DecodeError> {
    let compact: String = text.split_whitespace().collect();
    let der = STANDARD.decode(compact.as_bytes())?;
    decode(&der, hint)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
