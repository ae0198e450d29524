// Certvault — X.509 certificate variant

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use openssl::hash::MessageDigest;
use openssl::x509::{X509Ref, X509VerifyResult, X509};
use rusqlite::{params, Connection, OptionalExtension};

use super::corrupt;
use crate::artifact::{Artifact, ArtifactKind};
use crate::crypto::{asn1_to_utc, colon_hex, common_name, name_oneline, CryptoError};
use crate::crypto_context;
use crate::store::{StoreError, StoreKey};
use crate::token::TokenResidency;

#[derive(Debug)]
pub struct Certificate {
    x509: X509,
    der: Vec<u8>,
    residency: Option<TokenResidency>,
}

impl Certificate {
    pub fn from_x509(x509: X509) -> Result<Self, CryptoError> {
        let der = x509.to_der().map_err(crypto_context!("encode certificate"))?;
        Ok(Self {
            x509,
            der,
            residency: None,
        })
    }

    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let x509 = X509::from_der(der).map_err(crypto_context!("parse certificate"))?;
        Self::from_x509(x509)
    }

    pub fn x509(&self) -> &X509Ref {
        &self.x509
    }

    pub fn subject(&self) -> String {
        name_oneline(self.x509.subject_name()).unwrap_or_default()
    }

    pub fn issuer(&self) -> String {
        name_oneline(self.x509.issuer_name()).unwrap_or_default()
    }

    pub fn serial_hex(&self) -> Result<String, CryptoError> {
        let bn = self
            .x509
            .serial_number()
            .to_bn()
            .map_err(crypto_context!("read serial number"))?;
        let hex = bn.to_hex_str().map_err(crypto_context!("format serial number"))?;
        Ok(hex.to_string())
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        asn1_to_utc(self.x509.not_before()).ok()
    }

    pub fn not_after(&self) -> Option<DateTime<Utc>> {
        asn1_to_utc(self.x509.not_after()).ok()
    }

    /// SHA-256 fingerprint over the DER encoding.
    pub fn fingerprint(&self) -> Result<String, CryptoError> {
        let digest = self
            .x509
            .digest(MessageDigest::sha256())
            .map_err(crypto_context!("certificate fingerprint"))?;
        Ok(colon_hex(&digest))
    }

    /// True if `issuer`'s subject names this certificate's issuer and its
    /// key verifies the signature.
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        if issuer.x509.issued(&self.x509) != X509VerifyResult::OK {
            return false;
        }
        issuer
            .x509
            .public_key()
            .and_then(|key| self.x509.verify(&key))
            .unwrap_or(false)
    }

    pub fn is_self_signed(&self) -> bool {
        self.is_issued_by(self)
    }

    /// SubjectPublicKeyInfo DER of the certified key.
    pub fn public_key_der(&self) -> Result<Vec<u8>, CryptoError> {
        let key = self
            .x509
            .public_key()
            .map_err(crypto_context!("read certificate public key"))?;
        key.public_key_to_der()
            .map_err(crypto_context!("encode certificate public key"))
    }

    pub fn set_residency(&mut self, residency: Option<TokenResidency>) {
        self.residency = residency;
    }
}

impl Artifact for Certificate {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Certificate
    }

    fn canonical(&self) -> &[u8] {
        &self.der
    }

    fn pem_label(&self) -> &'static str {
        "CERTIFICATE"
    }

    fn dump(&self) -> Result<String, CryptoError> {
        let text = self.x509.to_text().map_err(crypto_context!("dump certificate"))?;
        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    fn summary(&self) -> String {
        match self.not_after() {
            Some(t) => format!("{} (until {})", self.subject(), t.format("%Y-%m-%d")),
            None => self.subject(),
        }
    }

    fn suggested_name(&self) -> Option<String> {
        common_name(self.x509.subject_name())
    }

    fn search_text(&self) -> Vec<String> {
        let mut text = vec![self.subject(), self.issuer()];
        if let Ok(serial) = self.serial_hex() {
            text.push(serial);
        }
        text
    }

    fn collect_properties(
        &self,
        props: &mut BTreeMap<String, String>,
    ) -> Result<(), CryptoError> {
        props.insert("subject".to_string(), self.subject());
        props.insert("issuer".to_string(), self.issuer());
        props.insert("serial".to_string(), self.serial_hex()?);
        if let Some(t) = self.not_before() {
            props.insert("not_before".to_string(), t.to_rfc3339());
        }
        if let Some(t) = self.not_after() {
            props.insert("not_after".to_string(), t.to_rfc3339());
        }
        let algorithm = self
            .x509
            .signature_algorithm()
            .object()
            .nid()
            .short_name()
            .map_err(crypto_context!("signature algorithm name"))?;
        props.insert("signature_algorithm".to_string(), algorithm.to_string());
        props.insert("fingerprint".to_string(), self.fingerprint()?);
        props.insert("self_signed".to_string(), self.is_self_signed().to_string());
        if let Some(ref r) = self.residency {
            props.insert("token_slot".to_string(), r.slot.to_string());
            props.insert("token_label".to_string(), r.label.clone());
        }
        Ok(())
    }

    fn expires(&self) -> Option<DateTime<Utc>> {
        self.not_after()
    }

    fn residency(&self) -> Option<&TokenResidency> {
        self.residency.as_ref()
    }

    fn residency_mut(&mut self) -> Option<&mut TokenResidency> {
        self.residency.as_mut()
    }

    fn save_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError> {
        let (slot, label, object_id) = TokenResidency::to_columns(self.residency.as_ref());
        conn.execute(
            "INSERT OR REPLACE INTO certificates
                (item, der, token_slot, token_label, token_object_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key.to_string(), self.der, slot, label, object_id],
        )?;
        Ok(())
    }

    fn delete_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError> {
        conn.execute(
            "DELETE FROM certificates WHERE item = ?1",
            params![key.to_string()],
        )?;
        Ok(())
    }

    fn restore_data(conn: &Connection, key: &StoreKey) -> Result<Option<Self>, StoreError> {
        let row = conn
            .query_row(
                "SELECT der, token_slot, token_label, token_object_id
                 FROM certificates WHERE item = ?1",
                params![key.to_string()],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<Vec<u8>>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((der, slot, label, object_id)) = row else {
            return Ok(None);
        };
        let mut cert = Certificate::from_der(&der).map_err(|e| corrupt(key, e))?;
        cert.residency = TokenResidency::from_columns(slot, label, object_id);
        Ok(Some(cert))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
