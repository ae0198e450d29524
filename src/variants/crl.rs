// Certvault — Revocation list variant

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use openssl::x509::{X509Crl, X509CrlRef};
use rusqlite::{params, Connection, OptionalExtension};

use super::{corrupt, Certificate};
use crate::artifact::{Artifact, ArtifactKind};
use crate::crypto::{asn1_to_utc, common_name, name_oneline, CryptoError};
use crate::crypto_context;
use crate::store::{StoreError, StoreKey};
use crate::token::TokenResidency;

pub struct RevocationList {
    crl: X509Crl,
    der: Vec<u8>,
}

impl RevocationList {
    pub fn from_crl(crl: X509Crl) -> Result<Self, CryptoError> {
        let der = crl.to_der().map_err(crypto_context!("encode revocation list"))?;
        Ok(Self { crl, der })
    }

    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let crl = X509Crl::from_der(der).map_err(crypto_context!("parse revocation list"))?;
        Self::from_crl(crl)
    }

    pub fn crl(&self) -> &X509CrlRef {
        &self.crl
    }

    pub fn issuer(&self) -> String {
        name_oneline(self.crl.issuer_name()).unwrap_or_default()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        asn1_to_utc(self.crl.last_update()).ok()
    }

    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        self.crl.next_update().and_then(|t| asn1_to_utc(t).ok())
    }

    /// Hex serials of every revoked certificate, in list order.
    pub fn revoked_serials(&self) -> Result<Vec<String>, CryptoError> {
        let Some(stack) = self.crl.get_revoked() else {
            return Ok(Vec::new());
        };
        let mut serials = Vec::with_capacity(stack.len());
        for revoked in stack {
            let bn = revoked
                .serial_number()
                .to_bn()
                .map_err(crypto_context!("read revoked serial"))?;
            let hex = bn.to_hex_str().map_err(crypto_context!("format revoked serial"))?;
            serials.push(hex.to_string());
        }
        Ok(serials)
    }

    /// True if `issuer` signed this list.
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        issuer
            .x509()
            .public_key()
            .and_then(|key| self.crl.verify(&key))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for RevocationList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationList")
            .field("issuer", &self.issuer())
            .field("next_update", &self.next_update())
            .finish()
    }
}

impl Artifact for RevocationList {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::RevocationList
    }

    fn canonical(&self) -> &[u8] {
        &self.der
    }

    fn pem_label(&self) -> &'static str {
        "X509 CRL"
    }

    fn dump(&self) -> Result<String, CryptoError> {
        let mut out = String::from("Certificate Revocation List (CRL):\n");
        out.push_str(&format!("    Issuer: {}\n", self.issuer()));
        if let Some(t) = self.last_update() {
            out.push_str(&format!("    Last Update: {}\n", t.to_rfc2822()));
        }
        match self.next_update() {
            Some(t) => out.push_str(&format!("    Next Update: {}\n", t.to_rfc2822())),
            None => out.push_str("    Next Update: NONE\n"),
        }
        let serials = self.revoked_serials()?;
        if serials.is_empty() {
            out.push_str("No Revoked Certificates.\n");
        } else {
            out.push_str("Revoked Certificates:\n");
            for serial in serials {
                out.push_str(&format!("    Serial Number: {}\n", serial));
            }
        }
        Ok(out)
    }

    fn summary(&self) -> String {
        let count = self.revoked_serials().map(|s| s.len()).unwrap_or(0);
        format!("{} ({} revoked)", self.issuer(), count)
    }

    fn suggested_name(&self) -> Option<String> {
        common_name(self.crl.issuer_name())
    }

    fn search_text(&self) -> Vec<String> {
        vec![self.issuer()]
    }

    fn collect_properties(
        &self,
        props: &mut BTreeMap<String, String>,
    ) -> Result<(), CryptoError> {
        props.insert("issuer".to_string(), self.issuer());
        if let Some(t) = self.last_update() {
            props.insert("last_update".to_string(), t.to_rfc3339());
        }
        if let Some(t) = self.next_update() {
            props.insert("next_update".to_string(), t.to_rfc3339());
        }
        props.insert(
            "revoked".to_string(),
            self.revoked_serials()?.len().to_string(),
        );
        Ok(())
    }

    fn expires(&self) -> Option<DateTime<Utc>> {
        self.next_update()
    }

    fn residency(&self) -> Option<&TokenResidency> {
        None
    }

    fn residency_mut(&mut self) -> Option<&mut TokenResidency> {
        None
    }

    fn save_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError> {
        conn.execute(
            "INSERT OR REPLACE INTO revocations (item, der) VALUES (?1, ?2)",
            params![key.to_string(), self.der],
        )?;
        Ok(())
    }

    fn delete_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError> {
        conn.execute(
            "DELETE FROM revocations WHERE item = ?1",
            params![key.to_string()],
        )?;
        Ok(())
    }

    fn restore_data(conn: &Connection, key: &StoreKey) -> Result<Option<Self>, StoreError> {
        let der: Option<Vec<u8>> = conn
            .query_row(
                "SELECT der FROM revocations WHERE item = ?1",
                params![key.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        der.map(|der| RevocationList::from_der(&der).map_err(|e| corrupt(key, e)))
            .transpose()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
