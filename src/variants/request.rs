// Certvault — PKCS#10 certificate request variant

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use openssl::x509::{X509Req, X509ReqRef};
use rusqlite::{params, Connection, OptionalExtension};

use super::corrupt;
use crate::artifact::{Artifact, ArtifactKind};
use crate::crypto::{common_name, name_oneline, CryptoError};
use crate::crypto_context;
use crate::store::{StoreError, StoreKey};
use crate::token::TokenResidency;

pub struct Request {
    req: X509Req,
    der: Vec<u8>,
}

impl Request {
    pub fn from_req(req: X509Req) -> Result<Self, CryptoError> {
        let der = req.to_der().map_err(crypto_context!("encode request"))?;
        Ok(Self { req, der })
    }

    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let req = X509Req::from_der(der).map_err(crypto_context!("parse request"))?;
        Self::from_req(req)
    }

    pub fn req(&self) -> &X509ReqRef {
        &self.req
    }

    pub fn subject(&self) -> String {
        name_oneline(self.req.subject_name()).unwrap_or_default()
    }

    /// Whether the request is signed by the key it carries.
    pub fn verify_signature(&self) -> Result<bool, CryptoError> {
        let key = self
            .req
            .public_key()
            .map_err(crypto_context!("read request public key"))?;
        self.req
            .verify(&key)
            .map_err(crypto_context!("verify request signature"))
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("subject", &self.subject())
            .finish()
    }
}

impl Artifact for Request {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Request
    }

    fn canonical(&self) -> &[u8] {
        &self.der
    }

    fn pem_label(&self) -> &'static str {
        "CERTIFICATE REQUEST"
    }

    fn dump(&self) -> Result<String, CryptoError> {
        let text = self.req.to_text().map_err(crypto_context!("dump request"))?;
        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    fn summary(&self) -> String {
        self.subject()
    }

    fn suggested_name(&self) -> Option<String> {
        common_name(self.req.subject_name())
    }

    fn search_text(&self) -> Vec<String> {
        vec![self.subject()]
    }

    fn collect_properties(
        &self,
        props: &mut BTreeMap<String, String>,
    ) -> Result<(), CryptoError> {
        props.insert("subject".to_string(), self.subject());
        props.insert(
            "signature_valid".to_string(),
            self.verify_signature()?.to_string(),
        );
        Ok(())
    }

    fn expires(&self) -> Option<DateTime<Utc>> {
        None
    }

    // Requests never live on a token.
    fn residency(&self) -> Option<&TokenResidency> {
        None
    }

    fn residency_mut(&mut self) -> Option<&mut TokenResidency> {
        None
    }

    fn save_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError> {
        conn.execute(
            "INSERT OR REPLACE INTO requests (item, der) VALUES (?1, ?2)",
            params![key.to_string(), self.der],
        )?;
        Ok(())
    }

    fn delete_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError> {
        conn.execute("DELETE FROM requests WHERE item = ?1", params![key.to_string()])?;
        Ok(())
    }

    fn restore_data(conn: &Connection, key: &StoreKey) -> Result<Option<Self>, StoreError> {
        let der: Option<Vec<u8>> = conn
            .query_row(
                "SELECT der FROM requests WHERE item = ?1",
                params![key.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        der.map(|der| Request::from_der(&der).map_err(|e| corrupt(key, e)))
            .transpose()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
