// Certvault — Certificate template variant
//
// A template is a reusable set of subject fields and extensions. It has no
// ASN.1 structure of its own; its canonical encoding is the compact JSON of
// the body, which is deterministic because every map is ordered.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::corrupt;
use crate::artifact::{Artifact, ArtifactKind};
use crate::crypto::CryptoError;
use crate::store::{StoreError, StoreKey};
use crate::token::TokenResidency;

const DEFAULT_VALIDITY_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateBody {
    /// Display name the template was saved under, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Subject fields keyed by short name (`CN`, `O`, ...).
    #[serde(default)]
    pub subject: BTreeMap<String, String>,
    /// Extension values keyed by short name (`keyUsage`, ...).
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
    #[serde(default = "default_validity")]
    pub validity_days: u32,
    #[serde(default)]
    pub ca: bool,
}

fn default_validity() -> u32 {
    DEFAULT_VALIDITY_DAYS
}

impl Default for TemplateBody {
    fn default() -> Self {
        Self {
            name: None,
            subject: BTreeMap::new(),
            extensions: BTreeMap::new(),
            validity_days: DEFAULT_VALIDITY_DAYS,
            ca: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Template {
    body: TemplateBody,
    canonical: Vec<u8>,
}

impl Template {
    pub fn new(body: TemplateBody) -> Self {
        // Plain string maps and scalars always serialize.
        let canonical = serde_json::to_vec(&body).unwrap_or_default();
        Self { body, canonical }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let body: TemplateBody = serde_json::from_slice(bytes)?;
        Ok(Self::new(body))
    }

    pub fn body(&self) -> &TemplateBody {
        &self.body
    }

    fn subject_line(&self) -> String {
        self.body
            .subject
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::new(TemplateBody::default())
    }
}

impl Artifact for Template {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Template
    }

    fn canonical(&self) -> &[u8] {
        &self.canonical
    }

    fn pem_label(&self) -> &'static str {
        "XCA TEMPLATE"
    }

    fn dump(&self) -> Result<String, CryptoError> {
        let mut out = String::from("Template:\n");
        if let Some(ref name) = self.body.name {
            out.push_str(&format!("    Name: {}\n", name));
        }
        out.push_str(&format!("    Validity: {} days\n", self.body.validity_days));
        out.push_str(&format!("    CA: {}\n", self.body.ca));
        for (k, v) in &self.body.subject {
            out.push_str(&format!("    Subject {}: {}\n", k, v));
        }
        for (k, v) in &self.body.extensions {
            out.push_str(&format!("    Extension {}: {}\n", k, v));
        }
        Ok(out)
    }

    fn summary(&self) -> String {
        let role = if self.body.ca { "CA" } else { "end entity" };
        format!("{} template, {} days", role, self.body.validity_days)
    }

    fn suggested_name(&self) -> Option<String> {
        self.body.name.clone()
    }

    fn search_text(&self) -> Vec<String> {
        vec![self.subject_line()]
    }

    fn collect_properties(
        &self,
        props: &mut BTreeMap<String, String>,
    ) -> Result<(), CryptoError> {
        props.insert("validity_days".to_string(), self.body.validity_days.to_string());
        props.insert("ca".to_string(), self.body.ca.to_string());
        for (k, v) in &self.body.subject {
            props.insert(format!("subject.{}", k), v.clone());
        }
        for (k, v) in &self.body.extensions {
            props.insert(format!("extension.{}", k), v.clone());
        }
        Ok(())
    }

    fn expires(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn residency(&self) -> Option<&TokenResidency> {
        None
    }

    fn residency_mut(&mut self) -> Option<&mut TokenResidency> {
        None
    }

    fn save_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError> {
        let body = serde_json::to_string(&self.body)?;
        conn.execute(
            "INSERT OR REPLACE INTO templates (item, body) VALUES (?1, ?2)",
            params![key.to_string(), body],
        )?;
        Ok(())
    }

    fn delete_data(&self, conn: &Connection, key: &StoreKey) -> Result<(), StoreError> {
        conn.execute("DELETE FROM templates WHERE item = ?1", params![key.to_string()])?;
        Ok(())
    }

    fn restore_data(conn: &Connection, key: &StoreKey) -> Result<Option<Self>, StoreError> {
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM templates WHERE item = ?1",
                params![key.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| Template::from_json(b.as_bytes()).map_err(|e| corrupt(key, e)))
            .transpose()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> Template {
        let mut body = TemplateBody {
            name: Some("TLS server".to_string()),
            ..Default::default()
        };
        body.subject.insert("O".to_string(), "Example".to_string());
        body.subject.insert("CN".to_string(), "server".to_string());
        body.extensions
            .insert("extendedKeyUsage".to_string(), "serverAuth".to_string());
        Template::new(body)
    }

    #[test]
    fn test_canonical_is_order_independent() {
        let a = server();
        let mut body = TemplateBody {
            name: Some("TLS server".to_string()),
            ..Default::default()
        };
        body.extensions
            .insert("extendedKeyUsage".to_string(), "serverAuth".to_string());
        body.subject.insert("CN".to_string(), "server".to_string());
        body.subject.insert("O".to_string(), "Example".to_string());
        let b = Template::new(body);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_json_round_trip() {
        let a = server();
        let b = Template::from_json(a.canonical()).unwrap();
        assert_eq!(a.body(), b.body());
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let t = Template::from_json(br#"{"subject":{"CN":"x"}}"#).unwrap();
        assert_eq!(t.body().validity_days, 365);
        assert!(!t.body().ca);
        assert!(t.suggested_name().is_none());
    }

    #[test]
    fn test_search_text_and_summary() {
        let t = server();
        assert_eq!(t.search_text(), vec!["CN=server, O=Example".to_string()]);
        assert_eq!(t.summary(), "end entity template, 365 days");
        assert_eq!(t.suggested_name().as_deref(), Some("TLS server"));
    }
}
