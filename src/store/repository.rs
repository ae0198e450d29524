// Certvault — Artifact Store Repository
//
// Persists artifact nodes. Generic metadata lives in `items`; each variant
// writes its own table through the `save_data`/`delete_data` hooks inside the
// same transaction. A node only receives its store key and creation time
// after the transaction has committed.
//
// Ordering: parents are inserted before children and deleted after them.
// The `items.parent` foreign key enforces both.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::db::Database;
use super::models::{AuditEntry, ItemRow, StoreKey};
use super::StoreError;
use crate::artifact::{ArtifactKind, ArtifactNode, Source};
use crate::tree::{Hierarchy, NodeId};
use crate::variants::Payload;

const ACTOR: &str = "certvault";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over artifact persistence.
pub trait ArtifactStore {
    /// Insert `node` (under `parent`, if given) or, when it already carries a
    /// key, update its row. Returns the node's store key.
    fn save(&self, node: &mut ArtifactNode, parent: Option<&StoreKey>)
        -> Result<StoreKey, StoreError>;

    /// Rewrite the metadata (name, comment, source, file hint, token
    /// residency) of an already saved node.
    fn update_metadata(&self, node: &ArtifactNode) -> Result<(), StoreError>;

    fn set_parent(&self, key: &StoreKey, parent: Option<&StoreKey>) -> Result<(), StoreError>;

    /// Delete the rows of `id` and every persisted descendant, children
    /// first, and clear their store keys. Returns the deleted keys in order.
    fn delete(&self, tree: &mut Hierarchy, id: NodeId) -> Result<Vec<StoreKey>, StoreError>;

    /// Rebuild a node from its rows.
    fn restore(&self, key: &StoreKey) -> Result<ArtifactNode, StoreError>;

    fn list_by_kind(&self, kind: ArtifactKind) -> Result<Vec<ItemRow>, StoreError>;

    fn find_by_hash(&self, hash: u32) -> Result<Vec<StoreKey>, StoreError>;

    /// Restore every item into `tree`, re-linking parents. Returns the
    /// inserted handles in insertion order.
    fn load_tree(&self, tree: &mut Hierarchy) -> Result<Vec<NodeId>, StoreError>;

    fn log_action(
        &self,
        key: &StoreKey,
        action: &str,
        details: Option<&str>,
    ) -> Result<(), StoreError>;

    fn get_audit_logs(&self, key: &StoreKey) -> Result<Vec<AuditEntry>, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

pub struct SqliteArtifactStore<'a> {
    db: &'a Database,
}

impl<'a> SqliteArtifactStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn audit(
        conn: &Connection,
        key: &StoreKey,
        action: &str,
        details: Option<&str>,
    ) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO audit_log (item, action, actor, timestamp, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key.to_string(), action, ACTOR, Utc::now().to_rfc3339(), details],
        )?;
        Ok(())
    }

    /// Kind tag of the row behind `key`, if it exists.
    fn row_kind(conn: &Connection, key: &StoreKey) -> Result<Option<String>, StoreError> {
        Ok(conn
            .query_row(
                "SELECT kind FROM items WHERE id = ?1",
                params![key.to_string()],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn parse_time(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Utc))
    }

    fn parse_key(text: &str) -> rusqlite::Result<StoreKey> {
        text.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    /// Parse an `items` row selected as
    /// `id, kind, name, comment, source, created_at, content_hash, parent`.
    fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<ItemRow> {
        let key = Self::parse_key(&row.get::<_, String>(0)?)?;
        let kind_str: String = row.get(1)?;
        let kind: ArtifactKind = kind_str.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?;
        let source: Source = row.get::<_, String>(4)?.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
        })?;
        let created_at = Self::parse_time(&row.get::<_, String>(5)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let hash: i64 = row.get(6)?;
        let parent = row
            .get::<_, Option<String>>(7)?
            .map(|p| Self::parse_key(&p))
            .transpose()?;

        Ok(ItemRow {
            key,
            kind,
            name: row.get(2)?,
            comment: row.get(3)?,
            source,
            created_at,
            content_hash: hash as u32,
            parent,
        })
    }

    /// Rewrite the mutable columns of `key` from `node` and refresh its
    /// variant row.
    fn write_metadata(
        conn: &Connection,
        node: &ArtifactNode,
        key: &StoreKey,
    ) -> Result<(), StoreError> {
        let file_hint = node.file_hint().map(|p| p.to_string_lossy().into_owned());
        let updated = conn.execute(
            "UPDATE items SET name = ?1, comment = ?2, source = ?3, file_hint = ?4
             WHERE id = ?5",
            params![
                node.name(),
                node.comment(),
                node.source().as_str(),
                file_hint,
                key.to_string()
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::RowNotFound {
                key: *key,
                description: node.to_string(),
            });
        }
        node.payload().save_data(conn, key)?;
        Self::audit(conn, key, "updated", Some(node.name()))
    }

    fn delete_one(
        conn: &Connection,
        node: &ArtifactNode,
        key: &StoreKey,
    ) -> Result<(), StoreError> {
        node.payload().delete_data(conn, key)?;
        let removed = conn.execute("DELETE FROM items WHERE id = ?1", params![key.to_string()])?;
        if removed == 0 {
            return Err(StoreError::RowNotFound {
                key: *key,
                description: node.to_string(),
            });
        }
        Self::audit(conn, key, "deleted", Some(node.name()))?;
        Ok(())
    }
}

impl<'a> ArtifactStore for SqliteArtifactStore<'a> {
    fn save(
        &self,
        node: &mut ArtifactNode,
        parent: Option<&StoreKey>,
    ) -> Result<StoreKey, StoreError> {
        let conn = self.db.conn();

        if let Some(key) = node.store_key().copied() {
            match Self::row_kind(conn, &key)? {
                None => {
                    return Err(StoreError::RowNotFound {
                        key,
                        description: node.to_string(),
                    })
                }
                Some(found) if found != node.kind().as_str() => {
                    return Err(StoreError::Ownership {
                        key,
                        expected: node.kind(),
                        found,
                    })
                }
                Some(_) => {}
            }
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "UPDATE items SET parent = ?1 WHERE id = ?2",
                params![parent.map(|p| p.to_string()), key.to_string()],
            )?;
            Self::write_metadata(&tx, node, &key)?;
            tx.commit()?;
            return Ok(key);
        }

        let key = StoreKey::generate();
        let created = node.created().unwrap_or_else(Utc::now);
        let file_hint = node.file_hint().map(|p| p.to_string_lossy().into_owned());

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO items
                (id, kind, name, comment, source, created_at, content_hash, file_hint, parent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                key.to_string(),
                node.kind().as_str(),
                node.name(),
                node.comment(),
                node.source().as_str(),
                created.to_rfc3339(),
                i64::from(node.content_hash()),
                file_hint,
                parent.map(|p| p.to_string()),
            ],
        )?;
        node.payload().save_data(&tx, &key)?;
        Self::audit(&tx, &key, "created", Some(node.kind().as_str()))?;
        tx.commit()?;

        node.set_created(created);
        node.set_store_key(Some(key));

        tracing::info!(
            store_key = %key,
            kind = %node.kind(),
            name = node.name(),
            "Artifact stored successfully"
        );

        Ok(key)
    }

    fn update_metadata(&self, node: &ArtifactNode) -> Result<(), StoreError> {
        let key = node
            .store_key()
            .copied()
            .ok_or_else(|| StoreError::Unsaved(node.to_string()))?;
        let tx = self.db.conn().unchecked_transaction()?;
        Self::write_metadata(&tx, node, &key)?;
        tx.commit()?;

        tracing::debug!(store_key = %key, "Artifact metadata updated");
        Ok(())
    }

    fn set_parent(&self, key: &StoreKey, parent: Option<&StoreKey>) -> Result<(), StoreError> {
        let tx = self.db.conn().unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE items SET parent = ?1 WHERE id = ?2",
            params![parent.map(|p| p.to_string()), key.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::RowNotFound {
                key: *key,
                description: "item row".to_string(),
            });
        }
        let details = parent.map(|p| p.to_string());
        Self::audit(&tx, key, "reparented", details.as_deref())?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, tree: &mut Hierarchy, id: NodeId) -> Result<Vec<StoreKey>, StoreError> {
        tree.node(id)?;
        let mut order = tree.descendants(id);
        order.push(id);

        let tx = self.db.conn().unchecked_transaction()?;
        let mut deleted = Vec::new();
        for n in &order {
            let node = tree.node(*n)?;
            let Some(key) = node.store_key().copied() else {
                continue;
            };
            Self::delete_one(&tx, node, &key)?;
            deleted.push((*n, key));
        }
        tx.commit()?;

        for (n, _) in &deleted {
            if let Some(node) = tree.get_mut(*n) {
                node.set_store_key(None);
            }
        }

        tracing::info!(count = deleted.len(), root = %id, "Artifacts deleted");
        Ok(deleted.into_iter().map(|(_, key)| key).collect())
    }

    fn restore(&self, key: &StoreKey) -> Result<ArtifactNode, StoreError> {
        let conn = self.db.conn();
        let row = conn
            .query_row(
                "SELECT kind, name, comment, source, created_at, file_hint
                 FROM items WHERE id = ?1",
                params![key.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((kind, name, comment, source, created, file_hint)) = row else {
            return Err(StoreError::RowNotFound {
                key: *key,
                description: "no item row".to_string(),
            });
        };

        let kind: ArtifactKind = kind.parse().map_err(|reason| StoreError::Corrupt {
            key: *key,
            reason,
        })?;
        let payload = Payload::restore(kind, conn, key)?.ok_or_else(|| {
            StoreError::RowNotFound {
                key: *key,
                description: format!("{} '{}' has no {} row", kind.label(), name, kind),
            }
        })?;
        let source: Source = source.parse().map_err(|reason| StoreError::Corrupt {
            key: *key,
            reason,
        })?;
        let created = Self::parse_time(&created).map_err(|e| StoreError::Corrupt {
            key: *key,
            reason: format!("bad created_at '{}': {}", created, e),
        })?;

        Ok(ArtifactNode::restored(
            payload,
            *key,
            name,
            comment,
            source,
            created,
            file_hint.map(PathBuf::from),
        ))
    }

    fn list_by_kind(&self, kind: ArtifactKind) -> Result<Vec<ItemRow>, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, kind, name, comment, source, created_at, content_hash, parent
             FROM items WHERE kind = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![kind.as_str()], Self::row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn find_by_hash(&self, hash: u32) -> Result<Vec<StoreKey>, StoreError> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT id FROM items WHERE content_hash = ?1 ORDER BY rowid")?;
        let keys = stmt
            .query_map(params![i64::from(hash)], |row| {
                Self::parse_key(&row.get::<_, String>(0)?)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn load_tree(&self, tree: &mut Hierarchy) -> Result<Vec<NodeId>, StoreError> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT id, parent FROM items ORDER BY rowid")?;
        let links = stmt
            .query_map([], |row| {
                let key = Self::parse_key(&row.get::<_, String>(0)?)?;
                let parent = row
                    .get::<_, Option<String>>(1)?
                    .map(|p| Self::parse_key(&p))
                    .transpose()?;
                Ok((key, parent))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut ids = HashMap::new();
        let mut inserted = Vec::with_capacity(links.len());
        for (key, _) in &links {
            let id = tree.insert(self.restore(key)?);
            ids.insert(*key, id);
            inserted.push(id);
        }

        for (key, parent) in &links {
            let (Some(parent), Some(&child)) = (parent, ids.get(key)) else {
                continue;
            };
            let Some(&parent_id) = ids.get(parent) else {
                continue;
            };
            if let Err(e) = tree.attach(child, parent_id) {
                tracing::warn!(store_key = %key, error = %e, "Ignoring stored parent link");
            }
        }

        tracing::debug!(count = inserted.len(), "Loaded artifact tree");
        Ok(inserted)
    }

    fn log_action(
        &self,
        key: &StoreKey,
        action: &str,
        details: Option<&str>,
    ) -> Result<(), StoreError> {
        Self::audit(self.db.conn(), key, action, details)
    }

    fn get_audit_logs(&self, key: &StoreKey) -> Result<Vec<AuditEntry>, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT item, action, actor, timestamp, details
             FROM audit_log WHERE item = ?1 ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![key.to_string()], |row| {
                Ok(AuditEntry {
                    item: Self::parse_key(&row.get::<_, String>(0)?)?,
                    action: row.get(1)?,
                    actor: row.get(2)?,
                    timestamp: Self::parse_time(&row.get::<_, String>(3)?).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            3,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                    details: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::token::{SlotId, TokenResidency};
    use crate::variants::{Template, TemplateBody};

    const CA_PEM: &[u8] = include_bytes!("../../tests/fixtures/ca_cert.pem");
    const LEAF_PEM: &[u8] = include_bytes!("../../tests/fixtures/leaf_cert.pem");
    const KEY_PEM: &[u8] = include_bytes!("../../tests/fixtures/leaf_key.pem");
    const REQ_PEM: &[u8] = include_bytes!("../../tests/fixtures/leaf_req.pem");
    const CRL_PEM: &[u8] = include_bytes!("../../tests/fixtures/ca_crl.pem");

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.conn()
            .query_row(&format!("SELECT count(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_save_assigns_key_and_restore_round_trips() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);

        let mut node = codec::decode(CA_PEM, "/tmp/ca.pem").unwrap();
        node.set_comment("root of trust");
        assert!(node.store_key().is_none());

        let key = store.save(&mut node, None).unwrap();
        assert_eq!(node.store_key(), Some(&key));

        let restored = store.restore(&key).unwrap();
        assert!(restored.equals(&node));
        assert_eq!(restored.name(), node.name());
        assert_eq!(restored.comment(), "root of trust");
        assert_eq!(restored.source(), node.source());
        assert_eq!(restored.file_hint(), node.file_hint());
        assert_eq!(restored.store_key(), Some(&key));
        assert_eq!(
            restored.created().map(|t| t.timestamp()),
            node.created().map(|t| t.timestamp())
        );
    }

    #[test]
    fn test_every_kind_round_trips() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut body = TemplateBody::default();
        body.subject.insert("CN".to_string(), "tpl".to_string());
        let mut nodes = vec![
            codec::decode(CA_PEM, "").unwrap(),
            codec::decode(KEY_PEM, "").unwrap(),
            codec::decode(REQ_PEM, "").unwrap(),
            codec::decode(CRL_PEM, "").unwrap(),
            ArtifactNode::new(Template::new(body), Source::Generated),
        ];
        for node in nodes.iter_mut() {
            let key = store.save(node, None).unwrap();
            let restored = store.restore(&key).unwrap();
            assert!(restored.equals(node), "{} did not round trip", node.kind());
            assert_eq!(restored.kind(), node.kind());
        }
        let key = store.restore(nodes[1].store_key().unwrap()).unwrap();
        assert!(key.payload().as_key().unwrap().is_private());
    }

    #[test]
    fn test_token_residency_persists() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut node = codec::decode(KEY_PEM, "").unwrap();
        node.payload_mut()
            .set_residency(TokenResidency::new(SlotId(4), "card key", vec![0xab]));
        let key = store.save(&mut node, None).unwrap();
        let restored = store.restore(&key).unwrap();
        let residency = restored.payload().residency().unwrap();
        assert_eq!(residency.slot, SlotId(4));
        assert_eq!(residency.label, "card key");
        assert_eq!(residency.object_id, vec![0xab]);
    }

    #[test]
    fn test_delete_then_restore_is_row_not_found() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut tree = Hierarchy::new();

        let mut node = codec::decode(CA_PEM, "").unwrap();
        let key = store.save(&mut node, None).unwrap();
        let id = tree.insert(node);

        assert_eq!(store.delete(&mut tree, id).unwrap(), vec![key]);
        assert!(tree.get(id).unwrap().store_key().is_none());
        match store.restore(&key) {
            Err(StoreError::RowNotFound { key: k, .. }) => assert_eq!(k, key),
            other => panic!("expected RowNotFound, got {:?}", other.map(|n| n.to_string())),
        }
        assert_eq!(count(&db, "certificates"), 0);
    }

    #[test]
    fn test_delete_children_before_parent() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut tree = Hierarchy::new();

        let mut key_node = codec::decode(KEY_PEM, "").unwrap();
        let k0 = store.save(&mut key_node, None).unwrap();
        let n0 = tree.insert(key_node);

        let mut cert_node = codec::decode(LEAF_PEM, "").unwrap();
        let k1 = store.save(&mut cert_node, Some(&k0)).unwrap();
        let n1 = tree.insert(cert_node);
        tree.attach(n1, n0).unwrap();

        let order = store.delete(&mut tree, n0).unwrap();
        assert_eq!(order, vec![k1, k0]);
        assert_eq!(count(&db, "items"), 0);
        assert_eq!(count(&db, "keys"), 0);
        assert_eq!(count(&db, "certificates"), 0);
        assert!(matches!(store.restore(&k0), Err(StoreError::RowNotFound { .. })));
        assert!(matches!(store.restore(&k1), Err(StoreError::RowNotFound { .. })));
    }

    #[test]
    fn test_parent_row_cannot_be_deleted_first() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut tree = Hierarchy::new();

        let mut parent = codec::decode(KEY_PEM, "").unwrap();
        let k0 = store.save(&mut parent, None).unwrap();
        let mut child = codec::decode(LEAF_PEM, "").unwrap();
        store.save(&mut child, Some(&k0)).unwrap();

        // The tree does not know about the child, so only the parent is tried.
        let n0 = tree.insert(parent);
        assert!(matches!(store.delete(&mut tree, n0), Err(StoreError::Database(_))));
        assert_eq!(tree.get(n0).unwrap().store_key(), Some(&k0));
        assert_eq!(count(&db, "items"), 2);
    }

    #[test]
    fn test_save_with_vanished_row() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut tree = Hierarchy::new();

        let mut node = codec::decode(CA_PEM, "").unwrap();
        let key = store.save(&mut node, None).unwrap();
        let mut copy = store.restore(&key).unwrap();
        let id = tree.insert(node);
        store.delete(&mut tree, id).unwrap();

        assert!(matches!(
            store.save(&mut copy, None),
            Err(StoreError::RowNotFound { .. })
        ));
    }

    #[test]
    fn test_save_existing_updates_metadata() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut node = codec::decode(LEAF_PEM, "").unwrap();
        let key = store.save(&mut node, None).unwrap();

        node.set_name("web");
        assert_eq!(store.save(&mut node, None).unwrap(), key);
        assert_eq!(store.restore(&key).unwrap().name(), "web");
        assert_eq!(count(&db, "items"), 1);
    }

    #[test]
    fn test_key_of_other_kind_is_ownership_error() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut cert = codec::decode(LEAF_PEM, "").unwrap();
        let key = store.save(&mut cert, None).unwrap();

        let mut req = codec::decode(REQ_PEM, "").unwrap();
        req.set_store_key(Some(key));
        assert!(matches!(
            store.save(&mut req, None),
            Err(StoreError::Ownership { expected: ArtifactKind::Request, .. })
        ));
    }

    #[test]
    fn test_list_and_find_by_hash() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut ca = codec::decode(CA_PEM, "").unwrap();
        let mut leaf = codec::decode(LEAF_PEM, "").unwrap();
        let mut key = codec::decode(KEY_PEM, "").unwrap();
        let k_ca = store.save(&mut ca, None).unwrap();
        let k_leaf = store.save(&mut leaf, Some(&k_ca)).unwrap();
        store.save(&mut key, None).unwrap();

        let certs = store.list_by_kind(ArtifactKind::Certificate).unwrap();
        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0].key, k_ca);
        assert_eq!(certs[1].parent, Some(k_ca));
        assert_eq!(certs[1].content_hash, leaf.content_hash());
        assert_eq!(store.list_by_kind(ArtifactKind::Key).unwrap().len(), 1);
        assert!(store.list_by_kind(ArtifactKind::Template).unwrap().is_empty());

        assert_eq!(store.find_by_hash(leaf.content_hash()).unwrap(), vec![k_leaf]);
    }

    #[test]
    fn test_load_tree_relinks_parents() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut ca = codec::decode(CA_PEM, "").unwrap();
        let mut leaf = codec::decode(LEAF_PEM, "").unwrap();
        let k_ca = store.save(&mut ca, None).unwrap();
        store.save(&mut leaf, Some(&k_ca)).unwrap();

        let mut tree = Hierarchy::new();
        let ids = store.load_tree(&mut tree).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(tree.roots(), &[ids[0]]);
        assert_eq!(tree.children(ids[0]), &[ids[1]]);
        assert!(tree.get(ids[1]).unwrap().equals(&leaf));
    }

    #[test]
    fn test_audit_trail() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut parent = codec::decode(KEY_PEM, "").unwrap();
        let mut node = codec::decode(LEAF_PEM, "").unwrap();
        let k0 = store.save(&mut parent, None).unwrap();
        let key = store.save(&mut node, None).unwrap();
        node.set_comment("x");
        store.update_metadata(&node).unwrap();
        store.set_parent(&key, Some(&k0)).unwrap();
        store.log_action(&key, "exported", Some("leaf.crt")).unwrap();

        let actions: Vec<String> = store
            .get_audit_logs(&key)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["created", "updated", "reparented", "exported"]);
    }

    #[test]
    fn test_update_unsaved_node() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let node = codec::decode(LEAF_PEM, "").unwrap();
        assert!(matches!(store.update_metadata(&node), Err(StoreError::Unsaved(_))));
    }

    #[test]
    fn test_failed_insert_assigns_no_key() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut body = TemplateBody::default();
        body.subject.insert("CN".to_string(), "orphan".to_string());
        let mut node = ArtifactNode::new(Template::new(body), Source::Generated);
        assert!(node.created().is_none());

        // No row exists for this parent, so the foreign key rejects the insert.
        let missing_parent = StoreKey::generate();
        assert!(matches!(
            store.save(&mut node, Some(&missing_parent)),
            Err(StoreError::Database(_))
        ));
        assert!(node.store_key().is_none());
        assert!(node.created().is_none());
        assert_eq!(count(&db, "items"), 0);
        assert_eq!(count(&db, "templates"), 0);
        assert_eq!(count(&db, "audit_log"), 0);
    }

    #[test]
    fn test_corrupt_source_or_time_is_reported() {
        let db = setup();
        let store = SqliteArtifactStore::new(&db);
        let mut node = codec::decode(CA_PEM, "").unwrap();
        let key = store.save(&mut node, None).unwrap();

        db.conn()
            .execute(
                "UPDATE items SET source = 'smuggled' WHERE id = ?1",
                params![key.to_string()],
            )
            .unwrap();
        assert!(matches!(store.restore(&key), Err(StoreError::Corrupt { .. })));
        assert!(store.list_by_kind(ArtifactKind::Certificate).is_err());

        db.conn()
            .execute(
                "UPDATE items SET source = 'imported', created_at = 'yesterday' WHERE id = ?1",
                params![key.to_string()],
            )
            .unwrap();
        match store.restore(&key) {
            Err(StoreError::Corrupt { key: k, reason }) => {
                assert_eq!(k, key);
                assert!(reason.contains("yesterday"));
            }
            other => panic!("expected corrupt row, got {:?}", other.map(|n| n.to_string())),
        }
        assert!(store.list_by_kind(ArtifactKind::Certificate).is_err());
    }
}
