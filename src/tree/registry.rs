// Certvault — Deduplication registry
//
// Content hash → node handles. The hash is only a pre-filter; a duplicate is
// confirmed with `equals` on the canonical encoding. Owned by whoever owns
// the hierarchy and cleared with it.

use std::collections::HashMap;

use super::{Hierarchy, NodeId};
use crate::artifact::ArtifactNode;

#[derive(Debug, Default)]
pub struct Registry {
    by_hash: HashMap<u32, Vec<NodeId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: NodeId, node: &ArtifactNode) {
        let ids = self.by_hash.entry(node.content_hash()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    pub fn unregister(&mut self, id: NodeId, node: &ArtifactNode) {
        let hash = node.content_hash();
        if let Some(ids) = self.by_hash.get_mut(&hash) {
            ids.retain(|i| *i != id);
            if ids.is_empty() {
                self.by_hash.remove(&hash);
            }
        }
    }

    /// A managed node `equals` to `node`, if there is one.
    pub fn find_duplicate(&self, tree: &Hierarchy, node: &ArtifactNode) -> Option<NodeId> {
        self.by_hash
            .get(&node.content_hash())?
            .iter()
            .copied()
            .find(|id| tree.get(*id).is_some_and(|existing| existing.equals(node)))
    }

    pub fn len(&self) -> usize {
        self.by_hash.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_hash.clear();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    const CA_PEM: &[u8] = include_bytes!("../../tests/fixtures/ca_cert.pem");
    const LEAF_PEM: &[u8] = include_bytes!("../../tests/fixtures/leaf_cert.pem");

    #[test]
    fn test_duplicate_found_regardless_of_metadata() {
        let mut tree = Hierarchy::new();
        let mut registry = Registry::new();
        let id = tree.insert(codec::decode(CA_PEM, "").unwrap());
        registry.register(id, tree.get(id).unwrap());

        let mut again = codec::decode(CA_PEM, "other.pem").unwrap();
        again.set_name("renamed");
        assert_eq!(registry.find_duplicate(&tree, &again), Some(id));

        let other = codec::decode(LEAF_PEM, "").unwrap();
        assert_eq!(registry.find_duplicate(&tree, &other), None);
    }

    #[test]
    fn test_unregister_and_clear() {
        let mut tree = Hierarchy::new();
        let mut registry = Registry::new();
        let a = tree.insert(codec::decode(CA_PEM, "").unwrap());
        let b = tree.insert(codec::decode(LEAF_PEM, "").unwrap());
        registry.register(a, tree.get(a).unwrap());
        registry.register(b, tree.get(b).unwrap());
        registry.register(b, tree.get(b).unwrap());
        assert_eq!(registry.len(), 2);

        registry.unregister(a, tree.get(a).unwrap());
        assert_eq!(registry.len(), 1);
        assert!(registry
            .find_duplicate(&tree, &codec::decode(CA_PEM, "").unwrap())
            .is_none());

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_released_handle_is_not_a_duplicate() {
        let mut tree = Hierarchy::new();
        let mut registry = Registry::new();
        let id = tree.insert(codec::decode(CA_PEM, "").unwrap());
        registry.register(id, tree.get(id).unwrap());
        tree.release(id).unwrap();
        let lookup = codec::decode(CA_PEM, "").unwrap();
        assert_eq!(registry.find_duplicate(&tree, &lookup), None);
    }
}
