// Certvault — Hierarchy Module
//
// Parent/child grouping of artifact nodes. Nodes live in an arena and are
// addressed by generational handles; the parent link is a plain handle and
// each node owns the ordered list of its children's handles. Every edit goes
// through `Hierarchy` so both directions stay consistent.
//
// Detach policy: a detached node keeps its children. The whole subtree
// becomes a new root; nothing is handed to the former grandparent.

mod filter;
mod registry;

use std::fmt;

use thiserror::Error;

use crate::artifact::ArtifactNode;

pub use filter::Filter;
pub use registry::Registry;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// `parent` is `child` itself or one of its descendants.
    #[error("Cannot attach {child} under {parent}: would create a cycle")]
    Cycle { child: NodeId, parent: NodeId },

    #[error("Unknown or released node {0}")]
    Stale(NodeId),

    #[error("Node {0} still has children")]
    HasChildren(NodeId),
}

// ─── Handles ─────────────────────────────────────────────────────────────────

/// Stable handle of a node. Handles of released nodes never resolve again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

struct Entry {
    node: ArtifactNode,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

// ─── Hierarchy ───────────────────────────────────────────────────────────────

/// Mutation takes `&mut self`; share behind an `RwLock` for one writer and
/// many concurrent readers.
#[derive(Default)]
pub struct Hierarchy {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<NodeId>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `node` as a new root.
    pub fn insert(&mut self, node: ArtifactNode) -> NodeId {
        let entry = Entry {
            node,
            parent: None,
            children: Vec::new(),
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        };
        self.roots.push(id);
        id
    }

    fn entry(&self, id: NodeId) -> Option<&Entry> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn require(&self, id: NodeId) -> Result<&Entry, TreeError> {
        self.entry(id).ok_or(TreeError::Stale(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&ArtifactNode> {
        self.entry(id).map(|e| &e.node)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ArtifactNode> {
        self.entry_mut(id).map(|e| &mut e.node)
    }

    pub fn node(&self, id: NodeId) -> Result<&ArtifactNode, TreeError> {
        self.get(id).ok_or(TreeError::Stale(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut ArtifactNode, TreeError> {
        self.get_mut(id).ok_or(TreeError::Stale(id))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Every live node with its handle, in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ArtifactNode)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry.as_ref().map(|e| {
                (
                    NodeId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    &e.node,
                )
            })
        })
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.entry(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    // ─── Positional access ───────────────────────────────────────────────

    pub fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent).get(index).copied()
    }

    pub fn child_count(&self, parent: NodeId) -> usize {
        self.children(parent).len()
    }

    /// Position of `child` among `parent`'s direct children.
    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    /// Number of ancestors above `id`.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            depth += 1;
            cur = self.parent(p);
        }
        depth
    }

    /// True if `ancestor` is `id` or lies on the path from `id` to its root.
    pub fn is_self_or_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.parent(n);
        }
        false
    }

    // ─── Edits ───────────────────────────────────────────────────────────

    /// Move `child` to the end of `parent`'s children. A no-op when it is
    /// already the last child of `parent`. The tree is untouched on error.
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> Result<(), TreeError> {
        self.require(child)?;
        let siblings = &self.require(parent)?.children;

        if self.is_self_or_ancestor(child, parent) {
            return Err(TreeError::Cycle { child, parent });
        }
        if siblings.last() == Some(&child) {
            return Ok(());
        }

        self.unlink(child);
        if let Some(e) = self.entry_mut(parent) {
            e.children.push(child);
        }
        if let Some(e) = self.entry_mut(child) {
            e.parent = Some(parent);
        }
        Ok(())
    }

    /// Remove `id` from its parent; it becomes a root and keeps its subtree.
    pub fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.require(id)?;
        if self.parent(id).is_some() {
            self.unlink(id);
            self.roots.push(id);
        }
        Ok(())
    }

    /// Where `id` sits: its parent (`None` for a root) and its index among
    /// its siblings.
    pub fn position(&self, id: NodeId) -> Result<(Option<NodeId>, usize), TreeError> {
        self.require(id)?;
        let parent = self.parent(id);
        let siblings = match parent {
            Some(p) => self.children(p),
            None => self.roots(),
        };
        let index = siblings.iter().position(|s| *s == id).unwrap_or(siblings.len());
        Ok((parent, index))
    }

    /// Put `id` at `index` under `parent` (or among the roots), as recorded
    /// by `position`. Indexes past the end append. The tree is untouched on
    /// error.
    pub fn place(
        &mut self,
        id: NodeId,
        parent: Option<NodeId>,
        index: usize,
    ) -> Result<(), TreeError> {
        self.require(id)?;
        if let Some(p) = parent {
            self.require(p)?;
            if self.is_self_or_ancestor(id, p) {
                return Err(TreeError::Cycle { child: id, parent: p });
            }
        }

        self.unlink(id);
        let siblings = match parent {
            Some(p) => match self.entry_mut(p) {
                Some(e) => &mut e.children,
                None => return Err(TreeError::Stale(p)),
            },
            None => &mut self.roots,
        };
        siblings.insert(index.min(siblings.len()), id);
        if let Some(e) = self.entry_mut(id) {
            e.parent = parent;
        }
        Ok(())
    }

    /// Drop `id` from its parent's children or from the roots list.
    fn unlink(&mut self, id: NodeId) {
        let parent = self.entry_mut(id).and_then(|e| e.parent.take());
        match parent {
            Some(p) => {
                if let Some(e) = self.entry_mut(p) {
                    e.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
    }

    /// Detach and return the first child of `parent`.
    pub fn take_first(&mut self, parent: NodeId) -> Option<NodeId> {
        let first = self.child_at(parent, 0)?;
        self.detach(first).ok()?;
        Some(first)
    }

    /// Detach every child of `parent`; they become roots in order.
    pub fn clear(&mut self, parent: NodeId) -> Vec<NodeId> {
        let mut taken = Vec::new();
        while let Some(child) = self.take_first(parent) {
            taken.push(child);
        }
        taken
    }

    /// All descendants of `id` in post-order: children before their parent,
    /// siblings in order. `id` itself is not included.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        // (node, next child index)
        let mut stack: Vec<(NodeId, usize)> = vec![(id, 0)];
        while let Some((node, next)) = stack.pop() {
            match self.child_at(node, next) {
                Some(child) => {
                    stack.push((node, next + 1));
                    stack.push((child, 0));
                }
                None => {
                    if node != id {
                        out.push(node);
                    }
                }
            }
        }
        out
    }

    /// Remove a childless node from the arena and hand it back.
    pub fn release(&mut self, id: NodeId) -> Result<ArtifactNode, TreeError> {
        if !self.require(id)?.children.is_empty() {
            return Err(TreeError::HasChildren(id));
        }
        self.unlink(id);
        let slot = &mut self.slots[id.index as usize];
        let entry = slot.entry.take().ok_or(TreeError::Stale(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Ok(entry.node)
    }

    /// Release `id` and its whole subtree, children first.
    pub fn release_subtree(&mut self, id: NodeId) -> Result<Vec<ArtifactNode>, TreeError> {
        self.require(id)?;
        let mut order = self.descendants(id);
        order.push(id);
        order.into_iter().map(|n| self.release(n)).collect()
    }

    // ─── Visibility ──────────────────────────────────────────────────────

    /// Memoized filter match of the node's own identity text.
    pub fn is_visible(&self, id: NodeId, filter: &Filter) -> bool {
        self.get(id).is_some_and(|n| n.visible(filter))
    }

    /// True if `id` or any descendant is visible.
    pub fn subtree_visible(&self, id: NodeId, filter: &Filter) -> bool {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if self.is_visible(n, filter) {
                return true;
            }
            stack.extend_from_slice(self.children(n));
        }
        false
    }

    /// Drop the memoized visibility of `id`.
    pub fn invalidate(&self, id: NodeId) {
        if let Some(node) = self.get(id) {
            node.recheck_visibility();
        }
    }
}

impl fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hierarchy")
            .field("nodes", &self.len())
            .field("roots", &self.roots)
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
