// Certvault — In-memory token driver
//
// A software stand-in for a hardware token: one or more slots holding
// labelled objects keyed by artifact identity.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{ObjectHandle, SlotId, TokenDriver, TokenError};
use crate::artifact::{ArtifactKind, ArtifactNode};

const DEFAULT_MAX_LABEL: usize = 32;

#[derive(Debug, Clone)]
struct TokenObject {
    handle: ObjectHandle,
    kind: ArtifactKind,
    identity: Vec<u8>,
    label: String,
}

#[derive(Debug, Default)]
struct State {
    slots: BTreeMap<SlotId, Vec<TokenObject>>,
    next_handle: u64,
    read_only: bool,
}

#[derive(Debug)]
pub struct MemoryToken {
    default_slot: SlotId,
    max_label: usize,
    state: Mutex<State>,
}

impl MemoryToken {
    /// A token with a single empty slot.
    pub fn new(default_slot: SlotId) -> Self {
        let mut state = State::default();
        state.slots.insert(default_slot, Vec::new());
        Self {
            default_slot,
            max_label: DEFAULT_MAX_LABEL,
            state: Mutex::new(state),
        }
    }

    pub fn with_max_label(mut self, max: usize) -> Self {
        self.max_label = max;
        self
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.lock().read_only = read_only;
    }

    /// Materialize `node` in `slot`, creating the slot if needed.
    pub fn store(&self, slot: SlotId, node: &ArtifactNode, label: &str) -> ObjectHandle {
        let mut state = self.lock();
        state.next_handle += 1;
        let handle = ObjectHandle(state.next_handle);
        state.slots.entry(slot).or_default().push(TokenObject {
            handle,
            kind: node.kind(),
            identity: node.canonical_encode().to_vec(),
            label: label.to_string(),
        });
        handle
    }

    pub fn object_count(&self, slot: SlotId) -> usize {
        self.lock().slots.get(&slot).map(Vec::len).unwrap_or(0)
    }

    pub fn labels(&self, slot: SlotId) -> Vec<String> {
        self.lock()
            .slots
            .get(&slot)
            .map(|objects| objects.iter().map(|o| o.label.clone()).collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn unreachable_slot(slot: SlotId) -> TokenError {
    TokenError::Access {
        slot,
        reason: "no such slot".to_string(),
    }
}

impl TokenDriver for MemoryToken {
    fn default_slot(&self) -> Result<SlotId, TokenError> {
        Ok(self.default_slot)
    }

    fn find_objects(
        &self,
        slot: SlotId,
        kind: ArtifactKind,
        identity: &[u8],
    ) -> Result<Vec<ObjectHandle>, TokenError> {
        let state = self.lock();
        let objects = state.slots.get(&slot).ok_or_else(|| unreachable_slot(slot))?;
        Ok(objects
            .iter()
            .filter(|o| o.kind == kind && o.identity == identity)
            .map(|o| o.handle)
            .collect())
    }

    fn destroy_object(&self, slot: SlotId, object: ObjectHandle) -> Result<(), TokenError> {
        let mut state = self.lock();
        if state.read_only {
            return Err(TokenError::ReadOnly);
        }
        let objects = state.slots.get_mut(&slot).ok_or_else(|| unreachable_slot(slot))?;
        let before = objects.len();
        objects.retain(|o| o.handle != object);
        if objects.len() == before {
            return Err(TokenError::NotFound(slot));
        }
        Ok(())
    }

    fn set_label(&self, slot: SlotId, object: ObjectHandle, label: &str) -> Result<(), TokenError> {
        if label.len() > self.max_label {
            return Err(TokenError::LabelTooLong { max: self.max_label });
        }
        let mut state = self.lock();
        if state.read_only {
            return Err(TokenError::ReadOnly);
        }
        let objects = state.slots.get_mut(&slot).ok_or_else(|| unreachable_slot(slot))?;
        let target = objects
            .iter_mut()
            .find(|o| o.handle == object)
            .ok_or(TokenError::NotFound(slot))?;
        target.label = label.to_string();
        Ok(())
    }
}
