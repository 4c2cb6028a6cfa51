//! Per-session record of source identities the coordinator has claimed

use super::ElementState;
use crate::types::ResourceId;

use parking_lot::Mutex;
use std::collections::HashMap;

/// Where a claimed identity is in its conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEntry {
    /// Claimed, conversion still running or waiting for the element to load
    InFlight,
    /// Conversion finished in this state
    Done(ElementState),
}

#[derive(Debug, Default)]
struct Entries {
    states: HashMap<ResourceId, RecordEntry>,
    targets: HashMap<ResourceId, ResourceId>,
}

/// De-duplication guard scoped to one page session.
///
/// An identity is claimed when its conversion starts, so a second mutation
/// referencing it while the first is still running is skipped. Finished
/// entries are never pruned, including failures. A claim whose element never
/// loaded in time is released so a later pass can try again.
#[derive(Debug, Default)]
pub struct ConversionRecord {
    entries: Mutex<Entries>,
}

impl ConversionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` was claimed, finished or not
    pub fn has_processed(&self, id: &ResourceId) -> bool {
        self.entries.lock().states.contains_key(id)
    }

    /// Record `id` as finished in `state`
    pub fn mark_processed(&self, id: &ResourceId, state: ElementState) {
        self.entries.lock().states.insert(id.clone(), RecordEntry::Done(state));
    }

    /// Record `id` as finished in `state`, its elements now pointing at `target`
    pub fn mark_swapped(&self, id: &ResourceId, state: ElementState, target: ResourceId) {
        let mut entries = self.entries.lock();
        entries.states.insert(id.clone(), RecordEntry::Done(state));
        entries.targets.insert(id.clone(), target);
    }

    /// Claim `id` for conversion; `false` if someone already holds it
    pub fn try_begin(&self, id: &ResourceId) -> bool {
        let mut entries = self.entries.lock();
        if entries.states.contains_key(id) {
            return false;
        }
        entries.states.insert(id.clone(), RecordEntry::InFlight);
        true
    }

    /// Drop an in-flight claim. Finished entries are kept.
    pub fn release(&self, id: &ResourceId) -> bool {
        let mut entries = self.entries.lock();
        match entries.states.get(id) {
            Some(RecordEntry::InFlight) => entries.states.remove(id).is_some(),
            _ => false,
        }
    }

    pub fn entry(&self, id: &ResourceId) -> Option<RecordEntry> {
        self.entries.lock().states.get(id).copied()
    }

    /// Source that replaced `id`, for swapped conversions
    pub fn target(&self, id: &ResourceId) -> Option<ResourceId> {
        self.entries.lock().targets.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.entries
            .lock()
            .states
            .values()
            .filter(|e| matches!(e, RecordEntry::InFlight))
            .count()
    }
}
