//! Reference-counted tracking of active linked-call identifiers.
//!
//! Every live channel holds one reference on its linked id. When the last
//! reference is dropped the id retires, which is the engine's cue to emit
//! LINKEDID_END for the channel whose end caused the drop.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Result of dropping a reference on a linked id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unref {
    /// The last reference was dropped; the id has been removed
    Retired,
    /// Other channels still reference the id
    StillReferenced,
    /// The id was not being tracked
    NotFound,
}

/// Refcounted set of linked-call identifiers.
///
/// The tracker owns its id strings; refcounts equal the number of live
/// channels bearing each id.
pub struct LinkedIdTracker {
    entries: DashMap<String, usize>,
}

impl LinkedIdTracker {
    /// Create an empty tracker.
    pub fn new() -> LinkedIdTracker {
        LinkedIdTracker {
            entries: DashMap::new(),
        }
    }

    /// Take a reference on `linked_id`, creating the entry on first use.
    ///
    /// Returns `false` without tracking anything when the id is empty.
    pub fn ref_id(&self, linked_id: &str) -> bool {
        if linked_id.is_empty() {
            tracing::error!("The linked id should never be empty");
            return false;
        }
        *self.entries.entry(linked_id.to_string()).or_insert(0) += 1;
        true
    }

    /// Drop a reference on `linked_id`.
    pub fn unref_id(&self, linked_id: &str) -> Unref {
        match self.entries.entry(linked_id.to_string()) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() -= 1;
                if *entry.get() == 0 {
                    entry.remove();
                    Unref::Retired
                } else {
                    Unref::StillReferenced
                }
            }
            Entry::Vacant(_) => Unref::NotFound,
        }
    }

    /// Current refcount for `linked_id`, if tracked.
    pub fn refcount(&self, linked_id: &str) -> Option<usize> {
        self.entries.get(linked_id).map(|entry| *entry.value())
    }

    /// Number of tracked ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no ids are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for LinkedIdTracker {
    fn default() -> Self {
        Self::new()
    }
}
