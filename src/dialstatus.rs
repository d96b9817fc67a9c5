//! Staging store for in-flight dial outcomes.
//!
//! Dial events carrying a final status are held here, keyed by the
//! caller's unique id, until the caller's HANGUP is built and drains the
//! entry to attach the status.

use dashmap::DashMap;

use crate::messages::DialPayload;

/// Keyed staging of dial outcome payloads.
///
/// A later payload for the same caller replaces the earlier one, so the
/// store always holds the most recent outcome.
pub struct DialStatusStore {
    entries: DashMap<String, DialPayload>,
}

impl DialStatusStore {
    /// Create an empty store.
    pub fn new() -> DialStatusStore {
        DialStatusStore {
            entries: DashMap::new(),
        }
    }

    /// Stage `payload` under its caller's unique id.
    ///
    /// Payloads without a caller snapshot are ignored.
    pub fn stage(&self, payload: DialPayload) {
        let Some(caller) = payload.caller.as_ref() else {
            tracing::debug!("Dropping dial status with no caller");
            return;
        };
        self.entries.insert(caller.unique_id.clone(), payload);
    }

    /// Remove and return the staged payload for `unique_id`.
    pub fn drain(&self, unique_id: &str) -> Option<DialPayload> {
        self.entries.remove(unique_id).map(|(_, payload)| payload)
    }

    /// Number of staged payloads.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard everything staged.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for DialStatusStore {
    fn default() -> Self {
        Self::new()
    }
}
