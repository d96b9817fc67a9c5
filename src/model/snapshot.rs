//! Immutable channel and bridge snapshots consumed by the engine.
//!
//! Snapshots are point-in-time views published by the channel and bridge
//! subsystems. The engine never mutates them; translators compare old and
//! new snapshots to infer semantic events.

use serde::{Deserialize, Serialize};

/// Channel state at the time a snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelState {
    /// On hook, no call
    #[default]
    Down,
    /// Reserved by a technology driver
    Reserved,
    /// Off hook, no call yet
    OffHook,
    /// Digits being dialed
    Dialing,
    /// Remote end is ringing
    Ring,
    /// Local end is ringing
    Ringing,
    /// Call is up
    Up,
    /// Remote end is busy
    Busy,
}

/// Technology property flags carried by a channel snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TechProperties(u32);

impl TechProperties {
    /// No properties set.
    pub const NONE: TechProperties = TechProperties(0);

    /// The channel is an implementation detail of its technology driver
    /// and must not be reported on.
    pub const INTERNAL: TechProperties = TechProperties(1);

    /// Check whether all flags in `other` are set.
    pub fn contains(self, other: TechProperties) -> bool {
        self.0 & other.0 == other.0
    }

    /// Combine two flag sets.
    pub fn union(self, other: TechProperties) -> TechProperties {
        TechProperties(self.0 | other.0)
    }
}

/// An immutable view of one channel at a point in time.
///
/// All string fields default to empty when the underlying value is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    /// Identifier unique to this channel
    pub unique_id: String,
    /// Identifier shared by every channel in the same logical call
    pub linked_id: String,
    /// Channel name, e.g. `PJSIP/alice-00000001`
    pub name: String,
    /// Channel state
    pub state: ChannelState,
    /// Terminal flag, set once the channel has been hung up
    pub dead: bool,
    /// Caller id name
    pub caller_name: String,
    /// Caller id number
    pub caller_number: String,
    /// Automatic Number Identification
    pub caller_ani: String,
    /// Redirecting Directory Number Information Service
    pub caller_rdnis: String,
    /// Dialed Number Identification Service
    pub caller_dnid: String,
    /// Dialplan context
    pub context: String,
    /// Dialplan extension
    pub exten: String,
    /// Currently executing application, empty when none
    pub app_name: String,
    /// Arguments of the currently executing application
    pub app_data: String,
    /// Billing account code
    pub account_code: String,
    /// Billing account code of the bridged peer
    pub peer_account: String,
    /// Free-form user field
    pub user_field: String,
    /// Automatic Message Accounting flags
    pub ama_flags: u32,
    /// Cause code recorded at hangup
    pub hangup_cause: u32,
    /// Entity that initiated the hangup
    pub hangup_source: String,
    /// Technology property flags
    pub tech_properties: TechProperties,
}

impl ChannelSnapshot {
    /// Whether this channel is internal to its technology driver and
    /// must be ignored by the engine.
    pub fn is_internal(&self) -> bool {
        self.tech_properties.contains(TechProperties::INTERNAL)
    }
}

/// An immutable view of one bridge at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeSnapshot {
    /// Identifier unique to this bridge
    pub unique_id: String,
}
