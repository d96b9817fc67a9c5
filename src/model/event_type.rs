//! CEL event kinds, their canonical names, and the tracked-event bitset.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of channel events the engine can report.
///
/// Discriminants are dense small integers that fit in a 64-bit bitset.
/// Index 0 is reserved for the special `ALL` value, which is only valid in
/// the `events` configuration list and is not an event kind of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
#[repr(u32)]
pub enum EventType {
    /// A channel was created
    ChannelStart = 1,
    /// A channel was destroyed
    ChannelEnd = 2,
    /// A channel answered
    Answer = 3,
    /// A channel was hung up
    Hangup = 4,
    /// A tracked application started executing on a channel
    AppStart = 5,
    /// A tracked application finished executing on a channel
    AppEnd = 6,
    /// A channel was parked
    ParkStart = 7,
    /// A parked channel left the parking lot
    ParkEnd = 8,
    /// An event published by an external producer under its own name
    UserDefined = 9,
    /// A channel entered a bridge
    BridgeEnter = 10,
    /// A channel left a bridge
    BridgeExit = 11,
    /// A blind transfer completed
    BlindTransfer = 12,
    /// An attended transfer completed
    AttendedTransfer = 13,
    /// A call was picked up by another channel
    Pickup = 14,
    /// A dial attempt was forwarded to another destination
    Forward = 15,
    /// The last channel bearing a linked id ended
    LinkedidEnd = 16,
    /// A local channel pair was optimized away
    LocalOptimize = 17,
}

/// The special configuration value that selects every event kind.
pub const ALL_EVENTS_NAME: &str = "ALL";

impl EventType {
    /// Every defined event kind, in discriminant order.
    pub const VARIANTS: [EventType; 17] = [
        EventType::ChannelStart,
        EventType::ChannelEnd,
        EventType::Answer,
        EventType::Hangup,
        EventType::AppStart,
        EventType::AppEnd,
        EventType::ParkStart,
        EventType::ParkEnd,
        EventType::UserDefined,
        EventType::BridgeEnter,
        EventType::BridgeExit,
        EventType::BlindTransfer,
        EventType::AttendedTransfer,
        EventType::Pickup,
        EventType::Forward,
        EventType::LinkedidEnd,
        EventType::LocalOptimize,
    ];

    /// Get the canonical name for this event kind.
    pub fn name(self) -> &'static str {
        match self {
            EventType::ChannelStart => "CHANNEL_START",
            EventType::ChannelEnd => "CHANNEL_END",
            EventType::Answer => "ANSWER",
            EventType::Hangup => "HANGUP",
            EventType::AppStart => "APP_START",
            EventType::AppEnd => "APP_END",
            EventType::ParkStart => "PARK_START",
            EventType::ParkEnd => "PARK_END",
            EventType::UserDefined => "USER_DEFINED",
            EventType::BridgeEnter => "BRIDGE_ENTER",
            EventType::BridgeExit => "BRIDGE_EXIT",
            EventType::BlindTransfer => "BLINDTRANSFER",
            EventType::AttendedTransfer => "ATTENDEDTRANSFER",
            EventType::Pickup => "PICKUP",
            EventType::Forward => "FORWARD",
            EventType::LinkedidEnd => "LINKEDID_END",
            EventType::LocalOptimize => "LOCAL_OPTIMIZE",
        }
    }

    /// Look up an event kind by its canonical name.
    ///
    /// Matching is case-sensitive. Returns `None` for unknown names and for
    /// the literal `ALL`, which is not a kind.
    pub fn from_name(name: &str) -> Option<EventType> {
        EventType::VARIANTS
            .iter()
            .find(|event_type| event_type.name() == name)
            .copied()
    }

    /// The bit this event kind occupies in an [`EventSet`].
    pub fn bit(self) -> u64 {
        1u64 << (self as u32)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<EventType> for u32 {
    fn from(event_type: EventType) -> u32 {
        event_type as u32
    }
}

impl TryFrom<u32> for EventType {
    type Error = String;

    fn try_from(raw: u32) -> Result<EventType, String> {
        EventType::VARIANTS
            .iter()
            .find(|event_type| **event_type as u32 == raw)
            .copied()
            .ok_or_else(|| format!("Unknown event type {}", raw))
    }
}

/// Get the name for a raw event kind value, `"Unknown"` if unmapped.
pub fn type_name(raw: u32) -> &'static str {
    EventType::try_from(raw).map(EventType::name).unwrap_or("Unknown")
}

/// A set of event kinds packed into a 64-bit bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventSet(u64);

impl EventSet {
    /// The empty set.
    pub const EMPTY: EventSet = EventSet(0);

    /// The set containing every bit, produced by the `ALL` config value.
    pub const ALL: EventSet = EventSet(u64::MAX);

    /// Create a set from a raw bitmask.
    pub fn from_bits(bits: u64) -> EventSet {
        EventSet(bits)
    }

    /// Get the raw bitmask.
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Add an event kind to the set.
    pub fn insert(&mut self, event_type: EventType) {
        self.0 |= event_type.bit();
    }

    /// Check whether an event kind is in the set.
    pub fn contains(self, event_type: EventType) -> bool {
        self.0 & event_type.bit() != 0
    }

    /// Check whether the set is empty.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the defined event kinds present in the set, in
    /// discriminant order.
    pub fn iter(self) -> impl Iterator<Item = EventType> {
        EventType::VARIANTS
            .into_iter()
            .filter(move |event_type| self.contains(*event_type))
    }
}

impl FromIterator<EventType> for EventSet {
    fn from_iter<I: IntoIterator<Item = EventType>>(iter: I) -> EventSet {
        let mut set = EventSet::EMPTY;
        for event_type in iter {
            set.insert(event_type);
        }
        set
    }
}
