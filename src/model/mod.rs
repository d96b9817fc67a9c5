//! Data model: event kinds, channel snapshots, and event records.

pub mod event_type;
pub mod record;
pub mod snapshot;

pub use event_type::{type_name, EventSet, EventType, ALL_EVENTS_NAME};
pub use record::{EventRecord, FabricatedChannel};
pub use snapshot::{BridgeSnapshot, ChannelSnapshot, ChannelState, TechProperties};
