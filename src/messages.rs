//! Messages flowing over the engine's topics.
//!
//! Upstream subsystems publish these on their own topics; the engine
//! forwards everything into one aggregation topic and dispatches by
//! variant. Using tagged variants keeps routing exhaustive at compile
//! time.

use serde_json::Value;

use crate::model::{BridgeSnapshot, ChannelSnapshot, EventType};

/// Outcome of a transfer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferResult {
    /// The request was not valid for the channels involved
    Invalid,
    /// The transfer was not permitted
    NotPermitted,
    /// The transfer failed
    Fail,
    /// The transfer completed
    Success,
}

/// What happened to a parked call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkedCallEvent {
    /// The call entered the parking lot
    Parked,
    /// The parked call timed out
    Timeout,
    /// The parkee hung up while parked
    GiveUp,
    /// The call was retrieved from the lot
    Unparked,
    /// Parking failed
    Failed,
    /// The parked call was swapped for another
    Swap,
}

/// A parking lot update for one parked channel.
#[derive(Debug, Clone)]
pub struct ParkingPayload {
    /// The channel that was parked
    pub parkee: ChannelSnapshot,
    /// What happened
    pub event: ParkedCallEvent,
    /// Dial string that reaches the parker
    pub parker_dial_string: String,
    /// Name of the parking lot
    pub parking_lot: String,
}

/// Outcome of a dial attempt, published by the dialing core.
#[derive(Debug, Clone)]
pub struct DialPayload {
    /// The channel that dialed
    pub caller: Option<ChannelSnapshot>,
    /// Destination the dial was forwarded to, empty when not forwarded
    pub forwarded_to: String,
    /// Final dial status (e.g. ANSWER, BUSY), empty while in flight
    pub dial_status: String,
}

/// A channel entering or leaving a bridge.
#[derive(Debug, Clone)]
pub struct BridgePayload {
    /// The bridge involved
    pub bridge: BridgeSnapshot,
    /// The channel that entered or left
    pub channel: ChannelSnapshot,
}

/// A completed or failed blind transfer.
#[derive(Debug, Clone)]
pub struct BlindTransferPayload {
    /// Outcome of the transfer
    pub result: TransferResult,
    /// The channel that initiated the transfer
    pub transferer: ChannelSnapshot,
    /// Bridge the transferer was in, when known
    pub bridge: Option<BridgeSnapshot>,
    /// Destination extension
    pub exten: Option<String>,
    /// Destination context
    pub context: Option<String>,
}

/// One side of an attended transfer.
#[derive(Debug, Clone)]
pub struct TransferSide {
    /// Bridge on this side, when one exists
    pub bridge: Option<BridgeSnapshot>,
    /// Channel on this side
    pub channel: ChannelSnapshot,
}

/// Where an attended transfer ended up.
#[derive(Debug, Clone)]
pub enum AttendedTransferDest {
    /// The transfer failed
    Fail,
    /// The two bridges were merged
    BridgeMerge,
    /// The bridges were linked by local channels
    Link,
    /// All parties were joined into one bridge
    Threeway,
    /// The transferee was sent to a dialplan application
    App(String),
}

/// A completed attended transfer.
#[derive(Debug, Clone)]
pub struct AttendedTransferPayload {
    /// The transferer's side toward the transferee
    pub to_transferee: TransferSide,
    /// The transferer's side toward the transfer target
    pub to_transfer_target: TransferSide,
    /// Destination of the transfer
    pub dest: AttendedTransferDest,
}

/// A call pickup.
#[derive(Debug, Clone)]
pub struct PickupPayload {
    /// The channel doing the pickup
    pub channel: Option<ChannelSnapshot>,
    /// The ringing channel that was picked up
    pub target: Option<ChannelSnapshot>,
}

/// A local channel pair being optimized away.
#[derive(Debug, Clone)]
pub struct LocalOptimizePayload {
    /// First half of the local pair
    pub channel_one: Option<ChannelSnapshot>,
    /// Second half of the local pair
    pub channel_two: Option<ChannelSnapshot>,
}

/// A generic CEL event published through [`publish_event`].
///
/// [`publish_event`]: crate::engine::CelEngine::publish_event
#[derive(Debug, Clone)]
pub struct GenericCelPayload {
    /// The channel the event concerns
    pub snapshot: ChannelSnapshot,
    /// The claimed event kind; only USER_DEFINED is honored
    pub event_type: EventType,
    /// Producer-supplied details: `event` names the user event,
    /// `extra` carries its extras object
    pub event_details: Value,
}

/// The tagged union routed by the engine's dispatcher.
#[derive(Debug, Clone)]
pub enum CelMessage {
    /// A channel snapshot changed; either side is absent at the
    /// channel's birth or death
    SnapshotUpdate {
        /// Previous snapshot, absent for a new channel
        old: Option<ChannelSnapshot>,
        /// Current snapshot, absent once the channel is destroyed
        new: Option<ChannelSnapshot>,
    },
    /// A dial attempt concluded or was forwarded
    Dial(DialPayload),
    /// A channel entered a bridge
    BridgeEnter(BridgePayload),
    /// A channel left a bridge
    BridgeExit(BridgePayload),
    /// A parking lot update
    ParkedCall(ParkingPayload),
    /// A blind transfer concluded
    BlindTransfer(BlindTransferPayload),
    /// An attended transfer concluded
    AttendedTransfer(AttendedTransferPayload),
    /// A call was picked up
    Pickup(PickupPayload),
    /// A local channel pair was optimized away
    LocalOptimize(LocalOptimizePayload),
    /// A producer-published generic CEL event
    Generic(GenericCelPayload),
}

impl CelMessage {
    /// Short name of the message kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            CelMessage::SnapshotUpdate { .. } => "snapshot_update",
            CelMessage::Dial(_) => "dial",
            CelMessage::BridgeEnter(_) => "bridge_enter",
            CelMessage::BridgeExit(_) => "bridge_exit",
            CelMessage::ParkedCall(_) => "parked_call",
            CelMessage::BlindTransfer(_) => "blind_transfer",
            CelMessage::AttendedTransfer(_) => "attended_transfer",
            CelMessage::Pickup(_) => "pickup",
            CelMessage::LocalOptimize(_) => "local_optimize",
            CelMessage::Generic(_) => "generic",
        }
    }
}
