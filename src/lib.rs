//! Channel Event Logging (CEL) engine
//!
//! This crate observes telephony-channel lifecycle events published by
//! other subsystems, filters them against operator policy, normalizes
//! them into a uniform record format, and fans them out to pluggable
//! logging backends.
//!
//! # Features
//!
//! - **Snapshot diffing**: CHANNEL_START/END, ANSWER, HANGUP, and
//!   APP_START/END are inferred from old/new channel snapshot pairs
//! - **Linked-call tracking**: LINKEDID_END fires once, when the last
//!   channel of a logical call ends
//! - **Policy filtering**: a 64-bit event bitset and a case-insensitive
//!   tracked-application set, atomically swappable on reload
//! - **Backend fan-out**: named callback sinks with failure isolation
//!
//! # Example
//!
//! ```rust,ignore
//! use cel_engine::{CelConfig, CelEngine, CelMessage};
//!
//! let engine = CelEngine::init_from_text(
//!     "[general]\nenable = yes\nevents = ALL\n",
//! )?;
//!
//! engine.backend_register("stdout", |record| {
//!     println!("{} on {}", record.event_name(), record.channel_name);
//! })?;
//!
//! // Upstream subsystems publish onto the engine's topics
//! engine.channel_topic().publish(CelMessage::SnapshotUpdate {
//!     old: None,
//!     new: Some(snapshot),
//! });
//!
//! engine.shutdown().await?;
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod dialstatus;
pub mod engine;
pub mod error;
pub mod linkedid;
pub mod logging;
pub mod messages;
pub mod model;
pub mod topic;

mod router;
mod translators;

// Re-export main types
pub use backend::{BackendCallback, BackendRegistry};
pub use config::{parse_apps, parse_events, CelConfig, ConfigStore};
pub use dialstatus::DialStatusStore;
pub use engine::{CelEngine, EngineStatus};
pub use error::{ConfigError, EngineError, RegistryError, Result};
pub use linkedid::{LinkedIdTracker, Unref};
pub use messages::{
    AttendedTransferDest, AttendedTransferPayload, BlindTransferPayload, BridgePayload,
    CelMessage, DialPayload, GenericCelPayload, LocalOptimizePayload, ParkedCallEvent,
    ParkingPayload, PickupPayload, TransferResult, TransferSide,
};
pub use model::{
    type_name, BridgeSnapshot, ChannelSnapshot, ChannelState, EventRecord, EventSet, EventType,
    FabricatedChannel, TechProperties, ALL_EVENTS_NAME,
};
pub use topic::{forward_all, Forwarder, Subscription, Topic};
