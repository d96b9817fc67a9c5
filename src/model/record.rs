//! The normalized event record delivered to backends, and its inverse:
//! fabricating a channel-like object back out of a record.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{ChannelSnapshot, EventType};

/// A normalized channel event, built once per emission and read-only
/// thereafter.
///
/// The record is self-contained: every field is owned, so it retains no
/// references to the snapshot it was built from. Backends receive a shared
/// reference for the duration of one delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// The kind of event
    pub event_type: EventType,
    /// Name supplied by the producer for USER_DEFINED events, else empty
    pub user_defined_name: String,
    /// Seconds since the Unix epoch at construction time
    pub event_time_sec: u64,
    /// Microsecond part of the event time
    pub event_time_usec: u32,
    /// Caller id name
    pub caller_id_name: String,
    /// Caller id number
    pub caller_id_num: String,
    /// Automatic Number Identification
    pub caller_id_ani: String,
    /// Redirecting number
    pub caller_id_rdnis: String,
    /// Dialed number
    pub caller_id_dnid: String,
    /// Dialplan extension
    pub extension: String,
    /// Dialplan context
    pub context: String,
    /// Channel name
    pub channel_name: String,
    /// Application name
    pub application_name: String,
    /// Application arguments
    pub application_data: String,
    /// Billing account code
    pub account_code: String,
    /// Peer account code
    pub peer_account: String,
    /// Channel unique id
    pub unique_id: String,
    /// Linked call id
    pub linked_id: String,
    /// Automatic Message Accounting flags
    pub ama_flags: u32,
    /// Free-form user field
    pub user_field: String,
    /// Bridged peer name
    pub peer: String,
    /// Event-kind specific extras, serialized to a compact JSON string;
    /// empty when the event carries none
    pub extra: String,
}

impl EventRecord {
    /// Build a record from a channel snapshot.
    ///
    /// The event time is captured here. `extra`, when present, is
    /// serialized to its compact string form.
    pub fn from_snapshot(
        snapshot: &ChannelSnapshot,
        event_type: EventType,
        user_defined_name: Option<&str>,
        extra: Option<&serde_json::Value>,
    ) -> EventRecord {
        let (event_time_sec, event_time_usec) = now_parts();

        EventRecord {
            event_type,
            user_defined_name: user_defined_name.unwrap_or("").to_string(),
            event_time_sec,
            event_time_usec,
            caller_id_name: snapshot.caller_name.clone(),
            caller_id_num: snapshot.caller_number.clone(),
            caller_id_ani: snapshot.caller_ani.clone(),
            caller_id_rdnis: snapshot.caller_rdnis.clone(),
            caller_id_dnid: snapshot.caller_dnid.clone(),
            extension: snapshot.exten.clone(),
            context: snapshot.context.clone(),
            channel_name: snapshot.name.clone(),
            application_name: snapshot.app_name.clone(),
            application_data: snapshot.app_data.clone(),
            account_code: snapshot.account_code.clone(),
            peer_account: snapshot.peer_account.clone(),
            unique_id: snapshot.unique_id.clone(),
            linked_id: snapshot.linked_id.clone(),
            ama_flags: snapshot.ama_flags,
            user_field: snapshot.user_field.clone(),
            peer: String::new(),
            extra: extra.map(|value| value.to_string()).unwrap_or_default(),
        }
    }

    /// The canonical name of this record's event kind.
    pub fn event_name(&self) -> &'static str {
        self.event_type.name()
    }

    /// The event time as a [`SystemTime`].
    pub fn event_time(&self) -> SystemTime {
        UNIX_EPOCH
            + Duration::new(
                self.event_time_sec,
                self.event_time_usec.saturating_mul(1_000),
            )
    }
}

fn now_parts() -> (u64, u32) {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (since_epoch.as_secs(), since_epoch.subsec_micros())
}

/// A lightweight channel-like object synthesized from an event record.
///
/// Used by consumers that evaluate channel-shaped expressions against
/// historical events. The derived variables mirror what a live channel
/// would expose, plus the event metadata under `event_*` names.
#[derive(Debug, Clone)]
pub struct FabricatedChannel {
    /// The user-defined name for USER_DEFINED events, else the event name
    pub event_type_name: String,
    /// The event time rendered per the configured date format, or
    /// `"<sec>.<usec>"` when no format is configured
    pub event_time: String,
    /// Always the canonical event name, even for USER_DEFINED events
    pub event_enum_name: String,
    /// Name supplied by the producer for USER_DEFINED events
    pub user_defined_name: String,
    /// The record's extras string
    pub extra: String,
    /// Caller id name
    pub caller_name: String,
    /// Caller id number
    pub caller_number: String,
    /// Automatic Number Identification
    pub caller_ani: String,
    /// Redirecting number
    pub caller_rdnis: String,
    /// Dialed number
    pub caller_dnid: String,
    /// Dialplan extension
    pub exten: String,
    /// Dialplan context
    pub context: String,
    /// Channel name
    pub name: String,
    /// Channel unique id
    pub unique_id: String,
    /// Linked call id
    pub linked_id: String,
    /// Billing account code
    pub account_code: String,
    /// Peer account code
    pub peer_account: String,
    /// Free-form user field
    pub user_field: String,
    /// Automatic Message Accounting flags
    pub ama_flags: u32,
    /// Name of the bridged peer at event time
    pub bridge_peer: String,
    // Application name and data share one allocation whose lifetime equals
    // the fabricated object's; the accessors split it.
    app_buf: String,
    app_split: usize,
}

impl FabricatedChannel {
    /// Synthesize a channel-like object from `record`.
    ///
    /// `date_format` is a strftime-style format string; when empty the
    /// event time is rendered as `"<sec>.<usec>"`.
    pub fn from_record(record: &EventRecord, date_format: &str) -> FabricatedChannel {
        let event_type_name = if record.event_type == EventType::UserDefined {
            record.user_defined_name.clone()
        } else {
            record.event_name().to_string()
        };

        let mut app_buf =
            String::with_capacity(record.application_name.len() + record.application_data.len());
        app_buf.push_str(&record.application_name);
        let app_split = app_buf.len();
        app_buf.push_str(&record.application_data);

        FabricatedChannel {
            event_type_name,
            event_time: format_event_time(record, date_format),
            event_enum_name: record.event_name().to_string(),
            user_defined_name: record.user_defined_name.clone(),
            extra: record.extra.clone(),
            caller_name: record.caller_id_name.clone(),
            caller_number: record.caller_id_num.clone(),
            caller_ani: record.caller_id_ani.clone(),
            caller_rdnis: record.caller_id_rdnis.clone(),
            caller_dnid: record.caller_id_dnid.clone(),
            exten: record.extension.clone(),
            context: record.context.clone(),
            name: record.channel_name.clone(),
            unique_id: record.unique_id.clone(),
            linked_id: record.linked_id.clone(),
            account_code: record.account_code.clone(),
            // TODO: this mirrors the account code instead of the record's
            // own peer_account field; downstream billing consumers depend
            // on the current behavior, so changing it needs a coordinated
            // migration.
            peer_account: record.account_code.clone(),
            user_field: record.user_field.clone(),
            ama_flags: record.ama_flags,
            bridge_peer: record.peer.clone(),
            app_buf,
            app_split,
        }
    }

    /// The application name at event time.
    pub fn app_name(&self) -> &str {
        &self.app_buf[..self.app_split]
    }

    /// The application arguments at event time.
    pub fn app_data(&self) -> &str {
        &self.app_buf[self.app_split..]
    }
}

/// Render a record's event time per `date_format`, falling back to the
/// numeric `"<sec>.<usec>"` form when the format is empty or invalid.
fn format_event_time(record: &EventRecord, date_format: &str) -> String {
    use std::fmt::Write;

    if !date_format.is_empty() {
        let local: chrono::DateTime<chrono::Local> = record.event_time().into();
        let mut formatted = String::new();
        if write!(formatted, "{}", local.format(date_format)).is_ok() {
            return formatted;
        }
        tracing::warn!(
            date_format,
            "Invalid date format, falling back to numeric event time"
        );
    }

    format!("{}.{:06}", record.event_time_sec, record.event_time_usec)
}
