//! Translators: turn upstream messages into CEL event reports.
//!
//! Snapshot-diff translators infer semantic events from old/new channel
//! snapshot pairs; the remaining translators map one upstream message
//! kind each. Malformed messages are dropped without reporting.

use serde_json::json;

use crate::engine::EngineCore;
use crate::messages::{
    AttendedTransferDest, AttendedTransferPayload, BlindTransferPayload, BridgePayload,
    DialPayload, GenericCelPayload, LocalOptimizePayload, ParkedCallEvent, ParkingPayload,
    PickupPayload, TransferResult,
};
use crate::model::{ChannelSnapshot, ChannelState, EventType};

type SnapshotMonitor = fn(&EngineCore, Option<&ChannelSnapshot>, Option<&ChannelSnapshot>);

/// Monitors applied to every channel snapshot delta.
///
/// Order matters: application changes must come before state changes so
/// that APP_END precedes any HANGUP or CHANNEL_END, and linked-id
/// checking always runs last.
const SNAPSHOT_MONITORS: [SnapshotMonitor; 3] = [app_change, state_change, linkedid_change];

/// Run the snapshot monitors over one delta.
///
/// Updates involving an internal channel are dropped whole.
pub(crate) fn channel_snapshot_update(
    core: &EngineCore,
    old: Option<&ChannelSnapshot>,
    new: Option<&ChannelSnapshot>,
) {
    if old.is_some_and(ChannelSnapshot::is_internal)
        || new.is_some_and(ChannelSnapshot::is_internal)
    {
        return;
    }

    for monitor in SNAPSHOT_MONITORS {
        monitor(core, old, new);
    }
}

fn app_change(core: &EngineCore, old: Option<&ChannelSnapshot>, new: Option<&ChannelSnapshot>) {
    if let (Some(old), Some(new)) = (old, new) {
        if old.app_name == new.app_name {
            return;
        }
    }

    // End the outgoing application before starting the incoming one
    if let Some(old) = old {
        if !old.app_name.is_empty() {
            core.report_event(old, EventType::AppEnd, None, None);
        }
    }
    if let Some(new) = new {
        if !new.app_name.is_empty() {
            core.report_event(new, EventType::AppStart, None, None);
        }
    }
}

fn state_change(core: &EngineCore, old: Option<&ChannelSnapshot>, new: Option<&ChannelSnapshot>) {
    let (old, new) = match (old, new) {
        (Some(old), None) => {
            core.report_event(old, EventType::ChannelEnd, None, None);
            core.retire_linked_id(old);
            return;
        }
        (None, Some(new)) => {
            core.report_event(new, EventType::ChannelStart, None, None);
            return;
        }
        (Some(old), Some(new)) => (old, new),
        (None, None) => return,
    };

    if !old.dead && new.dead {
        let dial_status = core
            .dial_status
            .drain(&new.unique_id)
            .map(|payload| payload.dial_status)
            .unwrap_or_default();
        let extra = json!({
            "hangupcause": new.hangup_cause,
            "hangupsource": new.hangup_source,
            "dialstatus": dial_status,
        });
        core.report_event(new, EventType::Hangup, None, Some(&extra));
        return;
    }

    if old.state != new.state && new.state == ChannelState::Up {
        core.report_event(new, EventType::Answer, None, None);
    }
}

fn linkedid_change(
    core: &EngineCore,
    old: Option<&ChannelSnapshot>,
    new: Option<&ChannelSnapshot>,
) {
    let (Some(old), Some(new)) = (old, new) else {
        return;
    };

    if old.linked_id != new.linked_id {
        core.linked_id_ref(&new.linked_id);
        core.retire_linked_id(old);
    }
}

pub(crate) fn bridge_enter(core: &EngineCore, payload: &BridgePayload) {
    if payload.channel.is_internal() {
        return;
    }
    let extra = json!({ "bridge_id": payload.bridge.unique_id });
    core.report_event(&payload.channel, EventType::BridgeEnter, None, Some(&extra));
}

pub(crate) fn bridge_exit(core: &EngineCore, payload: &BridgePayload) {
    if payload.channel.is_internal() {
        return;
    }
    let extra = json!({ "bridge_id": payload.bridge.unique_id });
    core.report_event(&payload.channel, EventType::BridgeExit, None, Some(&extra));
}

pub(crate) fn parked_call(core: &EngineCore, payload: &ParkingPayload) {
    let reason = match payload.event {
        ParkedCallEvent::Parked => {
            let extra = json!({
                "parker_dial_string": payload.parker_dial_string,
                "parking_lot": payload.parking_lot,
            });
            core.report_event(&payload.parkee, EventType::ParkStart, None, Some(&extra));
            return;
        }
        ParkedCallEvent::Timeout => "ParkedCallTimeOut",
        ParkedCallEvent::GiveUp => "ParkedCallGiveUp",
        ParkedCallEvent::Unparked => "ParkedCallUnparked",
        ParkedCallEvent::Failed => "ParkedCallFailed",
        ParkedCallEvent::Swap => "ParkedCallSwap",
    };

    let extra = json!({ "reason": reason });
    core.report_event(&payload.parkee, EventType::ParkEnd, None, Some(&extra));
}

pub(crate) fn dial(core: &EngineCore, payload: &DialPayload) {
    let Some(caller) = payload.caller.as_ref() else {
        return;
    };
    if caller.is_internal() {
        return;
    }

    if !payload.forwarded_to.is_empty() {
        let extra = json!({ "forward": payload.forwarded_to });
        core.report_event(caller, EventType::Forward, None, Some(&extra));
    }

    if payload.dial_status.is_empty() {
        return;
    }

    // Held until the caller's HANGUP drains it
    core.dial_status.stage(payload.clone());
}

pub(crate) fn blind_transfer(core: &EngineCore, payload: &BlindTransferPayload) {
    if payload.result != TransferResult::Success {
        return;
    }
    let (Some(exten), Some(context)) = (payload.exten.as_ref(), payload.context.as_ref()) else {
        return;
    };
    // The payload does not always carry a bridge; without one there is
    // nothing coherent to report
    let Some(bridge) = payload.bridge.as_ref() else {
        tracing::debug!("Dropping blind transfer with no bridge snapshot");
        return;
    };

    let extra = json!({
        "extension": exten,
        "context": context,
        "bridge_id": bridge.unique_id,
    });
    core.report_event(
        &payload.transferer,
        EventType::BlindTransfer,
        None,
        Some(&extra),
    );
}

pub(crate) fn attended_transfer(core: &EngineCore, payload: &AttendedTransferPayload) {
    // Order the sides so bridge1 is always present
    let (bridge1, channel1, bridge2, channel2) = if payload.to_transferee.bridge.is_none() {
        (
            payload.to_transfer_target.bridge.as_ref(),
            &payload.to_transfer_target.channel,
            payload.to_transferee.bridge.as_ref(),
            &payload.to_transferee.channel,
        )
    } else {
        (
            payload.to_transferee.bridge.as_ref(),
            &payload.to_transferee.channel,
            payload.to_transfer_target.bridge.as_ref(),
            &payload.to_transfer_target.channel,
        )
    };
    let Some(bridge1) = bridge1 else {
        return;
    };

    let extra = match &payload.dest {
        AttendedTransferDest::Fail => return,
        AttendedTransferDest::BridgeMerge
        | AttendedTransferDest::Link
        | AttendedTransferDest::Threeway => json!({
            "bridge1_id": bridge1.unique_id,
            "channel2_name": channel2.name,
            "bridge2_id": bridge2.map(|bridge| bridge.unique_id.as_str()),
        }),
        AttendedTransferDest::App(app) => json!({
            "bridge1_id": bridge1.unique_id,
            "channel2_name": channel2.name,
            "app": app,
        }),
    };

    core.report_event(channel1, EventType::AttendedTransfer, None, Some(&extra));
}

pub(crate) fn pickup(core: &EngineCore, payload: &PickupPayload) {
    let (Some(channel), Some(target)) = (payload.channel.as_ref(), payload.target.as_ref()) else {
        return;
    };

    let extra = json!({ "pickup_channel": channel.name });
    core.report_event(target, EventType::Pickup, None, Some(&extra));
}

pub(crate) fn local_optimize(core: &EngineCore, payload: &LocalOptimizePayload) {
    let (Some(one), Some(two)) = (payload.channel_one.as_ref(), payload.channel_two.as_ref())
    else {
        return;
    };

    let extra = json!({ "local_two": two.name });
    core.report_event(one, EventType::LocalOptimize, None, Some(&extra));
}

pub(crate) fn generic(core: &EngineCore, payload: &GenericCelPayload) {
    match payload.event_type {
        EventType::UserDefined => {
            let event = payload
                .event_details
                .get("event")
                .and_then(|value| value.as_str())
                .unwrap_or("");
            let extra = payload.event_details.get("extra");
            core.report_event(&payload.snapshot, EventType::UserDefined, Some(event), extra);
        }
        other => {
            tracing::error!("Unhandled {} event blob", other.name());
        }
    }
}
