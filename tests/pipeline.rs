//! End-to-end pipeline tests: messages published on the engine's topics
//! flow through forwarding, routing, and translation to a recording
//! backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use cel_engine::{
    AttendedTransferDest, AttendedTransferPayload, BlindTransferPayload, BridgePayload,
    BridgeSnapshot, CelConfig, CelEngine, CelMessage, ChannelSnapshot, ChannelState, DialPayload,
    EventRecord, EventSet, EventType, ParkedCallEvent, ParkingPayload, TransferResult,
    TransferSide,
};

/// Backend that records every delivered record.
#[derive(Clone, Default)]
struct Recorder {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl Recorder {
    fn new() -> Recorder {
        Recorder::default()
    }

    fn attach(&self, engine: &CelEngine, name: &str) {
        let records = Arc::clone(&self.records);
        engine
            .backend_register(name, move |record| {
                records.lock().unwrap().push(record.clone());
            })
            .unwrap();
    }

    fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn records(&self) -> Vec<EventRecord> {
        self.records.lock().unwrap().clone()
    }

    /// The recorded events as (kind, channel unique id) pairs.
    fn events(&self) -> Vec<(EventType, String)> {
        self.records()
            .iter()
            .map(|record| (record.event_type, record.unique_id.clone()))
            .collect()
    }
}

/// Wait until the recorder has seen `count` events.
async fn wait_for_events(recorder: &Recorder, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while recorder.len() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {} events, have {}",
            count,
            recorder.len()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Give in-flight messages a moment to drain, for asserting absence.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn all_events_config() -> CelConfig {
    CelConfig {
        enabled: true,
        events: EventSet::ALL,
        ..Default::default()
    }
}

fn channel(unique_id: &str, linked_id: &str) -> ChannelSnapshot {
    ChannelSnapshot {
        unique_id: unique_id.to_string(),
        linked_id: linked_id.to_string(),
        name: format!("PJSIP/{}-00000001", unique_id),
        state: ChannelState::Ring,
        ..Default::default()
    }
}

fn extra_of(record: &EventRecord) -> Value {
    serde_json::from_str(&record.extra).expect("extras should be valid JSON")
}

#[tokio::test]
async fn test_dial_with_answer_full_lifecycle() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let ringing = ChannelSnapshot {
        state: ChannelState::Ringing,
        ..channel("c1", "L1")
    };
    let up = ChannelSnapshot {
        state: ChannelState::Up,
        ..ringing.clone()
    };
    let dead = ChannelSnapshot {
        dead: true,
        hangup_cause: 16,
        ..up.clone()
    };

    let topic = engine.channel_topic();
    topic.publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(ringing.clone()),
    });
    topic.publish(CelMessage::Dial(DialPayload {
        caller: Some(ringing.clone()),
        forwarded_to: String::new(),
        dial_status: "ANSWER".to_string(),
    }));
    topic.publish(CelMessage::SnapshotUpdate {
        old: Some(ringing),
        new: Some(up.clone()),
    });
    topic.publish(CelMessage::SnapshotUpdate {
        old: Some(up),
        new: Some(dead.clone()),
    });
    topic.publish(CelMessage::SnapshotUpdate {
        old: Some(dead),
        new: None,
    });

    wait_for_events(&recorder, 5).await;
    assert_eq!(
        recorder.events(),
        vec![
            (EventType::ChannelStart, "c1".to_string()),
            (EventType::Answer, "c1".to_string()),
            (EventType::Hangup, "c1".to_string()),
            (EventType::ChannelEnd, "c1".to_string()),
            (EventType::LinkedidEnd, "c1".to_string()),
        ]
    );

    let records = recorder.records();
    assert_eq!(
        extra_of(&records[2]),
        json!({
            "hangupcause": 16,
            "hangupsource": "",
            "dialstatus": "ANSWER",
        })
    );
    assert_eq!(records[4].linked_id, "L1");

    settle().await;
    assert_eq!(recorder.len(), 5);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_call_forward_does_not_stage_dial_status() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let snapshot = channel("c1", "L1");
    let dead = ChannelSnapshot {
        dead: true,
        ..snapshot.clone()
    };

    let topic = engine.channel_topic();
    topic.publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(snapshot.clone()),
    });
    topic.publish(CelMessage::Dial(DialPayload {
        caller: Some(snapshot.clone()),
        forwarded_to: "200".to_string(),
        dial_status: String::new(),
    }));
    topic.publish(CelMessage::SnapshotUpdate {
        old: Some(snapshot),
        new: Some(dead),
    });

    wait_for_events(&recorder, 3).await;
    let records = recorder.records();

    assert_eq!(records[1].event_type, EventType::Forward);
    assert_eq!(extra_of(&records[1]), json!({ "forward": "200" }));

    // No dial status was staged, so HANGUP carries an empty one
    assert_eq!(records[2].event_type, EventType::Hangup);
    assert_eq!(extra_of(&records[2])["dialstatus"], json!(""));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_blind_transfer_success() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    engine
        .bridge_topic()
        .publish(CelMessage::BlindTransfer(BlindTransferPayload {
            result: TransferResult::Success,
            transferer: channel("c1", "L1"),
            bridge: Some(BridgeSnapshot {
                unique_id: "b1".to_string(),
            }),
            exten: Some("500".to_string()),
            context: Some("default".to_string()),
        }));

    wait_for_events(&recorder, 1).await;
    let records = recorder.records();
    assert_eq!(records[0].event_type, EventType::BlindTransfer);
    assert_eq!(records[0].unique_id, "c1");
    assert_eq!(
        extra_of(&records[0]),
        json!({
            "extension": "500",
            "context": "default",
            "bridge_id": "b1",
        })
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_blind_transfer_dropped_without_result_fields_or_bridge() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let payload = BlindTransferPayload {
        result: TransferResult::Success,
        transferer: channel("c1", "L1"),
        bridge: Some(BridgeSnapshot {
            unique_id: "b1".to_string(),
        }),
        exten: Some("500".to_string()),
        context: Some("default".to_string()),
    };

    engine
        .bridge_topic()
        .publish(CelMessage::BlindTransfer(BlindTransferPayload {
            result: TransferResult::Fail,
            ..payload.clone()
        }));
    engine
        .bridge_topic()
        .publish(CelMessage::BlindTransfer(BlindTransferPayload {
            exten: None,
            ..payload.clone()
        }));
    engine
        .bridge_topic()
        .publish(CelMessage::BlindTransfer(BlindTransferPayload {
            bridge: None,
            ..payload
        }));

    settle().await;
    assert_eq!(recorder.len(), 0);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_attended_transfer_merge_with_missing_bridge() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let target_channel = channel("c_t", "L1");
    let transferee_channel = channel("c_tr", "L1");

    engine
        .bridge_topic()
        .publish(CelMessage::AttendedTransfer(AttendedTransferPayload {
            to_transferee: TransferSide {
                bridge: None,
                channel: transferee_channel.clone(),
            },
            to_transfer_target: TransferSide {
                bridge: Some(BridgeSnapshot {
                    unique_id: "b_t".to_string(),
                }),
                channel: target_channel.clone(),
            },
            dest: AttendedTransferDest::BridgeMerge,
        }));

    wait_for_events(&recorder, 1).await;
    let records = recorder.records();
    assert_eq!(records[0].event_type, EventType::AttendedTransfer);
    assert_eq!(records[0].unique_id, "c_t");
    assert_eq!(
        extra_of(&records[0]),
        json!({
            "bridge1_id": "b_t",
            "channel2_name": transferee_channel.name,
            "bridge2_id": null,
        })
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_attended_transfer_to_app() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    engine
        .bridge_topic()
        .publish(CelMessage::AttendedTransfer(AttendedTransferPayload {
            to_transferee: TransferSide {
                bridge: Some(BridgeSnapshot {
                    unique_id: "b1".to_string(),
                }),
                channel: channel("c1", "L1"),
            },
            to_transfer_target: TransferSide {
                bridge: Some(BridgeSnapshot {
                    unique_id: "b2".to_string(),
                }),
                channel: channel("c2", "L1"),
            },
            dest: AttendedTransferDest::App("VoiceMail".to_string()),
        }));

    // A failed transfer reports nothing
    engine
        .bridge_topic()
        .publish(CelMessage::AttendedTransfer(AttendedTransferPayload {
            to_transferee: TransferSide {
                bridge: Some(BridgeSnapshot {
                    unique_id: "b1".to_string(),
                }),
                channel: channel("c1", "L1"),
            },
            to_transfer_target: TransferSide {
                bridge: None,
                channel: channel("c2", "L1"),
            },
            dest: AttendedTransferDest::Fail,
        }));

    wait_for_events(&recorder, 1).await;
    settle().await;

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].unique_id, "c1");
    assert_eq!(
        extra_of(&records[0]),
        json!({
            "bridge1_id": "b1",
            "channel2_name": "PJSIP/c2-00000001",
            "app": "VoiceMail",
        })
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_park_then_timeout() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let parkee = channel("c1", "L1");
    let topic = engine.parking_topic();
    topic.publish(CelMessage::ParkedCall(ParkingPayload {
        parkee: parkee.clone(),
        event: ParkedCallEvent::Parked,
        parker_dial_string: "PJSIP/bob".to_string(),
        parking_lot: "default".to_string(),
    }));
    topic.publish(CelMessage::ParkedCall(ParkingPayload {
        parkee,
        event: ParkedCallEvent::Timeout,
        parker_dial_string: "PJSIP/bob".to_string(),
        parking_lot: "default".to_string(),
    }));

    wait_for_events(&recorder, 2).await;
    let records = recorder.records();

    assert_eq!(records[0].event_type, EventType::ParkStart);
    assert_eq!(
        extra_of(&records[0]),
        json!({
            "parker_dial_string": "PJSIP/bob",
            "parking_lot": "default",
        })
    );

    assert_eq!(records[1].event_type, EventType::ParkEnd);
    assert_eq!(extra_of(&records[1]), json!({ "reason": "ParkedCallTimeOut" }));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shared_linked_id_retires_once() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let c1 = channel("c1", "L");
    let c2 = channel("c2", "L");

    let topic = engine.channel_topic();
    topic.publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(c1.clone()),
    });
    topic.publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(c2.clone()),
    });
    topic.publish(CelMessage::SnapshotUpdate {
        old: Some(c1),
        new: None,
    });
    topic.publish(CelMessage::SnapshotUpdate {
        old: Some(c2),
        new: None,
    });

    wait_for_events(&recorder, 5).await;
    settle().await;

    assert_eq!(
        recorder.events(),
        vec![
            (EventType::ChannelStart, "c1".to_string()),
            (EventType::ChannelStart, "c2".to_string()),
            (EventType::ChannelEnd, "c1".to_string()),
            (EventType::ChannelEnd, "c2".to_string()),
            (EventType::LinkedidEnd, "c2".to_string()),
        ]
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_event_kind_filtering() {
    let config = CelConfig {
        enabled: true,
        events: [EventType::ChannelStart].into_iter().collect(),
        ..Default::default()
    };
    let engine = CelEngine::init(config).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let snapshot = channel("c1", "L1");
    let topic = engine.channel_topic();
    topic.publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(snapshot.clone()),
    });
    topic.publish(CelMessage::SnapshotUpdate {
        old: Some(snapshot),
        new: None,
    });

    wait_for_events(&recorder, 1).await;
    settle().await;

    // CHANNEL_END is untracked; LINKEDID_END tracking is inactive
    assert_eq!(
        recorder.events(),
        vec![(EventType::ChannelStart, "c1".to_string())]
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_linked_id_tracked_without_channel_start() {
    let config = CelConfig {
        enabled: true,
        events: [EventType::LinkedidEnd].into_iter().collect(),
        ..Default::default()
    };
    let engine = CelEngine::init(config).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let snapshot = channel("c1", "L1");
    let topic = engine.channel_topic();
    topic.publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(snapshot.clone()),
    });
    topic.publish(CelMessage::SnapshotUpdate {
        old: Some(snapshot),
        new: None,
    });

    // CHANNEL_START itself is untracked, but the linked-id reference is
    // still taken, so LINKEDID_END fires on the channel's end
    wait_for_events(&recorder, 1).await;
    settle().await;
    assert_eq!(
        recorder.events(),
        vec![(EventType::LinkedidEnd, "c1".to_string())]
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_app_tracking_and_filtering() {
    let config = CelConfig {
        enabled: true,
        events: EventSet::ALL,
        apps: cel_engine::parse_apps("Dial"),
        ..Default::default()
    };
    let engine = CelEngine::init(config).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let idle = channel("c1", "L1");
    let in_dial = ChannelSnapshot {
        app_name: "Dial".to_string(),
        app_data: "PJSIP/bob".to_string(),
        ..idle.clone()
    };
    let in_queue = ChannelSnapshot {
        app_name: "Queue".to_string(),
        app_data: "support".to_string(),
        ..idle.clone()
    };

    let topic = engine.channel_topic();
    topic.publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(idle.clone()),
    });
    topic.publish(CelMessage::SnapshotUpdate {
        old: Some(idle),
        new: Some(in_dial.clone()),
    });
    topic.publish(CelMessage::SnapshotUpdate {
        old: Some(in_dial),
        new: Some(in_queue),
    });

    wait_for_events(&recorder, 3).await;
    settle().await;

    // Queue is not tracked, so its APP_START is filtered; Dial's pair is
    let events: Vec<EventType> = recorder
        .records()
        .iter()
        .map(|record| record.event_type)
        .collect();
    assert_eq!(
        events,
        vec![EventType::ChannelStart, EventType::AppStart, EventType::AppEnd]
    );
    assert_eq!(recorder.records()[1].application_name, "Dial");
    assert_eq!(recorder.records()[2].application_name, "Dial");

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_app_end_precedes_hangup() {
    let engine = CelEngine::init(CelConfig {
        apps: cel_engine::parse_apps("Dial"),
        ..all_events_config()
    })
    .unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let in_dial = ChannelSnapshot {
        app_name: "Dial".to_string(),
        ..channel("c1", "L1")
    };
    let dead = ChannelSnapshot {
        dead: true,
        app_name: String::new(),
        ..in_dial.clone()
    };

    engine.channel_topic().publish(CelMessage::SnapshotUpdate {
        old: Some(in_dial),
        new: Some(dead),
    });

    wait_for_events(&recorder, 2).await;
    let events: Vec<EventType> = recorder
        .records()
        .iter()
        .map(|record| record.event_type)
        .collect();
    assert_eq!(events, vec![EventType::AppEnd, EventType::Hangup]);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_internal_channels_are_ignored() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let internal = ChannelSnapshot {
        tech_properties: cel_engine::TechProperties::INTERNAL,
        ..channel("c1", "L1")
    };

    engine.channel_topic().publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(internal.clone()),
    });
    engine.bridge_topic().publish(CelMessage::BridgeEnter(BridgePayload {
        bridge: BridgeSnapshot {
            unique_id: "b1".to_string(),
        },
        channel: internal,
    }));

    settle().await;
    assert_eq!(recorder.len(), 0);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_backend_isolation_through_pipeline() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");
    engine
        .backend_register("broken", |_record| panic!("backend failure"))
        .unwrap();

    let topic = engine.channel_topic();
    topic.publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(channel("c1", "L1")),
    });
    topic.publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(channel("c2", "L2")),
    });

    // The panicking sibling suppresses neither record
    wait_for_events(&recorder, 2).await;
    assert_eq!(
        recorder.events(),
        vec![
            (EventType::ChannelStart, "c1".to_string()),
            (EventType::ChannelStart, "c2".to_string()),
        ]
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_user_defined_publish() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let snapshot = channel("c1", "L1");
    engine.publish_event(
        &snapshot,
        EventType::UserDefined,
        json!({
            "event": "MyEvent",
            "extra": { "key": "value" },
        }),
    );
    // Non-user-defined kinds via the generic carrier are dropped
    engine.publish_event(&snapshot, EventType::Answer, json!({}));

    wait_for_events(&recorder, 1).await;
    settle().await;

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event_type, EventType::UserDefined);
    assert_eq!(records[0].user_defined_name, "MyEvent");
    assert_eq!(extra_of(&records[0]), json!({ "key": "value" }));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_disabled_engine_reports_nothing() {
    let config = CelConfig {
        enabled: false,
        events: EventSet::ALL,
        ..Default::default()
    };
    let engine = CelEngine::init(config).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    engine.channel_topic().publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(channel("c1", "L1")),
    });

    settle().await;
    assert_eq!(recorder.len(), 0);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_events_after_shutdown_are_dropped() {
    let engine = CelEngine::init(all_events_config()).unwrap();
    let recorder = Recorder::new();
    recorder.attach(&engine, "recorder");

    let topic = engine.channel_topic().clone();
    topic.publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(channel("c1", "L1")),
    });
    wait_for_events(&recorder, 1).await;

    engine.shutdown().await.unwrap();

    topic.publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(channel("c2", "L2")),
    });
    settle().await;
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn test_independent_engines_are_isolated() {
    let first = CelEngine::init(all_events_config()).unwrap();
    let second = CelEngine::init(all_events_config()).unwrap();
    let first_recorder = Recorder::new();
    let second_recorder = Recorder::new();
    first_recorder.attach(&first, "recorder");
    second_recorder.attach(&second, "recorder");

    first.channel_topic().publish(CelMessage::SnapshotUpdate {
        old: None,
        new: Some(channel("c1", "L1")),
    });

    wait_for_events(&first_recorder, 1).await;
    settle().await;
    assert_eq!(second_recorder.len(), 0);

    first.shutdown().await.unwrap();
    second.shutdown().await.unwrap();
}
