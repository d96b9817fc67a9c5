//! The CEL engine: lifecycle, the central report-event gate, and the
//! public programmatic surface.
//!
//! An engine owns the upstream topics it observes (channel, bridge,
//! parking) plus its own topic for producer-published events. One
//! forwarder per upstream feeds a single aggregation topic, and a single
//! router task dispatches aggregated messages to translators. Because
//! there is exactly one router, events deriving from one topic are
//! reported in publication order.

use std::sync::Arc;

use serde_json::Value;

use crate::backend::BackendRegistry;
use crate::config::{CelConfig, ConfigStore};
use crate::dialstatus::DialStatusStore;
use crate::error::Result;
use crate::linkedid::{LinkedIdTracker, Unref};
use crate::messages::{CelMessage, GenericCelPayload};
use crate::model::{ChannelSnapshot, EventRecord, EventType, FabricatedChannel};
use crate::router::Router;
use crate::topic::{forward_all, Forwarder, Topic};

/// Shared state captured by the router task.
pub(crate) struct EngineCore {
    pub(crate) config: ConfigStore,
    pub(crate) backends: BackendRegistry,
    pub(crate) linked_ids: LinkedIdTracker,
    pub(crate) dial_status: DialStatusStore,
}

impl EngineCore {
    /// Report a channel event: consult config, build the record, and fan
    /// it out to the backends.
    ///
    /// This is the single gate every emission passes through. In order:
    /// drop when disabled; take a linked-id reference for CHANNEL_START
    /// while LINKEDID_END is tracked (even if CHANNEL_START itself is
    /// not); drop untracked kinds; drop APP events for untracked apps;
    /// then build and deliver the record.
    pub(crate) fn report_event(
        &self,
        snapshot: &ChannelSnapshot,
        event_type: EventType,
        user_defined_name: Option<&str>,
        extra: Option<&Value>,
    ) {
        let config = self.config.current();
        if !config.enabled {
            return;
        }

        if event_type == EventType::ChannelStart
            && config.tracks(EventType::LinkedidEnd)
            && !self.linked_ids.ref_id(&snapshot.linked_id)
        {
            return;
        }

        if !config.tracks(event_type) {
            return;
        }

        if matches!(event_type, EventType::AppStart | EventType::AppEnd)
            && !config.tracks_app(&snapshot.app_name)
        {
            return;
        }

        let record = EventRecord::from_snapshot(snapshot, event_type, user_defined_name, extra);
        self.backends.for_each(&record);
    }

    /// Take a linked-id reference for `linked_id`, if linked-id tracking
    /// is active.
    pub(crate) fn linked_id_ref(&self, linked_id: &str) {
        if !self.config.current().tracks(EventType::LinkedidEnd) {
            return;
        }
        self.linked_ids.ref_id(linked_id);
    }

    /// Drop the linked-id reference held by `snapshot`'s channel,
    /// emitting LINKEDID_END if it was the last one.
    ///
    /// Called whenever a channel is destroyed or its linked id changes.
    pub(crate) fn retire_linked_id(&self, snapshot: &ChannelSnapshot) {
        if snapshot.linked_id.is_empty() || !self.config.current().tracks(EventType::LinkedidEnd) {
            return;
        }

        match self.linked_ids.unref_id(&snapshot.linked_id) {
            Unref::Retired => {
                self.report_event(snapshot, EventType::LinkedidEnd, None, None);
            }
            Unref::StillReferenced => {}
            Unref::NotFound => {
                tracing::error!(
                    linked_id = %snapshot.linked_id,
                    "Couldn't find linked id to retire"
                );
            }
        }
    }
}

/// Snapshot of engine state for status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    /// Whether event reporting is enabled
    pub enabled: bool,
    /// Names of tracked event kinds, in kind order
    pub tracked_events: Vec<&'static str>,
    /// Tracked application names, sorted
    pub tracked_apps: Vec<String>,
    /// Registered backend names, sorted
    pub backends: Vec<String>,
}

/// The Channel Event Logging engine.
///
/// Create one with [`CelEngine::init`]; tear it down with
/// [`CelEngine::shutdown`]. Independent engines are fully isolated, so
/// tests can run many side by side.
pub struct CelEngine {
    core: Arc<EngineCore>,
    channel_topic: Topic<CelMessage>,
    bridge_topic: Topic<CelMessage>,
    parking_topic: Topic<CelMessage>,
    cel_topic: Topic<CelMessage>,
    forwarders: Vec<Forwarder>,
    router: Router,
}

impl CelEngine {
    /// Start an engine with `config`.
    ///
    /// Validates the configuration, wires the forwarders and router, and
    /// returns the running engine. Must be called within a tokio runtime.
    pub fn init(config: CelConfig) -> Result<CelEngine> {
        config.validate().map_err(crate::error::EngineError::from)?;

        let core = Arc::new(EngineCore {
            config: ConfigStore::new(config),
            backends: BackendRegistry::new(),
            linked_ids: LinkedIdTracker::new(),
            dial_status: DialStatusStore::new(),
        });

        let aggregation_topic: Topic<CelMessage> = Topic::new("cel_aggregation");
        let channel_topic: Topic<CelMessage> = Topic::new("cel_channel");
        let bridge_topic: Topic<CelMessage> = Topic::new("cel_bridge");
        let parking_topic: Topic<CelMessage> = Topic::new("cel_parking");
        let cel_topic: Topic<CelMessage> = Topic::new("cel");

        let router = Router::spawn(Arc::clone(&core), aggregation_topic.subscribe());

        let forwarders = vec![
            forward_all(&channel_topic, aggregation_topic.clone()),
            forward_all(&bridge_topic, aggregation_topic.clone()),
            forward_all(&parking_topic, aggregation_topic.clone()),
            forward_all(&cel_topic, aggregation_topic),
        ];

        Ok(CelEngine {
            core,
            channel_topic,
            bridge_topic,
            parking_topic,
            cel_topic,
            forwarders,
            router,
        })
    }

    /// Start an engine from configuration text.
    ///
    /// A rejected configuration falls back to the built-in defaults with
    /// a warning, matching first-load behavior: a bad config file must
    /// not keep the engine from coming up.
    pub fn init_from_text(source: &str) -> Result<CelEngine> {
        let config = match CelConfig::load(source) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(%error, "Failed to process CEL configuration; using defaults");
                CelConfig::default()
            }
        };
        CelEngine::init(config)
    }

    /// Replace the configuration from configuration text.
    ///
    /// On any error the previous configuration stays in effect.
    pub fn reload(&self, source: &str) -> Result<()> {
        let config = CelConfig::load(source).map_err(crate::error::EngineError::from)?;
        let enabled = config.enabled;
        self.core
            .config
            .swap(config)
            .map_err(crate::error::EngineError::from)?;
        tracing::info!(
            "CEL logging {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Get the current configuration.
    pub fn get_config(&self) -> Arc<CelConfig> {
        self.core.config.current()
    }

    /// Replace the configuration programmatically.
    ///
    /// On validation failure the previous configuration stays in effect.
    pub fn set_config(&self, config: CelConfig) -> Result<()> {
        self.core
            .config
            .swap(config)
            .map_err(crate::error::EngineError::from)
    }

    /// Whether event reporting is currently enabled.
    pub fn check_enabled(&self) -> bool {
        self.core.config.current().enabled
    }

    /// Register an event sink under `name`.
    pub fn backend_register<F>(&self, name: &str, callback: F) -> Result<()>
    where
        F: Fn(&EventRecord) + Send + Sync + 'static,
    {
        self.core
            .backends
            .register(name, callback)
            .map_err(crate::error::EngineError::from)
    }

    /// Remove the event sink registered under `name`.
    pub fn backend_unregister(&self, name: &str) -> Result<()> {
        self.core
            .backends
            .unregister(name)
            .map_err(crate::error::EngineError::from)
    }

    /// Publish a generic CEL event into the pipeline.
    ///
    /// The arguments are wrapped in a generic carrier message on the
    /// engine's own topic, so producer events take the same routing and
    /// filtering path as everything else rather than reaching backends
    /// directly.
    pub fn publish_event(
        &self,
        channel: &ChannelSnapshot,
        event_type: EventType,
        event_details: Value,
    ) {
        self.cel_topic.publish(CelMessage::Generic(GenericCelPayload {
            snapshot: channel.clone(),
            event_type,
            event_details,
        }));
    }

    /// Synthesize a channel-like object from an event record, using the
    /// configured date format for the event time.
    pub fn fabricate_channel_from_event(&self, record: &EventRecord) -> FabricatedChannel {
        FabricatedChannel::from_record(record, &self.core.config.current().date_format)
    }

    /// Topic carrying channel snapshot updates and dial events.
    pub fn channel_topic(&self) -> &Topic<CelMessage> {
        &self.channel_topic
    }

    /// Topic carrying bridge enter/exit and transfer events.
    pub fn bridge_topic(&self) -> &Topic<CelMessage> {
        &self.bridge_topic
    }

    /// Topic carrying parking lot events.
    pub fn parking_topic(&self) -> &Topic<CelMessage> {
        &self.parking_topic
    }

    /// The engine's own topic for producer-published events.
    pub fn cel_topic(&self) -> &Topic<CelMessage> {
        &self.cel_topic
    }

    /// Current status for display.
    pub fn status(&self) -> EngineStatus {
        let config = self.core.config.current();

        let tracked_events = config.events.iter().map(EventType::name).collect();

        let mut tracked_apps: Vec<String> = config.apps.iter().cloned().collect();
        tracked_apps.sort_unstable();

        let mut backends = self.core.backends.names();
        backends.sort_unstable();

        EngineStatus {
            enabled: config.enabled,
            tracked_events,
            tracked_apps,
            backends,
        }
    }

    /// Tear the engine down.
    ///
    /// Unsubscribes and joins each forwarder and then the router, so no
    /// translator or backend callback is in flight on return, then
    /// releases the stores. Messages published afterwards are dropped.
    pub async fn shutdown(self) -> Result<()> {
        for forwarder in self.forwarders {
            forwarder.shutdown().await;
        }
        self.router.shutdown().await;

        self.core.dial_status.clear();
        self.core.linked_ids.clear();
        self.core.backends.clear();
        Ok(())
    }
}
