//! The dispatcher task that routes aggregated messages to translators.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::engine::EngineCore;
use crate::messages::CelMessage;
use crate::topic::Subscription;
use crate::translators;

/// Handle to the running dispatcher task.
pub(crate) struct Router {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl Router {
    /// Spawn the dispatcher over `subscription`.
    ///
    /// Translators run inline on the task, one message at a time, which
    /// is what preserves publication order through to the backends.
    pub(crate) fn spawn(
        core: Arc<EngineCore>,
        mut subscription: Subscription<CelMessage>,
    ) -> Router {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    message = subscription.recv() => match message {
                        Some(message) => dispatch(&core, &message),
                        None => break,
                    },
                }
            }
            tracing::debug!("CEL dispatcher stopped");
        });

        Router {
            handle,
            shutdown: shutdown_tx,
        }
    }

    /// Stop dispatching and wait for the task to finish.
    ///
    /// Any translator or backend callback in flight completes first.
    pub(crate) async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

/// Route one aggregated message to its translator.
fn dispatch(core: &EngineCore, message: &CelMessage) {
    match message {
        CelMessage::SnapshotUpdate { old, new } => {
            translators::channel_snapshot_update(core, old.as_ref(), new.as_ref());
        }
        CelMessage::Dial(payload) => translators::dial(core, payload),
        CelMessage::BridgeEnter(payload) => translators::bridge_enter(core, payload),
        CelMessage::BridgeExit(payload) => translators::bridge_exit(core, payload),
        CelMessage::ParkedCall(payload) => translators::parked_call(core, payload),
        CelMessage::BlindTransfer(payload) => translators::blind_transfer(core, payload),
        CelMessage::AttendedTransfer(payload) => {
            translators::attended_transfer(core, payload);
        }
        CelMessage::Pickup(payload) => translators::pickup(core, payload),
        CelMessage::LocalOptimize(payload) => translators::local_optimize(core, payload),
        CelMessage::Generic(payload) => translators::generic(core, payload),
    }
}
