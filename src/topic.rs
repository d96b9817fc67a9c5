//! Publish/subscribe plumbing: topics, subscriptions, and forwarders.
//!
//! A topic fans each published message out to every live subscription.
//! Messages are shared via `Arc`, so publishing never clones the payload.
//! A forwarder is a background task that republishes everything from a
//! source topic onto a destination topic; the engine uses one per
//! upstream topic to build its aggregation topic.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A named publish/subscribe topic.
///
/// Cloning a topic yields another handle to the same subscriber list.
/// Publishing to a topic with no subscribers drops the message, which is
/// what makes post-shutdown publishes harmless.
pub struct Topic<T> {
    name: Arc<str>,
    subscribers: Arc<RwLock<Vec<mpsc::UnboundedSender<Arc<T>>>>>,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Topic {
            name: Arc::clone(&self.name),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T: Send + Sync + 'static> Topic<T> {
    /// Create a topic with the given diagnostic name.
    pub fn new(name: impl Into<String>) -> Topic<T> {
        Topic {
            name: Arc::from(name.into()),
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// The topic's diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish a message to every subscriber.
    pub fn publish(&self, message: T) {
        self.publish_arc(Arc::new(message));
    }

    pub(crate) fn publish_arc(&self, message: Arc<T>) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Dropped receivers are pruned as they are discovered
        subscribers.retain(|sender| sender.send(Arc::clone(&message)).is_ok());
    }

    /// Open a new subscription on this topic.
    ///
    /// The subscription receives every message published after this call.
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        Subscription {
            topic: Arc::clone(&self.name),
            receiver,
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// The receiving end of a topic subscription.
pub struct Subscription<T> {
    topic: Arc<str>,
    receiver: mpsc::UnboundedReceiver<Arc<T>>,
}

impl<T> Subscription<T> {
    /// Name of the topic this subscription is attached to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Receive the next message, waiting until one is published.
    ///
    /// Returns `None` once the topic has been dropped.
    pub async fn recv(&mut self) -> Option<Arc<T>> {
        self.receiver.recv().await
    }

    /// Receive a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Arc<T>> {
        self.receiver.try_recv().ok()
    }
}

/// Handle to a running topic forwarder.
pub struct Forwarder {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl Forwarder {
    /// Unsubscribe and wait for the forwarding task to finish.
    ///
    /// On return no further messages will be forwarded.
    pub async fn shutdown(self) {
        // The task may already have ended if the source topic went away
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

/// Forward every message published on `source` to `destination`.
///
/// Must be called within a tokio runtime.
pub fn forward_all<T: Send + Sync + 'static>(
    source: &Topic<T>,
    destination: Topic<T>,
) -> Forwarder {
    let mut subscription = source.subscribe();
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                message = subscription.recv() => match message {
                    Some(message) => destination.publish_arc(message),
                    None => break,
                },
            }
        }
    });

    Forwarder {
        handle,
        shutdown: shutdown_tx,
    }
}
