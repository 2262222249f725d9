//! Event plumbing between configuration writers and subscription streams.

mod dispatcher;

pub use dispatcher::Dispatcher;
pub use dispatcher::Event;
pub use dispatcher::EventKind;

#[cfg(test)]
mod dispatcher_test;

use tokio::sync::broadcast;

use crate::proto::gnmi::Update;

/// Ring bus carrying config-change updates from every writer (Set handler,
/// datetime heartbeat) to the per-client stream consumers.
///
/// Producers never block: the underlying broadcast channel overwrites the
/// oldest events for lagging consumers, and publishing without any
/// attached consumer discards the event.
pub struct ConfigUpdateBus {
    tx: broadcast::Sender<Update>,
}

impl ConfigUpdateBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes one config-update event. Losses are silent.
    pub fn publish(&self, update: Update) {
        let _ = self.tx.send(update);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Update> {
        self.tx.subscribe()
    }
}
