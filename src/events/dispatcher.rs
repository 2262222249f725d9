//! Type-keyed event dispatcher.
//!
//! A small pub/sub used by the synthetic telemetry producer: event kinds
//! are registered up front, listeners attach per kind, and dispatch hands
//! every listener its own clone of the event so no two sinks ever share
//! mutable event state.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// The kinds of events that can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Configuration,
    OperationalState,
    Random,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Configuration => "Configuration",
            EventKind::OperationalState => "OperationalState",
            EventKind::Random => "RandomEvent",
        };
        f.write_str(name)
    }
}

/// A dispatched event. `client` scopes an event to one stream client when
/// set; listeners serving other clients ignore it.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub subject: String,
    pub time: SystemTime,
    pub value: String,
    pub client: Option<u64>,
}

/// Dispatches events to registered listener channels.
#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<EventKind, Vec<mpsc::Sender<Event>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an event kind, making it possible to attach listeners for
    /// it. Returns false when the kind was already registered.
    pub fn register_event(&self, kind: EventKind) -> bool {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&kind) {
            return false;
        }
        debug!("registering event kind {kind}");
        handlers.insert(kind, Vec::new());
        true
    }

    /// Attaches a listener channel for an event kind. Returns false when
    /// the kind has not been registered.
    pub fn register_listener(&self, kind: EventKind, listener: mpsc::Sender<Event>) -> bool {
        let mut handlers = self.handlers.write();
        match handlers.get_mut(&kind) {
            Some(listeners) => {
                listeners.push(listener);
                true
            }
            None => false,
        }
    }

    /// Sends a clone of the event to every listener of its kind without
    /// blocking; full listeners drop the event. Returns false when the
    /// event kind was never registered. Listeners whose receiving end is
    /// gone are purged.
    pub fn dispatch(&self, event: &Event) -> bool {
        // Clone the listener set under the read lock; never send under it.
        let listeners = match self.handlers.read().get(&event.kind) {
            Some(listeners) => listeners.clone(),
            None => return false,
        };
        let mut closed = false;
        for listener in &listeners {
            match listener.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!("dropping {} event: listener queue full", event.kind);
                }
                Err(TrySendError::Closed(_)) => closed = true,
            }
        }
        if closed {
            if let Some(listeners) = self.handlers.write().get_mut(&event.kind) {
                listeners.retain(|listener| !listener.is_closed());
            }
        }
        true
    }
}
