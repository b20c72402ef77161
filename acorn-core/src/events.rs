use tokio::sync::broadcast;

use crate::error::FaultComponent;

/// Events a [`crate::Tree`] emits for `stash`/`toss`/`shake` and for
/// every swallowed background error (§7: "no silent swallowing").
#[derive(Debug, Clone)]
pub enum TreeEvent {
    Stashed { id: String, version: u64 },
    Tossed { id: String, version: u64 },
    Shaken { purged: usize },
    SquabbleResolved { id: String },
    Smushed { id: String },
    Fault {
        component: FaultComponent,
        kind: &'static str,
        message: String,
    },
}

/// A small `tokio::sync::broadcast`-backed event bus. Subscribers get a
/// lazy stream that is only finite once every sender (and the bus
/// itself) is dropped, matching §4.6's "lazy, finite-only-on-unsubscribe
/// stream" wording — in practice a receiver simply stops getting
/// items once the bus is dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TreeEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event, ignoring the "no active receivers" error —
    /// an event with nobody listening is not a fault.
    pub fn publish(&self, event: TreeEvent) {
        let _ = self.sender.send(event);
    }
}
