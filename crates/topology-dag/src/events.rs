//! Event bus: `data`/`error`/`done`, each carrying the live snapshot
//! reference.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::snapshot::Snapshot;

/// The live snapshot, shared with subscribers. The `Arc` is the zero-copy
/// aliasing reference handed out on every emission; the `Mutex` is what
/// stops a subscriber from ever getting a `&mut` to it. They can only
/// ever read through a guard, never hold one past a single access.
pub type SharedSnapshot = Arc<Mutex<Snapshot>>;

/// One emission on the bus. Subscribers must treat the enclosed snapshot
/// as read-only and deep-copy before persisting it asynchronously.
#[derive(Debug, Clone)]
pub enum Event {
    Data(SharedSnapshot),
    Error(SharedSnapshot),
    Done(SharedSnapshot),
}

/// Multi-listener publisher. `data` fires once per mutation. Exactly one
/// of `error`/`done` fires once, at the very end of a run: `error` for a
/// run that finalizes `errored`, `done` for one that finalizes `completed`
/// or `suspended`.
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub(crate) fn emit_data(&self, snapshot: &SharedSnapshot) {
        let _ = self.sender.send(Event::Data(snapshot.clone()));
    }

    pub(crate) fn emit_error(&self, snapshot: &SharedSnapshot) {
        let _ = self.sender.send(Event::Error(snapshot.clone()));
    }

    pub(crate) fn emit_done(&self, snapshot: &SharedSnapshot) {
        let _ = self.sender.send(Event::Done(snapshot.clone()));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
