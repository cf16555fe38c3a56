//! World lifecycle events broadcast to subscribers.

use crossbeam_channel::{Receiver, Sender, unbounded};
use glam::Vec3;
use parking_lot::Mutex;
use strata_voxel::ChunkCoord;

/// Emitted by the engine as the world changes state.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    /// The initial window is fully rendered. Observers were moved to
    /// `spawn_position` inside `spawn_chunk`.
    Generated {
        spawn_chunk: ChunkCoord,
        spawn_position: Vec3,
    },
    /// A window-generation pass finished.
    PassCompleted {
        center: ChunkCoord,
        active: usize,
        queued_instances: usize,
        queued_updates: usize,
        queued_unloads: usize,
    },
}

/// Fan-out of [`WorldEvent`]s to any number of channel subscribers.
#[derive(Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<Sender<WorldEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<WorldEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Sends `event` to every live subscriber, dropping disconnected ones.
    pub fn broadcast(&self, event: WorldEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
