//! Observers: the moving points the world window follows.

use glam::Vec3;
use parking_lot::Mutex;
use strata_voxel::{CHUNK_SIZE, ChunkCoord};

/// A discrete interaction request from an observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditIntent {
    Place,
    Remove,
}

/// Position, view direction and intents of one observer.
///
/// Implementations are polled from the window and interaction threads.
pub trait Observer: Send + Sync {
    fn position(&self) -> Vec3;
    fn forward(&self) -> Vec3;
    /// Moves the observer, used once at spawn.
    fn teleport(&self, position: Vec3);
    /// Pops the next pending intent, if any.
    fn take_intent(&self) -> Option<EditIntent>;
}

/// An observer whose state is set from outside, for scripted runs and tests.
#[derive(Debug)]
pub struct ScriptedObserver {
    state: Mutex<ScriptedState>,
}

#[derive(Debug)]
struct ScriptedState {
    position: Vec3,
    forward: Vec3,
    intents: Vec<EditIntent>,
}

impl ScriptedObserver {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                position,
                forward: forward.normalize_or(Vec3::Z),
                intents: Vec::new(),
            }),
        }
    }

    pub fn set_position(&self, position: Vec3) {
        self.state.lock().position = position;
    }

    pub fn set_forward(&self, forward: Vec3) {
        self.state.lock().forward = forward.normalize_or(Vec3::Z);
    }

    pub fn push_intent(&self, intent: EditIntent) {
        self.state.lock().intents.push(intent);
    }
}

impl Observer for ScriptedObserver {
    fn position(&self) -> Vec3 {
        self.state.lock().position
    }

    fn forward(&self) -> Vec3 {
        self.state.lock().forward
    }

    fn teleport(&self, position: Vec3) {
        self.set_position(position);
    }

    fn take_intent(&self) -> Option<EditIntent> {
        let mut state = self.state.lock();
        if state.intents.is_empty() {
            None
        } else {
            Some(state.intents.remove(0))
        }
    }
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

/// Distance, in world units, an observer must move from its source chunk
/// before the window is regenerated around it.
///
/// A threshold of at least the draw range is halved so the window moves
/// before the observer reaches its edge.
pub fn regeneration_threshold(regen_threshold: u32, draw_range: u32) -> f32 {
    let chunks = if regen_threshold >= draw_range {
        regen_threshold / 2
    } else {
        regen_threshold
    };
    (chunks as usize * CHUNK_SIZE + CHUNK_SIZE / 2) as f32
}

/// Window bookkeeping for one observer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObserverState {
    /// Chunk the last generation pass was centred on.
    pub source_chunk: ChunkCoord,
    /// Chunk containing the observer at the last update.
    pub current_chunk: ChunkCoord,
    /// A pass for this observer is running.
    pub request_pending: bool,
    /// The observer is past the regeneration threshold.
    pub far_enough: bool,
}

impl ObserverState {
    pub fn new(spawn_chunk: ChunkCoord) -> Self {
        Self {
            source_chunk: spawn_chunk,
            current_chunk: spawn_chunk,
            request_pending: false,
            far_enough: false,
        }
    }

    /// Refreshes the tracked chunk and distance flag from a new position.
    ///
    /// Returns the chunk a new pass should be centred on, and marks the
    /// request pending, when the observer has moved far enough.
    pub fn update(&mut self, position: Vec3, threshold: f32) -> Option<ChunkCoord> {
        self.current_chunk = ChunkCoord::containing_position(position);
        self.far_enough =
            self.source_chunk.planar_distance_squared(position) >= threshold * threshold;
        if self.far_enough && !self.request_pending {
            self.request_pending = true;
            Some(self.current_chunk)
        } else {
            None
        }
    }

    /// Records a completed pass centred on `center`.
    pub fn complete(&mut self, center: ChunkCoord) {
        self.source_chunk = center;
        self.request_pending = false;
        self.far_enough = false;
    }
}
