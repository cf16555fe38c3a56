//! Single-block edits resolved by a short ray march from an observer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec3;
use strata_voxel::{BlockCoord, ChunkCoord};

use crate::chunk::Chunk;
use crate::observer::{EditIntent, Observer};
use crate::pipeline::{Enqueued, Pipeline};
use crate::tables::ActiveTable;

/// Maximum ray length, in world units.
pub const REACH: f32 = 8.0;
/// Samples along the ray.
pub const RAY_STEPS: u32 = 200;
/// Steps walked back from the first solid hit to find the placement cell.
pub const BACKTRACK_STEPS: u32 = 3;

/// An accessible active chunk and the local cell holding `point`.
fn locate(active: &ActiveTable, point: Vec3) -> Option<(Arc<Chunk>, BlockCoord)> {
    let chunk = active.get(ChunkCoord::containing_position(point))?;
    if !chunk.is_accessible() {
        return None;
    }
    let local = BlockCoord::from_local_position(point - chunk.coord().origin().as_vec3())?;
    Some((chunk, local))
}

/// Finds the cell in front of the first solid block along the view ray.
///
/// Returns `None` when nothing solid is within reach, when the hit or the
/// backed-off point is in a chunk that is not accessible, or when the
/// backed-off cell is itself solid.
pub fn resolve_placement(
    active: &ActiveTable,
    origin: Vec3,
    forward: Vec3,
) -> Option<(Arc<Chunk>, BlockCoord)> {
    let step = REACH / RAY_STEPS as f32;
    let forward = forward.normalize_or_zero();
    if forward == Vec3::ZERO {
        return None;
    }

    for i in 0..=RAY_STEPS {
        let point = origin + forward * (i as f32 * step);
        let Some((chunk, local)) = locate(active, point) else {
            continue;
        };
        if !chunk.block(local).is_some_and(|b| b.solid) {
            continue;
        }

        let back = point - forward * (BACKTRACK_STEPS as f32 * step);
        let (target, cell) = locate(active, back)?;
        return target
            .block(cell)
            .filter(|b| !b.solid)
            .map(|_| (target, cell));
    }
    None
}

/// Stores the placement block at `local` if it holds air, then queues the
/// chunk for a mesh update, after any rebuild already in flight. Returns `true` if the block was stored.
pub fn place_block(pipeline: &Pipeline, chunk: Arc<Chunk>, local: BlockCoord) -> bool {
    if !chunk.replace_air(local, pipeline.placement_block) {
        tracing::trace!(chunk = ?chunk.coord(), cell = ?local, "placement target is not air");
        return false;
    }
    let coord = chunk.coord();
    if let Enqueued::Duplicate(stage) = pipeline.request_remesh(chunk) {
        tracing::trace!(chunk = ?coord, ?stage, "placement remesh waits for the current holder");
    }
    tracing::debug!(chunk = ?coord, cell = ?local, "block placed");
    true
}

/// Resolves and applies a placement for a ray from `origin` along `forward`.
pub fn place_from(pipeline: &Pipeline, origin: Vec3, forward: Vec3) -> Option<ChunkCoord> {
    let (chunk, local) = resolve_placement(&pipeline.active, origin, forward)?;
    let coord = chunk.coord();
    place_block(pipeline, chunk, local).then_some(coord)
}

/// Body of the `strata-interact` thread.
pub(crate) fn run_interaction_thread(
    pipeline: Arc<Pipeline>,
    observers: Vec<Arc<dyn Observer>>,
    world_generated: Arc<AtomicBool>,
) {
    let cancel = &pipeline.signals.services;
    while !cancel.load(Ordering::Acquire) {
        if world_generated.load(Ordering::Acquire) {
            for observer in &observers {
                while let Some(intent) = observer.take_intent() {
                    match intent {
                        EditIntent::Place => {
                            place_from(&pipeline, observer.position(), observer.forward());
                        }
                        EditIntent::Remove => tracing::debug!("block removal is not supported"),
                    }
                }
            }
        }
        std::thread::sleep(pipeline.poll);
    }
    tracing::debug!("interaction thread exiting");
}
