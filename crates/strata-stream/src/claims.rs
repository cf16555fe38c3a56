//! Per-coordinate stage claims.
//!
//! Every coordinate sitting in a pipeline queue, or held by a stage that
//! dequeued it, has exactly one claim naming that stage. Claims are taken
//! before enqueueing and moved with compare-and-swap, so a chunk can never
//! be queued in two stages at once and two builders never share a mesh
//! buffer. A coordinate with no claim is idle.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use strata_voxel::ChunkCoord;

/// Pipeline stage a coordinate currently belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BuildInstance,
    BuildData,
    BuildMesh,
    RenderLoad,
    UpdateMesh,
    RenderUpdate,
    Unload,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Self::BuildInstance,
        Self::BuildData,
        Self::BuildMesh,
        Self::RenderLoad,
        Self::UpdateMesh,
        Self::RenderUpdate,
        Self::Unload,
    ];
}

/// Concurrent coordinate → stage map.
#[derive(Default)]
pub struct StageClaims {
    claims: DashMap<ChunkCoord, Stage>,
}

impl StageClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims an idle coordinate for `stage`. Fails if any stage holds it.
    pub fn try_claim(&self, coord: ChunkCoord, stage: Stage) -> Result<(), Stage> {
        match self.claims.entry(coord) {
            Entry::Occupied(held) => Err(*held.get()),
            Entry::Vacant(slot) => {
                slot.insert(stage);
                Ok(())
            }
        }
    }

    /// Moves a claim from `from` to `to`. Fails if `from` is not the holder.
    pub fn transition(&self, coord: ChunkCoord, from: Stage, to: Stage) -> bool {
        match self.claims.get_mut(&coord) {
            Some(mut held) if *held == from => {
                *held = to;
                true
            }
            _ => false,
        }
    }

    /// Drops the claim if `from` holds it, making the coordinate idle.
    pub fn release(&self, coord: ChunkCoord, from: Stage) -> bool {
        self.claims.remove_if(&coord, |_, held| *held == from).is_some()
    }

    pub fn stage_of(&self, coord: ChunkCoord) -> Option<Stage> {
        self.claims.get(&coord).map(|held| *held)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Number of coordinates held by `stage`.
    pub fn count(&self, stage: Stage) -> usize {
        self.claims.iter().filter(|e| *e.value() == stage).count()
    }

    /// Copy of every claim.
    pub fn entries(&self) -> Vec<(ChunkCoord, Stage)> {
        self.claims.iter().map(|e| (*e.key(), *e.value())).collect()
    }
}
