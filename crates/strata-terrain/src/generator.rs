//! Column classification and whole-chunk generation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::IVec3;
use strata_voxel::{
    Block, BlockAtlas, BlockType, CHUNK_HEIGHT, CHUNK_SIZE, ChunkBlocks, ChunkCoord,
};
use thiserror::Error;

use crate::heightmap::HeightmapSampler;

/// Errors returned by [`TerrainGenerator::generate_chunk`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The cancellation flag was raised before the chunk finished.
    #[error("generation of chunk {0:?} was cancelled")]
    Cancelled(ChunkCoord),
}

/// Block type of the cell at `world_y` in a column whose surface is at `surface`.
///
/// Above the surface: water below sea level, air otherwise. At the surface:
/// sand under water, grass otherwise. One layer of dirt, then stone.
pub fn classify(world_y: i32, surface: i32, sea_level: i32) -> BlockType {
    if world_y > surface {
        if world_y < sea_level {
            BlockType::Water
        } else {
            BlockType::Air
        }
    } else if world_y == surface {
        if world_y < sea_level {
            BlockType::Sand
        } else {
            BlockType::Grass
        }
    } else if world_y == surface - 1 {
        BlockType::Dirt
    } else {
        BlockType::Stone
    }
}

/// Deterministic terrain source shared by every data-build worker.
pub struct TerrainGenerator {
    sampler: HeightmapSampler,
    sea_level: i32,
    atlas: Arc<BlockAtlas>,
}

impl TerrainGenerator {
    pub fn new(sampler: HeightmapSampler, sea_level: i32, atlas: Arc<BlockAtlas>) -> Self {
        Self {
            sampler,
            sea_level,
            atlas,
        }
    }

    pub fn sea_level(&self) -> i32 {
        self.sea_level
    }

    pub fn atlas(&self) -> &Arc<BlockAtlas> {
        &self.atlas
    }

    /// Surface height of a world column.
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        self.sampler.surface_height(world_x, world_z)
    }

    /// Block type of a world cell.
    pub fn block_type_at(&self, world: IVec3) -> BlockType {
        classify(world.y, self.surface_height(world.x, world.z), self.sea_level)
    }

    /// Block value of a world cell, as a data-ready chunk would store it.
    pub fn block_at(&self, world: IVec3) -> Block {
        self.resolve(self.block_type_at(world))
    }

    /// Fills every cell of the chunk at `coord`.
    ///
    /// `cancel` is checked once per column; a raised flag abandons the chunk.
    pub fn generate_chunk(
        &self,
        coord: ChunkCoord,
        cancel: &AtomicBool,
    ) -> Result<ChunkBlocks, GenerationError> {
        let mut surfaces = [[0i32; CHUNK_SIZE]; CHUNK_SIZE];
        for (x, row) in surfaces.iter_mut().enumerate() {
            for (z, surface) in row.iter_mut().enumerate() {
                if cancel.load(Ordering::Relaxed) {
                    tracing::debug!(chunk = ?coord, "terrain generation cancelled");
                    return Err(GenerationError::Cancelled(coord));
                }
                *surface = self.surface_height(coord.x + x as i32, coord.z + z as i32);
            }
        }

        let palette = BlockType::ALL.map(|kind| self.resolve(kind));
        let blocks = ChunkBlocks::from_fn(|local| {
            let surface = surfaces[local.x as usize][local.z as usize];
            let kind = classify(i32::from(local.y), surface, self.sea_level);
            palette[kind as usize]
        });

        tracing::trace!(chunk = ?coord, height = CHUNK_HEIGHT, "chunk terrain generated");
        Ok(blocks)
    }

    /// Atlas lookup that degrades to air. The atlas is validated at startup,
    /// so a miss here means an invariant was broken.
    fn resolve(&self, kind: BlockType) -> Block {
        self.atlas.block(kind).unwrap_or_else(|err| {
            tracing::error!(block = %kind, %err, "atlas lookup failed during generation");
            Block::AIR
        })
    }
}
