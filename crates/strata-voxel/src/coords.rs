//! Chunk-local block coordinates and world-space chunk coordinates.

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::direction::{ChunkDirection, FaceDirection};

/// Horizontal side length of a chunk in blocks.
pub const CHUNK_SIZE: usize = 16;

/// Vertical extent of a chunk in blocks.
pub const CHUNK_HEIGHT: usize = 256;

/// Number of blocks in a chunk (16 × 256 × 16).
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_HEIGHT * CHUNK_SIZE;

const _: () = assert!(CHUNK_SIZE <= u8::MAX as usize + 1 && CHUNK_HEIGHT <= u8::MAX as usize + 1);

// ---------------------------------------------------------------------------
// BlockCoord
// ---------------------------------------------------------------------------

/// Position of a block inside its chunk.
///
/// `x` and `z` are in `[0, CHUNK_SIZE)`, `y` is in `[0, CHUNK_HEIGHT)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockCoord {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl BlockCoord {
    /// Creates a coordinate without bounds checks on `y`.
    ///
    /// `x` and `z` are debug-checked against `CHUNK_SIZE`.
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        debug_assert!((x as usize) < CHUNK_SIZE && (z as usize) < CHUNK_SIZE);
        Self { x, y, z }
    }

    /// Converts signed local coordinates, returning `None` outside the chunk.
    pub fn from_ivec3(pos: IVec3) -> Option<Self> {
        let in_bounds = (0..CHUNK_SIZE as i32).contains(&pos.x)
            && (0..CHUNK_HEIGHT as i32).contains(&pos.y)
            && (0..CHUNK_SIZE as i32).contains(&pos.z);
        in_bounds.then(|| Self::new(pos.x as u8, pos.y as u8, pos.z as u8))
    }

    /// Block cell containing a chunk-local position.
    ///
    /// Block centers sit on integer coordinates and a cube extends ±0.5
    /// around its center, so the position is rounded.
    pub fn from_local_position(pos: Vec3) -> Option<Self> {
        Self::from_ivec3(pos.round().as_ivec3())
    }

    /// Rebuilds a coordinate from its dense storage index.
    pub fn from_index(index: usize) -> Self {
        let x = index % CHUNK_SIZE;
        let y = (index / CHUNK_SIZE) % CHUNK_HEIGHT;
        let z = index / (CHUNK_SIZE * CHUNK_HEIGHT);
        Self::new(x as u8, y as u8, z as u8)
    }

    /// Dense storage index (x fastest, then y, then z).
    pub fn index(self) -> usize {
        (self.z as usize * CHUNK_HEIGHT + self.y as usize) * CHUNK_SIZE + self.x as usize
    }

    /// Signed local coordinates.
    pub fn as_ivec3(self) -> IVec3 {
        IVec3::new(self.x as i32, self.y as i32, self.z as i32)
    }

    /// Local coordinates as floats (the block center).
    pub fn as_vec3(self) -> Vec3 {
        self.as_ivec3().as_vec3()
    }

    /// The neighbouring coordinate in `dir`, or `None` if it leaves the chunk.
    pub fn neighbor(self, dir: FaceDirection) -> Option<Self> {
        Self::from_ivec3(self.as_ivec3() + dir.offset())
    }

    /// The coordinate a face in `dir` touches inside the adjacent chunk.
    ///
    /// Only horizontal faces cross chunk borders; the axis that left the
    /// chunk wraps to the opposite edge.
    pub fn mirrored_across(self, dir: ChunkDirection) -> Self {
        let last = (CHUNK_SIZE - 1) as u8;
        match dir {
            ChunkDirection::North => Self::new(self.x, self.y, 0),
            ChunkDirection::South => Self::new(self.x, self.y, last),
            ChunkDirection::East => Self::new(0, self.y, self.z),
            ChunkDirection::West => Self::new(last, self.y, self.z),
        }
    }

    /// Iterates every coordinate of a chunk in storage order.
    pub fn all() -> impl Iterator<Item = BlockCoord> {
        (0..CHUNK_VOLUME).map(Self::from_index)
    }
}

// ---------------------------------------------------------------------------
// ChunkCoord
// ---------------------------------------------------------------------------

/// World-space origin (X/Z) of a chunk. Both components are multiples of
/// [`CHUNK_SIZE`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a chunk coordinate from its world-space origin.
    pub const fn new(x: i32, z: i32) -> Self {
        debug_assert!(x % CHUNK_SIZE as i32 == 0 && z % CHUNK_SIZE as i32 == 0);
        Self { x, z }
    }

    /// The chunk owning the world block column `(world_x, world_z)`.
    pub fn containing(world_x: i32, world_z: i32) -> Self {
        let size = CHUNK_SIZE as i32;
        Self::new(world_x.div_euclid(size) * size, world_z.div_euclid(size) * size)
    }

    /// The chunk owning the block cell at a world-space position.
    pub fn containing_position(pos: Vec3) -> Self {
        let cell = world_cell(pos);
        Self::containing(cell.x, cell.z)
    }

    /// Returns `true` if the block cell at `pos` belongs to this chunk.
    pub fn contains_world(self, pos: Vec3) -> bool {
        Self::containing_position(pos) == self
    }

    /// Origin as a world-space block position (`y = 0`).
    pub fn origin(self) -> IVec3 {
        IVec3::new(self.x, 0, self.z)
    }

    /// Horizontal center of the chunk at `y = 0`.
    pub fn middle_point(self) -> Vec3 {
        let half = (CHUNK_SIZE / 2) as f32;
        Vec3::new(self.x as f32 + half, 0.0, self.z as f32 + half)
    }

    /// The adjacent chunk in `dir`.
    pub fn neighbor(self, dir: ChunkDirection) -> Self {
        let off = dir.offset();
        Self::new(self.x + off.x, self.z + off.y)
    }

    /// The four horizontally adjacent chunks, in [`ChunkDirection::ALL`] order.
    pub fn neighbors(self) -> [ChunkCoord; 4] {
        ChunkDirection::ALL.map(|dir| self.neighbor(dir))
    }

    /// Returns `true` if `other` shares an edge with this chunk.
    pub fn is_neighbor(self, other: ChunkCoord) -> bool {
        self.neighbors().contains(&other)
    }

    /// Squared distance on the XZ plane from `pos` to this chunk's origin.
    pub fn planar_distance_squared(self, pos: Vec3) -> f32 {
        let dx = pos.x - self.x as f32;
        let dz = pos.z - self.z as f32;
        dx * dx + dz * dz
    }

    /// World-space block position of a local coordinate.
    pub fn world_position(self, local: BlockCoord) -> IVec3 {
        self.origin() + local.as_ivec3()
    }

    /// Local coordinate of a world block cell, if the cell lies in this chunk.
    pub fn to_local(self, world: IVec3) -> Option<BlockCoord> {
        BlockCoord::from_ivec3(world - self.origin())
    }

    /// Square window of chunks within `range` chunks of this one, X-major.
    pub fn window(self, range: u32) -> impl Iterator<Item = ChunkCoord> {
        let size = CHUNK_SIZE as i32;
        let span = range as i32 * size;
        let xs = (self.x - span..=self.x + span).step_by(CHUNK_SIZE);
        xs.flat_map(move |x| {
            (self.z - span..=self.z + span)
                .step_by(CHUNK_SIZE)
                .map(move |z| ChunkCoord::new(x, z))
        })
    }
}

/// World block cell containing a world-space position.
pub fn world_cell(pos: Vec3) -> IVec3 {
    pos.round().as_ivec3()
}
