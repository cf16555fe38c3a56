//! Cross-chunk neighbour access for boundary-face culling.
//!
//! [`ChunkNeighborhood`] holds, for each of the four horizontal neighbours,
//! the single layer of blocks touching the centre chunk. It is an owned
//! snapshot, so a mesh build reads it without holding any lock on the
//! neighbouring chunks.

use strata_voxel::{
    Block, BlockCoord, CHUNK_HEIGHT, CHUNK_SIZE, ChunkBlocks, ChunkDirection,
};

// ---------------------------------------------------------------------------
// Boundary slices
// ---------------------------------------------------------------------------

/// The `CHUNK_SIZE × CHUNK_HEIGHT` layer of a neighbour chunk that touches
/// the centre chunk.
///
/// Indexed by the neighbour-local coordinate of each touching block, as
/// produced by [`BlockCoord::mirrored_across`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundarySlice {
    direction: ChunkDirection,
    blocks: Box<[Block]>,
}

impl BoundarySlice {
    /// Builds the slice for the neighbour in `direction`, calling `f` with
    /// each touching neighbour-local coordinate.
    pub fn from_fn(direction: ChunkDirection, mut f: impl FnMut(BlockCoord) -> Block) -> Self {
        let blocks = (0..CHUNK_HEIGHT)
            .flat_map(|y| (0..CHUNK_SIZE).map(move |u| (u, y)))
            .map(|(u, y)| f(touching_coord(direction, u as u8, y as u8)))
            .collect();
        Self { direction, blocks }
    }

    /// Copies the touching layer out of a neighbour's block storage.
    pub fn from_chunk(direction: ChunkDirection, neighbor: &ChunkBlocks) -> Self {
        Self::from_fn(direction, |coord| neighbor.get(coord))
    }

    /// Slice of a neighbour made entirely of one block.
    pub fn filled(direction: ChunkDirection, block: Block) -> Self {
        Self::from_fn(direction, |_| block)
    }

    pub fn direction(&self) -> ChunkDirection {
        self.direction
    }

    /// The neighbour block at a neighbour-local coordinate on the touching layer.
    ///
    /// Returns `None` if `coord` is not on the touching layer.
    pub fn get(&self, coord: BlockCoord) -> Option<Block> {
        if touching_coord(self.direction, along_edge(self.direction, coord), coord.y) != coord {
            return None;
        }
        let u = along_edge(self.direction, coord) as usize;
        self.blocks.get(coord.y as usize * CHUNK_SIZE + u).copied()
    }
}

/// Neighbour-local coordinate of the touching block at edge position `u`, height `y`.
fn touching_coord(direction: ChunkDirection, u: u8, y: u8) -> BlockCoord {
    let last = (CHUNK_SIZE - 1) as u8;
    match direction {
        ChunkDirection::North => BlockCoord::new(u, y, 0),
        ChunkDirection::South => BlockCoord::new(u, y, last),
        ChunkDirection::East => BlockCoord::new(0, y, u),
        ChunkDirection::West => BlockCoord::new(last, y, u),
    }
}

fn along_edge(direction: ChunkDirection, coord: BlockCoord) -> u8 {
    match direction {
        ChunkDirection::North | ChunkDirection::South => coord.x,
        ChunkDirection::East | ChunkDirection::West => coord.z,
    }
}

// ---------------------------------------------------------------------------
// Neighbourhood
// ---------------------------------------------------------------------------

/// Boundary layers of the four horizontal neighbours of a chunk.
///
/// A missing slice means nothing is known about that neighbour; its
/// boundary is treated as open air.
#[derive(Clone, Debug, Default)]
pub struct ChunkNeighborhood {
    slices: [Option<BoundarySlice>; 4],
}

impl ChunkNeighborhood {
    /// A neighbourhood with no known neighbours.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Collects one slice per direction from `f`.
    pub fn gather(mut f: impl FnMut(ChunkDirection) -> Option<BoundarySlice>) -> Self {
        Self {
            slices: ChunkDirection::ALL.map(&mut f),
        }
    }

    /// Replaces the slice for its direction.
    pub fn set(&mut self, slice: BoundarySlice) {
        let index = slice.direction() as usize;
        self.slices[index] = Some(slice);
    }

    pub fn slice(&self, direction: ChunkDirection) -> Option<&BoundarySlice> {
        self.slices[direction as usize].as_ref()
    }

    /// The block across the border from `source` in `direction`.
    ///
    /// `source` is a centre-chunk coordinate on the edge facing `direction`.
    pub fn block_across(&self, source: BlockCoord, direction: ChunkDirection) -> Block {
        let mirrored = source.mirrored_across(direction);
        self.slice(direction)
            .and_then(|slice| slice.get(mirrored))
            .unwrap_or(Block::AIR)
    }
}

#[cfg(test)]
mod tests {
    use strata_voxel::BlockType;

    use super::*;

    const STONE: Block = Block::new(BlockType::Stone, true);

    #[test]
    fn test_slice_copies_touching_layer_only() {
        let neighbor = ChunkBlocks::from_fn(|c| if c.z == 0 { STONE } else { Block::AIR });
        let slice = BoundarySlice::from_chunk(ChunkDirection::North, &neighbor);
        assert_eq!(slice.get(BlockCoord::new(7, 100, 0)), Some(STONE));
        assert_eq!(slice.get(BlockCoord::new(7, 100, 1)), None);
    }

    #[test]
    fn test_block_across_uses_mirrored_coord() {
        // East neighbour: stone only at its x = 0, z = 3 column.
        let neighbor = ChunkBlocks::from_fn(|c| {
            if c.x == 0 && c.z == 3 { STONE } else { Block::AIR }
        });
        let mut hood = ChunkNeighborhood::empty();
        hood.set(BoundarySlice::from_chunk(ChunkDirection::East, &neighbor));

        let source = BlockCoord::new(15, 12, 3);
        assert_eq!(hood.block_across(source, ChunkDirection::East), STONE);
        let other = BlockCoord::new(15, 12, 4);
        assert_eq!(hood.block_across(other, ChunkDirection::East), Block::AIR);
    }

    #[test]
    fn test_missing_neighbor_reads_as_air() {
        let hood = ChunkNeighborhood::empty();
        let source = BlockCoord::new(0, 5, 5);
        assert_eq!(hood.block_across(source, ChunkDirection::West), Block::AIR);
    }

    #[test]
    fn test_gather_places_slices_by_direction() {
        let hood = ChunkNeighborhood::gather(|dir| {
            (dir == ChunkDirection::South).then(|| BoundarySlice::filled(dir, STONE))
        });
        assert!(hood.slice(ChunkDirection::South).is_some());
        assert!(hood.slice(ChunkDirection::North).is_none());
        let source = BlockCoord::new(9, 0, 0);
        assert_eq!(hood.block_across(source, ChunkDirection::South), STONE);
    }
}
