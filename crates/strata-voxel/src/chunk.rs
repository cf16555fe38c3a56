//! Dense per-chunk block storage.
//!
//! A chunk column holds [`CHUNK_VOLUME`] blocks indexed by [`BlockCoord`].
//! Storage is always fully populated: it is either built in one pass by a
//! generator or filled with a single block, so a lookup by a valid local
//! coordinate cannot miss.

use crate::block::{Block, BlockType};
use crate::coords::{BlockCoord, CHUNK_HEIGHT, CHUNK_VOLUME};

/// Every block of one chunk, stored by value.
#[derive(Clone, PartialEq, Eq)]
pub struct ChunkBlocks {
    blocks: Box<[Block]>,
}

impl ChunkBlocks {
    /// A chunk where every cell holds `block`.
    pub fn filled(block: Block) -> Self {
        Self {
            blocks: vec![block; CHUNK_VOLUME].into_boxed_slice(),
        }
    }

    /// A chunk of air.
    pub fn air() -> Self {
        Self::filled(Block::AIR)
    }

    /// Builds a chunk by evaluating `f` once per local coordinate.
    pub fn from_fn(mut f: impl FnMut(BlockCoord) -> Block) -> Self {
        Self {
            blocks: BlockCoord::all().map(&mut f).collect(),
        }
    }

    /// Builds a chunk with a fallible per-cell function, stopping at the first error.
    pub fn try_from_fn<E>(
        mut f: impl FnMut(BlockCoord) -> Result<Block, E>,
    ) -> Result<Self, E> {
        let blocks = BlockCoord::all()
            .map(&mut f)
            .collect::<Result<Box<[Block]>, E>>()?;
        Ok(Self { blocks })
    }

    /// Returns the block at `coord`.
    pub fn get(&self, coord: BlockCoord) -> Block {
        self.blocks[coord.index()]
    }

    /// Replaces the block at `coord`, returning the previous one.
    pub fn set(&mut self, coord: BlockCoord, block: Block) -> Block {
        std::mem::replace(&mut self.blocks[coord.index()], block)
    }

    /// Number of stored blocks (always [`CHUNK_VOLUME`]).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates `(coord, block)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockCoord, Block)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (BlockCoord::from_index(i), *block))
    }

    /// Number of cells holding `kind`.
    pub fn count(&self, kind: BlockType) -> usize {
        self.blocks.iter().filter(|b| b.kind == kind).count()
    }

    /// Height at which an observer can stand in column `(x, z)`.
    ///
    /// Scans upward and returns the first `y` whose cell is neither solid nor
    /// fluid, starting from `y = 1`. `None` when the column is full to the top.
    pub fn spawn_height(&self, x: u8, z: u8) -> Option<u8> {
        (1..CHUNK_HEIGHT).map(|y| y as u8).find(|&y| {
            let above = self.get(BlockCoord::new(x, y, z));
            !above.solid && !above.kind.is_fluid()
        })
    }
}

impl std::fmt::Debug for ChunkBlocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkBlocks")
            .field("len", &self.blocks.len())
            .field("air", &self.count(BlockType::Air))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CHUNK_SIZE;

    const STONE: Block = Block::new(BlockType::Stone, true);
    const WATER: Block = Block::new(BlockType::Water, false);

    #[test]
    fn test_filled_chunk_is_fully_populated() {
        let chunk = ChunkBlocks::air();
        assert_eq!(chunk.len(), CHUNK_VOLUME);
        assert_eq!(chunk.count(BlockType::Air), CHUNK_VOLUME);
    }

    #[test]
    fn test_from_fn_visits_each_coord_once() {
        let mut visited = 0;
        let chunk = ChunkBlocks::from_fn(|c| {
            visited += 1;
            if c.y < 10 { STONE } else { Block::AIR }
        });
        assert_eq!(visited, CHUNK_VOLUME);
        assert_eq!(chunk.count(BlockType::Stone), CHUNK_SIZE * CHUNK_SIZE * 10);
        assert_eq!(chunk.get(BlockCoord::new(3, 9, 3)), STONE);
        assert_eq!(chunk.get(BlockCoord::new(3, 10, 3)), Block::AIR);
    }

    #[test]
    fn test_try_from_fn_stops_on_error() {
        let mut calls = 0;
        let result: Result<ChunkBlocks, &str> = ChunkBlocks::try_from_fn(|c| {
            calls += 1;
            if c.index() == 100 { Err("stop") } else { Ok(Block::AIR) }
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(calls, 101);
    }

    #[test]
    fn test_set_returns_previous() {
        let mut chunk = ChunkBlocks::air();
        let coord = BlockCoord::new(1, 2, 3);
        assert_eq!(chunk.set(coord, STONE), Block::AIR);
        assert_eq!(chunk.get(coord), STONE);
        assert_eq!(chunk.count(BlockType::Stone), 1);
    }

    #[test]
    fn test_iter_matches_get() {
        let chunk = ChunkBlocks::from_fn(|c| if c.x == c.z { STONE } else { Block::AIR });
        for (coord, block) in chunk.iter().step_by(97) {
            assert_eq!(chunk.get(coord), block);
        }
    }

    #[test]
    fn test_spawn_height_skips_water() {
        let chunk = ChunkBlocks::from_fn(|c| match c.y {
            0..=20 => STONE,
            21..=30 => WATER,
            _ => Block::AIR,
        });
        assert_eq!(chunk.spawn_height(4, 4), Some(31));

        let chunk = ChunkBlocks::from_fn(|c| if c.y <= 50 { STONE } else { Block::AIR });
        assert_eq!(chunk.spawn_height(4, 4), Some(51));

        assert_eq!(ChunkBlocks::filled(STONE).spawn_height(0, 0), None);
    }
}
