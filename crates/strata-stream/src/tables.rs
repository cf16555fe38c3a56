//! World and active chunk tables.
//!
//! The world table remembers every coordinate ever instantiated this
//! session. Unloading nulls the entry instead of removing it, so "never
//! generated" and "generated then evicted" stay distinguishable.

use std::sync::Arc;

use dashmap::DashMap;
use strata_voxel::ChunkCoord;

use crate::chunk::Chunk;

/// Every chunk created this session, keyed by coordinate.
#[derive(Default)]
pub struct WorldTable {
    chunks: DashMap<ChunkCoord, Option<Arc<Chunk>>>,
}

impl WorldTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes a live entry.
    pub fn insert(&self, chunk: Arc<Chunk>) {
        self.chunks.insert(chunk.coord(), Some(chunk));
    }

    /// The live chunk at `coord`, if one is loaded.
    pub fn get(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.get(&coord).and_then(|entry| entry.value().clone())
    }

    /// `true` if the coordinate was ever instantiated, loaded or not.
    pub fn is_known(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Marks `coord` as evicted, returning the chunk that was loaded there.
    pub fn unload(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.get_mut(&coord).and_then(|mut entry| entry.take())
    }

    /// Number of entries, including evicted ones.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of entries holding a loaded chunk.
    pub fn alive_count(&self) -> usize {
        self.chunks.iter().filter(|e| e.value().is_some()).count()
    }

    /// Coordinates of every loaded chunk.
    pub fn alive_coords(&self) -> Vec<ChunkCoord> {
        self.chunks
            .iter()
            .filter(|e| e.value().is_some())
            .map(|e| *e.key())
            .collect()
    }
}

/// Chunks inside at least one observer's window.
#[derive(Default)]
pub struct ActiveTable {
    chunks: DashMap<ChunkCoord, Arc<Chunk>>,
}

impl ActiveTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, chunk: Arc<Chunk>) {
        self.chunks.insert(chunk.coord(), chunk);
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.get(&coord).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    pub fn clear(&self) {
        self.chunks.clear();
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn coords(&self) -> Vec<ChunkCoord> {
        self.chunks.iter().map(|e| *e.key()).collect()
    }

    /// A world-edge chunk has at least one horizontal neighbour missing
    /// from the table.
    pub fn is_edge(&self, coord: ChunkCoord) -> bool {
        coord.neighbors().iter().any(|n| !self.contains(*n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unload_nulls_instead_of_removing() {
        let world = WorldTable::new();
        let coord = ChunkCoord::new(16, -16);
        world.insert(Arc::new(Chunk::new(coord)));
        assert!(world.get(coord).is_some());
        assert_eq!(world.alive_count(), 1);

        let evicted = world.unload(coord);
        assert_eq!(evicted.map(|c| c.coord()), Some(coord));
        assert!(world.get(coord).is_none());
        assert!(world.is_known(coord));
        assert_eq!(world.len(), 1);
        assert_eq!(world.alive_count(), 0);
        assert!(world.unload(coord).is_none());
    }

    #[test]
    fn test_never_generated_is_unknown() {
        let world = WorldTable::new();
        assert!(!world.is_known(ChunkCoord::new(0, 0)));
        assert!(world.unload(ChunkCoord::new(0, 0)).is_none());
    }

    #[test]
    fn test_edge_predicate() {
        let active = ActiveTable::new();
        for coord in ChunkCoord::new(0, 0).window(1) {
            active.insert(Arc::new(Chunk::new(coord)));
        }
        assert_eq!(active.len(), 9);
        assert!(!active.is_edge(ChunkCoord::new(0, 0)));
        assert!(active.is_edge(ChunkCoord::new(16, 0)));
        assert!(active.is_edge(ChunkCoord::new(-16, -16)));
    }
}
