//! Block model, chunk storage, coordinates and the block atlas.

pub mod atlas;
pub mod block;
pub mod chunk;
pub mod coords;
pub mod direction;

pub use atlas::{AtlasEntry, AtlasError, BlockAtlas, BlockTiles, UV_INSET};
pub use block::{Block, BlockType, ParseBlockTypeError, VERTICES_PER_FACE, face_vertices};
pub use chunk::ChunkBlocks;
pub use coords::{BlockCoord, CHUNK_HEIGHT, CHUNK_SIZE, CHUNK_VOLUME, ChunkCoord, world_cell};
pub use direction::{ChunkDirection, FaceDirection};
