use strata_voxel::{AtlasError, ChunkCoord};
use thiserror::Error;

/// Errors raised while building a chunk mesh.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    /// A face needed UVs for a block type the atlas does not know.
    #[error("atlas lookup failed while meshing: {0}")]
    Atlas(#[from] AtlasError),
    /// The cancellation flag was raised mid-build.
    #[error("meshing of chunk {0:?} was cancelled")]
    Cancelled(ChunkCoord),
}
