//! Chunk meshing: face culling, opaque/translucent mesh buffers and the
//! submission payload handed to the rendering backend.

pub mod chunk_mesh;
pub mod error;
pub mod neighborhood;
pub mod submission;
pub mod visibility;
pub mod visible_faces;

pub use chunk_mesh::{ChunkMeshData, MeshBuffer, MeshLayer, build_chunk_mesh};
pub use error::MeshError;
pub use neighborhood::{BoundarySlice, ChunkNeighborhood};
pub use submission::{MeshBounds, SubmittedMesh, SubmittedVertex};
pub use visibility::{compute_visible_faces, count_visible_faces, is_face_hidden, visible_faces};
pub use visible_faces::VisibleFaces;
