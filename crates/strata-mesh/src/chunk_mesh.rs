//! Per-chunk mesh buffers and the face-culling mesh builder.
//!
//! A chunk owns one [`ChunkMeshData`]: an opaque and a translucent
//! [`MeshBuffer`], each with its own running vertex index. The builder
//! clears both, emits one quad per visible face, routes fluid faces to the
//! translucent layer, then rebases every vertex from world space into
//! chunk-local space.

use std::sync::atomic::{AtomicBool, Ordering};

use glam::{Vec2, Vec3};
use strata_voxel::{
    BlockAtlas, BlockCoord, CHUNK_HEIGHT, CHUNK_SIZE, ChunkBlocks, ChunkCoord, FaceDirection,
    VERTICES_PER_FACE, face_vertices,
};

use crate::error::MeshError;
use crate::neighborhood::ChunkNeighborhood;
use crate::visibility::visible_faces;

/// Triangle indices of one quad, relative to its first vertex.
const QUAD_TRIANGLES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Which submesh a face belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshLayer {
    Opaque,
    Translucent,
}

// ---------------------------------------------------------------------------
// MeshBuffer
// ---------------------------------------------------------------------------

/// Vertex, triangle and UV lists for one layer of a chunk mesh.
///
/// Triangle indices always reference vertices already pushed to this
/// buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffer {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<u32>,
    pub uvs: Vec<Vec2>,
    vertex_index: u32,
}

impl MeshBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one quad centred on `center` facing `direction`.
    pub fn push_face(&mut self, center: Vec3, direction: FaceDirection, uvs: [Vec2; 4]) {
        let base = self.vertex_index;
        self.vertices
            .extend(face_vertices(direction).map(|corner| center + corner));
        self.triangles.extend(QUAD_TRIANGLES.map(|i| base + i));
        self.uvs.extend(uvs);
        self.vertex_index += VERTICES_PER_FACE as u32;
    }

    /// Empties every list and resets the vertex index.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.triangles.clear();
        self.uvs.clear();
        self.vertex_index = 0;
    }

    /// Subtracts `origin` from every vertex.
    pub fn rebase(&mut self, origin: Vec3) {
        for v in &mut self.vertices {
            *v -= origin;
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_FACE
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ChunkMeshData
// ---------------------------------------------------------------------------

/// Both mesh layers of a chunk plus the build-complete flag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMeshData {
    pub opaque: MeshBuffer,
    pub translucent: MeshBuffer,
    ready: bool,
}

impl ChunkMeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, layer: MeshLayer) -> &MeshBuffer {
        match layer {
            MeshLayer::Opaque => &self.opaque,
            MeshLayer::Translucent => &self.translucent,
        }
    }

    pub fn layer_mut(&mut self, layer: MeshLayer) -> &mut MeshBuffer {
        match layer {
            MeshLayer::Opaque => &mut self.opaque,
            MeshLayer::Translucent => &mut self.translucent,
        }
    }

    /// Clears both layers and drops the ready flag.
    pub fn clear(&mut self) {
        self.opaque.clear();
        self.translucent.clear();
        self.ready = false;
    }

    /// `true` once a build has completed and until the next clear.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn vertex_count(&self) -> usize {
        self.opaque.vertex_count() + self.translucent.vertex_count()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Rebuilds `mesh` from a chunk's blocks.
///
/// `cancel` is checked once per Z layer. On error the buffers are left
/// cleared and not ready.
pub fn build_chunk_mesh(
    coord: ChunkCoord,
    blocks: &ChunkBlocks,
    neighbors: &ChunkNeighborhood,
    atlas: &BlockAtlas,
    mesh: &mut ChunkMeshData,
    cancel: &AtomicBool,
) -> Result<(), MeshError> {
    mesh.clear();
    let origin = coord.origin().as_vec3();

    let result = emit_faces(coord, blocks, neighbors, atlas, mesh, cancel);
    if let Err(err) = result {
        mesh.clear();
        return Err(err);
    }

    mesh.opaque.rebase(origin);
    mesh.translucent.rebase(origin);
    mesh.ready = true;

    tracing::trace!(
        chunk = ?coord,
        opaque_faces = mesh.opaque.face_count(),
        translucent_faces = mesh.translucent.face_count(),
        "chunk mesh built"
    );
    Ok(())
}

fn emit_faces(
    coord: ChunkCoord,
    blocks: &ChunkBlocks,
    neighbors: &ChunkNeighborhood,
    atlas: &BlockAtlas,
    mesh: &mut ChunkMeshData,
    cancel: &AtomicBool,
) -> Result<(), MeshError> {
    let layer_len = CHUNK_SIZE * CHUNK_HEIGHT;
    for (i, (local, block)) in blocks.iter().enumerate() {
        if i % layer_len == 0 && cancel.load(Ordering::Relaxed) {
            tracing::debug!(chunk = ?coord, "mesh build cancelled");
            return Err(MeshError::Cancelled(coord));
        }
        if block.is_air() {
            continue;
        }
        let faces = visible_faces(blocks, neighbors, local);
        if faces.is_empty() {
            continue;
        }

        let layer = if block.kind.is_fluid() {
            MeshLayer::Translucent
        } else {
            MeshLayer::Opaque
        };
        let center = world_center(coord, local);
        for dir in faces.iter() {
            let uvs = atlas.face_uvs(dir, block.kind)?;
            mesh.layer_mut(layer).push_face(center, dir, uvs);
        }
    }
    Ok(())
}

fn world_center(coord: ChunkCoord, local: BlockCoord) -> Vec3 {
    coord.world_position(local).as_vec3()
}
