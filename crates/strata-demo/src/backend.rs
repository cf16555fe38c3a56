//! Headless render backend that logs submissions and keeps totals.

use rustc_hash::FxHashMap;
use strata_mesh::SubmittedMesh;
use strata_stream::{MeshHandle, RenderBackend, VisualHandle};
use strata_voxel::ChunkCoord;

#[derive(Debug, Default)]
pub struct LoggingBackend {
    next_id: u64,
    meshes: FxHashMap<MeshHandle, usize>,
    visuals: FxHashMap<VisualHandle, ChunkCoord>,
    pub submissions: usize,
    pub uploaded_bytes: usize,
}

impl LoggingBackend {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_visuals(&self) -> usize {
        self.visuals.len()
    }

    /// Bytes held by meshes that were not released.
    pub fn resident_bytes(&self) -> usize {
        self.meshes.values().sum()
    }
}

impl RenderBackend for LoggingBackend {
    fn submit_mesh(&mut self, coord: ChunkCoord, mesh: SubmittedMesh) -> MeshHandle {
        let handle = MeshHandle(self.next());
        let bytes = mesh.vertex_bytes().len() + mesh.triangle_count() * 3 * size_of::<u32>();
        tracing::debug!(
            chunk = ?coord,
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            bytes,
            "mesh submitted"
        );
        self.meshes.insert(handle, bytes);
        self.submissions += 1;
        self.uploaded_bytes += bytes;
        handle
    }

    fn release_mesh(&mut self, handle: MeshHandle) {
        self.meshes.remove(&handle);
    }

    fn attach_visual(&mut self, coord: ChunkCoord) -> VisualHandle {
        let handle = VisualHandle(self.next());
        self.visuals.insert(handle, coord);
        handle
    }

    fn detach_visual(&mut self, handle: VisualHandle) {
        if let Some(coord) = self.visuals.remove(&handle) {
            tracing::trace!(chunk = ?coord, "visual detached");
        }
    }
}
