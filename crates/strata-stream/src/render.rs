//! Rendering backend interface.
//!
//! The engine never touches a graphics API. Finished meshes and chunk
//! visuals go through a [`RenderBackend`] owned by the thread that drives
//! [`Engine::tick`](crate::Engine::tick).

use rustc_hash::FxHashMap;
use strata_mesh::SubmittedMesh;
use strata_voxel::ChunkCoord;

/// Backend handle to a submitted mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Backend handle to a chunk's visual object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VisualHandle(pub u64);

/// Consumer of finished chunk geometry.
pub trait RenderBackend {
    /// Takes ownership of a finished mesh for the chunk at `coord`.
    fn submit_mesh(&mut self, coord: ChunkCoord, mesh: SubmittedMesh) -> MeshHandle;
    /// Frees a mesh previously returned by [`submit_mesh`](Self::submit_mesh).
    fn release_mesh(&mut self, handle: MeshHandle);
    /// Creates the visual object for a newly instantiated chunk.
    fn attach_visual(&mut self, coord: ChunkCoord) -> VisualHandle;
    /// Destroys a chunk's visual object.
    fn detach_visual(&mut self, handle: VisualHandle);
}

/// What a [`RecordingBackend`] knows about one submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub coord: ChunkCoord,
    pub handle: MeshHandle,
    pub vertex_count: usize,
    pub opaque_triangles: usize,
    pub translucent_triangles: usize,
}

/// In-memory backend that keeps counts and the latest submission per chunk.
///
/// Used by headless runs and tests.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u64,
    live_meshes: FxHashMap<MeshHandle, ChunkCoord>,
    live_visuals: FxHashMap<VisualHandle, ChunkCoord>,
    latest: FxHashMap<ChunkCoord, SubmissionRecord>,
    submissions: Vec<SubmissionRecord>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Every submission in order.
    pub fn submissions(&self) -> &[SubmissionRecord] {
        &self.submissions
    }

    /// Number of submissions made for `coord`.
    pub fn submission_count(&self, coord: ChunkCoord) -> usize {
        self.submissions.iter().filter(|s| s.coord == coord).count()
    }

    /// The most recent submission for `coord`.
    pub fn latest(&self, coord: ChunkCoord) -> Option<&SubmissionRecord> {
        self.latest.get(&coord)
    }

    pub fn live_mesh_count(&self) -> usize {
        self.live_meshes.len()
    }

    pub fn live_visual_count(&self) -> usize {
        self.live_visuals.len()
    }

    /// `true` if `coord` has a visual that was not detached.
    pub fn has_visual(&self, coord: ChunkCoord) -> bool {
        self.live_visuals.values().any(|c| *c == coord)
    }
}

impl RenderBackend for RecordingBackend {
    fn submit_mesh(&mut self, coord: ChunkCoord, mesh: SubmittedMesh) -> MeshHandle {
        let handle = MeshHandle(self.next());
        let record = SubmissionRecord {
            coord,
            handle,
            vertex_count: mesh.vertex_count(),
            opaque_triangles: mesh.opaque_triangles.len() / 3,
            translucent_triangles: mesh.translucent_triangles.len() / 3,
        };
        self.live_meshes.insert(handle, coord);
        self.latest.insert(coord, record);
        self.submissions.push(record);
        handle
    }

    fn release_mesh(&mut self, handle: MeshHandle) {
        if self.live_meshes.remove(&handle).is_none() {
            tracing::warn!(?handle, "released an unknown mesh handle");
        }
    }

    fn attach_visual(&mut self, coord: ChunkCoord) -> VisualHandle {
        let handle = VisualHandle(self.next());
        self.live_visuals.insert(handle, coord);
        handle
    }

    fn detach_visual(&mut self, handle: VisualHandle) {
        if self.live_visuals.remove(&handle).is_none() {
            tracing::warn!(?handle, "detached an unknown visual handle");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_backend_tracks_live_handles() {
        let mut backend = RecordingBackend::new();
        let coord = ChunkCoord::new(0, 16);
        let visual = backend.attach_visual(coord);
        let first = backend.submit_mesh(coord, SubmittedMesh::default());
        let second = backend.submit_mesh(coord, SubmittedMesh::default());
        assert_ne!(first, second);
        assert_eq!(backend.submission_count(coord), 2);
        assert_eq!(backend.latest(coord).map(|r| r.handle), Some(second));

        backend.release_mesh(first);
        assert_eq!(backend.live_mesh_count(), 1);
        assert!(backend.has_visual(coord));
        backend.detach_visual(visual);
        assert!(!backend.has_visual(coord));
    }
}
