//! The finished mesh handed to the rendering backend.
//!
//! Opaque and translucent layers are concatenated into one vertex/UV list
//! with two triangle lists (submeshes). Translucent indices are shifted by
//! the opaque vertex count so both submeshes index the shared list.

use glam::{Vec2, Vec3};

use crate::chunk_mesh::ChunkMeshData;

/// Interleaved vertex layout for GPU upload: position, normal, UV.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SubmittedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

static_assertions::assert_eq_size!(SubmittedVertex, [u8; 32]);

/// Axis-aligned bounds of a mesh in chunk-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl MeshBounds {
    /// Bounds of `points`, or `None` when there are none.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self { min, max })
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// A two-submesh mesh ready for the rendering backend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmittedMesh {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    /// Submesh 0.
    pub opaque_triangles: Vec<u32>,
    /// Submesh 1, already offset into the shared vertex list.
    pub translucent_triangles: Vec<u32>,
    pub bounds: Option<MeshBounds>,
}

impl SubmittedMesh {
    /// Concatenates both layers of `data`, leaving its buffers empty.
    pub fn take_from(data: &mut ChunkMeshData) -> Self {
        let opaque = std::mem::take(&mut data.opaque);
        let translucent = std::mem::take(&mut data.translucent);
        data.clear();

        let offset = opaque.vertex_count() as u32;
        let mut vertices = opaque.vertices;
        vertices.extend(translucent.vertices);
        let mut uvs = opaque.uvs;
        uvs.extend(translucent.uvs);
        let translucent_triangles = translucent.triangles.iter().map(|i| i + offset).collect();

        let mut mesh = Self {
            vertices,
            uvs,
            normals: Vec::new(),
            opaque_triangles: opaque.triangles,
            translucent_triangles,
            bounds: None,
        };
        mesh.recalculate_normals();
        mesh.bounds = MeshBounds::from_points(&mesh.vertices);
        mesh
    }

    /// Area-weighted vertex normals over both submeshes.
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];
        for tri in self
            .opaque_triangles
            .chunks_exact(3)
            .chain(self.translucent_triangles.chunks_exact(3))
        {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (Some(pa), Some(pb), Some(pc)) =
                (self.vertices.get(a), self.vertices.get(b), self.vertices.get(c))
            else {
                tracing::error!(a, b, c, "triangle references a missing vertex");
                continue;
            };
            let face = (*pb - *pa).cross(*pc - *pa);
            for i in [a, b, c] {
                normals[i] += face;
            }
        }
        self.normals = normals.into_iter().map(|n| n.normalize_or_zero()).collect();
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        (self.opaque_triangles.len() + self.translucent_triangles.len()) / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Interleaved vertex data in [`SubmittedVertex`] layout.
    pub fn interleaved(&self) -> Vec<SubmittedVertex> {
        self.vertices
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((p, n), uv)| SubmittedVertex {
                position: p.to_array(),
                normal: n.to_array(),
                uv: uv.to_array(),
            })
            .collect()
    }

    /// Raw bytes of [`interleaved`](Self::interleaved), ready for a vertex buffer.
    pub fn vertex_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.interleaved()).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use strata_voxel::FaceDirection;

    use super::*;
    use crate::chunk_mesh::MeshBuffer;

    fn quad_buffer(center: Vec3, dir: FaceDirection) -> MeshBuffer {
        let mut buf = MeshBuffer::new();
        buf.push_face(center, dir, [Vec2::ZERO; 4]);
        buf
    }

    #[test]
    fn test_translucent_indices_are_offset() {
        let mut data = ChunkMeshData::new();
        data.opaque = quad_buffer(Vec3::ZERO, FaceDirection::Top);
        data.opaque
            .push_face(Vec3::X, FaceDirection::Top, [Vec2::ZERO; 4]);
        data.translucent = quad_buffer(Vec3::Y, FaceDirection::Top);

        let mesh = SubmittedMesh::take_from(&mut data);
        assert_eq!(mesh.vertex_count(), 12);
        assert_eq!(mesh.opaque_triangles.len(), 12);
        assert_eq!(mesh.translucent_triangles, vec![8, 9, 10, 8, 10, 11]);
        assert_eq!(mesh.triangle_count(), 6);
        assert_eq!(data.vertex_count(), 0);
        assert!(!data.is_ready());
    }

    #[test]
    fn test_normals_follow_face_direction() {
        for dir in FaceDirection::ALL {
            let mut data = ChunkMeshData::new();
            data.opaque = quad_buffer(Vec3::splat(3.0), dir);
            let mesh = SubmittedMesh::take_from(&mut data);
            for n in &mesh.normals {
                assert!(n.dot(dir.normal()) > 0.99, "{dir:?} {n}");
            }
        }
    }

    #[test]
    fn test_bounds_cover_unit_cube_faces() {
        let mut data = ChunkMeshData::new();
        for dir in FaceDirection::ALL {
            data.opaque.push_face(Vec3::new(2.0, 5.0, 2.0), dir, [Vec2::ZERO; 4]);
        }
        let mesh = SubmittedMesh::take_from(&mut data);
        let bounds = mesh.bounds.unwrap();
        assert_eq!(bounds.min, Vec3::new(1.5, 4.5, 1.5));
        assert_eq!(bounds.size(), Vec3::ONE);
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        let mesh = SubmittedMesh::take_from(&mut ChunkMeshData::new());
        assert!(mesh.is_empty());
        assert_eq!(mesh.bounds, None);
    }

    #[test]
    fn test_vertex_bytes_length() {
        let mut data = ChunkMeshData::new();
        data.opaque = quad_buffer(Vec3::ZERO, FaceDirection::North);
        let mesh = SubmittedMesh::take_from(&mut data);
        assert_eq!(mesh.vertex_bytes().len(), 4 * std::mem::size_of::<SubmittedVertex>());
    }
}
