//! Visible face detection: decides which block faces need geometry, inside
//! the chunk and across its four borders.

use strata_voxel::{Block, BlockCoord, ChunkBlocks, FaceDirection};

use crate::neighborhood::ChunkNeighborhood;
use crate::visible_faces::VisibleFaces;

/// Returns `true` if the face of `source` touching `neighbor` is culled.
///
/// A solid neighbour always hides the face. A non-solid source is also
/// hidden by any non-air neighbour, so two fluid blocks never render the
/// face between them. A solid source stays visible against air and fluid.
pub fn is_face_hidden(source: Block, neighbor: Block) -> bool {
    neighbor.solid || (!source.solid && !neighbor.is_air())
}

/// Visibility mask of the block at `coord`.
///
/// Faces crossing a horizontal border are resolved against `neighbors`.
/// The bottom face of the lowest layer is always hidden and the top face of
/// the highest layer always faces air.
pub fn visible_faces(
    blocks: &ChunkBlocks,
    neighbors: &ChunkNeighborhood,
    coord: BlockCoord,
) -> VisibleFaces {
    let source = blocks.get(coord);
    let mut faces = VisibleFaces::NONE;
    if source.is_air() {
        return faces;
    }

    for dir in FaceDirection::ALL {
        let neighbor = match coord.neighbor(dir) {
            Some(inner) => Some(blocks.get(inner)),
            None => match dir.chunk_direction() {
                Some(chunk_dir) => Some(neighbors.block_across(coord, chunk_dir)),
                None if dir == FaceDirection::Top => Some(Block::AIR),
                None => None,
            },
        };
        if let Some(neighbor) = neighbor
            && !is_face_hidden(source, neighbor)
        {
            faces.set_visible(dir);
        }
    }
    faces
}

/// Per-block visibility for a whole chunk, in storage order.
pub fn compute_visible_faces(blocks: &ChunkBlocks, neighbors: &ChunkNeighborhood) -> Vec<VisibleFaces> {
    BlockCoord::all()
        .map(|coord| visible_faces(blocks, neighbors, coord))
        .collect()
}

/// Counts the total number of visible faces in a visibility array.
pub fn count_visible_faces(faces: &[VisibleFaces]) -> u32 {
    faces.iter().map(|vf| vf.count()).sum()
}
