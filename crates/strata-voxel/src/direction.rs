//! Face and chunk directions, and the offsets they map to.
//!
//! Conventions: North is +Z, East is +X, South is −Z, West is −X, Top is +Y,
//! Bottom is −Y.

use glam::{IVec2, IVec3, Vec3};

use crate::coords::CHUNK_SIZE;

/// One of the six directions a block face can point.
///
/// The `repr(u8)` discriminant doubles as the bit index of a face bitmask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FaceDirection {
    /// +Z.
    North = 0,
    /// +X.
    East = 1,
    /// −Z.
    South = 2,
    /// −X.
    West = 3,
    /// +Y.
    Top = 4,
    /// −Y.
    Bottom = 5,
}

impl FaceDirection {
    /// All six directions in emission order.
    pub const ALL: [FaceDirection; 6] = [
        Self::North,
        Self::East,
        Self::South,
        Self::West,
        Self::Top,
        Self::Bottom,
    ];

    /// Unit offset to the neighbouring block in this direction.
    pub fn offset(self) -> IVec3 {
        match self {
            Self::North => IVec3::new(0, 0, 1),
            Self::East => IVec3::new(1, 0, 0),
            Self::South => IVec3::new(0, 0, -1),
            Self::West => IVec3::new(-1, 0, 0),
            Self::Top => IVec3::new(0, 1, 0),
            Self::Bottom => IVec3::new(0, -1, 0),
        }
    }

    /// Returns the unit normal for this face.
    pub fn normal(self) -> Vec3 {
        self.offset().as_vec3()
    }

    /// Returns the opposite face direction.
    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }

    /// The chunk direction this face points towards, if it is horizontal.
    pub fn chunk_direction(self) -> Option<ChunkDirection> {
        match self {
            Self::North => Some(ChunkDirection::North),
            Self::East => Some(ChunkDirection::East),
            Self::South => Some(ChunkDirection::South),
            Self::West => Some(ChunkDirection::West),
            Self::Top | Self::Bottom => None,
        }
    }

    /// Returns the direction index (0–5).
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One of the four horizontal directions between adjacent chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkDirection {
    /// +Z.
    North = 0,
    /// +X.
    East = 1,
    /// −Z.
    South = 2,
    /// −X.
    West = 3,
}

impl ChunkDirection {
    /// All four chunk directions.
    pub const ALL: [ChunkDirection; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// World-space offset, in blocks, from a chunk origin to its neighbour's origin.
    pub fn offset(self) -> IVec2 {
        let size = CHUNK_SIZE as i32;
        match self {
            Self::North => IVec2::new(0, size),
            Self::East => IVec2::new(size, 0),
            Self::South => IVec2::new(0, -size),
            Self::West => IVec2::new(-size, 0),
        }
    }

    /// The block face that points across this chunk border.
    pub fn face(self) -> FaceDirection {
        match self {
            Self::North => FaceDirection::North,
            Self::East => FaceDirection::East,
            Self::South => FaceDirection::South,
            Self::West => FaceDirection::West,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_is_involution() {
        for dir in FaceDirection::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(dir.offset() + dir.opposite().offset(), IVec3::ZERO);
        }
    }

    #[test]
    fn test_indices_are_unique_and_dense() {
        let mut seen = [false; 6];
        for dir in FaceDirection::ALL {
            assert!(!seen[dir.index()]);
            seen[dir.index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_chunk_offsets_are_one_chunk_apart() {
        for dir in ChunkDirection::ALL {
            let off = dir.offset();
            assert_eq!(off.x.abs() + off.y.abs(), CHUNK_SIZE as i32);
        }
        assert_eq!(ChunkDirection::North.offset(), IVec2::new(0, 16));
        assert_eq!(ChunkDirection::West.offset(), IVec2::new(-16, 0));
    }

    #[test]
    fn test_horizontal_faces_map_to_chunk_directions() {
        for dir in ChunkDirection::ALL {
            assert_eq!(dir.face().chunk_direction(), Some(dir));
            let face = dir.face().offset();
            let chunk = dir.offset() / CHUNK_SIZE as i32;
            assert_eq!((face.x, face.z), (chunk.x, chunk.y));
        }
        assert_eq!(FaceDirection::Top.chunk_direction(), None);
        assert_eq!(FaceDirection::Bottom.chunk_direction(), None);
    }
}
