//! Block types, block values and the per-face cube geometry table.

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::direction::FaceDirection;

/// Number of vertices emitted per visible face.
pub const VERTICES_PER_FACE: usize = 4;

/// Kind of block stored in a chunk cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Air,
    Dirt,
    Grass,
    Stone,
    Sand,
    Water,
}

impl BlockType {
    /// Every block type.
    pub const ALL: [BlockType; 6] = [
        Self::Air,
        Self::Dirt,
        Self::Grass,
        Self::Stone,
        Self::Sand,
        Self::Water,
    ];

    /// Lowercase name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            Self::Air => "air",
            Self::Dirt => "dirt",
            Self::Grass => "grass",
            Self::Stone => "stone",
            Self::Sand => "sand",
            Self::Water => "water",
        }
    }

    /// Fluids go to the translucent mesh and never render faces against each other.
    pub fn is_fluid(self) -> bool {
        matches!(self, Self::Water)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a configuration names a block type that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown block type name: {0:?}")]
pub struct ParseBlockTypeError(pub String);

impl FromStr for BlockType {
    type Err = ParseBlockTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseBlockTypeError(s.to_string()))
    }
}

/// A block value: its type plus whether it occludes neighbours.
///
/// Stored by value in chunk storage. Solidity comes from the block atlas so
/// it stays configurable per type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockType,
    pub solid: bool,
}

impl Block {
    /// The air sentinel.
    pub const AIR: Block = Block {
        kind: BlockType::Air,
        solid: false,
    };

    pub const fn new(kind: BlockType, solid: bool) -> Self {
        Self { kind, solid }
    }

    pub fn is_air(self) -> bool {
        self.kind == BlockType::Air
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::AIR
    }
}

// ---------------------------------------------------------------------------
// Face geometry
// ---------------------------------------------------------------------------

/// Cube corners around a block center, scaled by 0.5 when emitted.
const CUBE_CORNERS: [Vec3; 8] = [
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(-1.0, 1.0, 1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(1.0, -1.0, 1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(1.0, 1.0, -1.0),
    Vec3::new(1.0, -1.0, -1.0),
    Vec3::new(-1.0, -1.0, -1.0),
];

/// Corner indices per face, in [`FaceDirection`] discriminant order.
///
/// Triangles `(0, 1, 2)` and `(0, 2, 3)` of every quad wind counter-clockwise
/// around the outward normal.
const FACE_CORNERS: [[usize; 4]; 6] = [
    [0, 1, 2, 3],
    [5, 0, 3, 6],
    [4, 5, 6, 7],
    [1, 4, 7, 2],
    [5, 4, 1, 0],
    [3, 2, 7, 6],
];

/// The four corner offsets of a face, relative to the block center.
pub fn face_vertices(direction: FaceDirection) -> [Vec3; 4] {
    FACE_CORNERS[direction.index()].map(|corner| CUBE_CORNERS[corner] * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_case_insensitive() {
        assert_eq!("grass".parse::<BlockType>(), Ok(BlockType::Grass));
        assert_eq!(" Water ".parse::<BlockType>(), Ok(BlockType::Water));
        assert!("lava".parse::<BlockType>().is_err());
        for t in BlockType::ALL {
            assert_eq!(t.name().parse::<BlockType>(), Ok(t));
        }
    }

    #[test]
    fn test_air_sentinel() {
        assert!(Block::AIR.is_air());
        assert!(!Block::AIR.solid);
        assert_eq!(Block::default(), Block::AIR);
    }

    #[test]
    fn test_only_water_is_fluid() {
        let fluids: Vec<_> = BlockType::ALL.into_iter().filter(|t| t.is_fluid()).collect();
        assert_eq!(fluids, vec![BlockType::Water]);
    }

    #[test]
    fn test_face_vertices_lie_on_face_plane() {
        for dir in FaceDirection::ALL {
            let normal = dir.normal();
            for v in face_vertices(dir) {
                assert!((v.dot(normal) - 0.5).abs() < 1e-6, "{dir:?} vertex {v}");
            }
        }
    }

    #[test]
    fn test_face_winding_points_outward() {
        for dir in FaceDirection::ALL {
            let [a, b, c, _] = face_vertices(dir);
            let winding = (b - a).cross(c - a).normalize();
            assert!(winding.dot(dir.normal()) > 0.99, "{dir:?}");
        }
    }
}
