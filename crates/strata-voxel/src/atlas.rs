//! Block atlas: per-type texture tiles and solidity.
//!
//! The atlas is built once at startup from configuration and shared
//! read-only by generation and meshing. A block type missing from the
//! atlas is a configuration error; construction fails rather than letting
//! a half-configured atlas reach the workers.

use glam::{UVec2, Vec2};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::block::{Block, BlockType, ParseBlockTypeError};
use crate::direction::FaceDirection;

/// Inset applied to every UV so neighbouring atlas tiles never bleed in.
pub const UV_INSET: f32 = 0.001;

/// Atlas tiles used by the faces of one block type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockTiles {
    /// Tile for the +Y face.
    pub top: UVec2,
    /// Tile for the −Y face.
    pub bottom: UVec2,
    /// Tile for the four horizontal faces.
    pub side: UVec2,
}

impl BlockTiles {
    /// Same tile on every face.
    pub fn uniform(tile: UVec2) -> Self {
        Self {
            top: tile,
            bottom: tile,
            side: tile,
        }
    }

    /// Tile for the face pointing in `direction`.
    pub fn for_face(&self, direction: FaceDirection) -> UVec2 {
        match direction {
            FaceDirection::Top => self.top,
            FaceDirection::Bottom => self.bottom,
            _ => self.side,
        }
    }
}

/// Atlas entry for one block type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasEntry {
    pub tiles: BlockTiles,
    pub solid: bool,
}

/// Errors raised while building or querying a [`BlockAtlas`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AtlasError {
    /// No entry was configured for a block type.
    #[error("block type {0} has no atlas entry")]
    MissingBlockType(BlockType),
    /// A configured entry names an unknown block type.
    #[error(transparent)]
    UnknownBlockName(#[from] ParseBlockTypeError),
    /// Tile size components must be positive and at most 1.
    #[error("invalid atlas tile size {0}")]
    InvalidTileSize(Vec2),
}

/// Texture tiles and solidity for every [`BlockType`].
#[derive(Clone, Debug)]
pub struct BlockAtlas {
    tile_size: Vec2,
    entries: FxHashMap<BlockType, AtlasEntry>,
}

impl BlockAtlas {
    /// Builds an atlas, failing if any non-air block type lacks an entry.
    ///
    /// Air gets a non-solid entry when none is supplied, and is forced
    /// non-solid when one is.
    pub fn new(
        tile_size: Vec2,
        entries: impl IntoIterator<Item = (BlockType, AtlasEntry)>,
    ) -> Result<Self, AtlasError> {
        let valid = |c: f32| c > 0.0 && c <= 1.0;
        if !valid(tile_size.x) || !valid(tile_size.y) {
            return Err(AtlasError::InvalidTileSize(tile_size));
        }

        let mut map = FxHashMap::default();
        for (kind, entry) in entries {
            if map.insert(kind, entry).is_some() {
                tracing::warn!(block = %kind, "duplicate atlas entry, keeping the last one");
            }
        }

        let air = map.entry(BlockType::Air).or_insert(AtlasEntry {
            tiles: BlockTiles::uniform(UVec2::ZERO),
            solid: false,
        });
        if air.solid {
            tracing::warn!("air configured as solid, overriding to non-solid");
            air.solid = false;
        }

        if let Some(missing) = BlockType::ALL.into_iter().find(|t| !map.contains_key(t)) {
            tracing::error!(block = %missing, "block atlas is incomplete");
            return Err(AtlasError::MissingBlockType(missing));
        }

        Ok(Self {
            tile_size,
            entries: map,
        })
    }

    /// Builds an atlas from `(name, tiles, solid)` triples as found in config files.
    pub fn from_named<'a>(
        tile_size: Vec2,
        entries: impl IntoIterator<Item = (&'a str, BlockTiles, bool)>,
    ) -> Result<Self, AtlasError> {
        let parsed = entries
            .into_iter()
            .map(|(name, tiles, solid)| -> Result<_, AtlasError> {
                Ok((name.parse::<BlockType>()?, AtlasEntry { tiles, solid }))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tile_size, parsed)
    }

    /// Size of one tile in UV space.
    pub fn tile_size(&self) -> Vec2 {
        self.tile_size
    }

    /// The entry for `kind`.
    pub fn entry(&self, kind: BlockType) -> Result<&AtlasEntry, AtlasError> {
        self.entries
            .get(&kind)
            .ok_or(AtlasError::MissingBlockType(kind))
    }

    /// A block value of `kind` with its configured solidity.
    pub fn block(&self, kind: BlockType) -> Result<Block, AtlasError> {
        if kind == BlockType::Air {
            return Ok(Block::AIR);
        }
        self.entry(kind).map(|e| Block::new(kind, e.solid))
    }

    /// The four UVs of a face, matching the corner order of
    /// [`face_vertices`](crate::face_vertices).
    pub fn face_uvs(
        &self,
        direction: FaceDirection,
        kind: BlockType,
    ) -> Result<[Vec2; 4], AtlasError> {
        let tile = self.entry(kind)?.tiles.for_face(direction).as_vec2();
        let size = self.tile_size;
        let min = tile * size;
        let max = min + size;
        Ok([
            Vec2::new(max.x - UV_INSET, max.y - UV_INSET),
            Vec2::new(min.x + UV_INSET, max.y - UV_INSET),
            Vec2::new(min.x + UV_INSET, min.y + UV_INSET),
            Vec2::new(max.x - UV_INSET, min.y + UV_INSET),
        ])
    }
}
