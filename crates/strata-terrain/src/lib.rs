//! Procedural terrain: seed resolution, layered height noise and block classification.

mod generator;
mod heightmap;
mod seed;

pub use generator::{GenerationError, TerrainGenerator, classify};
pub use heightmap::{HeightmapSampler, NoiseParams};
pub use seed::{RANDOM_SEED_RANGE, WorldSeed, resolve_seed, resolve_seed_with};
