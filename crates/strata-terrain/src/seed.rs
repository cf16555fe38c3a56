//! World seed resolution.
//!
//! The seed never feeds the noise function directly. It selects a horizontal
//! offset into the noise field, so every session samples a different region
//! of the same infinite terrain.

use glam::IVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_config::WorldConfig;

/// Range random seeds are drawn from.
pub const RANDOM_SEED_RANGE: std::ops::Range<i32> = -16_000..16_000;

/// The seed in effect for a session and the noise offset derived from it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldSeed {
    pub seed: i32,
    pub offset: IVec2,
}

/// Resolves the session seed using the thread RNG for random seeds.
pub fn resolve_seed(config: &WorldConfig) -> WorldSeed {
    resolve_seed_with(config, &mut rand::rng())
}

/// Resolves the session seed, drawing random seeds from `rng`.
pub fn resolve_seed_with(config: &WorldConfig, rng: &mut impl Rng) -> WorldSeed {
    let resolved = if config.use_random_seed {
        let seed = rng.random_range(RANDOM_SEED_RANGE);
        WorldSeed {
            seed,
            offset: offset_from_seed(seed),
        }
    } else {
        let [x, z] = config.seed_offset;
        let offset = if x == 0 && z == 0 {
            IVec2::splat(config.seed)
        } else {
            IVec2::new(x, z)
        };
        WorldSeed {
            seed: config.seed,
            offset,
        }
    };

    tracing::info!(
        seed = resolved.seed,
        offset_x = resolved.offset.x,
        offset_z = resolved.offset.y,
        random = config.use_random_seed,
        "world seed resolved"
    );
    resolved
}

/// Deterministic offset in `[-|seed|, |seed|)` on both axes.
fn offset_from_seed(seed: i32) -> IVec2 {
    let bound = seed.unsigned_abs() as i32;
    if bound == 0 {
        return IVec2::ZERO;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed as i64 as u64);
    IVec2::new(rng.random_range(-bound..bound), rng.random_range(-bound..bound))
}
