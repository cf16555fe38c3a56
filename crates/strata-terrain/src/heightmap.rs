//! Multi-octave Perlin height sampler.
//!
//! Produces a normalized `[0, 1]` value per world column, redistributes it,
//! then maps it to an integer surface height inside the chunk column.

use glam::IVec2;
use noise::{NoiseFn, Perlin};
use strata_config::NoiseConfig;
use strata_voxel::CHUNK_HEIGHT;

use crate::seed::WorldSeed;

/// Parameters of the layered noise sum.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseParams {
    /// Scale applied to world coordinates before sampling.
    pub zoom: f64,
    /// Number of octaves. Each octave doubles the frequency.
    pub octaves: u32,
    /// Amplitude multiplier between successive octaves.
    pub persistence: f64,
    /// Seed-derived offset shared by every sample in the session.
    pub world_offset: IVec2,
    /// Fixed offset from configuration.
    pub offset: IVec2,
    /// Multiplier applied before the redistribution exponent.
    pub redistribution_modifier: f64,
    /// Redistribution exponent. Values above 1 flatten valleys.
    pub exponent: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self::from_config(&NoiseConfig::default(), &WorldSeed::default())
    }
}

impl NoiseParams {
    /// Combines noise configuration with the resolved world seed.
    pub fn from_config(config: &NoiseConfig, seed: &WorldSeed) -> Self {
        let [ox, oz] = config.offset;
        let [wx, wz] = config.world_offset;
        Self {
            zoom: config.zoom,
            octaves: config.octaves,
            persistence: config.persistence,
            world_offset: seed.offset + IVec2::new(wx, wz),
            offset: IVec2::new(ox, oz),
            redistribution_modifier: config.redistribution_modifier,
            exponent: config.exponent,
        }
    }
}

/// Samples column heights from layered Perlin noise.
///
/// Sampling is a pure function of `(x, z)` and the parameters, so two
/// samplers built from the same parameters agree everywhere.
pub struct HeightmapSampler {
    noise: Perlin,
    params: NoiseParams,
}

impl HeightmapSampler {
    pub fn new(params: NoiseParams) -> Self {
        Self {
            noise: Perlin::new(Perlin::DEFAULT_SEED),
            params,
        }
    }

    /// Normalized `[0, 1]` layered noise at a world column.
    pub fn octave_perlin(&self, x: f64, z: f64) -> f64 {
        let p = &self.params;
        let x = x * p.zoom + p.zoom;
        let z = z * p.zoom + p.zoom;
        let shift_x = f64::from(p.offset.x + p.world_offset.x);
        let shift_z = f64::from(p.offset.y + p.world_offset.y);

        let mut total = 0.0;
        let mut frequency = 1.0;
        let mut amplitude = 1.0;
        let mut amplitude_sum = 0.0;
        for _ in 0..p.octaves {
            let sample = self
                .noise
                .get([(shift_x + x) * frequency, (shift_z + z) * frequency]);
            total += unit_range(sample) * amplitude;
            amplitude_sum += amplitude;
            amplitude *= p.persistence;
            frequency *= 2.0;
        }

        if amplitude_sum > 0.0 {
            total / amplitude_sum
        } else {
            0.0
        }
    }

    /// Applies the modifier and exponent to a normalized sample.
    pub fn redistribute(&self, value: f64) -> f64 {
        (value * self.params.redistribution_modifier).powf(self.params.exponent)
    }

    /// Surface height of the column at `(world_x, world_z)`, in `[0, CHUNK_HEIGHT)`.
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        let v = self.redistribute(self.octave_perlin(f64::from(world_x), f64::from(world_z)));
        let height = (v * CHUNK_HEIGHT as f64) as i32;
        height.clamp(0, CHUNK_HEIGHT as i32 - 1)
    }

    pub fn params(&self) -> &NoiseParams {
        &self.params
    }
}

/// Maps a `[-1, 1]` Perlin sample into `[0, 1]`.
fn unit_range(sample: f64) -> f64 {
    ((sample + 1.0) * 0.5).clamp(0.0, 1.0)
}
