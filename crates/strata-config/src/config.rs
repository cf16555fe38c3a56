//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the persisted configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// Top-level world streaming configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// World window and seed settings.
    pub world: WorldConfig,
    /// Terrain noise settings.
    pub noise: NoiseConfig,
    /// Block texture atlas and solidity table.
    pub blocks: BlockAtlasConfig,
    /// Worker pool sizing.
    pub pipeline: PipelineConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// World window configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// Radius of the loaded window, in chunks, around the observer's chunk.
    pub draw_range: u32,
    /// Distance, in chunks, an observer may travel from its source chunk
    /// before a new generation pass is requested.
    pub regen_threshold: u32,
    /// Blocks strictly below this Y that are above the surface become water.
    pub sea_level: i32,
    /// World seed.
    pub seed: i32,
    /// Ignore `seed` and draw a random one at startup.
    pub use_random_seed: bool,
    /// Explicit noise offset. `[0, 0]` means "derive from the seed".
    pub seed_offset: [i32; 2],
}

/// Coherent-noise settings for the height field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NoiseConfig {
    /// Scale applied to world coordinates before sampling.
    pub zoom: f64,
    /// Number of octaves summed per sample.
    pub octaves: u32,
    /// Amplitude multiplier between octaves, in `(0, 1)`.
    pub persistence: f64,
    /// Offset added to every sample (usually overwritten by the seed offset).
    pub world_offset: [i32; 2],
    /// Static offset added to every sample.
    pub offset: [i32; 2],
    /// Multiplier applied before the redistribution exponent.
    pub redistribution_modifier: f64,
    /// Exponent applied to the normalized noise value.
    pub exponent: f64,
}

/// Texture atlas layout and per-block properties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlockAtlasConfig {
    /// Size of one tile in UV space (`1 / columns`, `1 / rows`).
    pub tile_size: [f32; 2],
    /// One entry per block type.
    pub blocks: Vec<BlockEntryConfig>,
    /// Name of the block placed by the interaction path.
    pub placement_block: String,
}

/// Atlas tiles and solidity of a single block type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockEntryConfig {
    /// Block type name (`"grass"`, `"water"`, ...).
    pub name: String,
    /// Tile used by the top face.
    pub top: [u32; 2],
    /// Tile used by the bottom face.
    pub bottom: [u32; 2],
    /// Tile used by the four side faces.
    pub side: [u32; 2],
    /// Whether the block occludes its neighbours.
    pub solid: bool,
}

/// Worker pool sizing for the streaming stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Threads building chunk block data (0 = derive from CPU count).
    pub data_workers: usize,
    /// Threads building initial chunk meshes (0 = derive from CPU count).
    pub mesh_workers: usize,
    /// Threads rebuilding meshes of modified chunks (0 = derive from CPU count).
    pub update_workers: usize,
    /// How long an idle worker blocks on its queue before re-checking shutdown.
    pub idle_poll_ms: u64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Interval between pipeline snapshots logged by the driver.
    pub snapshot_interval_ms: u64,
}

// --- Default implementations ---

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            draw_range: 8,
            regen_threshold: 2,
            sea_level: 40,
            seed: 0,
            use_random_seed: false,
            seed_offset: [0, 0],
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            zoom: 0.01,
            octaves: 4,
            persistence: 0.5,
            world_offset: [0, 0],
            offset: [0, 0],
            redistribution_modifier: 1.0,
            exponent: 1.0,
        }
    }
}

impl Default for BlockAtlasConfig {
    fn default() -> Self {
        let entry = |name: &str, top, bottom, side, solid| BlockEntryConfig {
            name: name.to_string(),
            top,
            bottom,
            side,
            solid,
        };
        Self {
            tile_size: [0.25, 0.25],
            blocks: vec![
                entry("air", [0, 0], [0, 0], [0, 0], false),
                entry("dirt", [2, 3], [2, 3], [2, 3], true),
                entry("grass", [0, 3], [2, 3], [1, 3], true),
                entry("stone", [3, 3], [3, 3], [3, 3], true),
                entry("sand", [0, 2], [0, 2], [0, 2], true),
                entry("water", [1, 2], [1, 2], [1, 2], false),
            ],
            placement_block: "sand".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_workers: 0,
            mesh_workers: 0,
            update_workers: 1,
            idle_poll_ms: 20,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            snapshot_interval_ms: 1000,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform config directory for Strata (`<config_dir>/strata`).
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("strata"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(4))
                .unwrap();
        assert!(ron_str.contains("draw_range: 8"));
        assert!(ron_str.contains("sea_level: 40"));
        assert!(ron_str.contains("\"water\""));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(world: (draw_range: 3))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.world.draw_range, 3);
        assert_eq!(config.world.sea_level, 40);
        assert_eq!(config.noise, NoiseConfig::default());
        assert_eq!(config.blocks, BlockAtlasConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_default_atlas_covers_all_terrain_blocks() {
        let atlas = BlockAtlasConfig::default();
        let names: Vec<&str> = atlas.blocks.iter().map(|b| b.name.as_str()).collect();
        for name in ["air", "dirt", "grass", "stone", "sand", "water"] {
            assert!(names.contains(&name), "missing {name}");
        }
        let water = atlas.blocks.iter().find(|b| b.name == "water").unwrap();
        assert!(!water.solid);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.world.draw_range = 2;
        config.world.seed = -1234;
        config.noise.octaves = 6;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{{not valid}}").unwrap();
        let result = Config::load_or_create(dir.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
