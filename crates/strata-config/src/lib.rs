//! Configuration system for Strata.
//!
//! Provides startup settings that persist to disk as RON files: the world
//! window, terrain noise, the block atlas table and worker pool sizing.
//! Supports CLI overrides via clap and forward/backward compatible
//! serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    BlockAtlasConfig, BlockEntryConfig, CONFIG_FILE_NAME, Config, DebugConfig, NoiseConfig,
    PipelineConfig, WorldConfig,
};
pub use error::ConfigError;
