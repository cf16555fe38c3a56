//! Command-line argument parsing for the Strata driver.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Strata command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "strata", about = "Procedural voxel world streaming")]
pub struct CliArgs {
    /// Window radius in chunks.
    #[arg(long)]
    pub draw_range: Option<u32>,

    /// Chunks an observer may travel before the window is regenerated.
    #[arg(long)]
    pub regen_threshold: Option<u32>,

    /// World seed.
    #[arg(long, allow_hyphen_values = true)]
    pub seed: Option<i32>,

    /// Draw a random seed at startup.
    #[arg(long)]
    pub random_seed: bool,

    /// Sea level in blocks.
    #[arg(long)]
    pub sea_level: Option<i32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of render ticks the headless driver runs before exiting.
    #[arg(long, default_value_t = 600)]
    pub ticks: u32,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(range) = args.draw_range {
            self.world.draw_range = range;
        }
        if let Some(threshold) = args.regen_threshold {
            self.world.regen_threshold = threshold;
        }
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if args.random_seed {
            self.world.use_random_seed = true;
        }
        if let Some(sea) = args.sea_level {
            self.world.sea_level = sea;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            draw_range: Some(2),
            seed: Some(-77),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.world.draw_range, 2);
        assert_eq!(config.world.seed, -77);
        // Non-overridden fields retain defaults
        assert_eq!(config.world.sea_level, 40);
        assert!(!config.world.use_random_seed);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_negative_seed() {
        let args = CliArgs::parse_from(["strata", "--seed", "-42", "--draw-range", "3"]);
        assert_eq!(args.seed, Some(-42));
        assert_eq!(args.draw_range, Some(3));
        assert_eq!(args.ticks, 600);
    }
}
