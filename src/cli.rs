//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::params::{FieldPhysics, RecordingConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "emberflow")]
#[command(about = "Audio-reactive curl-noise flame", long_about = None)]
pub struct Args {
    /// Particle count (rounded up to a square grid)
    #[arg(long, value_name = "COUNT", default_value = "16384")]
    pub particles: u32,

    /// Seed for respawn positions and the CPU noise field
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u32>,

    /// Record frames to PNG (duration in seconds)
    #[arg(long, value_name = "SECONDS")]
    pub record: Option<f32>,

    /// Run without a window on the CPU simulator and write the last frame
    #[arg(long)]
    pub headless: bool,

    /// Ticks to simulate in headless mode
    #[arg(long, value_name = "TICKS", default_value = "600")]
    pub ticks: u32,

    /// Headless output image
    #[arg(long, value_name = "PATH", default_value = "emberflow.png")]
    pub output: PathBuf,

    /// Use a generated beat instead of the microphone
    #[arg(long)]
    pub synthetic: bool,
}

/// Smallest grid width whose square holds `count` particles
pub fn grid_width_for(count: u32) -> u32 {
    let mut width = (count as f64).sqrt() as u32;
    while width.saturating_mul(width) < count {
        width += 1;
    }
    width
}

impl Args {
    /// Field physics with command-line overrides applied
    pub fn field_physics(&self) -> FieldPhysics {
        let defaults = FieldPhysics::default();
        FieldPhysics {
            grid_width: grid_width_for(self.particles),
            seed: self.seed.unwrap_or(defaults.seed),
            ..defaults
        }
    }

    /// Create recording configuration (and its directories) if recording is enabled
    pub fn create_recording_config(&self) -> std::io::Result<Option<RecordingConfig>> {
        let Some(duration) = self.record else {
            return Ok(None);
        };
        let config = RecordingConfig::new(duration);
        std::fs::create_dir_all(config.frames_dir())?;
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_width_rounds_up() {
        assert_eq!(grid_width_for(16_384), 128);
        assert_eq!(grid_width_for(16_385), 129);
        assert_eq!(grid_width_for(1), 1);
        assert_eq!(grid_width_for(0), 0);
    }

    #[test]
    fn test_overrides_reach_physics() {
        let args = Args::parse_from(["emberflow", "--particles", "100", "--seed", "7"]);
        let physics = args.field_physics();
        assert_eq!(physics.grid_width, 10);
        assert_eq!(physics.seed, 7);
        assert!(!args.headless);
        assert!(args.create_recording_config().unwrap().is_none());
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["emberflow"]);
        assert_eq!(args.field_physics().seed, FieldPhysics::default().seed);
        assert_eq!(args.ticks, 600);
    }
}
