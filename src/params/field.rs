//! Particle field physics parameters.
//!
//! All step sizes are per tick (world units per tick), matching a display-locked
//! update loop.

use crate::error::ConfigError;

/// Flame field simulation parameters
#[derive(Debug, Clone)]
pub struct FieldPhysics {
    /// Particle grid width; population N = grid_width²
    /// 128 = 16,384 particles
    pub grid_width: u32,

    /// Seed mixed into every respawn hash
    pub seed: u32,

    /// Base life lost per tick
    pub base_decay: f32,

    /// Decay multiplier: life -= base_decay * (1 + energy * energy_decay_gain)
    pub energy_decay_gain: f32,

    /// Life assigned to particles killed by the height valve
    pub kill_life: f32,

    /// Height above which particles are force-killed (world units)
    pub kill_height: f32,

    /// Spatial scale applied to position before sampling curl noise
    pub noise_scale: f32,

    /// Time offset rate for the noise field (per second of sim time)
    pub noise_time_scale: f32,

    /// Finite-difference step for the curl derivative
    pub curl_epsilon: f32,

    /// Curl displacement per tick at zero energy
    pub noise_base_strength: f32,

    /// Extra curl displacement per unit energy
    pub noise_energy_gain: f32,

    /// Upward drift per tick at zero energy
    pub base_drift: f32,

    /// Extra drift per unit energy
    pub drift_energy_gain: f32,

    /// Energy above which the burst drift applies
    pub burst_threshold: f32,

    /// Burst drift per tick while energy is above threshold
    pub burst_strength: f32,

    /// Source disk radius (world units)
    pub source_radius: f32,

    /// Source disk base height (world units)
    pub source_y: f32,

    /// Vertical thickness of the source region
    pub source_height: f32,

    /// Respawned life lies in [respawn_life_min, respawn_life_max]
    pub respawn_life_min: f32,
    pub respawn_life_max: f32,

    /// Pointer repulsion radius (world units)
    pub repel_radius: f32,

    /// Pointer push = (radius - distance) * repel_gain
    pub repel_gain: f32,

    /// Distance floor before normalizing the separation vector
    pub repel_min_distance: f32,

    /// Initial population: radius of the seeded column
    pub initial_radius: f32,

    /// Initial population: half height of the seeded column
    pub initial_half_height: f32,
}

impl Default for FieldPhysics {
    fn default() -> Self {
        Self {
            grid_width: 128,
            seed: 0x5eed,
            base_decay: 0.005,
            energy_decay_gain: 2.0,
            kill_life: -0.1,
            kill_height: 4.5,
            noise_scale: 0.5,
            noise_time_scale: 0.1,
            curl_epsilon: 0.1,
            noise_base_strength: 0.01,
            noise_energy_gain: 0.03,
            base_drift: 0.03,
            drift_energy_gain: 0.1,
            burst_threshold: 0.7,
            burst_strength: 0.05,
            source_radius: 2.5,
            source_y: -4.5,
            source_height: 0.5,
            respawn_life_min: 0.8,
            respawn_life_max: 1.0,
            repel_radius: 2.0,
            repel_gain: 0.1,
            repel_min_distance: 1e-4,
            initial_radius: 2.0,
            initial_half_height: 2.0,
        }
    }
}

impl FieldPhysics {
    /// Total number of particles
    pub fn particle_count(&self) -> usize {
        (self.grid_width as usize).pow(2)
    }

    /// Particle count as the shader sees it; only meaningful after `validate`
    pub fn particle_count_u32(&self) -> u32 {
        u32::try_from(self.particle_count()).unwrap_or(u32::MAX)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 {
            return Err(ConfigError::EmptyParticleGrid);
        }
        if self.particle_count() > u32::MAX as usize {
            return Err(ConfigError::ParticleGridTooLarge(self.grid_width));
        }
        if !(0.0..=1.0).contains(&self.respawn_life_min)
            || !(self.respawn_life_min..=1.0).contains(&self.respawn_life_max)
        {
            return Err(ConfigError::OutOfRange {
                name: "respawn_life_max",
                value: self.respawn_life_max,
                min: self.respawn_life_min,
                max: 1.0,
            });
        }
        if self.kill_life >= 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "kill_life",
                value: self.kill_life,
                min: -1.0,
                max: 0.0,
            });
        }
        if self.kill_height <= self.source_y + self.source_height {
            return Err(ConfigError::OutOfRange {
                name: "kill_height",
                value: self.kill_height,
                min: self.source_y + self.source_height,
                max: f32::MAX,
            });
        }
        if self.repel_min_distance <= 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "repel_min_distance",
                value: self.repel_min_distance,
                min: f32::EPSILON,
                max: f32::MAX,
            });
        }
        Ok(())
    }
}
