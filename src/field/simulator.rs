//! CPU reference simulator: the per-particle step shared with `simulate.wgsl`.

use glam::Vec3;
use rayon::prelude::*;

use super::curl::CurlNoise;
use super::hash::rand01;
use super::store::ParticleStore;
use super::{FieldStepper, FrameUniforms, Particle, Pointer};
use crate::audio::unit;
use crate::params::FieldPhysics;

/// Respawn streams: angle, radius, height, life
const STREAM_ANGLE: u32 = 0;
const STREAM_RADIUS: u32 = 1;
const STREAM_HEIGHT: u32 = 2;
const STREAM_LIFE: u32 = 3;

/// Fresh particle in the source disk, reproducible from (index, tick, seed)
pub fn respawn(physics: &FieldPhysics, index: u32, tick: u32) -> Particle {
    let r = |stream| rand01(index, tick, physics.seed, stream);

    let angle = r(STREAM_ANGLE) * std::f32::consts::TAU;
    // sqrt keeps the disk uniformly filled rather than centre-heavy
    let radius = physics.source_radius * r(STREAM_RADIUS).sqrt();
    let y = physics.source_y + r(STREAM_HEIGHT) * physics.source_height;
    let life = physics.respawn_life_min
        + r(STREAM_LIFE) * (physics.respawn_life_max - physics.respawn_life_min);

    Particle {
        position: [angle.cos() * radius, y, angle.sin() * radius],
        life,
    }
}

/// Advance one particle by one tick.
///
/// Pure in (physics, noise field, frame, index, particle): order of
/// evaluation across the population does not matter.
pub fn advance_particle(
    physics: &FieldPhysics,
    curl: &CurlNoise,
    frame: &FrameUniforms,
    index: u32,
    particle: Particle,
) -> Particle {
    let energy = unit(frame.energy);

    let life = particle.life - physics.base_decay * (1.0 + energy * physics.energy_decay_gain);
    if life <= 0.0 || !life.is_finite() {
        return respawn(physics, index, frame.tick);
    }

    let mut pos = Vec3::from_array(particle.position);
    if !pos.is_finite() {
        return respawn(physics, index, frame.tick);
    }

    // Height valve: guarantees turnover even if decay is slow
    if pos.y > physics.kill_height {
        return Particle {
            position: particle.position,
            life: physics.kill_life,
        };
    }

    let sample = pos * physics.noise_scale + Vec3::splat(frame.time * physics.noise_time_scale);
    let swirl = curl.swirl(sample);
    pos += swirl * (physics.noise_base_strength + energy * physics.noise_energy_gain);

    // Step function, recomputed every tick: only applies while energy stays high
    let burst = if energy >= physics.burst_threshold {
        physics.burst_strength
    } else {
        0.0
    };
    pos.y += physics.base_drift + energy * physics.drift_energy_gain + burst;

    pos = repel(physics, pos, &frame.pointer);

    if !pos.is_finite() {
        return respawn(physics, index, frame.tick);
    }

    Particle {
        position: pos.to_array(),
        life,
    }
}

/// Direct positional push away from an active pointer
fn repel(physics: &FieldPhysics, pos: Vec3, pointer: &Pointer) -> Vec3 {
    if !pointer.active {
        return pos;
    }

    let separation = pos - Vec3::new(pointer.x, pointer.y, 0.0);
    let dist = separation.length();
    if !(dist < physics.repel_radius) {
        return pos;
    }

    let dir = if dist > physics.repel_min_distance {
        separation / dist
    } else {
        Vec3::Y
    };
    pos + dir * (physics.repel_radius - dist) * physics.repel_gain
}

/// CPU field simulator: physics plus the noise field
pub struct FieldSimulator {
    physics: FieldPhysics,
    curl: CurlNoise,
}

impl FieldSimulator {
    pub fn new(physics: FieldPhysics) -> Self {
        let curl = CurlNoise::new(physics.seed, physics.curl_epsilon);
        Self { physics, curl }
    }

    /// Read current, write next, then swap
    pub fn step(&self, store: &mut ParticleStore, frame: &FrameUniforms) {
        let (current, next) = store.split();
        next.par_iter_mut()
            .zip(current.par_iter())
            .enumerate()
            .for_each(|(index, (dst, src))| {
                *dst = advance_particle(&self.physics, &self.curl, frame, index as u32, *src);
            });
        store.swap();
    }
}

/// CPU-resident field: the store and its simulator
pub struct CpuField {
    pub store: ParticleStore,
    pub simulator: FieldSimulator,
}

impl CpuField {
    pub fn new(physics: FieldPhysics) -> Self {
        Self {
            store: ParticleStore::new(&physics),
            simulator: FieldSimulator::new(physics),
        }
    }

    pub fn particles(&self) -> &[Particle] {
        self.store.current()
    }
}

impl FieldStepper for CpuField {
    fn step(&mut self, frame: &FrameUniforms) {
        self.simulator.step(&mut self.store, frame);
    }
}
