//! Flame particle field: state store, curl-noise advection and lifecycle.

mod curl;
mod hash;
mod simulator;
mod store;

use bytemuck::{Pod, Zeroable};

// Re-export public types
pub use curl::CurlNoise;
pub use hash::{hash, pcg, rand01};
pub use simulator::{advance_particle, respawn, CpuField, FieldSimulator};
pub use store::{initial_population, ParticleStore, PingPong};

/// One particle record: position plus remaining life.
///
/// Layout matches `vec4<f32>` in the WGSL shaders.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: [f32; 3],
    pub life: f32,
}

/// Pointer in world space (the z = 0 plane)
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Pointer {
    pub x: f32,
    pub y: f32,
    pub active: bool,
}

/// Global per-tick inputs to the simulation step
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FrameUniforms {
    /// Simulation time (seconds)
    pub time: f32,
    /// Time since previous tick (seconds)
    pub delta_time: f32,
    /// Smoothed audio energy in [0, 1]
    pub energy: f32,
    /// Tick counter, keys the respawn hash
    pub tick: u32,
    pub pointer: Pointer,
}

/// Something that can advance the particle field by one tick
pub trait FieldStepper {
    /// Advance every particle one step; the new state becomes current
    fn step(&mut self, frame: &FrameUniforms);

    /// Reason the backing device stopped working, if it did
    fn device_lost(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_layout_matches_vec4() {
        assert_eq!(std::mem::size_of::<Particle>(), 16);
        let p = Particle {
            position: [1.0, 2.0, 3.0],
            life: 0.5,
        };
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&p));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 0.5]);
    }
}
