//! Per-particle draw style: size, palette and opacity.
//!
//! Mirrors the math in `particles.wgsl` so the headless rasterizer and the
//! GPU renderer agree.

use glam::Vec3;

use crate::params::RenderConfig;

/// Low-energy palette: core, mid, end
const COLD: [Vec3; 3] = [
    Vec3::new(0.2, 0.6, 1.0),
    Vec3::new(0.1, 0.0, 0.4),
    Vec3::new(0.0, 0.0, 0.1),
];

/// High-energy palette: core, mid, end
const HOT: [Vec3; 3] = [
    Vec3::new(1.0, 0.9, 0.7),
    Vec3::new(1.0, 0.2, 0.1),
    Vec3::new(0.4, 0.0, 0.2),
];

/// Additive sparkle tint driven by the high band
const SPARKLE: Vec3 = Vec3::new(0.2, 0.5, 1.0);
const SPARKLE_FLOOR: f32 = 0.2;

/// Bass multiplies point size by up to (1 + BASS_SIZE_GAIN)
const BASS_SIZE_GAIN: f32 = 2.0;

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Size and opacity constants for particle sprites
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParticleStyle {
    pub base_size: f32,
    pub size_attenuation: f32,
    pub alpha_scale: f32,
}

impl From<&RenderConfig> for ParticleStyle {
    fn from(config: &RenderConfig) -> Self {
        Self {
            base_size: config.base_size,
            size_attenuation: config.size_attenuation,
            alpha_scale: config.alpha_scale,
        }
    }
}

impl ParticleStyle {
    /// Sprite diameter in pixels; zero for dead particles
    pub fn point_size(&self, bass: f32, life: f32, depth: f32) -> f32 {
        if life <= 0.0 || depth <= 0.0 {
            return 0.0;
        }
        self.base_size * (1.0 + bass * BASS_SIZE_GAIN) * life * (self.size_attenuation / depth)
    }

    pub fn alpha(&self, life: f32) -> f32 {
        life.max(0.0) * self.alpha_scale
    }
}

/// Palette colour for a particle; may exceed 1 before blending
pub fn particle_color(energy: f32, high: f32, life: f32) -> Vec3 {
    let core = COLD[0].lerp(HOT[0], energy);
    let mid = COLD[1].lerp(HOT[1], energy);
    let end = COLD[2].lerp(HOT[2], energy);

    let base = end.lerp(mid, life);
    let base = base.lerp(core, smoothstep(0.6, 1.0, life));
    base + SPARKLE * (high + SPARKLE_FLOOR) * life
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> ParticleStyle {
        ParticleStyle::from(&RenderConfig::default())
    }

    #[test]
    fn test_dead_particles_have_no_size() {
        assert_eq!(style().point_size(1.0, 0.0, 10.0), 0.0);
        assert_eq!(style().point_size(1.0, -0.1, 10.0), 0.0);
        assert_eq!(style().alpha(-0.1), 0.0);
    }

    #[test]
    fn test_bass_triples_size_at_full_scale() {
        let s = style();
        let quiet = s.point_size(0.0, 1.0, 10.0);
        let loud = s.point_size(1.0, 1.0, 10.0);
        assert!((quiet - 15.0).abs() < 1e-4);
        assert!((loud - 3.0 * quiet).abs() < 1e-4);
        // Farther particles shrink
        assert!(s.point_size(0.0, 1.0, 20.0) < quiet);
    }

    #[test]
    fn test_palette_endpoints() {
        // Quiet, fading particle: cold end colour only
        let c = particle_color(0.0, 0.0, 0.0);
        assert!((c - Vec3::new(0.0, 0.0, 0.1)).length() < 1e-6);

        // Loud, fresh particle: hot core plus sparkle floor
        let c = particle_color(1.0, 0.0, 1.0);
        assert!((c - Vec3::new(1.04, 1.0, 0.9)).length() < 1e-5);
    }

    #[test]
    fn test_high_band_adds_sparkle() {
        let dull = particle_color(0.5, 0.0, 0.5);
        let bright = particle_color(0.5, 1.0, 0.5);
        let diff = bright - dull;
        assert!((diff - SPARKLE * 0.5).length() < 1e-5);
    }

    #[test]
    fn test_alpha_scales_with_life() {
        assert!((style().alpha(1.0) - 0.6).abs() < 1e-6);
        assert!((style().alpha(0.5) - 0.3).abs() < 1e-6);
    }
}
