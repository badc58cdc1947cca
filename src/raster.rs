//! CPU point-splat renderer for headless runs.
//!
//! Draws the same sprites as `particles.wgsl` (size, palette, additive
//! blending) into an `image::RgbaImage`.

use glam::{Vec2, Vec3};
use image::{Rgba, RgbaImage};

use crate::audio::{AudioEvent, AudioFeatures};
use crate::camera::CameraSystem;
use crate::field::Particle;
use crate::params::RenderConfig;
use crate::style::{particle_color, ParticleStyle};
use crate::visual::Visual;

/// Headless flame renderer
pub struct FrameRaster {
    camera: CameraSystem,
    style: ParticleStyle,
    features: AudioFeatures,
    width: u32,
    height: u32,
}

impl FrameRaster {
    pub fn new(config: &RenderConfig) -> Self {
        let camera = CameraSystem::new(config);
        let (width, height) = camera.viewport();
        Self {
            camera,
            style: ParticleStyle::from(config),
            features: AudioFeatures::default(),
            width,
            height,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Splat every live particle onto a black frame
    pub fn render(&self, particles: &[Particle]) -> RgbaImage {
        let mut accum = vec![Vec3::ZERO; (self.width * self.height) as usize];

        for particle in particles {
            if particle.life <= 0.0 {
                continue;
            }
            let Some(projected) = self.camera.project(Vec3::from_array(particle.position)) else {
                continue;
            };

            let size = self
                .style
                .point_size(self.features.bass, particle.life, projected.depth);
            let color = particle_color(self.features.energy, self.features.high, particle.life);
            // Additive blend: src * alpha + dst
            let contribution = color * self.style.alpha(particle.life);

            self.splat(&mut accum, projected.pixel, size * 0.5, contribution);
        }

        let mut image = RgbaImage::new(self.width, self.height);
        for (pixel, value) in image.pixels_mut().zip(&accum) {
            let c = value.clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
            *pixel = Rgba([c.x as u8, c.y as u8, c.z as u8, 255]);
        }
        image
    }

    /// Add a filled disc; sub-pixel discs still light their centre pixel
    fn splat(&self, accum: &mut [Vec3], centre: Vec2, radius: f32, value: Vec3) {
        let (w, h) = (self.width as i64, self.height as i64);

        if radius < 0.5 {
            let (x, y) = (centre.x.floor() as i64, centre.y.floor() as i64);
            if (0..w).contains(&x) && (0..h).contains(&y) {
                accum[(y * w + x) as usize] += value;
            }
            return;
        }

        let x0 = ((centre.x - radius).floor() as i64).max(0);
        let x1 = ((centre.x + radius).ceil() as i64).min(w - 1);
        let y0 = ((centre.y - radius).floor() as i64).max(0);
        let y1 = ((centre.y + radius).ceil() as i64).min(h - 1);
        let r2 = radius * radius;

        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - centre;
                if d.length_squared() <= r2 {
                    accum[(y * w + x) as usize] += value;
                }
            }
        }
    }
}

impl Visual for FrameRaster {
    fn on_tick(&mut self, features: &AudioFeatures, _events: &[AudioEvent]) {
        self.features = features.sanitized();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster() -> FrameRaster {
        FrameRaster::new(&RenderConfig {
            window_width: 64,
            window_height: 64,
            ..Default::default()
        })
    }

    fn at_origin(life: f32) -> Particle {
        Particle {
            position: [0.0, 0.0, 0.0],
            life,
        }
    }

    #[test]
    fn test_empty_field_is_black() {
        let image = raster().render(&[]);
        assert_eq!(image.dimensions(), (64, 64));
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_dead_particles_are_not_drawn() {
        let image = raster().render(&[at_origin(0.0), at_origin(-0.1)]);
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_live_particle_lights_centre() {
        let image = raster().render(&[at_origin(1.0)]);
        let centre = image.get_pixel(32, 32);
        assert!(centre.0[2] > 0);
        // Sprite at depth 10 is 15 px across, so corners stay dark
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_overlap_is_additive() {
        let r = raster();
        let one = r.render(&[at_origin(0.5)]).get_pixel(32, 32).0;
        let two = r.render(&[at_origin(0.5), at_origin(0.5)]).get_pixel(32, 32).0;
        assert!(two[2] > one[2]);
    }

    #[test]
    fn test_energy_warms_the_palette() {
        let mut r = raster();
        let cold = r.render(&[at_origin(0.9)]).get_pixel(32, 32).0;
        r.on_tick(
            &AudioFeatures {
                energy: 1.0,
                ..Default::default()
            },
            &[],
        );
        let hot = r.render(&[at_origin(0.9)]).get_pixel(32, 32).0;
        assert!(hot[0] > cold[0]);
    }
}
