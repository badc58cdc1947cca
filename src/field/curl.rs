//! Curl noise: a divergence-free swirl field built from simplex noise.
//!
//! The WGSL compute shader carries its own simplex port; this CPU version
//! uses the `noise` crate, so the two fields match in character, not bits.

use glam::Vec3;
use noise::{NoiseFn, OpenSimplex};

/// Below this length the swirl direction is undefined and treated as zero
const MIN_CURL_LENGTH: f32 = 1e-6;

/// Curl-noise sampler
pub struct CurlNoise {
    simplex: OpenSimplex,
    epsilon: f32,
}

impl CurlNoise {
    pub fn new(seed: u32, epsilon: f32) -> Self {
        Self {
            simplex: OpenSimplex::new(seed),
            epsilon,
        }
    }

    fn sample(&self, p: Vec3) -> f32 {
        self.simplex.get([p.x as f64, p.y as f64, p.z as f64]) as f32
    }

    /// Three decorrelated noise channels from offset lookups
    fn potential(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            self.sample(p),
            self.sample(Vec3::new(p.y - 19.1, p.z + 33.4, p.x + 47.2)),
            self.sample(Vec3::new(p.z + 74.2, p.x - 124.5, p.y + 99.4)),
        )
    }

    /// Raw curl of the potential by central differences
    pub fn curl(&self, p: Vec3) -> Vec3 {
        let e = self.epsilon;
        let dx = Vec3::new(e, 0.0, 0.0);
        let dy = Vec3::new(0.0, e, 0.0);
        let dz = Vec3::new(0.0, 0.0, e);

        let p_x0 = self.potential(p - dx);
        let p_x1 = self.potential(p + dx);
        let p_y0 = self.potential(p - dy);
        let p_y1 = self.potential(p + dy);
        let p_z0 = self.potential(p - dz);
        let p_z1 = self.potential(p + dz);

        let x = p_y1.z - p_y0.z - p_z1.y + p_z0.y;
        let y = p_z1.x - p_z0.x - p_x1.z + p_x0.z;
        let z = p_x1.y - p_x0.y - p_y1.x + p_y0.x;

        Vec3::new(x, y, z) / (2.0 * e)
    }

    /// Unit-length swirl direction at `p`, or zero where it is degenerate
    pub fn swirl(&self, p: Vec3) -> Vec3 {
        let c = self.curl(p);
        let len = c.length();
        if !len.is_finite() || len < MIN_CURL_LENGTH {
            return Vec3::ZERO;
        }
        c / len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swirl_is_unit_or_zero() {
        let curl = CurlNoise::new(7, 0.1);
        for i in 0..200 {
            let t = i as f32 * 0.37;
            let p = Vec3::new(t.sin() * 3.0, t * 0.1 - 4.0, t.cos() * 2.0);
            let len = curl.swirl(p).length();
            assert!(len == 0.0 || (len - 1.0).abs() < 1e-4, "len {}", len);
        }
    }

    #[test]
    fn test_curl_is_nearly_divergence_free() {
        let curl = CurlNoise::new(3, 0.01);
        let h = 0.05;
        let p = Vec3::new(0.3, -1.2, 0.8);

        let div = (curl.curl(p + Vec3::X * h).x - curl.curl(p - Vec3::X * h).x
            + curl.curl(p + Vec3::Y * h).y
            - curl.curl(p - Vec3::Y * h).y
            + curl.curl(p + Vec3::Z * h).z
            - curl.curl(p - Vec3::Z * h).z)
            / (2.0 * h);

        // Central-difference operators commute, so only rounding remains
        let scale = curl.curl(p).length().max(1.0);
        assert!(div.abs() < 1e-2 * scale, "divergence {}", div);
    }

    #[test]
    fn test_same_seed_same_field() {
        let a = CurlNoise::new(11, 0.1);
        let b = CurlNoise::new(11, 0.1);
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(a.swirl(p), b.swirl(p));
    }
}
