//! Fixed camera looking at the flame, plus pointer picking on the z = 0 plane.

use glam::{Mat4, Vec2, Vec3, Vec3Swizzles, Vec4Swizzles};

use crate::params::RenderConfig;

/// Rays closer to parallel with the z = 0 plane than this never hit it
const MIN_RAY_Z: f32 = 1e-6;

/// A world point after projection
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Projected {
    /// Pixel coordinates, origin top-left
    pub pixel: Vec2,
    /// View-space distance in front of the camera (clip w)
    pub depth: f32,
}

/// Camera system: stationary eye on the +Z axis looking at the origin
pub struct CameraSystem {
    eye: Vec3,
    target: Vec3,
    fov_radians: f32,
    near: f32,
    far: f32,
    viewport: (u32, u32),
}

impl CameraSystem {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, config.camera_distance),
            target: Vec3::ZERO,
            fov_radians: config.fov_degrees.to_radians(),
            near: config.near_plane,
            far: config.far_plane,
            viewport: (config.window_width.max(1), config.window_height.max(1)),
        }
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Track the surface size; zero-sized windows keep the last aspect
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.viewport = (width, height);
        }
    }

    fn aspect_ratio(&self) -> f32 {
        self.viewport.0 as f32 / self.viewport.1 as f32
    }

    /// Create view-projection matrix for rendering
    pub fn view_proj(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target, Vec3::Y);
        let proj = Mat4::perspective_rh(self.fov_radians, self.aspect_ratio(), self.near, self.far);
        proj * view
    }

    /// Project a world point to pixels; `None` when it is behind the camera
    pub fn project(&self, world: Vec3) -> Option<Projected> {
        let clip = self.view_proj() * world.extend(1.0);
        if clip.w <= self.near {
            return None;
        }
        let ndc = clip.xy() / clip.w;
        let (w, h) = self.viewport;
        Some(Projected {
            pixel: Vec2::new(
                (ndc.x + 1.0) * 0.5 * w as f32,
                (1.0 - ndc.y) * 0.5 * h as f32,
            ),
            depth: clip.w,
        })
    }

    /// World point on the z = 0 plane under a cursor position in pixels
    pub fn pick_plane(&self, pixel: Vec2) -> Option<Vec2> {
        let (w, h) = self.viewport;
        let ndc = Vec2::new(
            pixel.x / w as f32 * 2.0 - 1.0,
            1.0 - pixel.y / h as f32 * 2.0,
        );

        let inv = self.view_proj().inverse();
        let near = inv.project_point3(ndc.extend(0.0));
        let far = inv.project_point3(ndc.extend(1.0));
        let dir = far - near;
        if dir.z.abs() < MIN_RAY_Z {
            return None;
        }

        let t = -near.z / dir.z;
        if !t.is_finite() || t < 0.0 {
            return None;
        }
        let hit = near + dir * t;
        Some(hit.xy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> CameraSystem {
        CameraSystem::new(&RenderConfig::default())
    }

    #[test]
    fn test_origin_projects_to_centre() {
        let camera = camera();
        let p = camera.project(Vec3::ZERO).unwrap();
        assert!((p.pixel.x - 360.0).abs() < 1e-3);
        assert!((p.pixel.y - 640.0).abs() < 1e-3);
        assert!((p.depth - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_points_behind_camera_are_rejected() {
        assert!(camera().project(Vec3::new(0.0, 0.0, 20.0)).is_none());
    }

    #[test]
    fn test_pick_inverts_projection_on_plane() {
        let camera = camera();
        let world = Vec3::new(1.5, -2.0, 0.0);
        let projected = camera.project(world).unwrap();
        let picked = camera.pick_plane(projected.pixel).unwrap();
        assert!((picked - world.xy()).length() < 1e-3, "{:?}", picked);

        let centre = camera.pick_plane(Vec2::new(360.0, 640.0)).unwrap();
        assert!(centre.length() < 1e-4);
    }

    #[test]
    fn test_screen_up_is_world_up() {
        let camera = camera();
        let top = camera.pick_plane(Vec2::new(360.0, 100.0)).unwrap();
        assert!(top.y > 0.0);
    }

    #[test]
    fn test_zero_viewport_is_ignored() {
        let mut camera = camera();
        camera.set_viewport(0, 100);
        assert_eq!(camera.viewport(), (720, 1280));
        camera.set_viewport(1280, 720);
        assert_eq!(camera.viewport(), (1280, 720));
    }
}
