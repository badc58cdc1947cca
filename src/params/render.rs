//! Rendering and recording configuration.

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Window width (pixels)
    pub window_width: u32,

    /// Window height (pixels)
    pub window_height: u32,

    /// Vertical field of view (degrees)
    pub fov_degrees: f32,

    /// Camera distance from the flame axis (world units)
    pub camera_distance: f32,

    /// Near clipping plane (world units)
    pub near_plane: f32,

    /// Far clipping plane (world units)
    pub far_plane: f32,

    /// Base particle size (pixels at the attenuation reference depth)
    pub base_size: f32,

    /// Distance attenuation numerator: size *= attenuation / view depth
    pub size_attenuation: f32,

    /// Particle alpha = life * alpha_scale
    pub alpha_scale: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 720,
            window_height: 1280,
            fov_degrees: 75.0,
            camera_distance: 10.0,
            near_plane: 0.1,
            far_plane: 100.0,
            base_size: 1.5,
            size_attenuation: 100.0,
            alpha_scale: 0.6,
        }
    }
}

/// Recording mode configuration
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Duration to record (seconds)
    pub duration_secs: f32,

    /// Output directory for frames
    pub output_dir: String,

    /// Frame rate (FPS)
    pub fps: u32,
}

impl RecordingConfig {
    pub fn new(duration_secs: f32) -> Self {
        Self {
            duration_secs,
            output_dir: "recording".to_string(),
            fps: 60,
        }
    }

    /// Total number of frames to capture
    pub fn total_frames(&self) -> usize {
        (self.duration_secs * self.fps as f32).ceil() as usize
    }

    /// Frame directory path
    pub fn frames_dir(&self) -> String {
        format!("{}/frames", self.output_dir)
    }

    /// Path of a single captured frame
    pub fn frame_path(&self, frame_num: usize) -> String {
        format!("{}/frame_{:05}.png", self.frames_dir(), frame_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_frames() {
        let config = RecordingConfig::new(2.5);
        assert_eq!(config.total_frames(), 150);
        assert_eq!(config.frame_path(7), "recording/frames/frame_00007.png");
    }
}
