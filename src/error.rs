//! Error types for configuration, audio capture and the GPU device.
//!
//! Only startup and device-fatal conditions are errors. Per-tick problems
//! (no new spectrum frame, surface outdated) are skipped, never returned.

use thiserror::Error;

/// Invalid parameter set, detected once at startup
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("FFT size must be a power of 2, got {0}")]
    FftSizeNotPowerOfTwo(usize),

    #[error("sample rate must be > 0")]
    ZeroSampleRate,

    #[error("{band} band range {low}..{high} Hz is empty or inverted")]
    EmptyBand {
        band: &'static str,
        low: f32,
        high: f32,
    },

    #[error("{band} band ends above the Nyquist frequency ({nyquist} Hz)")]
    BandAboveNyquist { band: &'static str, nyquist: f32 },

    #[error("particle grid width must be > 0")]
    EmptyParticleGrid,

    #[error("particle grid width {0} holds more than u32::MAX particles")]
    ParticleGridTooLarge(u32),

    #[error("{name} must lie in {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

/// Audio capture failure (terminal for the audio-reactive visual)
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no audio input device found")]
    NoInputDevice,

    #[error("failed to query input config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported input sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build input stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("failed to start input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// GPU device failure (terminal for the visual)
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter")]
    NoAdapter,

    #[error("surface reports no supported texture formats")]
    NoSurfaceFormat,

    #[error("failed to request device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    #[error("surface out of memory")]
    OutOfMemory,

    #[error("{particles} particles exceed the device limit: {reason}")]
    FieldTooLarge { particles: u64, reason: String },
}

/// Recording readback failure; the frame is skipped
#[derive(Debug, Error)]
pub enum FrameCaptureError {
    #[error("failed to map readback buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("readback buffer was dropped before mapping finished")]
    MapCancelled,

    #[error("readback does not fill a {width}x{height} image")]
    SizeMismatch { width: u32, height: u32 },

    #[error("failed to write frame: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::FftSizeNotPowerOfTwo(1000);
        assert_eq!(err.to_string(), "FFT size must be a power of 2, got 1000");

        let err = ConfigError::EmptyBand {
            band: "bass",
            low: 250.0,
            high: 40.0,
        };
        assert!(err.to_string().contains("bass"));
    }
}
