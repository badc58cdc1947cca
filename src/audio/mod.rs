//! Microphone capture and spectral feature extraction.
//!
//! The capture side turns raw samples into byte-magnitude spectrum frames and
//! deposits the newest one into a [`SpectrumSlot`]. The tick polls the slot and
//! runs the [`FeatureExtractor`], which reduces a frame to [`AudioFeatures`]
//! plus zero or more [`AudioEvent`]s.

mod capture;
mod features;
mod fft;
mod source;

use std::time::Duration;

// Re-export public types
pub use capture::{AudioCapture, SpectrumSlot};
pub use features::{Analysis, FeatureExtractor};
pub use fft::{hann_window, SpectrumAnalyzer};
pub use source::{InputSource, SyntheticSpectrum};

/// Per-tick audio snapshot consumed read-only by every visual.
///
/// Every field lies in [0, 1] and is never NaN.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioFeatures {
    /// Perceptual loudness
    pub vol: f32,
    /// Low band energy (≈40-250 Hz)
    pub bass: f32,
    /// Mid band energy (≈250 Hz-2 kHz)
    pub mid: f32,
    /// High band energy (≈2-10 kHz)
    pub high: f32,
    /// Smoothed overall energy; lags `vol`
    pub energy: f32,
    /// Frame-to-frame change, a proxy for percussive content
    pub chaos: f32,
}

impl AudioFeatures {
    /// Clamp every field into [0, 1], mapping NaN to 0
    pub fn sanitized(self) -> Self {
        Self {
            vol: unit(self.vol),
            bass: unit(self.bass),
            mid: unit(self.mid),
            high: unit(self.high),
            energy: unit(self.energy),
            chaos: unit(self.chaos),
        }
    }

    pub fn as_array(&self) -> [f32; 6] {
        [
            self.vol,
            self.bass,
            self.mid,
            self.high,
            self.energy,
            self.chaos,
        ]
    }
}

/// Clamp into [0, 1]; NaN becomes 0
pub(crate) fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Discrete event kinds emitted by the extractor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AudioEventType {
    /// Sudden loudness change (plucked string, snare)
    OnNoteOnset,
    /// Heavy low-end hit
    OnBeat,
    /// Sound stopped after having been present
    OnSilence,
}

/// One-tick event; never retained by the extractor
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioEvent {
    pub kind: AudioEventType,
    /// Event strength in [0, 1]
    pub intensity: f32,
    /// Time since pipeline start
    pub timestamp: Duration,
}

/// A spectrum bin value that can be normalized against full scale
pub trait Magnitude: Copy {
    /// Magnitude in [0, 1]; non-finite input maps to 0
    fn to_unit(self) -> f32;
}

impl Magnitude for u8 {
    fn to_unit(self) -> f32 {
        self as f32 / u8::MAX as f32
    }
}

impl Magnitude for f32 {
    fn to_unit(self) -> f32 {
        if self.is_finite() {
            self.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_clamps_and_removes_nan() {
        let raw = AudioFeatures {
            vol: 1.7,
            bass: -0.2,
            mid: f32::NAN,
            high: 0.5,
            energy: f32::INFINITY,
            chaos: 0.0,
        };
        let clean = raw.sanitized();
        assert_eq!(clean.vol, 1.0);
        assert_eq!(clean.bass, 0.0);
        assert_eq!(clean.mid, 0.0);
        assert_eq!(clean.high, 0.5);
        assert_eq!(clean.energy, 1.0);
    }

    #[test]
    fn test_magnitude_normalization() {
        assert_eq!(255u8.to_unit(), 1.0);
        assert_eq!(0u8.to_unit(), 0.0);
        assert_eq!(0.25f32.to_unit(), 0.25);
        assert_eq!(f32::NAN.to_unit(), 0.0);
        assert_eq!(3.0f32.to_unit(), 1.0);
    }
}
