//! Audio analysis configuration and constants.

use std::ops::Range;
use std::time::Duration;

use log::warn;

use crate::error::ConfigError;

/// Spectrum analysis configuration with frequency band mappings
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Capture sample rate (Hz), replaced by the device rate once the stream opens
    pub sample_rate_hz: usize,

    /// FFT window size (must be power of 2); the spectrum has fft_size / 2 bins
    pub fft_size: usize,

    /// Spectrum update interval (milliseconds)
    /// 16 ms ≈ one frame at 60 Hz
    pub update_interval_ms: u64,

    /// Analyser temporal smoothing (0 = none, 1 = frozen)
    pub smoothing_time_constant: f32,

    /// dBFS mapped to magnitude 0
    pub min_decibels: f32,

    /// dBFS mapped to full-scale magnitude
    pub max_decibels: f32,

    /// Bass frequency range (Hz)
    pub bass_range_hz: (f32, f32),

    /// Mid frequency range (Hz)
    pub mid_range_hz: (f32, f32),

    /// High frequency range (Hz)
    pub high_range_hz: (f32, f32),

    /// Band gains applied after normalization
    pub bass_gain: f32,
    pub mid_gain: f32,
    pub high_gain: f32,

    /// Gain applied to the band mean to produce `vol`
    pub vol_gain: f32,

    /// Energy EMA: energy = prev * retain + raw * boost * (1 - retain)
    pub energy_retain: f32,
    pub energy_boost: f32,

    /// Multiplier from frame-to-frame band-mean delta to `chaos`
    pub chaos_gain: f32,

    /// Onset: chaos above this fires ON_NOTE_ONSET
    pub onset_chaos_threshold: f32,
    pub onset_debounce: Duration,

    /// Beat: bass and chaos above these fire ON_BEAT
    pub beat_bass_threshold: f32,
    pub beat_chaos_threshold: f32,
    pub beat_debounce: Duration,

    /// Silence: vol below this for `silence_hold` fires ON_SILENCE
    pub silence_threshold: f32,
    pub silence_hold: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48000,
            fft_size: 2048,
            update_interval_ms: 16,
            smoothing_time_constant: 0.5,
            min_decibels: -100.0,
            max_decibels: -30.0,
            bass_range_hz: (40.0, 250.0),
            mid_range_hz: (250.0, 2000.0),
            high_range_hz: (2000.0, 10000.0),
            bass_gain: 1.5,
            mid_gain: 1.5,
            high_gain: 2.0,
            vol_gain: 1.5,
            energy_retain: 0.95,
            energy_boost: 1.5,
            chaos_gain: 10.0,
            onset_chaos_threshold: 0.4,
            onset_debounce: Duration::from_millis(100),
            beat_bass_threshold: 0.8,
            beat_chaos_threshold: 0.2,
            beat_debounce: Duration::from_millis(300),
            silence_threshold: 0.02,
            silence_hold: Duration::from_millis(1500),
        }
    }
}

impl AnalysisConfig {
    /// Number of magnitude bins in one spectrum frame
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Convert frequency (Hz) to FFT bin index
    pub fn hz_to_bin(&self, hz: f32) -> usize {
        ((hz * self.fft_size as f32) / self.sample_rate_hz as f32) as usize
    }

    /// Get FFT bin range for bass frequencies
    pub fn bass_bins(&self) -> Range<usize> {
        self.hz_to_bin(self.bass_range_hz.0)..self.hz_to_bin(self.bass_range_hz.1)
    }

    /// Get FFT bin range for mid frequencies
    pub fn mid_bins(&self) -> Range<usize> {
        self.hz_to_bin(self.mid_range_hz.0)..self.hz_to_bin(self.mid_range_hz.1)
    }

    /// Get FFT bin range for high frequencies
    pub fn high_bins(&self) -> Range<usize> {
        self.hz_to_bin(self.high_range_hz.0)..self.hz_to_bin(self.high_range_hz.1)
    }

    /// Switch to the device sample rate, clipping any band that ends above
    /// the new Nyquist frequency
    pub fn set_sample_rate(&mut self, sample_rate_hz: usize) {
        self.sample_rate_hz = sample_rate_hz;
        let nyquist = sample_rate_hz as f32 / 2.0;
        for (band, range) in [
            ("bass", &mut self.bass_range_hz),
            ("mid", &mut self.mid_range_hz),
            ("high", &mut self.high_range_hz),
        ] {
            if range.1 > nyquist {
                warn!(
                    "{} band {}..{} Hz clipped to Nyquist at {} Hz",
                    band, range.0, range.1, nyquist
                );
                range.1 = nyquist;
            }
        }
    }

    /// Validate configuration (FFT size must be power of 2, bands ordered, etc.)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fft_size.is_power_of_two() {
            return Err(ConfigError::FftSizeNotPowerOfTwo(self.fft_size));
        }
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }

        let nyquist = self.sample_rate_hz as f32 / 2.0;
        for (band, (low, high)) in [
            ("bass", self.bass_range_hz),
            ("mid", self.mid_range_hz),
            ("high", self.high_range_hz),
        ] {
            if !(low < high) || low < 0.0 {
                return Err(ConfigError::EmptyBand { band, low, high });
            }
            if high > nyquist {
                return Err(ConfigError::BandAboveNyquist { band, nyquist });
            }
        }

        check_unit("smoothing_time_constant", self.smoothing_time_constant)?;
        check_unit("energy_retain", self.energy_retain)?;
        if !(self.min_decibels < self.max_decibels) {
            return Err(ConfigError::OutOfRange {
                name: "min_decibels",
                value: self.min_decibels,
                min: f32::MIN,
                max: self.max_decibels,
            });
        }
        Ok(())
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hz_to_bin() {
        let config = AnalysisConfig::default();

        // 48000 Hz / 2048 bins ≈ 23.44 Hz per bin
        assert_eq!(config.hz_to_bin(0.0), 0);
        assert_eq!(config.hz_to_bin(23.5), 1);
        assert_eq!(config.hz_to_bin(250.0), 10);
    }

    #[test]
    fn test_band_ranges_are_contiguous() {
        let config = AnalysisConfig::default();

        let bass = config.bass_bins();
        let mid = config.mid_bins();
        let high = config.high_bins();

        assert_eq!(bass, 1..10);
        assert_eq!(mid.start, bass.end);
        assert_eq!(high.start, mid.end);
        assert!(high.end <= config.bin_count());
    }

    #[test]
    fn test_validate() {
        assert!(AnalysisConfig::default().validate().is_ok());

        let config = AnalysisConfig {
            fft_size: 1000,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::FftSizeNotPowerOfTwo(1000))
        );

        let config = AnalysisConfig {
            mid_range_hz: (2000.0, 250.0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyBand { band: "mid", .. })
        ));

        let config = AnalysisConfig {
            sample_rate_hz: 16000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BandAboveNyquist { band: "high", .. })
        ));
    }

    #[test]
    fn test_low_sample_rate_clips_high_band() {
        let mut config = AnalysisConfig::default();
        config.set_sample_rate(16000);

        assert_eq!(config.sample_rate_hz, 16000);
        assert_eq!(config.high_range_hz, (2000.0, 8000.0));
        assert_eq!(config.mid_range_hz, (250.0, 2000.0));
        assert!(config.validate().is_ok());
        assert!(config.high_bins().end <= config.bin_count());
    }

    #[test]
    fn test_band_entirely_above_nyquist_stays_invalid() {
        let mut config = AnalysisConfig::default();
        config.set_sample_rate(3000);
        assert_eq!(config.high_range_hz, (2000.0, 1500.0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyBand { band: "high", .. })
        ));
    }
}
