//! FFT spectrum analysis producing byte-magnitude frames.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::params::AnalysisConfig;

/// Windowed FFT with temporal smoothing and dB-to-byte mapping.
///
/// Output bins follow the usual analyser convention: magnitude is smoothed
/// across frames, converted to dBFS, and mapped linearly from
/// [min_decibels, max_decibels] onto [0, 255].
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_db: f32,
    db_range: f32,
}

impl SpectrumAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        let size = config.fft_size;
        let mut planner = FftPlanner::new();

        Self {
            fft: planner.plan_fft_forward(size),
            window: (0..size).map(|i| hann_window(i, size)).collect(),
            buffer: vec![Complex::new(0.0, 0.0); size],
            smoothed: vec![0.0; config.bin_count()],
            smoothing: config.smoothing_time_constant,
            min_db: config.min_decibels,
            db_range: config.max_decibels - config.min_decibels,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Analyze the newest `fft_size` samples into a byte spectrum.
    ///
    /// Shorter input is zero-padded at the front.
    pub fn analyze(&mut self, samples: &[f32]) -> Vec<u8> {
        let size = self.fft_size();
        let take = samples.len().min(size);
        let recent = &samples[samples.len() - take..];
        let pad = size - take;

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { recent[i - pad] };
            let sample = if sample.is_finite() { sample } else { 0.0 };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        let scale = 1.0 / size as f32;
        self.smoothed
            .iter_mut()
            .zip(&self.buffer)
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() * scale;
                *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
                to_byte(*smoothed, self.min_db, self.db_range)
            })
            .collect()
    }
}

/// Map linear magnitude to a byte over the configured dB window
fn to_byte(magnitude: f32, min_db: f32, db_range: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - min_db) / db_range;
    scaled.clamp(0.0, 255.0) as u8
}

/// Hann window function for FFT analysis
pub fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let size = 1024;

        // Hann window should be 0 at edges, 1 at center
        assert!((hann_window(0, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size - 1, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size / 2, size) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_silence_maps_to_zero() {
        let config = AnalysisConfig::default();
        let mut analyzer = SpectrumAnalyzer::new(&config);
        let frame = analyzer.analyze(&vec![0.0; config.fft_size]);
        assert_eq!(frame.len(), config.bin_count());
        assert!(frame.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_sine_peaks_in_its_bin() {
        let config = AnalysisConfig::default();
        let mut analyzer = SpectrumAnalyzer::new(&config);

        // Quiet 100 Hz tone lands in the bass band without saturating
        let freq = 100.0;
        let samples: Vec<f32> = (0..config.fft_size)
            .map(|i| (2.0 * PI * freq * i as f32 / config.sample_rate_hz as f32).sin() * 0.01)
            .collect();

        let frame = analyzer.analyze(&samples);
        let peak = frame
            .iter()
            .enumerate()
            .max_by_key(|&(_, b)| *b)
            .map(|(i, _)| i)
            .unwrap();

        assert_eq!(peak, config.hz_to_bin(freq));
        assert!(config.bass_bins().contains(&peak));
        assert!(frame[peak] > 140 && frame[peak] < 255);
        assert_eq!(frame[config.high_bins().start + 100], 0);
    }

    #[test]
    fn test_to_byte_range() {
        assert_eq!(to_byte(0.0, -100.0, 70.0), 0);
        assert_eq!(to_byte(1.0, -100.0, 70.0), 255);
        // -65 dB sits halfway through [-100, -30]
        let half = to_byte(10f32.powf(-65.0 / 20.0), -100.0, 70.0);
        assert!((126..=128).contains(&half));
    }
}
