//! Where the tick gets its spectrum frames from.

use std::time::Duration;

use super::capture::AudioCapture;
use crate::params::AnalysisConfig;

/// Generated test signal: a kick every 500 ms, hats every 125 ms,
/// and a slowly breathing mid pad.
pub struct SyntheticSpectrum {
    bass_bins: std::ops::Range<usize>,
    mid_bins: std::ops::Range<usize>,
    high_bins: std::ops::Range<usize>,
    bin_count: usize,
}

impl SyntheticSpectrum {
    const KICK_PERIOD_S: f32 = 0.5;
    const HAT_PERIOD_S: f32 = 0.125;

    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            bass_bins: config.bass_bins(),
            mid_bins: config.mid_bins(),
            high_bins: config.high_bins(),
            bin_count: config.bin_count(),
        }
    }

    /// Spectrum frame at time `now`
    pub fn frame(&self, now: Duration) -> Vec<u8> {
        let t = now.as_secs_f32();
        let kick = (-(t % Self::KICK_PERIOD_S) * 12.0).exp();
        let hat = (-(t % Self::HAT_PERIOD_S) * 40.0).exp();
        let pad = 0.35 + 0.25 * (t * 0.4).sin();

        (0..self.bin_count)
            .map(|bin| {
                let level = if self.bass_bins.contains(&bin) {
                    kick
                } else if self.mid_bins.contains(&bin) {
                    pad
                } else if self.high_bins.contains(&bin) {
                    0.3 * hat
                } else {
                    0.0
                };
                (level.clamp(0.0, 1.0) * 255.0) as u8
            })
            .collect()
    }
}

/// Spectrum input for the tick
pub enum InputSource {
    Microphone(AudioCapture),
    Synthetic(SyntheticSpectrum),
}

impl InputSource {
    /// Newest spectrum frame, or `None` when nothing new is available
    pub fn poll(&self, now: Duration) -> Option<Vec<u8>> {
        match self {
            InputSource::Microphone(capture) => capture.poll(),
            InputSource::Synthetic(synth) => Some(synth.frame(now)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_kick_envelope() {
        let config = AnalysisConfig::default();
        let synth = SyntheticSpectrum::new(&config);
        let bass_bin = config.bass_bins().start;

        let on_kick = synth.frame(Duration::from_millis(500));
        let between = synth.frame(Duration::from_millis(900));
        assert_eq!(on_kick.len(), config.bin_count());
        assert_eq!(on_kick[bass_bin], 255);
        assert!(between[bass_bin] < 10);
        assert_eq!(on_kick[0], 0);
    }
}
