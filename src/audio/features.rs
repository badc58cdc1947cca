//! Spectral feature extraction: band energies, smoothing, transient events.

use std::ops::Range;
use std::time::Duration;

use super::{unit, AudioEvent, AudioEventType, AudioFeatures, Magnitude};
use crate::error::ConfigError;
use crate::params::AnalysisConfig;

/// Output of one extraction
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Analysis {
    pub features: AudioFeatures,
    pub events: Vec<AudioEvent>,
}

/// Sum and bin count of one band
#[derive(Clone, Copy, Debug, Default)]
struct BandSum {
    sum: f32,
    bins: usize,
}

impl BandSum {
    fn over<M: Magnitude>(spectrum: &[M], bins: &Range<usize>) -> Self {
        // Bands past the end of a short frame are clipped, not rejected
        let end = bins.end.min(spectrum.len());
        let start = bins.start.min(end);
        let slice = &spectrum[start..end];
        Self {
            sum: slice.iter().map(|m| m.to_unit()).sum(),
            bins: slice.len(),
        }
    }

    /// Normalized band value with gain, clamped to 1
    fn level(&self, gain: f32) -> f32 {
        if self.bins == 0 {
            return 0.0;
        }
        unit(self.sum / self.bins as f32 * gain)
    }
}

/// Turns spectrum frames into bounded features and debounced events.
///
/// Carries the smoothing state across calls: previous band mean, previous
/// energy, and the last emission time of each event kind.
pub struct FeatureExtractor {
    config: AnalysisConfig,
    bass_bins: Range<usize>,
    mid_bins: Range<usize>,
    high_bins: Range<usize>,

    prev_mean: f32,
    prev_energy: f32,
    last_onset: Option<Duration>,
    last_beat: Option<Duration>,

    /// Sound has been present since the last silence event
    silence_armed: bool,
    quiet_since: Option<Duration>,
}

impl FeatureExtractor {
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            bass_bins: config.bass_bins(),
            mid_bins: config.mid_bins(),
            high_bins: config.high_bins(),
            config,
            prev_mean: 0.0,
            prev_energy: 0.0,
            last_onset: None,
            last_beat: None,
            silence_armed: false,
            quiet_since: None,
        })
    }

    /// Extract features from one frame captured at `now` (time since start)
    pub fn extract<M: Magnitude>(&mut self, spectrum: &[M], now: Duration) -> Analysis {
        let c = &self.config;

        let bass_sum = BandSum::over(spectrum, &self.bass_bins);
        let mid_sum = BandSum::over(spectrum, &self.mid_bins);
        let high_sum = BandSum::over(spectrum, &self.high_bins);

        let bass = bass_sum.level(c.bass_gain);
        let mid = mid_sum.level(c.mid_gain);
        let high = high_sum.level(c.high_gain);

        let mean = (bass + mid + high) / 3.0;
        let vol = unit(mean * c.vol_gain);

        // Magnitude-weighted mean over every band bin
        let total_bins = bass_sum.bins + mid_sum.bins + high_sum.bins;
        let raw_energy = if total_bins > 0 {
            (bass_sum.sum + mid_sum.sum + high_sum.sum) / total_bins as f32
        } else {
            0.0
        };
        let energy = unit(
            self.prev_energy * c.energy_retain
                + raw_energy * c.energy_boost * (1.0 - c.energy_retain),
        );

        let chaos = unit((mean - self.prev_mean).abs() * c.chaos_gain);

        self.prev_mean = mean;
        self.prev_energy = energy;

        let features = AudioFeatures {
            vol,
            bass,
            mid,
            high,
            energy,
            chaos,
        }
        .sanitized();

        let events = self.detect_events(&features, now);
        Analysis { features, events }
    }

    fn detect_events(&mut self, f: &AudioFeatures, now: Duration) -> Vec<AudioEvent> {
        let c = &self.config;
        let mut events = Vec::new();

        if f.chaos > c.onset_chaos_threshold && elapsed(self.last_onset, now, c.onset_debounce) {
            events.push(AudioEvent {
                kind: AudioEventType::OnNoteOnset,
                intensity: f.chaos,
                timestamp: now,
            });
            self.last_onset = Some(now);
        }

        if f.bass > c.beat_bass_threshold
            && f.chaos > c.beat_chaos_threshold
            && elapsed(self.last_beat, now, c.beat_debounce)
        {
            events.push(AudioEvent {
                kind: AudioEventType::OnBeat,
                intensity: f.bass,
                timestamp: now,
            });
            self.last_beat = Some(now);
        }

        if f.vol >= c.silence_threshold {
            self.silence_armed = true;
            self.quiet_since = None;
        } else if self.silence_armed {
            let since = *self.quiet_since.get_or_insert(now);
            if now.saturating_sub(since) >= c.silence_hold {
                events.push(AudioEvent {
                    kind: AudioEventType::OnSilence,
                    intensity: unit(1.0 - f.vol / c.silence_threshold),
                    timestamp: now,
                });
                self.silence_armed = false;
                self.quiet_since = None;
            }
        }

        events
    }
}

/// True when no event was emitted yet or at least `window` has passed
fn elapsed(last: Option<Duration>, now: Duration, window: Duration) -> bool {
    last.map_or(true, |t| now.saturating_sub(t) >= window)
}
