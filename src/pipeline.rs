//! Per-tick orchestration: extract features, then step the field.
//!
//! The pipeline is the single context object carrying cross-tick state
//! (extractor smoothing, last features, clock). It is created at startup,
//! driven once per display tick, and dropped on shutdown.

use std::time::Duration;

use crate::audio::{AudioEvent, AudioFeatures, FeatureExtractor, Magnitude};
use crate::error::ConfigError;
use crate::field::{FieldStepper, FrameUniforms, Pointer};
use crate::params::AnalysisConfig;

/// Largest time step accepted from the host clock (seconds)
const MAX_DELTA_S: f32 = 0.1;

/// Whether the pipeline still does work
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineState {
    Running,
    /// Terminal: a device failed; the caller decides whether to rebuild
    Inert { reason: String },
}

/// Result of one tick
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    Advanced {
        features: AudioFeatures,
        events: Vec<AudioEvent>,
        /// False when no new spectrum arrived and features were held
        audio_fresh: bool,
    },
    Inert,
}

/// Audio-reactive field pipeline context
pub struct Pipeline {
    extractor: FeatureExtractor,
    features: AudioFeatures,
    time_s: f32,
    tick: u32,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(analysis: AnalysisConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            extractor: FeatureExtractor::new(analysis)?,
            features: AudioFeatures::default(),
            time_s: 0.0,
            tick: 0,
            state: PipelineState::Running,
        })
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PipelineState::Running
    }

    /// Last extracted (or held) features
    pub fn features(&self) -> AudioFeatures {
        self.features
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    pub fn time_s(&self) -> f32 {
        self.time_s
    }

    /// Move to the terminal inert state
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.is_running() {
            let reason = reason.into();
            log::error!("Pipeline stopped: {}", reason);
            self.state = PipelineState::Inert { reason };
        }
    }

    /// Run one tick.
    ///
    /// * `spectrum` - newest frame, or `None` to hold the previous features
    /// * `now` - time since start, used for event debouncing
    /// * `delta_s` - host time since the previous tick
    /// * `pointer` - world-space pointer
    /// * `field` - stepper that owns the particle buffers
    pub fn tick<M, F>(
        &mut self,
        spectrum: Option<&[M]>,
        now: Duration,
        delta_s: f32,
        pointer: Pointer,
        field: &mut F,
    ) -> TickOutcome
    where
        M: Magnitude,
        F: FieldStepper + ?Sized,
    {
        if !self.is_running() {
            return TickOutcome::Inert;
        }
        if let Some(reason) = field.device_lost() {
            self.fail(reason);
            return TickOutcome::Inert;
        }

        // Missing input holds the last features instead of flatlining
        let (events, audio_fresh) = match spectrum {
            Some(bins) => {
                let analysis = self.extractor.extract(bins, now);
                self.features = analysis.features;
                (analysis.events, true)
            }
            None => (Vec::new(), false),
        };

        let delta_s = if delta_s.is_finite() {
            delta_s.clamp(0.0, MAX_DELTA_S)
        } else {
            0.0
        };
        self.time_s += delta_s;
        self.tick = self.tick.wrapping_add(1);

        field.step(&FrameUniforms {
            time: self.time_s,
            delta_time: delta_s,
            energy: self.features.energy,
            tick: self.tick,
            pointer,
        });

        TickOutcome::Advanced {
            features: self.features,
            events,
            audio_fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::CpuField;
    use crate::params::FieldPhysics;

    /// Records the frames it was stepped with
    #[derive(Default)]
    struct RecordingStepper {
        frames: Vec<FrameUniforms>,
        lost: Option<String>,
    }

    impl FieldStepper for RecordingStepper {
        fn step(&mut self, frame: &FrameUniforms) {
            self.frames.push(*frame);
        }

        fn device_lost(&self) -> Option<String> {
            self.lost.clone()
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(AnalysisConfig::default()).unwrap()
    }

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_missing_frame_holds_features() {
        let mut p = pipeline();
        let mut field = RecordingStepper::default();
        let loud = vec![200u8; 1024];

        let first = p.tick(Some(&loud[..]), Duration::ZERO, DT, Pointer::default(), &mut field);
        let TickOutcome::Advanced { features, .. } = first else {
            panic!("pipeline went inert");
        };
        assert!(features.vol > 0.0);

        let held = p.tick::<u8, _>(
            None,
            Duration::from_millis(16),
            DT,
            Pointer::default(),
            &mut field,
        );
        match held {
            TickOutcome::Advanced {
                features: held_features,
                events,
                audio_fresh,
            } => {
                assert_eq!(held_features, features);
                assert!(events.is_empty());
                assert!(!audio_fresh);
            }
            TickOutcome::Inert => panic!("pipeline went inert"),
        }

        // The simulation still advanced on the held tick
        assert_eq!(field.frames.len(), 2);
        assert_eq!(field.frames[1].energy, features.energy);
        assert_eq!(field.frames[1].tick, 2);
    }

    #[test]
    fn test_clock_advances_and_clamps() {
        let mut p = pipeline();
        let mut field = RecordingStepper::default();

        p.tick::<u8, _>(None, Duration::ZERO, DT, Pointer::default(), &mut field);
        p.tick::<u8, _>(None, Duration::ZERO, 5.0, Pointer::default(), &mut field);
        p.tick::<u8, _>(None, Duration::ZERO, f32::NAN, Pointer::default(), &mut field);

        assert!((field.frames[0].time - DT).abs() < 1e-6);
        assert!((field.frames[1].delta_time - MAX_DELTA_S).abs() < 1e-6);
        assert_eq!(field.frames[2].delta_time, 0.0);
        assert_eq!(p.tick_count(), 3);
    }

    #[test]
    fn test_device_loss_makes_pipeline_inert() {
        let mut p = pipeline();
        let mut field = RecordingStepper {
            lost: Some("context lost".to_string()),
            ..Default::default()
        };

        let outcome = p.tick::<u8, _>(None, Duration::ZERO, DT, Pointer::default(), &mut field);
        assert_eq!(outcome, TickOutcome::Inert);
        assert_eq!(
            p.state(),
            &PipelineState::Inert {
                reason: "context lost".to_string()
            }
        );

        // No work after going inert, even if the device recovers
        field.lost = None;
        let outcome = p.tick::<u8, _>(None, Duration::ZERO, DT, Pointer::default(), &mut field);
        assert_eq!(outcome, TickOutcome::Inert);
        assert!(field.frames.is_empty());
    }

    #[test]
    fn test_drives_cpu_field() {
        let mut p = pipeline();
        let mut field = CpuField::new(FieldPhysics {
            grid_width: 4,
            ..Default::default()
        });
        let before = field.particles().to_vec();

        let spectrum = vec![0.5f32; 1024];
        for n in 0..10 {
            p.tick(
                Some(&spectrum[..]),
                Duration::from_millis(16 * n),
                DT,
                Pointer::default(),
                &mut field,
            );
        }

        assert_ne!(field.particles(), &before[..]);
        assert!(p.features().energy > 0.0);
    }
}
