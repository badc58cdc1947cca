//! Consumers of the per-tick audio feature contract.

use crate::audio::{AudioEvent, AudioEventType, AudioFeatures};

/// Anything that reacts to extracted audio features once per tick.
///
/// Implementors only read the features; reactivity specific to one visual
/// lives in that visual.
pub trait Visual {
    fn on_tick(&mut self, features: &AudioFeatures, events: &[AudioEvent]);
}

/// Logs discrete audio events at debug level
#[derive(Debug, Default)]
pub struct EventLog {
    beats: u64,
}

impl EventLog {
    pub fn beats(&self) -> u64 {
        self.beats
    }
}

impl Visual for EventLog {
    fn on_tick(&mut self, _features: &AudioFeatures, events: &[AudioEvent]) {
        for event in events {
            if event.kind == AudioEventType::OnBeat {
                self.beats += 1;
            }
            log::debug!(
                "{:?} at {:.3}s (intensity {:.2})",
                event.kind,
                event.timestamp.as_secs_f32(),
                event.intensity
            );
        }
    }
}
