//! Microphone capture with a background spectrum analysis thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use super::fft::SpectrumAnalyzer;
use crate::error::CaptureError;
use crate::params::AnalysisConfig;

/// Latest-wins mailbox for spectrum frames.
///
/// The analysis thread publishes; the tick takes. A take with no new frame
/// since the last one returns `None`.
#[derive(Clone, Default)]
pub struct SpectrumSlot {
    latest: Arc<Mutex<Option<Vec<u8>>>>,
}

impl SpectrumSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any unread frame with `frame`
    pub fn publish(&self, frame: Vec<u8>) {
        *lock(&self.latest) = Some(frame);
    }

    /// Take the newest unread frame, if any
    pub fn take_latest(&self) -> Option<Vec<u8>> {
        lock(&self.latest).take()
    }
}

/// Capture system: input stream plus analysis thread
pub struct AudioCapture {
    slot: SpectrumSlot,
    sample_rate_hz: u32,

    /// Input stream (kept alive)
    _stream: cpal::Stream,

    stop: Arc<AtomicBool>,
    analysis_thread: Option<thread::JoinHandle<()>>,
}

impl AudioCapture {
    /// Open the default input device and start analysis
    pub fn new(config: &AnalysisConfig) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoInputDevice)?;

        let supported = device.default_input_config()?;
        let sample_rate_hz = supported.sample_rate().0;
        let channels = supported.channels() as usize;

        log::info!(
            "Audio input: {} @ {}Hz, {} channel(s)",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate_hz,
            channels
        );

        let samples = Arc::new(Mutex::new(Vec::<f32>::with_capacity(config.fft_size * 2)));
        let stream_config: cpal::StreamConfig = supported.config();

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, channels, Arc::clone(&samples))?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, channels, Arc::clone(&samples))?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, channels, Arc::clone(&samples))?
            }
            other => return Err(CaptureError::UnsupportedFormat(other)),
        };
        stream.play()?;

        let analysis_config = AnalysisConfig {
            sample_rate_hz: sample_rate_hz as usize,
            ..config.clone()
        };
        let slot = SpectrumSlot::new();
        let stop = Arc::new(AtomicBool::new(false));
        let analysis_thread = spawn_analysis_thread(
            analysis_config,
            samples,
            slot.clone(),
            Arc::clone(&stop),
        );

        Ok(Self {
            slot,
            sample_rate_hz,
            _stream: stream,
            stop,
            analysis_thread: Some(analysis_thread),
        })
    }

    /// Device sample rate; band bin ranges must be derived from this
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Newest unread spectrum frame
    pub fn poll(&self) -> Option<Vec<u8>> {
        self.slot.take_latest()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.analysis_thread.take() {
            if handle.join().is_err() {
                log::warn!("Audio analysis thread panicked");
            }
        }
    }
}

/// Build an input stream that mixes every channel down to mono
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    samples: Arc<Mutex<Vec<f32>>>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = channels.max(1);
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mut buf = lock(&samples);
            for frame in data.chunks(channels) {
                let sum: f32 = frame.iter().map(|&s| s.to_sample::<f32>()).sum();
                buf.push(sum / frame.len() as f32);
            }
        },
        |err| log::warn!("Audio stream error: {}", err),
        None,
    )
}

/// Spawn the analysis thread: every interval, FFT the newest window
fn spawn_analysis_thread(
    config: AnalysisConfig,
    samples: Arc<Mutex<Vec<f32>>>,
    slot: SpectrumSlot,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut analyzer = SpectrumAnalyzer::new(&config);
        let mut window = Vec::with_capacity(config.fft_size);

        while !stop.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(config.update_interval_ms));

            {
                let mut buf = lock(&samples);
                if buf.len() < config.fft_size {
                    continue;
                }
                // Keep only the newest window; older samples are stale
                let excess = buf.len() - config.fft_size;
                buf.drain(..excess);
                window.clear();
                window.extend_from_slice(&buf);
            }

            slot.publish(analyzer.analyze(&window));
        }
    })
}

/// Lock a mutex, recovering the data if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
