//! Emberflow - an audio-reactive flame
//!
//! Sixteen thousand embers ride a curl-noise updraft; the music decides how
//! fast they burn, how hard they rise and what colour they glow.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use glam::Vec2;
use log::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use emberflow::audio::{AudioCapture, InputSource, SyntheticSpectrum};
use emberflow::camera::CameraSystem;
use emberflow::cli::Args;
use emberflow::error::GpuError;
use emberflow::field::{initial_population, CpuField, Pointer};
use emberflow::gpu::{GpuContext, GpuField, ParticleRenderer};
use emberflow::params::{AnalysisConfig, FieldPhysics, RecordingConfig, RenderConfig};
use emberflow::pipeline::{Pipeline, PipelineState, TickOutcome};
use emberflow::raster::FrameRaster;
use emberflow::style::ParticleStyle;
use emberflow::visual::{EventLog, Visual};

/// Device-side state, created once the window exists
struct GpuState {
    context: GpuContext,
    field: GpuField,
    renderer: ParticleRenderer,
}

/// Mouse / touch state in window pixels
#[derive(Default)]
struct PointerInput {
    cursor: Option<Vec2>,
    pressed: bool,
}

/// Main application state
struct App {
    // Window and rendering
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    camera: CameraSystem,

    // Simulation
    pipeline: Pipeline,
    input: InputSource,
    events: EventLog,
    pointer: PointerInput,

    // Configuration
    physics: FieldPhysics,
    render_config: RenderConfig,
    recording: Option<RecordingConfig>,
    frame_num: usize,

    // Time tracking
    start_time: Instant,
    last_tick: Instant,

    /// Terminal error to report once the event loop returns
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(
        analysis: AnalysisConfig,
        physics: FieldPhysics,
        input: InputSource,
        recording: Option<RecordingConfig>,
    ) -> Result<Self> {
        let render_config = RenderConfig::default();
        let now = Instant::now();
        Ok(Self {
            window: None,
            gpu: None,
            camera: CameraSystem::new(&render_config),
            pipeline: Pipeline::new(analysis)?,
            input,
            events: EventLog::default(),
            pointer: PointerInput::default(),
            physics,
            render_config,
            recording,
            frame_num: 0,
            start_time: now,
            last_tick: now,
            failure: None,
        })
    }

    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title("Emberflow")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.render_config.window_width,
                self.render_config.window_height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("failed to create window")?,
        );

        let context = pollster::block_on(GpuContext::new(
            Arc::clone(&window),
            self.recording.is_some(),
        ))?;
        let field = GpuField::new(
            Arc::clone(&context.device),
            Arc::clone(&context.queue),
            self.physics.clone(),
            &initial_population(&self.physics),
            context.lost(),
        )?;
        let renderer = ParticleRenderer::new(
            &context.device,
            context.format(),
            &field,
            ParticleStyle::from(&self.render_config),
        );

        let (width, height) = context.size();
        self.camera.set_viewport(width, height);

        info!(
            "Emberflow running: {} particles, {}x{} (ESC to quit)",
            field.particle_count(),
            width,
            height
        );

        self.window = Some(window);
        self.gpu = Some(GpuState {
            context,
            field,
            renderer,
        });
        Ok(())
    }

    /// Pointer projected onto the flame plane
    fn pointer(&self) -> Pointer {
        let picked = self
            .pointer
            .cursor
            .filter(|_| self.pointer.pressed)
            .and_then(|cursor| self.camera.pick_plane(cursor));
        match picked {
            Some(world) => Pointer {
                x: world.x,
                y: world.y,
                active: true,
            },
            None => Pointer::default(),
        }
    }

    /// Run one tick and draw it. Returns false once the app should stop.
    fn tick_frame(&mut self) -> Result<bool> {
        let now = self.start_time.elapsed();
        let delta_s = match &self.recording {
            // Recorded output advances at a fixed rate regardless of capture cost
            Some(recording) => 1.0 / recording.fps as f32,
            None => self.last_tick.elapsed().as_secs_f32(),
        };
        self.last_tick = Instant::now();

        let spectrum = self.input.poll(now);
        let pointer = self.pointer();

        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(true);
        };

        let outcome = self.pipeline.tick(
            spectrum.as_deref(),
            now,
            delta_s,
            pointer,
            &mut gpu.field,
        );
        match outcome {
            TickOutcome::Advanced {
                features, events, ..
            } => {
                gpu.renderer.on_tick(&features, &events);
                self.events.on_tick(&features, &events);
            }
            TickOutcome::Inert => {
                let reason = match self.pipeline.state() {
                    PipelineState::Inert { reason } => reason.clone(),
                    PipelineState::Running => String::from("unknown"),
                };
                return Err(GpuError::DeviceLost(reason).into());
            }
        }

        let Some(frame) = gpu.context.acquire()? else {
            return Ok(true);
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        gpu.renderer
            .prepare(&gpu.context.queue, self.camera.view_proj(), gpu.context.size());

        let mut encoder = gpu
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        gpu.renderer
            .render(&mut encoder, &view, gpu.field.current());
        gpu.context.queue.submit(std::iter::once(encoder.finish()));

        let mut keep_running = true;
        if let Some(ref recording) = self.recording {
            let path = recording.frame_path(self.frame_num);
            if let Err(e) = gpu.context.capture_frame(&frame.texture, &path) {
                warn!("Failed to save frame {}: {}", self.frame_num, e);
            }
            self.frame_num += 1;
            if self.frame_num >= recording.total_frames() {
                info!(
                    "Recorded {} frames to {}",
                    self.frame_num,
                    recording.frames_dir()
                );
                keep_running = false;
            }
        }

        frame.present();
        Ok(keep_running)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.failure = Some(err);
        event_loop.exit();
    }

    fn finish(mut self) -> Result<()> {
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if !self.pipeline.is_running() {
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }
        if let Err(err) = self.init_gpu(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.context.resize(size.width, size.height);
                }
                self.camera.set_viewport(size.width, size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer.cursor = Some(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer.cursor = None;
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.pointer.pressed = state == ElementState::Pressed;
            }
            WindowEvent::Touch(touch) => {
                self.pointer.cursor = Some(Vec2::new(touch.location.x as f32, touch.location.y as f32));
                self.pointer.pressed = matches!(touch.phase, TouchPhase::Started | TouchPhase::Moved);
            }
            WindowEvent::RedrawRequested => match self.tick_frame() {
                Ok(true) => {}
                Ok(false) => event_loop.exit(),
                Err(err) => self.fail(event_loop, err),
            },
            _ => {}
        }
    }
}

/// Simulate on the CPU and write frames without opening a window
fn run_headless(
    args: &Args,
    analysis: AnalysisConfig,
    physics: FieldPhysics,
    input: InputSource,
    recording: Option<RecordingConfig>,
) -> Result<()> {
    let render_config = RenderConfig::default();
    let mut pipeline = Pipeline::new(analysis)?;
    let mut field = CpuField::new(physics);
    let mut raster = FrameRaster::new(&render_config);
    let mut events = EventLog::default();

    let fps = recording.as_ref().map_or(60, |r| r.fps);
    let delta_s = 1.0 / fps as f32;
    let ticks = recording
        .as_ref()
        .map_or(args.ticks as usize, |r| r.total_frames());
    // Live capture only produces frames in real time
    let realtime = matches!(input, InputSource::Microphone(_));

    let (width, height) = raster.size();
    info!(
        "Headless run: {} particles, {}x{}, {} ticks",
        field.particles().len(),
        width,
        height,
        ticks
    );

    for n in 0..ticks {
        let now = Duration::from_secs_f32(n as f32 * delta_s);
        let spectrum = input.poll(now);

        let outcome = pipeline.tick(
            spectrum.as_deref(),
            now,
            delta_s,
            Pointer::default(),
            &mut field,
        );
        if let TickOutcome::Advanced {
            features,
            events: fired,
            ..
        } = outcome
        {
            raster.on_tick(&features, &fired);
            events.on_tick(&features, &fired);
        }

        if let Some(ref recording) = recording {
            let path = recording.frame_path(n);
            raster
                .render(field.particles())
                .save(&path)
                .with_context(|| format!("failed to write {}", path))?;
        }

        if realtime {
            std::thread::sleep(Duration::from_secs_f32(delta_s));
        }
    }

    raster
        .render(field.particles())
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    info!(
        "Wrote {} after {} ticks, {:.1} s simulated ({} beats, energy {:.2})",
        args.output.display(),
        pipeline.tick_count(),
        pipeline.time_s(),
        events.beats(),
        pipeline.features().energy
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let physics = args.field_physics();
    physics.validate().context("invalid field parameters")?;

    let mut analysis = AnalysisConfig::default();
    let input = if args.synthetic {
        info!("Audio input: synthetic beat");
        InputSource::Synthetic(SyntheticSpectrum::new(&analysis))
    } else {
        let capture = AudioCapture::new(&analysis)
            .context("failed to open audio input (use --synthetic to run without one)")?;
        // Band bin ranges follow the device rate
        analysis.set_sample_rate(capture.sample_rate_hz() as usize);
        InputSource::Microphone(capture)
    };
    analysis.validate().context("invalid analysis parameters")?;

    let recording = args
        .create_recording_config()
        .context("failed to create recording directory")?;

    if args.headless {
        return run_headless(&args, analysis, physics, input, recording);
    }

    let mut app = App::new(analysis, physics, input, recording)?;
    let event_loop = EventLoop::new().map_err(|e| anyhow!("failed to start event loop: {}", e))?;
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("event loop error: {}", e))?;

    app.finish()
}
