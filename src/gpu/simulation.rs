//! Compute-shader field stepper with ping-pong storage buffers.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::context::DeviceLost;
use crate::audio::unit;
use crate::error::GpuError;
use crate::field::{FieldStepper, FrameUniforms, Particle, PingPong};
use crate::params::FieldPhysics;

/// Invocations per workgroup, must match `@workgroup_size` in simulate.wgsl
pub const WORKGROUP_SIZE: u32 = 64;

/// Workgroups needed to cover `particles` invocations
pub fn workgroup_count(particles: u32) -> u32 {
    particles.div_ceil(WORKGROUP_SIZE)
}

/// Reject populations whose buffers or dispatch the device cannot hold
pub fn check_device_limits(particles: u32, limits: &wgpu::Limits) -> Result<(), GpuError> {
    let too_large = |reason: String| GpuError::FieldTooLarge {
        particles: particles as u64,
        reason,
    };

    let bytes = particles as u64 * std::mem::size_of::<Particle>() as u64;
    let binding_limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    if bytes > binding_limit {
        return Err(too_large(format!(
            "{} byte particle buffer, storage binding limit is {}",
            bytes, binding_limit
        )));
    }

    let groups = workgroup_count(particles);
    if groups > limits.max_compute_workgroups_per_dimension {
        return Err(too_large(format!(
            "{} workgroups, dispatch limit is {}",
            groups, limits.max_compute_workgroups_per_dimension
        )));
    }
    Ok(())
}

/// Uniform block for simulate.wgsl (field order matches `SimParams` there)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SimParams {
    pub time: f32,
    pub delta_time: f32,
    pub energy: f32,
    pub tick: u32,
    /// x, y, active (0 or 1), unused
    pub pointer: [f32; 4],
    pub base_decay: f32,
    pub energy_decay_gain: f32,
    pub kill_life: f32,
    pub kill_height: f32,
    pub noise_scale: f32,
    pub noise_time_scale: f32,
    pub curl_epsilon: f32,
    pub noise_base_strength: f32,
    pub noise_energy_gain: f32,
    pub base_drift: f32,
    pub drift_energy_gain: f32,
    pub burst_threshold: f32,
    pub burst_strength: f32,
    pub source_radius: f32,
    pub source_y: f32,
    pub source_height: f32,
    pub respawn_life_min: f32,
    pub respawn_life_max: f32,
    pub repel_radius: f32,
    pub repel_gain: f32,
    pub repel_min_distance: f32,
    pub seed: u32,
    pub particle_count: u32,
    pub _padding: u32,
}

impl SimParams {
    pub fn new(physics: &FieldPhysics, frame: &FrameUniforms) -> Self {
        let active = if frame.pointer.active { 1.0 } else { 0.0 };
        Self {
            time: frame.time,
            delta_time: frame.delta_time,
            energy: unit(frame.energy),
            tick: frame.tick,
            pointer: [frame.pointer.x, frame.pointer.y, active, 0.0],
            base_decay: physics.base_decay,
            energy_decay_gain: physics.energy_decay_gain,
            kill_life: physics.kill_life,
            kill_height: physics.kill_height,
            noise_scale: physics.noise_scale,
            noise_time_scale: physics.noise_time_scale,
            curl_epsilon: physics.curl_epsilon,
            noise_base_strength: physics.noise_base_strength,
            noise_energy_gain: physics.noise_energy_gain,
            base_drift: physics.base_drift,
            drift_energy_gain: physics.drift_energy_gain,
            burst_threshold: physics.burst_threshold,
            burst_strength: physics.burst_strength,
            source_radius: physics.source_radius,
            source_y: physics.source_y,
            source_height: physics.source_height,
            respawn_life_min: physics.respawn_life_min,
            respawn_life_max: physics.respawn_life_max,
            repel_radius: physics.repel_radius,
            repel_gain: physics.repel_gain,
            repel_min_distance: physics.repel_min_distance,
            seed: physics.seed,
            particle_count: physics.particle_count_u32(),
            _padding: 0,
        }
    }
}

/// GPU particle state store and compute stepper.
///
/// Bind group `k` reads buffer `k` and writes buffer `1 - k`, so the
/// ping-pong index selects both the step's bind group and the buffer the
/// renderer should draw.
pub struct GpuField {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    physics: FieldPhysics,
    pipeline: wgpu::ComputePipeline,
    params_buffer: wgpu::Buffer,
    buffers: [wgpu::Buffer; 2],
    bind_groups: [wgpu::BindGroup; 2],
    ping_pong: PingPong,
    lost: DeviceLost,
}

impl GpuField {
    /// Upload the initial population and build the compute pipeline
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        physics: FieldPhysics,
        initial: &[Particle],
        lost: DeviceLost,
    ) -> Result<Self, GpuError> {
        check_device_limits(physics.particle_count_u32(), &device.limits())?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Field Simulation Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/simulate.wgsl").into()),
        });

        let buffers = [0, 1].map(|k| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(if k == 0 { "Particle Buffer A" } else { "Particle Buffer B" }),
                contents: bytemuck::cast_slice(initial),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            })
        });

        let params = SimParams::new(&physics, &FrameUniforms::default());
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Simulation Params Buffer"),
            contents: bytemuck::cast_slice(&[params]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Simulation Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        });

        let bind_groups = [0, 1].map(|read| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Simulation Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: buffers[read].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: buffers[1 - read].as_entire_binding(),
                    },
                ],
            })
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Simulation Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Simulation Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            device,
            queue,
            physics,
            pipeline,
            params_buffer,
            buffers,
            bind_groups,
            ping_pong: PingPong::default(),
            lost,
        })
    }

    pub fn particle_count(&self) -> u32 {
        self.physics.particle_count_u32()
    }

    /// Both particle buffers, indexed by ping-pong slot
    pub fn buffers(&self) -> &[wgpu::Buffer; 2] {
        &self.buffers
    }

    /// Slot holding the current (last written) state
    pub fn current(&self) -> usize {
        self.ping_pong.read()
    }
}

impl FieldStepper for GpuField {
    fn step(&mut self, frame: &FrameUniforms) {
        let params = SimParams::new(&self.physics, frame);
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[params]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Simulation Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Simulation Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_groups[self.ping_pong.read()], &[]);
            pass.dispatch_workgroups(workgroup_count(self.particle_count()), 1, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.ping_pong.flip();
    }

    fn device_lost(&self) -> Option<String> {
        self.lost.reason()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Pointer;

    #[test]
    fn test_sim_params_layout() {
        // Must be a multiple of 16 for a WGSL uniform block
        assert_eq!(std::mem::size_of::<SimParams>(), 128);
        assert_eq!(std::mem::offset_of!(SimParams, pointer), 16);
    }

    #[test]
    fn test_sim_params_packing() {
        let physics = FieldPhysics::default();
        let frame = FrameUniforms {
            time: 2.0,
            delta_time: 0.016,
            energy: 1.7,
            tick: 9,
            pointer: Pointer {
                x: 1.0,
                y: -2.0,
                active: true,
            },
        };
        let params = SimParams::new(&physics, &frame);
        assert_eq!(params.energy, 1.0);
        assert_eq!(params.pointer, [1.0, -2.0, 1.0, 0.0]);
        assert_eq!(params.particle_count, 16_384);
        assert_eq!(params.seed, physics.seed);

        let idle = SimParams::new(&physics, &FrameUniforms::default());
        assert_eq!(idle.pointer[2], 0.0);
    }

    #[test]
    fn test_workgroup_count_covers_population() {
        assert_eq!(workgroup_count(16_384), 256);
        assert_eq!(workgroup_count(65), 2);
        assert_eq!(workgroup_count(1), 1);
    }

    #[test]
    fn test_device_limits_bound_the_population() {
        let limits = wgpu::Limits::default();
        assert!(check_device_limits(16_384, &limits).is_ok());

        // 9,000,000 particles need 144 MB, past the 128 MiB binding default
        let err = check_device_limits(9_000_000, &limits).unwrap_err();
        assert!(matches!(err, GpuError::FieldTooLarge { particles: 9_000_000, .. }));
        assert!(err.to_string().contains("binding"));

        // Fits the buffer but needs more than 65,535 workgroups
        let roomy = wgpu::Limits {
            max_storage_buffer_binding_size: u32::MAX,
            max_buffer_size: u64::MAX,
            ..wgpu::Limits::default()
        };
        let err = check_device_limits(8_000_000, &roomy).unwrap_err();
        assert!(err.to_string().contains("dispatch"));
        assert!(check_device_limits(65_535 * 64, &roomy).is_ok());
    }
}
