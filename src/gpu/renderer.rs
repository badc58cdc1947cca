//! Instanced sprite renderer reading the current particle buffer.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use super::simulation::GpuField;
use crate::audio::{AudioEvent, AudioFeatures};
use crate::style::ParticleStyle;
use crate::visual::Visual;

/// Vertices per particle quad (two triangles)
const QUAD_VERTICES: u32 = 6;

/// Uniform block for particles.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct DrawParams {
    pub view_proj: [[f32; 4]; 4],
    pub viewport: [f32; 2],
    pub base_size: f32,
    pub size_attenuation: f32,
    pub bass: f32,
    pub high: f32,
    pub energy: f32,
    pub alpha_scale: f32,
}

impl DrawParams {
    pub fn new(
        view_proj: Mat4,
        viewport: (u32, u32),
        style: &ParticleStyle,
        features: &AudioFeatures,
    ) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            viewport: [viewport.0.max(1) as f32, viewport.1.max(1) as f32],
            base_size: style.base_size,
            size_attenuation: style.size_attenuation,
            bass: features.bass,
            high: features.high,
            energy: features.energy,
            alpha_scale: style.alpha_scale,
        }
    }
}

/// Draws the flame from whichever particle buffer is current
pub struct ParticleRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    /// One per particle buffer, indexed by the field's ping-pong slot
    bind_groups: [wgpu::BindGroup; 2],
    instance_count: u32,
    style: ParticleStyle,
    features: AudioFeatures,
}

impl ParticleRenderer {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        field: &GpuField,
        style: ParticleStyle,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/particles.wgsl").into()),
        });

        let params = DrawParams::new(Mat4::IDENTITY, (1, 1), &style, &AudioFeatures::default());
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Uniform Buffer"),
            contents: bytemuck::cast_slice(&[params]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_groups = [0, 1].map(|slot| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Particle Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: field.buffers()[slot].as_entire_binding(),
                    },
                ],
            })
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Additive: overlapping particles brighten instead of occluding
        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(additive),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_groups,
            instance_count: field.particle_count(),
            style,
            features: AudioFeatures::default(),
        }
    }

    /// Upload camera and audio uniforms for the next draw
    pub fn prepare(&self, queue: &wgpu::Queue, view_proj: Mat4, viewport: (u32, u32)) {
        let params = DrawParams::new(view_proj, viewport, &self.style, &self.features);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[params]));
    }

    /// Clear the target and draw every particle from buffer `slot`
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView, slot: usize) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Particle Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_groups[slot], &[]);
        render_pass.draw(0..QUAD_VERTICES, 0..self.instance_count);
    }
}

impl Visual for ParticleRenderer {
    fn on_tick(&mut self, features: &AudioFeatures, _events: &[AudioEvent]) {
        self.features = features.sanitized();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RenderConfig;

    #[test]
    fn test_draw_params_layout() {
        assert_eq!(std::mem::size_of::<DrawParams>(), 96);
        assert_eq!(std::mem::offset_of!(DrawParams, viewport), 64);
    }

    #[test]
    fn test_draw_params_carry_features() {
        let style = ParticleStyle::from(&RenderConfig::default());
        let features = AudioFeatures {
            bass: 0.8,
            high: 0.3,
            energy: 0.5,
            ..Default::default()
        };
        let params = DrawParams::new(Mat4::IDENTITY, (0, 720), &style, &features);
        assert_eq!(params.viewport, [1.0, 720.0]);
        assert_eq!(params.bass, 0.8);
        assert_eq!(params.high, 0.3);
        assert_eq!(params.energy, 0.5);
        assert_eq!(params.alpha_scale, style.alpha_scale);
    }
}
