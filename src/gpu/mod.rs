//! GPU-resident field: wgpu device setup, compute step and particle renderer.

mod context;
mod renderer;
mod simulation;

// Re-export public types
pub use context::{DeviceLost, GpuContext};
pub use renderer::{DrawParams, ParticleRenderer};
pub use simulation::{check_device_limits, workgroup_count, GpuField, SimParams, WORKGROUP_SIZE};
