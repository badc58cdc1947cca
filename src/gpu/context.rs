//! Device, queue and surface ownership.

use std::sync::{mpsc, Arc, OnceLock};

use image::RgbaImage;
use log::{info, warn};
use winit::window::Window;

use crate::error::{FrameCaptureError, GpuError};

/// Set once by the device-lost callback, read on every tick
#[derive(Clone, Debug, Default)]
pub struct DeviceLost(Arc<OnceLock<String>>);

impl DeviceLost {
    /// Record the first loss; later reports are ignored
    pub fn mark(&self, reason: impl Into<String>) {
        let _ = self.0.set(reason.into());
    }

    pub fn reason(&self) -> Option<String> {
        self.0.get().cloned()
    }
}

/// GPU context managing the wgpu device and window surface
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub config: wgpu::SurfaceConfiguration,
    lost: DeviceLost,
}

impl GpuContext {
    /// Create the device and configure the window surface.
    ///
    /// `capture` adds COPY_SRC to the surface so frames can be read back.
    pub async fn new(window: Arc<Window>, capture: bool) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Window must have 'static lifetime via Arc
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        info!(
            "GPU adapter: {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Flame Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let lost = DeviceLost::default();
        let flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            flag.mark(format!("device lost ({:?}): {}", reason, message));
        });

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::NoSurfaceFormat)?;

        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if capture {
            usage |= wgpu::TextureUsages::COPY_SRC;
        }

        let config = wgpu::SurfaceConfiguration {
            usage,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device: Arc::new(device),
            queue: Arc::new(queue),
            config,
            lost,
        })
    }

    /// Shared handle to the device-lost flag
    pub fn lost(&self) -> DeviceLost {
        self.lost.clone()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigure the surface; zero-sized (minimised) windows are skipped
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Next surface texture, or `None` when this tick's frame must be skipped
    pub fn acquire(&self) -> Result<Option<wgpu::SurfaceTexture>, GpuError> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(GpuError::OutOfMemory),
            Err(e) => {
                warn!("Skipping frame: {}", e);
                Ok(None)
            }
        }
    }

    /// Read a presented texture back and write it to `path` as PNG
    pub fn capture_frame(
        &self,
        texture: &wgpu::Texture,
        path: &str,
    ) -> Result<(), FrameCaptureError> {
        self.read_texture(texture)?.save(path)?;
        Ok(())
    }

    /// Blocking readback of an RGBA8 or BGRA8 texture
    fn read_texture(&self, texture: &wgpu::Texture) -> Result<RgbaImage, FrameCaptureError> {
        let extent = texture.size();
        let (width, height) = (extent.width, extent.height);
        let layout = ReadbackLayout::new(width, height);

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Readback Buffer"),
            size: layout.buffer_size(),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(layout.padded_row_bytes),
                    rows_per_image: Some(height),
                },
            },
            extent,
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        wait_for_map(&receiver)?;

        let swap_red_blue = matches!(
            self.config.format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );
        let pixels = {
            let mapped = slice.get_mapped_range();
            layout.unpad(&mapped, swap_red_blue)
        };
        staging.unmap();

        RgbaImage::from_raw(width, height, pixels)
            .ok_or(FrameCaptureError::SizeMismatch { width, height })
    }
}

/// Outcome of a `map_async` callback; a dropped sender means it never ran
fn wait_for_map(
    receiver: &mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>,
) -> Result<(), FrameCaptureError> {
    receiver
        .recv()
        .map_err(|_| FrameCaptureError::MapCancelled)?
        .map_err(FrameCaptureError::from)
}

/// Row layout of a texture-to-buffer copy; rows are padded to
/// `COPY_BYTES_PER_ROW_ALIGNMENT`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ReadbackLayout {
    row_bytes: u32,
    padded_row_bytes: u32,
    rows: u32,
}

impl ReadbackLayout {
    /// Four bytes per pixel: the surface is RGBA8 or BGRA8
    fn new(width: u32, height: u32) -> Self {
        let row_bytes = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        Self {
            row_bytes,
            padded_row_bytes: row_bytes.div_ceil(align) * align,
            rows: height,
        }
    }

    fn buffer_size(&self) -> u64 {
        self.padded_row_bytes as u64 * self.rows as u64
    }

    /// Tightly packed RGBA rows, swapping red and blue for BGRA sources
    fn unpad(&self, data: &[u8], swap_red_blue: bool) -> Vec<u8> {
        let row_bytes = self.row_bytes as usize;
        let mut out = Vec::with_capacity(row_bytes * self.rows as usize);
        for row in data
            .chunks(self.padded_row_bytes as usize)
            .take(self.rows as usize)
        {
            out.extend_from_slice(&row[..row_bytes.min(row.len())]);
        }
        if swap_red_blue {
            for pixel in out.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lost_keeps_first_reason() {
        let lost = DeviceLost::default();
        assert_eq!(lost.reason(), None);

        let handle = lost.clone();
        handle.mark("driver reset");
        handle.mark("later");
        assert_eq!(lost.reason().as_deref(), Some("driver reset"));
    }

    #[test]
    fn test_readback_rows_are_aligned() {
        let layout = ReadbackLayout::new(720, 1280);
        assert_eq!(layout.row_bytes, 2880);
        // 2880 rounds up to the next multiple of 256
        assert_eq!(layout.padded_row_bytes, 3072);
        assert_eq!(layout.buffer_size(), 3072 * 1280);

        let exact = ReadbackLayout::new(64, 2);
        assert_eq!(exact.padded_row_bytes, exact.row_bytes);
    }

    #[test]
    fn test_unpad_strips_padding_and_swaps_bgra() {
        // Two rows of one pixel, padded to 8 bytes
        let layout = ReadbackLayout {
            row_bytes: 4,
            padded_row_bytes: 8,
            rows: 2,
        };
        let data = [1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8, 0, 0, 0, 0];
        assert_eq!(layout.unpad(&data, false), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(layout.unpad(&data, true), vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn test_failed_map_is_reported() {
        let (sender, receiver) = mpsc::channel();
        sender.send(Err(wgpu::BufferAsyncError)).unwrap();
        assert!(matches!(
            wait_for_map(&receiver),
            Err(FrameCaptureError::Map(_))
        ));

        sender.send(Ok(())).unwrap();
        assert!(wait_for_map(&receiver).is_ok());

        drop(sender);
        assert!(matches!(
            wait_for_map(&receiver),
            Err(FrameCaptureError::MapCancelled)
        ));
    }
}
