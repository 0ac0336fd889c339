//! wgpu texture backend

use std::collections::HashMap;

use wgpu::{Device, Queue, Texture, TextureFormat, TextureUsages, TextureView};

use super::{GpuError, TextureBackend, TextureId};
use crate::defaults::BYTES_PER_PIXEL;
use crate::geometry::Rect;

/// Texture backend writing into wgpu textures through the queue.
///
/// Textures are `Bgra8Unorm`, matching the engine's pixel layout, and
/// usable as shader bindings so the host can draw them directly.
pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    format: TextureFormat,
    textures: HashMap<TextureId, Texture>,
    next_id: TextureId,
}

impl WgpuBackend {
    /// Create a backend on a host-owned device
    pub fn new(device: Device, queue: Queue) -> Self {
        Self {
            device,
            queue,
            format: TextureFormat::Bgra8Unorm,
            textures: HashMap::new(),
            next_id: 1,
        }
    }

    /// Look up the wgpu texture behind a handle
    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    /// Create a default view of a texture for binding
    pub fn create_view(&self, id: TextureId) -> Option<TextureView> {
        self.textures
            .get(&id)
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()))
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }
}

impl TextureBackend for WgpuBackend {
    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, GpuError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(GpuError::TextureAllocation {
                width,
                height,
                reason: format!("device limit is {0}x{0}", max),
            });
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Web View Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST | TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let id = self.next_id;
        self.next_id += 1;
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn write_region(
        &mut self,
        texture: TextureId,
        pixels: &[u8],
        stride: u32,
        region: Rect,
    ) -> Result<(), GpuError> {
        let target = self
            .textures
            .get(&texture)
            .ok_or(GpuError::UnknownTexture(texture))?;

        let region = region.clamp_to(target.width(), target.height());
        if region.is_empty() {
            return Ok(());
        }

        let offset = region.y as u64 * u64::from(stride) + region.x as u64 * BYTES_PER_PIXEL as u64;
        let needed = offset
            + (region.height as u64 - 1) * u64::from(stride)
            + region.width as u64 * BYTES_PER_PIXEL as u64;
        if needed > pixels.len() as u64 {
            return Err(GpuError::Upload(format!(
                "{:?} needs {} bytes, frame holds {}",
                region,
                needed,
                pixels.len()
            )));
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: target,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x as u32,
                    y: region.y as u32,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset,
                bytes_per_row: Some(stride),
                rows_per_image: Some(region.height as u32),
            },
            wgpu::Extent3d {
                width: region.width as u32,
                height: region.height as u32,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(texture) = self.textures.remove(&texture) {
            texture.destroy();
        }
    }
}
