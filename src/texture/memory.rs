//! CPU-side texture backend
//!
//! Stands in for a GPU on headless hosts and in tests. Textures are plain
//! BGRA8 buffers that can be read back pixel by pixel.

use std::collections::HashMap;

use super::{GpuError, TextureBackend, TextureId};
use crate::defaults::{BYTES_PER_PIXEL, MAX_TEXTURE_DIMENSION};
use crate::geometry::Rect;

/// A texture held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTexture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl MemoryTexture {
    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Check that every pixel inside `rect` equals `color`
    pub fn region_is(&self, rect: Rect, color: [u8; 4]) -> bool {
        let rect = rect.clamp_to(self.width, self.height);
        (rect.y..rect.bottom())
            .flat_map(|y| (rect.x..rect.right()).map(move |x| (x as u32, y as u32)))
            .all(|(x, y)| self.get_pixel(x, y) == color)
    }

    /// Convert to an RGBA image, e.g. for writing a PNG snapshot
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        let mut rgba = self.pixels.clone();
        for px in rgba.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.swap(0, 2);
        }
        image::RgbaImage::from_raw(self.width, self.height, rgba)
    }
}

/// Texture backend storing textures in memory
#[derive(Debug)]
pub struct MemoryBackend {
    textures: HashMap<TextureId, MemoryTexture>,
    next_id: TextureId,
    max_dimension: u32,
}

impl MemoryBackend {
    /// Create a backend with the default texture size limit
    pub fn new() -> Self {
        Self::with_max_dimension(MAX_TEXTURE_DIMENSION)
    }

    /// Create a backend refusing textures wider or taller than `max_dimension`
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            textures: HashMap::new(),
            next_id: 1,
            max_dimension,
        }
    }

    /// Look up a texture
    pub fn texture(&self, id: TextureId) -> Option<&MemoryTexture> {
        self.textures.get(&id)
    }

    /// Number of live textures
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureBackend for MemoryBackend {
    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, GpuError> {
        if width == 0 || height == 0 || width > self.max_dimension || height > self.max_dimension {
            return Err(GpuError::TextureAllocation {
                width,
                height,
                reason: format!("limit is {0}x{0}", self.max_dimension),
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        self.textures.insert(
            id,
            MemoryTexture {
                width,
                height,
                pixels: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
            },
        );
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
            .get_mut(&texture)
            .ok_or(GpuError::UnknownTexture(texture))?;

        let region = region.clamp_to(target.width, target.height);
        let row_bytes = region.width.max(0) as usize * BYTES_PER_PIXEL;
        let dst_stride = target.width as usize * BYTES_PER_PIXEL;
        for y in region.y..region.bottom() {
            let s = y as usize * stride as usize + region.x as usize * BYTES_PER_PIXEL;
            let src = pixels.get(s..s + row_bytes).ok_or_else(|| {
                GpuError::Upload(format!("source too small for row {} of {:?}", y, region))
            })?;
            let d = y as usize * dst_stride + region.x as usize * BYTES_PER_PIXEL;
            target.pixels[d..d + row_bytes].copy_from_slice(src);
        }
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_destroy() {
        let mut backend = MemoryBackend::new();
        let id = backend.create_texture(4, 2).unwrap();
        assert_eq!(backend.texture(id).map(|t| t.pixels.len()), Some(32));

        backend.destroy_texture(id);
        backend.destroy_texture(id);
        assert!(backend.texture(id).is_none());
    }

    #[test]
    fn test_rejects_oversized_texture() {
        let mut backend = MemoryBackend::with_max_dimension(64);
        assert!(backend.create_texture(65, 1).is_err());
        assert!(backend.create_texture(0, 1).is_err());
    }

    #[test]
    fn test_write_region_uses_stride() {
        let mut backend = MemoryBackend::new();
        let id = backend.create_texture(3, 2).unwrap();
        let frame: Vec<u8> = (0..24).collect();

        backend.write_region(id, &frame, 12, Rect::new(1, 1, 2, 1)).unwrap();
        let texture = backend.texture(id).unwrap();
        assert_eq!(texture.get_pixel(1, 1), [16, 17, 18, 19]);
        assert_eq!(texture.get_pixel(2, 1), [20, 21, 22, 23]);
        assert_eq!(texture.get_pixel(0, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn test_write_unknown_texture() {
        let mut backend = MemoryBackend::new();
        assert!(matches!(
            backend.write_region(9, &[], 0, Rect::new(0, 0, 1, 1)),
            Err(GpuError::UnknownTexture(9))
        ));
    }

    #[test]
    fn test_rgba_conversion_swaps_channels() {
        let texture = MemoryTexture {
            width: 1,
            height: 1,
            pixels: vec![1, 2, 3, 4],
        };
        let image = texture.to_rgba_image().unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [3, 2, 1, 4]);
    }
}
