//! GPU texture synchronization
//!
//! Keeps one GPU texture in step with the composited frame. All calls
//! happen on the host's render thread; nothing here is internally
//! synchronized.

mod gpu;
mod memory;
mod wgpu_backend;

pub use gpu::{GpuContext, GpuError};
pub use memory::{MemoryBackend, MemoryTexture};
pub use wgpu_backend::WgpuBackend;

use crate::compositor::CompositedFrame;
use crate::geometry::Rect;

/// Opaque handle of a texture owned by a backend
pub type TextureId = u64;

/// The GPU operations texture synchronization needs.
///
/// Implemented over wgpu for real hosts and over plain memory for headless
/// use and tests.
#[cfg_attr(test, mockall::automock)]
pub trait TextureBackend: Send {
    /// Allocate a `width` x `height` BGRA8 texture
    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, GpuError>;

    /// Upload `region` of a frame into the same region of `texture`.
    ///
    /// `pixels` is the whole frame, `stride` bytes per row.
    fn write_region(
        &mut self,
        texture: TextureId,
        pixels: &[u8],
        stride: u32,
        region: Rect,
    ) -> Result<(), GpuError>;

    /// Release a texture. Unknown handles are ignored.
    fn destroy_texture(&mut self, texture: TextureId);
}

/// How an upload was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Nothing to upload
    Skipped,
    /// Only the dirty region was written
    Partial(Rect),
    /// The texture was (re)allocated or fully rewritten
    Full,
}

/// Upload counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub full_uploads: u64,
    pub partial_uploads: u64,
    pub bytes_uploaded: u64,
}

/// Owns the GPU texture mirroring the composited frame
pub struct TextureSync<B: TextureBackend> {
    backend: B,
    texture: Option<TextureId>,
    width: u32,
    height: u32,
    stats: UploadStats,
}

impl<B: TextureBackend> TextureSync<B> {
    /// Create a texture sync without allocating anything yet
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            texture: None,
            width: 0,
            height: 0,
            stats: UploadStats::default(),
        }
    }

    /// Allocate the texture for a `width` x `height` view.
    ///
    /// Any previous texture is released first.
    pub fn initialize(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        self.cleanup();
        let texture = self.backend.create_texture(width, height)?;
        log::debug!("Created {}x{} texture #{}", width, height, texture);

        self.texture = Some(texture);
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Bring the texture up to date with `frame`.
    ///
    /// Only `dirty` is written while the texture matches the frame size;
    /// a size change reallocates the texture and uploads everything.
    pub fn upload(&mut self, frame: &CompositedFrame, dirty: Rect) -> Result<UploadKind, GpuError> {
        if frame.is_empty() {
            return Ok(UploadKind::Skipped);
        }

        let stride = frame.stride() as u32;
        let texture = match self.texture {
            Some(texture) if self.width == frame.width && self.height == frame.height => texture,
            _ => {
                self.initialize(frame.width, frame.height)?;
                let texture = self.texture.ok_or(GpuError::NotInitialized)?;
                self.backend
                    .write_region(texture, &frame.pixels, stride, frame.bounds())?;
                self.record(frame.bounds(), true);
                return Ok(UploadKind::Full);
            }
        };

        let region = dirty.clamp_to(frame.width, frame.height);
        if region.is_empty() {
            return Ok(UploadKind::Skipped);
        }

        self.backend.write_region(texture, &frame.pixels, stride, region)?;
        if region == frame.bounds() {
            self.record(region, true);
            Ok(UploadKind::Full)
        } else {
            self.record(region, false);
            Ok(UploadKind::Partial(region))
        }
    }

    fn record(&mut self, region: Rect, full: bool) {
        if full {
            self.stats.full_uploads += 1;
        } else {
            self.stats.partial_uploads += 1;
        }
        self.stats.bytes_uploaded += region.area() as u64 * crate::defaults::BYTES_PER_PIXEL as u64;
    }

    /// Release the texture. Safe to call when none exists.
    pub fn cleanup(&mut self) {
        if let Some(texture) = self.texture.take() {
            log::debug!("Destroying texture #{}", texture);
            self.backend.destroy_texture(texture);
        }
        self.width = 0;
        self.height = 0;
    }

    /// Current texture handle
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn is_ready(&self) -> bool {
        self.texture.is_some()
    }

    /// Size of the live texture, `(0, 0)` when none exists
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn stats(&self) -> UploadStats {
        self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    #[test]
    fn test_initialize_and_cleanup() {
        let mut sync = TextureSync::new(MemoryBackend::new());
        sync.initialize(800, 600).unwrap();
        assert!(sync.is_ready());
        assert_eq!(sync.size(), (800, 600));
        assert_eq!(sync.backend().texture_count(), 1);

        sync.cleanup();
        sync.cleanup();
        assert!(!sync.is_ready());
        assert_eq!(sync.backend().texture_count(), 0);
    }

    #[test]
    fn test_initialize_failure_leaves_not_ready() {
        let mut sync = TextureSync::new(MemoryBackend::with_max_dimension(256));
        assert!(matches!(
            sync.initialize(1024, 16),
            Err(GpuError::TextureAllocation { .. })
        ));
        assert!(!sync.is_ready());
    }

    #[test]
    fn test_partial_upload_when_size_matches() {
        let mut sync = TextureSync::new(MemoryBackend::new());
        sync.initialize(10, 10).unwrap();
        let frame = CompositedFrame::new(10, 10, WHITE);

        let kind = sync.upload(&frame, Rect::new(2, 2, 3, 3)).unwrap();
        assert_eq!(kind, UploadKind::Partial(Rect::new(2, 2, 3, 3)));
        assert_eq!(sync.stats().partial_uploads, 1);
        assert_eq!(sync.stats().bytes_uploaded, 36);
    }

    #[test]
    fn test_size_change_reallocates() {
        let mut sync = TextureSync::new(MemoryBackend::new());
        sync.initialize(10, 10).unwrap();
        let old = sync.texture();

        let frame = CompositedFrame::new(20, 5, WHITE);
        let kind = sync.upload(&frame, Rect::new(0, 0, 1, 1)).unwrap();
        assert_eq!(kind, UploadKind::Full);
        assert_ne!(sync.texture(), old);
        assert_eq!(sync.size(), (20, 5));
        assert_eq!(sync.backend().texture_count(), 1);
    }

    #[test]
    fn test_empty_dirty_skips_upload() {
        let mut backend = MockTextureBackend::new();
        backend.expect_create_texture().returning(|_, _| Ok(1));
        backend.expect_write_region().never();

        let mut sync = TextureSync::new(backend);
        sync.initialize(4, 4).unwrap();
        let frame = CompositedFrame::new(4, 4, WHITE);
        assert_eq!(sync.upload(&frame, Rect::new(10, 10, 2, 2)).unwrap(), UploadKind::Skipped);
    }

    #[test]
    fn test_upload_passes_stride_and_region() {
        let mut backend = MockTextureBackend::new();
        backend.expect_create_texture().with(eq(8), eq(4)).returning(|_, _| Ok(42));
        backend
            .expect_write_region()
            .withf(|texture, pixels, stride, region| {
                *texture == 42 && pixels.len() == 8 * 4 * 4 && *stride == 32 && *region == Rect::new(1, 1, 2, 2)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        backend.expect_destroy_texture().with(eq(42)).times(1).return_const(());

        let mut sync = TextureSync::new(backend);
        sync.initialize(8, 4).unwrap();
        let frame = CompositedFrame::new(8, 4, WHITE);
        sync.upload(&frame, Rect::new(1, 1, 2, 2)).unwrap();
        sync.cleanup();
    }
}
