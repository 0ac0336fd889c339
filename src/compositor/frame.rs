//! Owned composited pixel buffer

use crate::defaults::BYTES_PER_PIXEL;
use crate::geometry::Rect;

/// A composited frame in the engine's native BGRA8 layout, row-major and
/// tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl CompositedFrame {
    /// Create a frame filled with `fill`
    pub fn new(width: u32, height: u32, fill: [u8; 4]) -> Self {
        let mut frame = Self {
            width,
            height,
            pixels: Vec::new(),
        };
        frame.reallocate(width, height, fill);
        frame
    }

    /// Frame with no pixels
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Rectangle covering the whole frame
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Discard the content and resize to `width` x `height`
    pub fn reallocate(&mut self, width: u32, height: u32, fill: [u8; 4]) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels
            .resize(width as usize * height as usize * BYTES_PER_PIXEL, 0);
        self.fill(fill);
    }

    /// Overwrite every pixel with `color`
    pub fn fill(&mut self, color: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&color);
        }
    }

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

    /// Set pixel at (x, y)
    pub fn set_pixel(&mut self, x: u32, y: u32, bgra: [u8; 4]) {
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.pixels[idx..idx + BYTES_PER_PIXEL].copy_from_slice(&bgra);
    }

    /// Copy pixels from a `src_width`-wide source buffer.
    ///
    /// `dst` is the target area in frame coordinates and is clipped to the
    /// frame; `(src_x, src_y)` is the source pixel that lands on `dst`'s
    /// top-left corner. Rows that would read past the end of `src` are
    /// skipped. Returns the area actually written.
    pub fn blit(&mut self, dst: Rect, src: &[u8], src_width: u32, src_x: i32, src_y: i32) -> Rect {
        let clipped = dst.intersection(&self.bounds());
        if clipped.is_empty() || src_width == 0 {
            return Rect::empty();
        }

        // Shift the source origin by however much clipping moved the target.
        let src_x = src_x + (clipped.x - dst.x);
        let src_y = src_y + (clipped.y - dst.y);
        if src_x < 0 || src_y < 0 || src_x + clipped.width > src_width as i32 {
            return Rect::empty();
        }

        let src_stride = src_width as usize * BYTES_PER_PIXEL;
        let dst_stride = self.stride();
        let row_bytes = clipped.width as usize * BYTES_PER_PIXEL;
        let mut written = 0;

        for row in 0..clipped.height as usize {
            let s = (src_y as usize + row) * src_stride + src_x as usize * BYTES_PER_PIXEL;
            let Some(src_row) = src.get(s..s + row_bytes) else {
                break;
            };
            let d = (clipped.y as usize + row) * dst_stride + clipped.x as usize * BYTES_PER_PIXEL;
            self.pixels[d..d + row_bytes].copy_from_slice(src_row);
            written += 1;
        }

        Rect::new(clipped.x, clipped.y, clipped.width, written)
    }

    /// Copy a region out into a tightly packed buffer
    pub fn read_region(&self, rect: Rect) -> Vec<u8> {
        let clipped = rect.intersection(&self.bounds());
        if clipped.is_empty() {
            return Vec::new();
        }

        let row_bytes = clipped.width as usize * BYTES_PER_PIXEL;
        let stride = self.stride();
        let mut out = Vec::with_capacity(row_bytes * clipped.height as usize);
        for row in 0..clipped.height as usize {
            let s = (clipped.y as usize + row) * stride + clipped.x as usize * BYTES_PER_PIXEL;
            out.extend_from_slice(&self.pixels[s..s + row_bytes]);
        }
        out
    }

    /// Check that every pixel inside `rect` equals `color`
    pub fn region_is(&self, rect: Rect, color: [u8; 4]) -> bool {
        self.read_region(rect)
            .chunks_exact(BYTES_PER_PIXEL)
            .all(|px| px == color)
    }
}

impl Default for CompositedFrame {
    fn default() -> Self {
        Self::empty()
    }
}
