//! Popup overlay layer

use super::CompositedFrame;
use crate::defaults::BYTES_PER_PIXEL;
use crate::geometry::Rect;

/// Which layer a paint targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaintKind {
    /// The page itself
    Base,
    /// Transient overlay UI (select menus, autocomplete lists)
    Popup,
}

impl PaintKind {
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Base => 0,
            Self::Popup => 1,
        }
    }
}

/// The single overlay layer composited above the base frame.
///
/// Besides the popup's own pixels it keeps the base pixels underneath its
/// rectangle, so hiding the popup can restore the page without waiting for
/// the engine to repaint.
#[derive(Debug, Clone, Default)]
pub struct PopupLayer {
    /// Placement in view coordinates, empty while hidden
    rect: Rect,
    /// Last popup buffer, `rect.width` x `rect.height`
    pixels: Vec<u8>,
    /// Whether `pixels` holds painted content
    painted: bool,
    /// Per-pixel flag for popup content; unset pixels mirror the underlay
    painted_mask: Vec<bool>,
    /// Base pixels under `rect`, packed
    underlay: Vec<u8>,
}

impl PopupLayer {
    /// Create a hidden layer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_visible(&self) -> bool {
        !self.rect.is_empty()
    }

    /// Whether the popup has received pixels since it was placed
    pub fn is_painted(&self) -> bool {
        self.painted
    }

    /// Place the layer at `rect` and remember the base content below it
    pub fn show(&mut self, rect: Rect, frame: &CompositedFrame) {
        let rect = rect.intersection(&frame.bounds());
        self.rect = rect;
        self.underlay = frame.read_region(rect);
        self.pixels = self.underlay.clone();
        self.painted_mask = vec![false; rect.area().max(0) as usize];
        self.painted = false;
    }

    /// Move the layer after the frame was reallocated.
    ///
    /// The underlay is captured again from `frame`; painted pixels survive
    /// when the popup keeps its size.
    pub fn relocate(&mut self, rect: Rect, frame: &CompositedFrame) {
        let old = self.rect;
        let pixels = std::mem::take(&mut self.pixels);
        let mask = std::mem::take(&mut self.painted_mask);
        let painted = self.painted;

        self.show(rect, frame);
        if painted && old.width == self.rect.width && old.height == self.rect.height {
            self.pixels = pixels;
            self.painted_mask = mask;
            self.painted = true;
            self.refresh_unpainted(Rect::from_size(self.rect.width as u32, self.rect.height as u32));
        }
    }

    /// Put the saved base content back and hide the layer.
    ///
    /// Returns the area of `frame` that was restored.
    pub fn hide(&mut self, frame: &mut CompositedFrame) -> Rect {
        if !self.is_visible() {
            return Rect::empty();
        }

        let restored = frame.blit(self.rect, &self.underlay, self.rect.width as u32, 0, 0);
        *self = Self::new();
        restored
    }

    /// Store popup pixels for the popup-local `dirty` area and draw them.
    ///
    /// `src` is `src_width` x `src_height`, the engine's popup buffer.
    /// Returns the frame area that changed.
    pub fn paint(
        &mut self,
        frame: &mut CompositedFrame,
        dirty: Rect,
        src: &[u8],
        src_width: u32,
        src_height: u32,
    ) -> Rect {
        if !self.is_visible() {
            return Rect::empty();
        }

        let local = dirty
            .intersection(&Rect::from_size(src_width, src_height))
            .intersection(&Rect::from_size(self.rect.width as u32, self.rect.height as u32));
        if local.is_empty() {
            return Rect::empty();
        }

        let src_stride = src_width as usize * BYTES_PER_PIXEL;
        let dst_stride = self.rect.width as usize * BYTES_PER_PIXEL;
        let row_bytes = local.width as usize * BYTES_PER_PIXEL;
        for row in 0..local.height as usize {
            let y = local.y as usize + row;
            let s = y * src_stride + local.x as usize * BYTES_PER_PIXEL;
            let d = y * dst_stride + local.x as usize * BYTES_PER_PIXEL;
            let Some(src_row) = src.get(s..s + row_bytes) else {
                break;
            };
            self.pixels[d..d + row_bytes].copy_from_slice(src_row);
            let m = y * self.rect.width as usize + local.x as usize;
            self.painted_mask[m..m + local.width as usize].fill(true);
        }
        self.painted = true;

        self.draw(frame, local.translate(self.rect.x, self.rect.y))
    }

    /// Redraw the cached popup pixels over the part of `area` it covers
    pub fn draw(&self, frame: &mut CompositedFrame, area: Rect) -> Rect {
        if !self.painted {
            return Rect::empty();
        }

        let target = area.intersection(&self.rect);
        if target.is_empty() {
            return Rect::empty();
        }
        frame.blit(
            target,
            &self.pixels,
            self.rect.width as u32,
            target.x - self.rect.x,
            target.y - self.rect.y,
        )
    }

    /// Refresh the saved base content for `area` from `frame`.
    ///
    /// Must run after a base paint lands and before the popup is drawn
    /// back over it.
    pub fn capture_underlay(&mut self, frame: &CompositedFrame, area: Rect) {
        let target = area.intersection(&self.rect);
        if target.is_empty() {
            return;
        }

        let fresh = frame.read_region(target);
        let row_bytes = target.width as usize * BYTES_PER_PIXEL;
        let stride = self.rect.width as usize * BYTES_PER_PIXEL;
        for (row, chunk) in fresh.chunks_exact(row_bytes).enumerate() {
            let y = (target.y - self.rect.y) as usize + row;
            let d = y * stride + (target.x - self.rect.x) as usize * BYTES_PER_PIXEL;
            self.underlay[d..d + row_bytes].copy_from_slice(chunk);
        }
        self.refresh_unpainted(target.translate(-self.rect.x, -self.rect.y));
    }

    // Copy the underlay into popup pixels never painted inside `local`.
    fn refresh_unpainted(&mut self, local: Rect) {
        let width = self.rect.width as usize;
        for y in local.y.max(0) as usize..local.bottom().max(0) as usize {
            for x in local.x.max(0) as usize..local.right().max(0) as usize {
                let i = y * width + x;
                if !self.painted_mask[i] {
                    let b = i * BYTES_PER_PIXEL;
                    self.pixels[b..b + BYTES_PER_PIXEL]
                        .copy_from_slice(&self.underlay[b..b + BYTES_PER_PIXEL]);
                }
            }
        }
    }

    /// Drop all state without touching any frame
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const RED: [u8; 4] = [0, 0, 255, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];

    #[test]
    fn test_hidden_layer_ignores_paint() {
        let mut frame = CompositedFrame::new(10, 10, WHITE);
        let mut layer = PopupLayer::new();
        let src = RED.repeat(4);

        assert!(layer.paint(&mut frame, Rect::new(0, 0, 2, 2), &src, 2, 2).is_empty());
        assert!(frame.region_is(frame.bounds(), WHITE));
    }

    #[test]
    fn test_show_paint_hide_restores_base() {
        let mut frame = CompositedFrame::new(10, 10, WHITE);
        frame.set_pixel(3, 3, GREEN);

        let mut layer = PopupLayer::new();
        layer.show(Rect::new(2, 2, 4, 4), &frame);
        assert!(layer.is_visible());
        assert!(!layer.is_painted());

        let src = RED.repeat(16);
        let changed = layer.paint(&mut frame, Rect::new(0, 0, 4, 4), &src, 4, 4);
        assert_eq!(changed, Rect::new(2, 2, 4, 4));
        assert!(frame.region_is(Rect::new(2, 2, 4, 4), RED));

        let restored = layer.hide(&mut frame);
        assert_eq!(restored, Rect::new(2, 2, 4, 4));
        assert_eq!(frame.get_pixel(3, 3), GREEN);
        assert_eq!(frame.get_pixel(2, 2), WHITE);
        assert!(!layer.is_visible());
    }

    #[test]
    fn test_partial_popup_paint() {
        let mut frame = CompositedFrame::new(10, 10, WHITE);
        let mut layer = PopupLayer::new();
        layer.show(Rect::new(4, 4, 4, 4), &frame);

        let src = RED.repeat(16);
        let changed = layer.paint(&mut frame, Rect::new(1, 1, 2, 1), &src, 4, 4);
        assert_eq!(changed, Rect::new(5, 5, 2, 1));
        assert_eq!(frame.get_pixel(5, 5), RED);
        assert_eq!(frame.get_pixel(4, 4), WHITE);
    }

    #[test]
    fn test_capture_underlay_tracks_base_updates() {
        let mut frame = CompositedFrame::new(10, 10, WHITE);
        let mut layer = PopupLayer::new();
        layer.show(Rect::new(0, 0, 5, 5), &frame);
        layer.paint(&mut frame, Rect::new(0, 0, 5, 5), &RED.repeat(25), 5, 5);

        // A base paint lands under the popup...
        frame.fill(GREEN);
        let bounds = frame.bounds();
        layer.capture_underlay(&frame, bounds);
        layer.draw(&mut frame, bounds);
        assert!(frame.region_is(Rect::new(0, 0, 5, 5), RED));

        // ...and is what comes back when the popup goes away.
        layer.hide(&mut frame);
        assert!(frame.region_is(frame.bounds(), GREEN));
    }

    #[test]
    fn test_unpainted_popup_part_follows_base() {
        let mut frame = CompositedFrame::new(40, 40, WHITE);
        let mut layer = PopupLayer::new();
        layer.show(Rect::new(10, 10, 10, 10), &frame);
        layer.paint(&mut frame, Rect::new(0, 0, 10, 5), &RED.repeat(100), 10, 10);

        frame.fill(GREEN);
        let bounds = frame.bounds();
        layer.capture_underlay(&frame, bounds);
        layer.draw(&mut frame, bounds);

        assert!(frame.region_is(Rect::new(10, 10, 10, 5), RED));
        assert!(frame.region_is(Rect::new(10, 15, 10, 5), GREEN));
        assert_eq!(frame.get_pixel(12, 17), GREEN);
    }

    #[test]
    fn test_relocate_keeps_unpainted_part_on_new_base() {
        let mut frame = CompositedFrame::new(20, 20, WHITE);
        let mut layer = PopupLayer::new();
        layer.show(Rect::new(2, 2, 4, 4), &frame);
        layer.paint(&mut frame, Rect::new(0, 0, 4, 2), &RED.repeat(16), 4, 4);

        let mut grown = CompositedFrame::new(30, 30, GREEN);
        layer.relocate(Rect::new(2, 2, 4, 4), &grown);
        let bounds = grown.bounds();
        layer.draw(&mut grown, bounds);

        assert!(grown.region_is(Rect::new(2, 2, 4, 2), RED));
        assert!(grown.region_is(Rect::new(2, 4, 4, 2), GREEN));
    }
}
