//! Frame compositor for engine paint buffers
//!
//! Owns the canonical composited frame. Base-layer paints are copied in at
//! their dirty rectangles; the popup layer is kept on top of every base
//! update, and its underlay is cached so closing a popup restores the page
//! immediately. Every call leaves the frame complete and displayable; callers
//! serialize access (the render client keeps the compositor behind its
//! shared mutex).

mod frame;
mod layer;

pub use frame::CompositedFrame;
pub use layer::{PaintKind, PopupLayer};

use crate::defaults::BYTES_PER_PIXEL;
use crate::geometry::{Rect, ViewGeometry};
use crate::utils::{BridgeError, Result};

/// One paint delivered by the engine.
///
/// `pixels` is borrowed from the engine and only valid while the paint
/// callback runs; the compositor copies what it needs before returning.
#[derive(Debug, Clone, Copy)]
pub struct PaintJob<'a> {
    pub kind: PaintKind,
    pub dirty_rects: &'a [Rect],
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
    /// Delivery order; older jobs never overwrite newer ones of the same kind
    pub ordinal: u64,
}

/// Composites base and popup paints into a single frame
#[derive(Debug)]
pub struct FrameCompositor {
    frame: CompositedFrame,
    geometry: ViewGeometry,
    popup: PopupLayer,
    background: [u8; 4],
    last_ordinal: [Option<u64>; 2],
}

impl FrameCompositor {
    /// Create a compositor with a frame sized to `geometry`, cleared to
    /// `background` (BGRA)
    pub fn new(geometry: ViewGeometry, background: [u8; 4]) -> Self {
        let mut geometry = geometry;
        geometry.clear_popup();

        Self {
            frame: CompositedFrame::new(geometry.view_width, geometry.view_height, background),
            geometry,
            popup: PopupLayer::new(),
            background,
            last_ordinal: [None; 2],
        }
    }

    /// The composited frame
    pub fn frame(&self) -> &CompositedFrame {
        &self.frame
    }

    /// Current view geometry
    pub fn geometry(&self) -> &ViewGeometry {
        &self.geometry
    }

    pub fn is_popup_visible(&self) -> bool {
        self.popup.is_visible()
    }

    /// Apply a paint job, dropping it if a newer job of the same kind was
    /// already applied. Returns the frame area that changed.
    pub fn apply(&mut self, job: &PaintJob<'_>) -> Result<Rect> {
        let idx = job.kind.index();
        if let Some(last) = self.last_ordinal[idx] {
            if job.ordinal <= last {
                log::debug!(
                    "Dropping stale {:?} paint #{} (last applied #{})",
                    job.kind,
                    job.ordinal,
                    last
                );
                return Ok(Rect::empty());
            }
        }

        // A rejected job applies none of its rects.
        check_dimensions(job.width, job.height)?;
        if !job.pixels.is_empty() {
            check_buffer(job.width, job.height, job.pixels)?;
        }

        let mut changed = Rect::empty();
        for dirty in job.dirty_rects {
            let area = match job.kind {
                PaintKind::Base => {
                    self.apply_base_paint(*dirty, job.width, job.height, job.pixels)?
                }
                PaintKind::Popup => {
                    let popup_rect = self.geometry.popup_rect;
                    self.apply_popup_paint(*dirty, job.width, job.height, job.pixels, popup_rect)?
                }
            };
            changed = changed.union(&area);
        }

        self.last_ordinal[idx] = Some(job.ordinal);
        Ok(changed)
    }

    /// Copy a base-layer buffer into the frame at `dirty`.
    ///
    /// A buffer of a different size than the frame reallocates it and is
    /// copied in whole. A visible popup is drawn back over the update.
    pub fn apply_base_paint(&mut self, dirty: Rect, width: u32, height: u32, pixels: &[u8]) -> Result<Rect> {
        check_dimensions(width, height)?;
        if pixels.is_empty() || dirty.is_empty() {
            return Ok(Rect::empty());
        }
        check_buffer(width, height, pixels)?;

        let resized = width != self.frame.width || height != self.frame.height;
        let area = if resized {
            log::debug!(
                "Resizing composited frame {}x{} -> {}x{}",
                self.frame.width,
                self.frame.height,
                width,
                height
            );
            self.frame.reallocate(width, height, self.background);
            self.geometry.resize(width, height)?;
            self.frame.bounds()
        } else {
            dirty
        };

        let mut changed = self.frame.blit(area, pixels, width, area.x, area.y);

        if self.popup.is_visible() {
            if resized {
                self.popup.relocate(self.geometry.popup_rect, &self.frame);
                self.geometry.popup_rect = self.popup.rect();
                let bounds = self.frame.bounds();
                changed = changed.union(&self.popup.draw(&mut self.frame, bounds));
            } else {
                self.popup.capture_underlay(&self.frame, changed);
                self.popup.draw(&mut self.frame, changed);
            }
        }

        Ok(changed)
    }

    /// Copy a popup-layer buffer into the frame.
    ///
    /// `dirty` is in popup-local coordinates; `popup_rect` places the popup
    /// in the view and is recorded as the current popup rectangle.
    pub fn apply_popup_paint(
        &mut self,
        dirty: Rect,
        width: u32,
        height: u32,
        pixels: &[u8],
        popup_rect: Rect,
    ) -> Result<Rect> {
        check_dimensions(width, height)?;
        if pixels.is_empty() || dirty.is_empty() {
            return Ok(Rect::empty());
        }
        check_buffer(width, height, pixels)?;

        let placed = self.geometry.constrain_popup(popup_rect);
        if placed.is_empty() {
            log::debug!("Ignoring popup paint without a popup rectangle");
            return Ok(Rect::empty());
        }

        let moved = self.show_popup(placed);
        let painted = self.popup.paint(&mut self.frame, dirty, pixels, width, height);
        Ok(moved.union(&painted))
    }

    /// Place the popup at `rect`.
    ///
    /// Moving an already visible popup restores the page under its old
    /// position first. Returns the restored area.
    pub fn show_popup(&mut self, rect: Rect) -> Rect {
        let placed = self.geometry.constrain_popup(rect);
        if placed == self.popup.rect() {
            return Rect::empty();
        }

        let restored = self.popup.hide(&mut self.frame);
        if placed.is_empty() {
            self.geometry.clear_popup();
        } else {
            self.popup.show(placed, &self.frame);
            self.geometry.popup_rect = self.popup.rect();
        }
        restored
    }

    /// Remove the popup, restoring the base content under it.
    ///
    /// Returns the restored area.
    pub fn hide_popup(&mut self) -> Rect {
        let restored = self.popup.hide(&mut self.frame);
        self.geometry.clear_popup();
        self.last_ordinal[PaintKind::Popup.index()] = None;
        restored
    }

    /// Resize the view ahead of the engine's next paint.
    ///
    /// The frame is cleared to the background colour and any popup is
    /// dropped. Returns whether the size changed.
    pub fn resize_view(&mut self, width: u32, height: u32) -> Result<bool> {
        if !self.geometry.resize(width, height)? {
            return Ok(false);
        }
        self.popup.reset();
        self.geometry.clear_popup();
        self.frame.reallocate(width, height, self.background);
        Ok(true)
    }

    /// Place the view on screen without touching the frame
    pub fn set_screen_origin(&mut self, x: i32, y: i32) {
        self.geometry.screen_x = x;
        self.geometry.screen_y = y;
    }

    /// Release all pixel storage
    pub fn clear(&mut self) {
        self.frame = CompositedFrame::empty();
        self.popup.reset();
        self.geometry.clear_popup();
        self.last_ordinal = [None; 2];
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        log::warn!("Rejecting paint with invalid size {}x{}", width, height);
        return Err(BridgeError::InvalidGeometry {
            width: i64::from(width),
            height: i64::from(height),
        });
    }
    Ok(())
}

fn check_buffer(width: u32, height: u32, pixels: &[u8]) -> Result<()> {
    let expected = width as usize * height as usize * BYTES_PER_PIXEL;
    if pixels.len() < expected {
        log::warn!(
            "Rejecting {}x{} paint: buffer holds {} bytes, need {}",
            width,
            height,
            pixels.len(),
            expected
        );
        return Err(BridgeError::BufferTooSmall {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];
    const RED: [u8; 4] = [0, 0, 255, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];

    fn solid(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        color.repeat(width as usize * height as usize)
    }

    fn compositor(width: u32, height: u32) -> FrameCompositor {
        FrameCompositor::new(ViewGeometry::new(width, height), BLACK)
    }

    #[test]
    fn test_new_frame_matches_geometry() {
        let comp = compositor(64, 32);
        assert_eq!((comp.frame().width, comp.frame().height), (64, 32));
        assert!(comp.frame().region_is(comp.frame().bounds(), BLACK));
    }

    #[test]
    fn test_base_paint_dirty_only() {
        let mut comp = compositor(20, 20);
        let src = solid(20, 20, WHITE);

        let changed = comp
            .apply_base_paint(Rect::new(5, 5, 10, 10), 20, 20, &src)
            .unwrap();
        assert_eq!(changed, Rect::new(5, 5, 10, 10));
        assert!(comp.frame().region_is(changed, WHITE));
        assert_eq!(comp.frame().get_pixel(0, 0), BLACK);
    }

    #[test]
    fn test_base_paint_resize_reallocates() {
        let mut comp = compositor(20, 20);
        let src = solid(40, 10, WHITE);

        let changed = comp
            .apply_base_paint(Rect::new(0, 0, 1, 1), 40, 10, &src)
            .unwrap();
        assert_eq!(changed, Rect::new(0, 0, 40, 10));
        assert_eq!((comp.frame().width, comp.frame().height), (40, 10));
        assert_eq!(comp.geometry().view_width, 40);
        assert!(comp.frame().region_is(comp.frame().bounds(), WHITE));
    }

    #[test]
    fn test_invalid_paints() {
        let mut comp = compositor(20, 20);
        let src = solid(20, 20, WHITE);

        assert!(matches!(
            comp.apply_base_paint(Rect::new(0, 0, 5, 5), 0, 20, &src),
            Err(BridgeError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            comp.apply_base_paint(Rect::new(0, 0, 5, 5), 30, 30, &src),
            Err(BridgeError::BufferTooSmall { .. })
        ));
        assert_eq!(comp.frame().width, 20);

        // Zero-area dirty rects and empty buffers are no-ops
        assert!(comp.apply_base_paint(Rect::new(0, 0, 0, 5), 20, 20, &src).unwrap().is_empty());
        assert!(comp.apply_base_paint(Rect::new(0, 0, 5, 5), 20, 20, &[]).unwrap().is_empty());
        assert!(comp.frame().region_is(comp.frame().bounds(), BLACK));
    }

    #[test]
    fn test_popup_survives_base_repaint() {
        let mut comp = compositor(100, 100);
        comp.apply_base_paint(Rect::from_size(100, 100), 100, 100, &solid(100, 100, WHITE))
            .unwrap();

        let popup = Rect::new(10, 10, 20, 20);
        comp.apply_popup_paint(Rect::from_size(20, 20), 20, 20, &solid(20, 20, RED), popup)
            .unwrap();
        assert!(comp.is_popup_visible());

        comp.apply_base_paint(Rect::new(0, 0, 50, 50), 100, 100, &solid(100, 100, GREEN))
            .unwrap();
        assert!(comp.frame().region_is(popup, RED));
        assert_eq!(comp.frame().get_pixel(35, 35), GREEN);

        // The page painted under the popup is what hiding reveals.
        let restored = comp.hide_popup();
        assert_eq!(restored, popup);
        assert!(comp.frame().region_is(popup, GREEN));
        assert!(comp.geometry().popup_rect.is_empty());
    }

    #[test]
    fn test_moving_popup_restores_old_position() {
        let mut comp = compositor(100, 100);
        comp.apply_base_paint(Rect::from_size(100, 100), 100, 100, &solid(100, 100, WHITE))
            .unwrap();

        comp.apply_popup_paint(Rect::from_size(10, 10), 10, 10, &solid(10, 10, RED), Rect::new(0, 0, 10, 10))
            .unwrap();
        let changed = comp
            .apply_popup_paint(Rect::from_size(10, 10), 10, 10, &solid(10, 10, RED), Rect::new(50, 50, 10, 10))
            .unwrap();

        assert_eq!(changed, Rect::new(0, 0, 60, 60));
        assert!(comp.frame().region_is(Rect::new(0, 0, 10, 10), WHITE));
        assert!(comp.frame().region_is(Rect::new(50, 50, 10, 10), RED));
    }

    #[test]
    fn test_popup_paint_without_rect_ignored() {
        let mut comp = compositor(10, 10);
        let changed = comp
            .apply(&PaintJob {
                kind: PaintKind::Popup,
                dirty_rects: &[Rect::from_size(2, 2)],
                width: 2,
                height: 2,
                pixels: &solid(2, 2, RED),
                ordinal: 1,
            })
            .unwrap();
        assert!(changed.is_empty());
        assert!(comp.frame().region_is(comp.frame().bounds(), BLACK));
    }

    #[test]
    fn test_stale_job_dropped() {
        let mut comp = compositor(10, 10);
        let white = solid(10, 10, WHITE);
        let red = solid(10, 10, RED);
        let rects = [Rect::from_size(10, 10)];

        let newer = PaintJob {
            kind: PaintKind::Base,
            dirty_rects: &rects,
            width: 10,
            height: 10,
            pixels: &white,
            ordinal: 7,
        };
        let older = PaintJob {
            pixels: &red,
            ordinal: 3,
            ..newer
        };

        comp.apply(&newer).unwrap();
        assert!(comp.apply(&older).unwrap().is_empty());
        assert!(comp.frame().region_is(comp.frame().bounds(), WHITE));
    }

    #[test]
    fn test_multiple_dirty_rects() {
        let mut comp = compositor(10, 10);
        let white = solid(10, 10, WHITE);
        let rects = [Rect::new(0, 0, 2, 2), Rect::new(8, 8, 2, 2)];

        let changed = comp
            .apply(&PaintJob {
                kind: PaintKind::Base,
                dirty_rects: &rects,
                width: 10,
                height: 10,
                pixels: &white,
                ordinal: 1,
            })
            .unwrap();

        assert_eq!(changed, Rect::new(0, 0, 10, 10));
        assert_eq!(comp.frame().get_pixel(0, 0), WHITE);
        assert_eq!(comp.frame().get_pixel(5, 5), BLACK);
        assert_eq!(comp.frame().get_pixel(9, 9), WHITE);
    }

    #[test]
    fn test_rejected_job_leaves_frame_untouched() {
        let mut comp = compositor(10, 10);
        let short = solid(10, 5, WHITE);
        let rects = [Rect::new(0, 0, 2, 2), Rect::new(8, 8, 2, 2)];

        let result = comp.apply(&PaintJob {
            kind: PaintKind::Base,
            dirty_rects: &rects,
            width: 10,
            height: 10,
            pixels: &short,
            ordinal: 1,
        });

        assert!(matches!(result, Err(BridgeError::BufferTooSmall { .. })));
        assert!(comp.frame().region_is(comp.frame().bounds(), BLACK));
    }

    #[test]
    fn test_resize_keeps_popup_inside_view() {
        let mut comp = compositor(100, 100);
        comp.apply_base_paint(Rect::from_size(100, 100), 100, 100, &solid(100, 100, WHITE))
            .unwrap();
        comp.apply_popup_paint(Rect::from_size(20, 20), 20, 20, &solid(20, 20, RED), Rect::new(70, 70, 20, 20))
            .unwrap();

        comp.apply_base_paint(Rect::from_size(50, 50), 50, 50, &solid(50, 50, GREEN))
            .unwrap();

        let popup = comp.geometry().popup_rect;
        assert_eq!(popup, Rect::new(30, 30, 20, 20));
        assert!(comp.frame().region_is(popup, RED));
        comp.hide_popup();
        assert!(comp.frame().region_is(comp.frame().bounds(), GREEN));
    }

    #[test]
    fn test_resize_view_clears_frame() {
        let mut comp = compositor(10, 10);
        assert!(comp.resize_view(20, 5).unwrap());
        assert!(!comp.resize_view(20, 5).unwrap());
        assert!(comp.resize_view(0, 5).is_err());
        assert_eq!((comp.frame().width, comp.frame().height), (20, 5));
    }

    #[test]
    fn test_clear_releases_frame() {
        let mut comp = compositor(10, 10);
        comp.clear();
        assert!(comp.frame().is_empty());
    }
}
