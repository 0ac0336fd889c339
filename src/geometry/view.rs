//! View size, popup placement and view-to-screen mapping

use super::Rect;
use crate::utils::{BridgeError, Result};

/// Geometry of the off-screen view as seen by the web engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewGeometry {
    pub view_width: u32,
    pub view_height: u32,
    /// Popup rectangle in view coordinates, empty while no popup is open
    pub popup_rect: Rect,
    /// Screen position of the view's top-left corner
    pub screen_x: i32,
    pub screen_y: i32,
    /// Device pixels per view pixel
    pub pixel_ratio: f32,
}

impl ViewGeometry {
    /// Create geometry for a view of the given size at the screen origin
    pub fn new(view_width: u32, view_height: u32) -> Self {
        Self {
            view_width,
            view_height,
            popup_rect: Rect::empty(),
            screen_x: 0,
            screen_y: 0,
            pixel_ratio: 1.0,
        }
    }

    /// Place the view on screen
    pub fn with_screen_origin(mut self, x: i32, y: i32) -> Self {
        self.screen_x = x;
        self.screen_y = y;
        self
    }

    /// Set the device pixel ratio, ignoring non-positive or non-finite values
    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        if ratio.is_finite() && ratio > 0.0 {
            self.pixel_ratio = ratio;
        }
        self
    }

    /// Rectangle covering the whole view
    pub fn view_rect(&self) -> Rect {
        Rect::from_size(self.view_width, self.view_height)
    }

    /// Map a view coordinate to a screen coordinate
    pub fn screen_point(&self, view_x: i32, view_y: i32) -> (i32, i32) {
        let sx = (view_x as f32 * self.pixel_ratio).round() as i32;
        let sy = (view_y as f32 * self.pixel_ratio).round() as i32;
        (
            self.screen_x.saturating_add(sx),
            self.screen_y.saturating_add(sy),
        )
    }

    /// Change the view size. Returns whether the size actually changed.
    ///
    /// Zero-sized views are rejected and the previous size is kept.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool> {
        if width == 0 || height == 0 {
            return Err(BridgeError::InvalidGeometry {
                width: i64::from(width),
                height: i64::from(height),
            });
        }
        if width == self.view_width && height == self.view_height {
            return Ok(false);
        }

        self.view_width = width;
        self.view_height = height;
        if self.is_popup_open() {
            self.popup_rect = self.constrain_popup(self.popup_rect);
        }
        Ok(true)
    }

    /// Check if a popup is currently placed
    pub fn is_popup_open(&self) -> bool {
        !self.popup_rect.is_empty()
    }

    /// Record a new popup rectangle, constrained to the view
    pub fn set_popup_rect(&mut self, rect: Rect) -> Rect {
        self.popup_rect = self.constrain_popup(rect);
        self.popup_rect
    }

    /// Forget the popup rectangle
    pub fn clear_popup(&mut self) {
        self.popup_rect = Rect::empty();
    }

    /// Shift a popup so it stays inside the view.
    ///
    /// Popups wider or taller than the view are pinned to the top-left
    /// edge and cut off by the view bounds.
    pub fn constrain_popup(&self, rect: Rect) -> Rect {
        if rect.is_empty() {
            return Rect::empty();
        }

        let view = self.view_rect();
        let mut popup = rect;

        if popup.right() > view.right() {
            popup.x = view.right() - popup.width;
        }
        if popup.bottom() > view.bottom() {
            popup.y = view.bottom() - popup.height;
        }
        popup.x = popup.x.max(0);
        popup.y = popup.y.max(0);

        popup.intersection(&view)
    }
}

impl Default for ViewGeometry {
    fn default() -> Self {
        Self::new(crate::defaults::VIEW_WIDTH, crate::defaults::VIEW_HEIGHT)
    }
}
