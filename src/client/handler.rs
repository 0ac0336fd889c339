//! Capability interfaces between the client and the web engine

use std::fmt;

use crate::compositor::PaintKind;
use crate::geometry::Rect;
use crate::utils::Result;

/// Engine-assigned browser identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrowserId(pub u64);

impl fmt::Display for BrowserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "browser-{}", self.0)
    }
}

/// What the engine needs to create an off-screen browser
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserSettings {
    pub url: String,
    /// Navigation replaces history instead of adding to it
    pub single: bool,
    /// Context menus are available to the page
    pub allow_menus: bool,
    pub width: u32,
    pub height: u32,
    pub transparent: bool,
}

/// Callbacks the web engine invokes on the rendering client.
///
/// Any method may be called from any engine thread; implementations must
/// not block on the host's render thread.
pub trait RenderHandler: Send + Sync {
    /// A browser requested through [`WebEngine::create_browser`] exists
    fn on_created(&self, browser: BrowserId);

    /// The browser is about to close
    fn on_before_close(&self, browser: BrowserId);

    /// View rectangle in view coordinates, `None` while no view exists
    fn view_rect(&self) -> Option<Rect>;

    /// Map a view coordinate to the screen
    fn screen_point(&self, view_x: i32, view_y: i32) -> Option<(i32, i32)>;

    /// A popup was opened or closed
    fn on_popup_show(&self, show: bool);

    /// The popup moved or resized
    fn on_popup_size(&self, rect: Rect);

    /// A layer was painted. `buffer` is only valid for this call.
    fn on_paint(&self, kind: PaintKind, dirty_rects: &[Rect], buffer: &[u8], width: i32, height: i32);
}

/// Requests the rendering client sends to the web engine
pub trait WebEngine: Send + Sync {
    /// Ask for a new off-screen browser; the engine answers with
    /// [`RenderHandler::on_created`]
    fn create_browser(&self, settings: &BrowserSettings) -> Result<()>;

    /// Navigate an existing browser
    fn load_url(&self, browser: BrowserId, url: &str) -> Result<()>;

    /// The view size changed; the engine should query it again and repaint
    fn was_resized(&self, browser: BrowserId);

    /// Close a browser
    fn close_browser(&self, browser: BrowserId);
}
