//! Off-screen rendering client
//!
//! Ties the pieces together for one embedded browser view:
//!
//! - the engine's compositor thread calls the [`RenderHandler`] methods,
//!   which composite into the shared frame and post dirty regions to the
//!   mailbox;
//! - the host's render thread calls [`RenderClient::render`] once per frame,
//!   which drains the mailbox, copies the dirty part of the frame out under
//!   the lock and uploads it to the GPU texture.
//!
//! Locks are always taken in the order lifecycle → render → shared → mailbox.
//! `render` does not hold the lifecycle lock while it uploads.

mod handler;
mod state;

pub use handler::{BrowserId, BrowserSettings, RenderHandler, WebEngine};
pub use state::ClientState;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use url::Url;

use crate::compositor::{CompositedFrame, FrameCompositor, PaintJob, PaintKind};
use crate::config::ClientConfig;
use crate::geometry::{Rect, ViewGeometry};
use crate::mailbox::{Mailbox, MailboxStats};
use crate::security::AccessPolicy;
use crate::texture::{TextureBackend, TextureId, TextureSync, UploadKind, UploadStats};
use crate::utils::{BridgeError, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Host-side lifecycle bookkeeping
#[derive(Debug)]
struct Lifecycle {
    state: ClientState,
    browser: Option<BrowserId>,
    browser_requested: bool,
    /// Navigation asked for while the browser was still being created
    pending_url: Option<String>,
}

/// State touched by the engine's threads
#[derive(Debug)]
struct Shared {
    compositor: FrameCompositor,
    /// Paint and geometry callbacks are served
    accepting: bool,
}

/// Render-thread state
struct RenderSide<B: TextureBackend> {
    sync: TextureSync<B>,
    /// Copy of the composite taken under the shared lock
    staging: CompositedFrame,
    /// The texture may differ from the frame; the next render uploads it whole
    resync: bool,
}

impl<B: TextureBackend> RenderSide<B> {
    /// Copy the `dirty` part of `frame` into staging. Returns the region
    /// that now needs uploading.
    fn stage(&mut self, frame: &CompositedFrame, dirty: Rect) -> Rect {
        if self.staging.width != frame.width || self.staging.height != frame.height {
            self.staging = frame.clone();
            return frame.bounds();
        }

        let area = dirty.clamp_to(frame.width, frame.height);
        self.staging.blit(area, &frame.pixels, frame.width, area.x, area.y)
    }

    /// Forget what the texture holds after a failed upload
    fn invalidate(&mut self) {
        self.staging = CompositedFrame::empty();
        self.resync = true;
    }

    fn reset(&mut self) {
        self.staging = CompositedFrame::empty();
        self.resync = false;
    }
}

enum Navigation {
    Load(BrowserId),
    Create,
    Defer,
}

static NEXT_CLIENT_ID: AtomicU32 = AtomicU32::new(1);

/// One off-screen browser view rendered into a GPU texture
pub struct RenderClient<E: WebEngine, B: TextureBackend> {
    id: u32,
    config: ClientConfig,
    policy: AccessPolicy,
    engine: E,
    lifecycle: Mutex<Lifecycle>,
    render: Mutex<RenderSide<B>>,
    shared: Mutex<Shared>,
    mailbox: Mailbox,
    ordinal: AtomicU64,
}

impl<E: WebEngine, B: TextureBackend> RenderClient<E, B> {
    /// Create a client. Nothing is allocated until [`initialize`](Self::initialize).
    pub fn new(config: ClientConfig, engine: E, backend: B) -> Self {
        let geometry = config.geometry();
        let mut compositor = FrameCompositor::new(geometry, config.clear_color());
        compositor.clear();

        Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            policy: config.access_policy(),
            config,
            engine,
            lifecycle: Mutex::new(Lifecycle {
                state: ClientState::Created,
                browser: None,
                browser_requested: false,
                pending_url: None,
            }),
            render: Mutex::new(RenderSide {
                sync: TextureSync::new(backend),
                staging: CompositedFrame::empty(),
                resync: false,
            }),
            shared: Mutex::new(Shared {
                compositor,
                accepting: false,
            }),
            mailbox: Mailbox::new(),
            ordinal: AtomicU64::new(0),
        }
    }

    /// Unique id of this client within the process
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> ClientState {
        lock(&self.lifecycle).state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Browser currently attached, if the engine created one
    pub fn browser(&self) -> Option<BrowserId> {
        lock(&self.lifecycle).browser
    }

    /// Allocate the texture and start accepting paints.
    ///
    /// Fails with an invalid-state error unless the client is freshly
    /// created, and with a GPU error if the texture cannot be allocated,
    /// in which case the client stays in [`ClientState::Created`].
    pub fn initialize(&self) -> Result<()> {
        let mut life = lock(&self.lifecycle);
        if life.state != ClientState::Created {
            return Err(invalid_state("initialize", life.state));
        }
        self.config.validate()?;

        let geometry = self.config.geometry();
        {
            let mut render = lock(&self.render);
            if let Err(e) = render.sync.initialize(geometry.view_width, geometry.view_height) {
                log::error!("Client {}: texture allocation failed: {}", self.id, e);
                return Err(e.into());
            }
            render.reset();
        }

        {
            let mut shared = lock(&self.shared);
            shared.compositor = FrameCompositor::new(geometry, self.config.clear_color());
            shared.accepting = true;
            self.mailbox.clear();
            // Upload the cleared frame on the first render.
            self.mailbox.post(geometry.view_rect());
        }

        life.state = ClientState::Initialized;
        log::info!(
            "Client {} initialized ({}x{} at {},{})",
            self.id,
            geometry.view_width,
            geometry.view_height,
            geometry.screen_x,
            geometry.screen_y
        );
        Ok(())
    }

    /// Load `url`, creating the browser on first use.
    ///
    /// `single` makes navigation replace history; `allow_menus` enables
    /// context menus. Both are passed through to the engine.
    pub fn open_website(&self, url: &str, single: bool, allow_menus: bool) -> Result<()> {
        let navigation = {
            let mut life = lock(&self.lifecycle);
            if !life.state.can_open_website() {
                return Err(invalid_state("open website", life.state));
            }
            Url::parse(url).map_err(|source| BridgeError::InvalidUrl {
                url: url.to_string(),
                source,
            })?;

            match life.browser {
                Some(browser) => Navigation::Load(browser),
                None if life.browser_requested => {
                    life.pending_url = Some(url.to_string());
                    Navigation::Defer
                }
                None => {
                    life.browser_requested = true;
                    Navigation::Create
                }
            }
        };

        // The engine may call back synchronously, so no lock is held here.
        match navigation {
            Navigation::Load(browser) => self.engine.load_url(browser, url)?,
            Navigation::Create => {
                let settings = self.browser_settings(url, single, allow_menus);
                if let Err(e) = self.engine.create_browser(&settings) {
                    lock(&self.lifecycle).browser_requested = false;
                    return Err(e);
                }
            }
            Navigation::Defer => {
                log::debug!("Client {}: browser not created yet, deferring {}", self.id, url);
            }
        }

        let mut life = lock(&self.lifecycle);
        if life.state == ClientState::Initialized {
            life.state = ClientState::WebsiteOpen;
        }
        log::info!(
            "Client {} opening {} (single: {}, menus: {})",
            self.id,
            url,
            single,
            allow_menus
        );
        Ok(())
    }

    fn browser_settings(&self, url: &str, single: bool, allow_menus: bool) -> BrowserSettings {
        let geometry = *lock(&self.shared).compositor.geometry();
        BrowserSettings {
            url: url.to_string(),
            single,
            allow_menus,
            width: geometry.view_width,
            height: geometry.view_height,
            transparent: self.config.transparent_background,
        }
    }

    /// Bring the GPU texture up to date. Call once per displayed frame on
    /// the render thread; does nothing when no paint arrived since the
    /// last call.
    pub fn render(&self) -> Result<()> {
        let state = lock(&self.lifecycle).state;
        if !state.can_render() {
            return Err(invalid_state("render", state));
        }

        {
            let mut guard = lock(&self.render);
            let render = &mut *guard;
            let dirty = {
                let shared = lock(&self.shared);
                let frame = shared.compositor.frame();
                let pending = self.mailbox.drain_if_pending();
                let pending = if render.resync {
                    pending.or(Some(frame.bounds()))
                } else {
                    pending
                };
                pending.map(|dirty| render.stage(frame, dirty))
            };

            if let Some(dirty) = dirty {
                match render.sync.upload(&render.staging, dirty) {
                    Ok(kind) => {
                        render.resync = false;
                        if kind != UploadKind::Skipped {
                            log::trace!("Client {}: uploaded {:?}", self.id, kind);
                        }
                    }
                    Err(e) => {
                        // No retry here; the next render uploads the whole frame.
                        render.invalidate();
                        log::error!("Client {}: texture upload failed: {}", self.id, e);
                        return Err(e.into());
                    }
                }
            }
        }

        let mut life = lock(&self.lifecycle);
        if life.state == ClientState::WebsiteOpen {
            life.state = ClientState::Rendering;
        }
        Ok(())
    }

    /// Resize the view. The engine is told to repaint at the new size.
    pub fn resize(&self, width: u32, height: u32) -> Result<()> {
        let browser = {
            let life = lock(&self.lifecycle);
            if matches!(life.state, ClientState::Created | ClientState::CleanedUp) {
                return Err(invalid_state("resize", life.state));
            }
            life.browser
        };

        let changed = {
            let mut shared = lock(&self.shared);
            let changed = shared.compositor.resize_view(width, height)?;
            if changed {
                self.mailbox.post(Rect::from_size(width, height));
            }
            changed
        };

        if changed {
            log::debug!("Client {}: view resized to {}x{}", self.id, width, height);
            if let Some(browser) = browser {
                self.engine.was_resized(browser);
            }
        }
        Ok(())
    }

    /// Move the view on screen
    pub fn set_position(&self, x: i32, y: i32) {
        lock(&self.shared).compositor.set_screen_origin(x, y);
    }

    /// Release the texture and buffers and close the browser.
    ///
    /// Valid once from any state; every call afterwards fails.
    pub fn cleanup(&self) -> Result<()> {
        let browser = {
            let mut life = lock(&self.lifecycle);
            if life.state.is_terminal() {
                return Err(invalid_state("clean up", life.state));
            }

            {
                let mut render = lock(&self.render);
                render.sync.cleanup();
                render.reset();
            }
            {
                let mut shared = lock(&self.shared);
                shared.accepting = false;
                shared.compositor.clear();
                self.mailbox.clear();
            }

            life.state = ClientState::CleanedUp;
            life.browser_requested = false;
            life.pending_url = None;
            life.browser.take()
        };

        if let Some(browser) = browser {
            self.engine.close_browser(browser);
        }
        log::info!("Client {} cleaned up", self.id);
        Ok(())
    }

    /// Composite a paint. Paints arriving while the client is not
    /// initialized are dropped.
    ///
    /// Returns the frame area that changed.
    pub fn paint(
        &self,
        kind: PaintKind,
        dirty_rects: &[Rect],
        buffer: &[u8],
        width: i32,
        height: i32,
    ) -> Result<Rect> {
        let ordinal = self.ordinal.fetch_add(1, Ordering::SeqCst);
        let (width, height) = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(BridgeError::InvalidGeometry {
                    width: i64::from(width),
                    height: i64::from(height),
                });
            }
        };

        let mut shared = lock(&self.shared);
        if !shared.accepting {
            log::debug!("Client {}: dropping {:?} paint, not initialized", self.id, kind);
            return Ok(Rect::empty());
        }

        let changed = shared.compositor.apply(&PaintJob {
            kind,
            dirty_rects,
            width,
            height,
            pixels: buffer,
            ordinal,
        })?;
        self.mailbox.post(changed);
        Ok(changed)
    }

    /// Snapshot of the view geometry, `None` while not initialized
    pub fn geometry(&self) -> Option<ViewGeometry> {
        let shared = lock(&self.shared);
        shared.accepting.then(|| *shared.compositor.geometry())
    }

    /// Copy of the current composite
    pub fn frame_snapshot(&self) -> CompositedFrame {
        lock(&self.shared).compositor.frame().clone()
    }

    /// Current GPU texture handle
    pub fn texture_handle(&self) -> Option<TextureId> {
        lock(&self.render).sync.texture()
    }

    /// Run `f` with the texture backend and the live texture handle, e.g.
    /// to bind the texture for drawing. Render thread only.
    pub fn with_texture<R>(&self, f: impl FnOnce(&B, Option<TextureId>) -> R) -> R {
        let render = lock(&self.render);
        f(render.sync.backend(), render.sync.texture())
    }

    pub fn upload_stats(&self) -> UploadStats {
        lock(&self.render).sync.stats()
    }

    pub fn mailbox_stats(&self) -> &MailboxStats {
        self.mailbox.stats()
    }

    /// Check if a page at `origin` may use the host interface
    pub fn is_interface_allowed(&self, origin: &str) -> bool {
        self.policy.is_allowed(origin)
    }
}

impl<E: WebEngine, B: TextureBackend> RenderHandler for RenderClient<E, B> {
    fn on_created(&self, browser: BrowserId) {
        let pending = {
            let mut life = lock(&self.lifecycle);
            if life.state.is_terminal() {
                None
            } else {
                life.browser = Some(browser);
                life.browser_requested = false;
                Some(life.pending_url.take())
            }
        };

        match pending {
            None => {
                log::warn!("Client {}: {} created after cleanup, closing it", self.id, browser);
                self.engine.close_browser(browser);
            }
            Some(url) => {
                log::info!("Client {}: {} created", self.id, browser);
                if let Some(url) = url {
                    if let Err(e) = self.engine.load_url(browser, &url) {
                        log::error!("Client {}: deferred load of {} failed: {}", self.id, url, e);
                    }
                }
            }
        }
    }

    fn on_before_close(&self, browser: BrowserId) {
        let mut life = lock(&self.lifecycle);
        if life.browser == Some(browser) {
            life.browser = None;
        }
        log::info!("Client {}: {} closing", self.id, browser);
    }

    fn view_rect(&self) -> Option<Rect> {
        self.geometry().map(|g| g.view_rect())
    }

    fn screen_point(&self, view_x: i32, view_y: i32) -> Option<(i32, i32)> {
        self.geometry().map(|g| g.screen_point(view_x, view_y))
    }

    fn on_popup_show(&self, show: bool) {
        let mut shared = lock(&self.shared);
        if !shared.accepting {
            return;
        }
        if show {
            log::debug!("Client {}: popup opening", self.id);
        } else {
            let restored = shared.compositor.hide_popup();
            self.mailbox.post(restored);
            log::debug!("Client {}: popup closed, restored {:?}", self.id, restored);
        }
    }

    fn on_popup_size(&self, rect: Rect) {
        let mut shared = lock(&self.shared);
        if !shared.accepting {
            return;
        }
        let restored = shared.compositor.show_popup(rect);
        self.mailbox.post(restored);
    }

    fn on_paint(&self, kind: PaintKind, dirty_rects: &[Rect], buffer: &[u8], width: i32, height: i32) {
        if let Err(e) = self.paint(kind, dirty_rects, buffer, width, height) {
            log::debug!("Client {}: {:?} paint rejected: {}", self.id, kind, e);
        }
    }
}

fn invalid_state(operation: &'static str, state: ClientState) -> BridgeError {
    log::error!("Cannot {} while client is {}", operation, state);
    BridgeError::InvalidState { operation, state }
}
