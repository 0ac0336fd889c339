//! Osrbridge - Off-Screen Rendering Bridge
//!
//! Headless demo: a scripted engine thread paints a page and a popup into a
//! rendering client while the main thread renders frames.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use osrbridge::client::{BrowserId, BrowserSettings};
use osrbridge::compositor::PaintKind;
use osrbridge::texture::{GpuContext, MemoryBackend, TextureBackend};
use osrbridge::utils::logging;
use osrbridge::{BridgeError, ClientConfig, NAME, Rect, RenderClient, RenderHandler, Result, VERSION, WebEngine};

const WHITE: [u8; 4] = [255, 255, 255, 255];
const RED: [u8; 4] = [0, 0, 255, 255];
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

struct Options {
    gpu: bool,
    dump: Option<PathBuf>,
    frames: u32,
    config: Option<PathBuf>,
    url: String,
}

fn parse_args() -> std::result::Result<Options, String> {
    let mut options = Options {
        gpu: false,
        dump: None,
        frames: 10,
        config: None,
        url: "https://kodi.tv".to_string(),
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--gpu" => options.gpu = true,
            "--dump" => options.dump = Some(args.next().ok_or("--dump needs a path")?.into()),
            "--config" => options.config = Some(args.next().ok_or("--config needs a path")?.into()),
            "--url" => options.url = args.next().ok_or("--url needs a value")?,
            "--frames" => {
                let value = args.next().ok_or("--frames needs a count")?;
                options.frames = value
                    .parse()
                    .map_err(|_| format!("invalid frame count '{}'", value))?;
            }
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }
    Ok(options)
}

fn main() {
    let options = match parse_args() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("usage: osrbridge [--gpu] [--frames N] [--dump out.png] [--config file.json] [--url URL]");
            std::process::exit(2);
        }
    };

    logging::init();
    log::info!("{} v{}", NAME, VERSION);

    if let Err(e) = run(options) {
        eprintln!("Failed: {}", e);
        std::process::exit(1);
    }
}

fn run(options: Options) -> Result<()> {
    let config = match &options.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default().with_size(800, 600),
    };
    let (engine, commands) = ScriptedEngine::new();

    if options.gpu {
        if options.dump.is_some() {
            log::warn!("--dump reads back the memory backend only, ignoring it");
        }
        let mut context = GpuContext::new();
        tokio::runtime::Runtime::new()?.block_on(context.initialize())?;
        let client = Arc::new(RenderClient::new(config, engine, context.texture_backend()?));
        let compositor = drive(&client, commands, &options)?;
        client.cleanup()?;
        join(compositor);
        report(&client);
        return Ok(());
    }

    let client = Arc::new(RenderClient::new(config, engine, MemoryBackend::new()));
    let compositor = drive(&client, commands, &options)?;
    if let Some(path) = &options.dump {
        dump(&client, path)?;
    }
    client.cleanup()?;
    join(compositor);
    report(&client);
    Ok(())
}

/// Start the engine thread, open the page and render the requested frames
fn drive<B: TextureBackend + 'static>(
    client: &Arc<RenderClient<ScriptedEngine, B>>,
    commands: Receiver<EngineCommand>,
    options: &Options,
) -> Result<JoinHandle<()>> {
    client.initialize()?;

    let handler = Arc::clone(client);
    let compositor = thread::Builder::new()
        .name("engine-compositor".to_string())
        .spawn(move || run_compositor(handler.as_ref(), commands))?;

    client.open_website(&options.url, true, false)?;
    for _ in 0..options.frames {
        client.render()?;
        thread::sleep(FRAME_INTERVAL);
    }
    Ok(compositor)
}

fn join(compositor: JoinHandle<()>) {
    if compositor.join().is_err() {
        log::error!("Engine compositor thread panicked");
    }
}

fn report<B: TextureBackend>(client: &RenderClient<ScriptedEngine, B>) {
    let uploads = client.upload_stats();
    let mailbox = client.mailbox_stats();
    log::info!(
        "Uploads: {} full, {} partial, {} bytes; regions: {} posted, {} coalesced, {} drained",
        uploads.full_uploads,
        uploads.partial_uploads,
        uploads.bytes_uploaded,
        mailbox.posted(),
        mailbox.coalesced(),
        mailbox.drained()
    );
}

fn dump(client: &RenderClient<ScriptedEngine, MemoryBackend>, path: &PathBuf) -> Result<()> {
    let image = client
        .with_texture(|backend, handle| handle.and_then(|id| backend.texture(id)?.to_rgba_image()))
        .ok_or_else(|| BridgeError::Engine("no texture to dump".to_string()))?;
    image
        .save(path)
        .map_err(|e| BridgeError::Io(std::io::Error::other(e)))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

enum EngineCommand {
    Create(BrowserSettings),
    Load(BrowserId, String),
    Resized(BrowserId),
    Close(BrowserId),
}

/// Engine stand-in that forwards requests to the compositor thread
struct ScriptedEngine {
    commands: Sender<EngineCommand>,
}

impl ScriptedEngine {
    fn new() -> (Self, Receiver<EngineCommand>) {
        let (commands, receiver) = mpsc::channel();
        (Self { commands }, receiver)
    }

    fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| BridgeError::Engine("compositor thread has exited".to_string()))
    }
}

impl WebEngine for ScriptedEngine {
    fn create_browser(&self, settings: &BrowserSettings) -> Result<()> {
        self.send(EngineCommand::Create(settings.clone()))
    }

    fn load_url(&self, browser: BrowserId, url: &str) -> Result<()> {
        self.send(EngineCommand::Load(browser, url.to_string()))
    }

    fn was_resized(&self, browser: BrowserId) {
        if self.send(EngineCommand::Resized(browser)).is_err() {
            log::warn!("Resize of {} not delivered", browser);
        }
    }

    fn close_browser(&self, browser: BrowserId) {
        if self.send(EngineCommand::Close(browser)).is_err() {
            log::warn!("Close of {} not delivered", browser);
        }
    }
}

fn run_compositor(handler: &dyn RenderHandler, commands: Receiver<EngineCommand>) {
    let browser = BrowserId(1);
    while let Ok(command) = commands.recv() {
        match command {
            EngineCommand::Create(settings) => {
                handler.on_created(browser);
                paint_page(handler, &settings.url);
            }
            EngineCommand::Load(_, url) => paint_page(handler, &url),
            EngineCommand::Resized(_) => paint_page(handler, "resize"),
            EngineCommand::Close(id) => {
                handler.on_before_close(id);
                break;
            }
        }
    }
}

/// Paint a white page, open a red popup, then close it and repaint
fn paint_page(handler: &dyn RenderHandler, url: &str) {
    let Some(view) = handler.view_rect() else {
        log::warn!("No view to paint {} into", url);
        return;
    };
    log::info!("Painting {} at {}x{}", url, view.width, view.height);

    let page = solid(view.width, view.height, WHITE);
    handler.on_paint(PaintKind::Base, &[view], &page, view.width, view.height);
    thread::sleep(FRAME_INTERVAL);

    let popup = Rect::new(100, 100, 50, 50);
    handler.on_popup_show(true);
    handler.on_popup_size(popup);
    handler.on_paint(
        PaintKind::Popup,
        &[Rect::new(0, 0, popup.width, popup.height)],
        &solid(popup.width, popup.height, RED),
        popup.width,
        popup.height,
    );
    thread::sleep(FRAME_INTERVAL * 2);

    handler.on_popup_show(false);
    handler.on_paint(PaintKind::Base, &[popup], &page, view.width, view.height);
}

fn solid(width: i32, height: i32, color: [u8; 4]) -> Vec<u8> {
    color.repeat(width.max(0) as usize * height.max(0) as usize)
}
