// =============================================================================
// VULKAN BRING-UP - window, instance, surface, device, queues
// =============================================================================
//
// Startup skeleton that precedes any rendering:
// ┌─────────────────────────────────────────────────────────────────┐
// │  Event loop (winit)                                             │
// │    └── Window                                                   │
// │          └── Instance (+ debug messenger when validating)       │
// │                └── Surface                                      │
// │                      └── Physical device → logical device       │
// │                            └── Graphics + present queues        │
// └─────────────────────────────────────────────────────────────────┘
//
// Teardown runs bottom to top. Any failure during bring-up stops the event
// loop, is reported once on stderr, and the process exits with a failure status.
//
// =============================================================================

mod backend;
mod config;

use anyhow::{Context, Result};
use backend::{AshDriver, VulkanContext};
use config::Config;
use std::io::Write;
use std::process::ExitCode;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> ExitCode {
    // Load configuration from config.toml
    let (config, load_error) = Config::load();

    init_logging(&config);
    if let Some(e) = load_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    log::info!("Starting Vulkan bring-up");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.resizable { "resizable" } else { "fixed" }
    );

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&e, log::log_enabled!(log::Level::Error), &mut std::io::stderr());
            ExitCode::FAILURE
        }
    }
}

/// Report a startup failure. Written straight to `out` when the log filter
/// would drop it, so it always reaches stderr.
fn report_failure(e: &anyhow::Error, logged: bool, out: &mut impl Write) {
    if logged {
        log::error!("{:#}", e);
    } else {
        // Nothing left to report to if stderr itself fails
        let _ = writeln!(out, "Error: {:#}", e);
    }
}

fn run(config: Config) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    // Block until the next event; nothing is rendered
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("Event loop failed")?;

    app.finish()
}

/// Initialize logging. RUST_LOG overrides the configured level.
fn init_logging(config: &Config) {
    use env_logger::{Builder, Env};

    let mut builder = Builder::from_env(Env::default().default_filter_or(config.logging.level.as_str()));
    builder.format_timestamp_millis();
    builder.init();
}

/// The only event that ends the loop.
fn exit_requested(event: &WindowEvent) -> bool {
    matches!(event, WindowEvent::CloseRequested)
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Owns the window and everything created for it.
///
/// IMPORTANT: Field order matters for Drop! The context must be destroyed
/// before the window it was created from.
struct App {
    config: Config,
    context: Option<VulkanContext<AshDriver>>,
    window: Option<Window>,
    /// First bring-up failure, reported after the loop exits
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            context: None,
            window: None,
            failure: None,
        }
    }

    /// Create the window and run the Vulkan bring-up sequence.
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(self.config.window.resizable);

        let window = event_loop
            .create_window(window_attributes)
            .map_err(backend::InitError::from)
            .context("Failed to create window")?;
        let window = self.window.insert(window);

        let driver = AshDriver::load().context("Failed to initialize Vulkan")?;
        let context = VulkanContext::new(driver, window, &self.config.init_options())
            .context("Failed to initialize Vulkan")?;

        log::debug!(
            "Handles: instance={:?} messenger={:?} surface={:?} gpu={:?} device={:?}",
            context.instance,
            context.debug_messenger,
            context.surface,
            context.physical_device,
            context.device
        );
        log::info!(
            "Bring-up complete on {}: graphics queue {:?} (family {}), present queue {:?} (family {})",
            context.device_info.name,
            context.graphics_queue,
            context.queue_families.graphics,
            context.present_queue,
            context.queue_families.present
        );

        self.context = Some(context);
        Ok(())
    }

    /// Destroy everything in reverse order of creation.
    fn teardown(&mut self) {
        release_in_order(&mut self.context, &mut self.window);
    }

    fn finish(mut self) -> Result<()> {
        self.teardown();
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Drop the context before the window its surface was created from.
fn release_in_order<C, W>(context: &mut Option<C>, window: &mut Option<W>) {
    if let Some(context) = context.take() {
        drop(context);
        log::info!("Vulkan resources released");
    }
    if let Some(window) = window.take() {
        drop(window);
        log::info!("Window destroyed");
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.failure.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            self.failure = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if exit_requested(&event) {
            log::info!("Close requested, shutting down...");
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("Cleaning up...");
        self.teardown();
    }
}
