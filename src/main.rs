// =============================================================================
// VULKAN INSTANCE BOOTSTRAP - Window, instance, validation layers
// =============================================================================
//
// Creates a window, brings up a Vulkan instance with optional validation
// layers and a debug messenger, then runs the event loop until the window is
// closed. No rendering happens here; this is the instance lifecycle only.
//
// STARTUP FLOW:
// 1. Load config.toml (window size, validation settings)
// 2. Create window via winit
// 3. Check validation layers, create instance, attach debug messenger
// 4. Poll events until close requested
// 5. Tear down: messenger, then instance, then window

mod backend;
mod config;

use anyhow::{Context, Result};
use backend::{extension_names, AshApi, BootstrapConfig, Bootstrapper};
use config::Config;
use raw_window_handle::HasRawDisplayHandle;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    let config = Config::load();

    init_logging();
    log::info!("Starting Vulkan bootstrap");
    log::info!("Window: {}x{}", config.window.width, config.window.height);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // A startup failure exits the event loop; surface it here so the process
    // exits with a non-zero status
    if let Some(err) = app.startup_error.take() {
        return Err(err);
    }
    Ok(())
}

fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    builder.filter_level(LevelFilter::Info);
    builder.init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Main application struct.
///
/// Field order matters for Drop: the bootstrapper is declared before the
/// window so the Vulkan instance is torn down before the window goes away,
/// matching the creation order in reverse.
struct App {
    config: Config,
    bootstrap: Option<Bootstrapper<AshApi>>,
    window: Option<Arc<Window>>,
    startup_error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            bootstrap: None,
            window: None,
            startup_error: None,
        }
    }

    /// Bring up the Vulkan instance and debug messenger for this window.
    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        log::info!("Initializing Vulkan...");

        let api = AshApi::load().context("Failed to load Vulkan library. Is Vulkan installed?")?;

        // Instance extensions the window system needs (VK_KHR_surface plus
        // the platform surface extension)
        let window_extensions = extension_names(
            ash_window::enumerate_required_extensions(window.raw_display_handle())
                .context("Failed to query window-system instance extensions")?,
        );

        let bootstrap_config = BootstrapConfig {
            app_name: self.config.window.title.clone(),
            enable_validation: self.config.validation_enabled(),
            validation_layers: self.config.debug.layers.clone(),
        };

        let mut bootstrap = Bootstrapper::initialize(api, bootstrap_config, &window_extensions)?;
        bootstrap.setup_debug_messenger()?;
        self.bootstrap = Some(bootstrap);

        log::info!("Vulkan initialized successfully");
        Ok(())
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop
            .create_window(window_attributes)
            .context("Failed to create window")
        {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("{:?}", e);
                self.startup_error = Some(e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            log::error!("Failed to initialize Vulkan: {:?}", e);
            self.startup_error = Some(e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    /// Handle window events.
    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                // Tear down the instance (messenger first) while the window
                // still exists, matching creation order in reverse
                self.bootstrap.take();
                event_loop.exit();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() {
                    if let PhysicalKey::Code(KeyCode::Escape) = event.physical_key {
                        log::info!("ESC pressed, exiting...");
                        event_loop.exit();
                    }
                }
            }

            _ => {}
        }
    }
}
