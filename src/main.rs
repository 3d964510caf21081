// =============================================================================
// CANVAS RENDERER - Minimal Vulkan renderer on a native window
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  App (winit event loop, config, FPS title)                      │
// │    └── Canvas (native window, geometry from OS events)          │
// │          └── Device (instance, surface, GPU, queues, pool)      │
// │                └── Render (swapchain + per-image cmd buffers)   │
// │                      └── RenderSystem (layout + pipeline)       │
// │                            └── Models (vertex buffers)          │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Render::begin_frame acquires an image (or asks us to skip the frame)
// 2. Begin the swapchain render pass (clear, dynamic viewport/scissor)
// 3. RenderSystem binds its pipeline and draws every model
// 4. End the render pass, Render::end_frame submits and presents
//
// =============================================================================

mod backend;
mod canvas;
mod config;
mod scene;

use anyhow::{Context, Result};
use backend::{Device, DeviceConfig, GraphicsCanvas, Model, Render, RenderSystem, ShaderPaths};
use canvas::{Canvas, Size};
use config::Config;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowId,
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Logger first so config loading can report problems
    let rust_log = std::env::var("RUST_LOG").ok();
    init_logging(rust_log.as_deref());

    // Load configuration from config.toml
    let config = Config::load();
    log::set_max_level(effective_log_level(rust_log.as_deref(), config.log_level()));

    log::info!("Starting canvas renderer");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        config.window.title
    );
    log::info!("Present mode: {}", config.graphics.present_mode);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Install the logger before the config is read. Records pass through at
/// every level and `log::set_max_level` does the filtering, so the configured
/// level can be applied once the config is loaded.
fn init_logging(rust_log: Option<&str>) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Trace);
    builder.parse_default_env();
    builder.init();
    log::set_max_level(effective_log_level(rust_log, log::LevelFilter::Info));
}

/// RUST_LOG wins over the configured level. Its own directives are already in
/// the logger, so the global maximum only has to let them through.
fn effective_log_level(rust_log: Option<&str>, configured: log::LevelFilter) -> log::LevelFilter {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => log::LevelFilter::Trace,
        _ => configured,
    }
}

// =============================================================================
// GPU STATE
// =============================================================================

/// Everything that lives on the GPU.
///
/// IMPORTANT: Field order is the teardown order. Models and the render
/// system go first, then the swapchain, then the device they all borrow.
struct Gpu {
    models: Vec<Model>,
    render_system: Option<RenderSystem>,
    render: Render,
    device: Arc<Device>,
    shaders: ShaderPaths,
}

impl Gpu {
    fn new(config: &Config, canvas: &Arc<Canvas>) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let device_config = DeviceConfig {
            app_name: config.window.title.clone(),
            validation: config.validation(),
        };
        let device = Device::new(&device_config, canvas.as_ref()).context("Failed to create device")?;

        let render = Render::new(device.clone(), canvas.clone(), config.render_settings())
            .context("Failed to create swapchain")?;

        let vertices = scene::sierpinski(config.scene.sierpinski_depth);
        let model = Model::new(device.clone(), &vertices).context("Failed to upload model")?;
        log::info!(
            "Scene: depth {}, {} vertices, {} bytes",
            config.scene.sierpinski_depth,
            model.vertex_count(),
            model.buffer_size()
        );

        let mut gpu = Self {
            models: vec![model],
            render_system: None,
            render,
            device,
            shaders: config.shader_paths(),
        };
        gpu.rebuild_render_system()?;

        log::info!("Vulkan initialized successfully! Aspect ratio {:.3}", gpu.render.aspect_ratio());
        Ok(gpu)
    }

    /// Build the render system against the current render pass if the
    /// swapchain came back with a different one.
    fn rebuild_render_system(&mut self) -> Result<()> {
        if !self.render.take_render_pass_change() {
            return Ok(());
        }

        // Render has waited for the device before raising the flag
        self.render_system = None;
        let render_pass = self.render.render_pass()?;
        let render_system = RenderSystem::new(self.device.clone(), render_pass, &self.shaders)
            .context("Failed to create render system")?;
        self.render_system = Some(render_system);
        Ok(())
    }

    /// Record and present one frame. Returns false when the frame was skipped.
    fn draw_frame(&mut self) -> Result<bool> {
        let Some(command_buffer) = self.render.begin_frame()? else {
            return Ok(false);
        };
        self.rebuild_render_system()?;

        self.render.begin_swapchain_render_pass(command_buffer)?;
        if let Some(render_system) = &self.render_system {
            render_system.render_objects(command_buffer, &self.models);
        }
        self.render.end_swapchain_render_pass(command_buffer);

        self.render.end_frame()?;
        Ok(true)
    }
}

// =============================================================================
// FPS TRACKING
// =============================================================================

struct FpsCounter {
    frame_count: u32,
    last_update: Instant,
    last_frame: Instant,
}

impl FpsCounter {
    fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            last_update: now,
            last_frame: now,
        }
    }

    /// Count a frame. Once per second returns (fps, last frame time in ms).
    fn tick(&mut self, now: Instant) -> Option<(f32, f32)> {
        let frame_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_count += 1;

        let elapsed = now.duration_since(self.last_update);
        if elapsed < Duration::from_secs(1) {
            return None;
        }

        let fps = self.frame_count as f32 / elapsed.as_secs_f32();
        self.frame_count = 0;
        self.last_update = now;
        Some((fps, frame_time * 1000.0))
    }
}

/// Poll while there is something to draw. A minimized canvas waits for the
/// resize that restores it.
fn control_flow_for(size: Size) -> ControlFlow {
    if size.is_zero_area() {
        ControlFlow::Wait
    } else {
        ControlFlow::Poll
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

struct App {
    config: Config,
    // Dropped before the canvas, whose window the surface belongs to
    gpu: Option<Gpu>,
    canvas: Option<Arc<Canvas>>,
    fps: FpsCounter,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            gpu: None,
            canvas: None,
            fps: FpsCounter::new(Instant::now()),
            error: None,
        }
    }

    /// Log, remember the error for `main`, and stop the loop.
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:?}", error);
        self.gpu = None;
        self.error = Some(error);
        event_loop.exit();
    }

    fn requested_size(&self) -> Size {
        Size {
            width: self.config.window.width,
            height: self.config.window.height,
        }
    }

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }
        if let (Some((fps, frame_ms)), Some(canvas)) = (self.fps.tick(Instant::now()), &self.canvas) {
            canvas.set_title(&format!(
                "{} - {:.0} FPS ({:.2}ms)",
                self.config.window.title, fps, frame_ms
            ));
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.canvas.is_some() {
            return;
        }

        let canvas = match Canvas::new(event_loop, &self.config.window.title, self.requested_size()) {
            Ok(canvas) => Arc::new(canvas),
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("Failed to create canvas"));
                return;
            }
        };
        canvas.show();

        match Gpu::new(&self.config, &canvas) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => {
                self.fail(event_loop, e);
                return;
            }
        }
        self.canvas = Some(canvas);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.canvas.as_ref().is_some_and(|canvas| canvas.id() != id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            WindowEvent::Moved(_) | WindowEvent::Resized(_) => {
                if let Some(canvas) = &self.canvas {
                    canvas.handle_event(&event);
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(gpu) = self.gpu.as_mut() else {
                    return;
                };
                match gpu.draw_frame() {
                    Ok(true) => self.update_fps(),
                    Ok(false) => {}
                    Err(e) => self.fail(event_loop, e.context("Render error")),
                }
            }

            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => match event.physical_key {
                PhysicalKey::Code(KeyCode::Escape) => {
                    log::info!("ESC pressed, exiting...");
                    event_loop.exit();
                }
                PhysicalKey::Code(KeyCode::Home) => {
                    if let Some(canvas) = &self.canvas {
                        canvas.restore_placement(self.requested_size());
                    }
                }
                _ => {}
            },

            _ => {}
        }
    }

    /// Request continuous redraws, or sleep until the next event while the
    /// canvas has no area to draw into.
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(canvas) = &self.canvas else {
            return;
        };
        let control_flow = control_flow_for(canvas.size());
        event_loop.set_control_flow(control_flow);
        if control_flow == ControlFlow::Poll {
            canvas.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("Cleaning up Vulkan resources...");
        self.gpu = None;
        log::info!("Cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_reported_once_per_second() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);

        for i in 1..60 {
            assert_eq!(counter.tick(start + Duration::from_millis(i * 16)), None);
        }

        let (fps, frame_ms) = counter.tick(start + Duration::from_millis(1000)).unwrap();
        assert!((fps - 60.0).abs() < 0.01);
        assert!((frame_ms - 56.0).abs() < 0.01);

        // Counter restarts after reporting
        assert_eq!(counter.tick(start + Duration::from_millis(1016)), None);
    }

    #[test]
    fn minimized_canvas_waits_instead_of_polling() {
        assert_eq!(control_flow_for(Size { width: 0, height: 0 }), ControlFlow::Wait);
        assert_eq!(control_flow_for(Size { width: 800, height: 0 }), ControlFlow::Wait);
        assert_eq!(control_flow_for(Size { width: 800, height: 600 }), ControlFlow::Poll);
    }

    #[test]
    fn rust_log_overrides_configured_level() {
        use log::LevelFilter;
        assert_eq!(effective_log_level(None, LevelFilter::Warn), LevelFilter::Warn);
        assert_eq!(effective_log_level(Some(""), LevelFilter::Warn), LevelFilter::Warn);
        assert_eq!(effective_log_level(Some("debug"), LevelFilter::Warn), LevelFilter::Trace);
        assert_eq!(
            effective_log_level(Some("canvas_renderer=trace"), LevelFilter::Error),
            LevelFilter::Trace
        );
    }
}
