//! Window, GL contexts and the winit event loop.
//!
//! The main context is current on the UI thread for the whole run. A
//! second context is created in the same share group, without a surface,
//! and handed to the explorer for pre-rendering.

use std::error::Error;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glow::HasContext;
use glutin::config::{Config, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext, PossiblyCurrentContext,
    Version,
};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, Surface, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};
use mesmer_core::ScreenSize;
use mesmer_render::{Explorer, PreRenderSettings, ShaderLibrary};
use raw_window_handle::HasWindowHandle;
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::window::{Window, WindowId};

use crate::gl_backend::{GlowGpu, WorkerContext};
use crate::input::InputTranslator;
use crate::settings::{AppConfig, Settings};
use crate::ui::Screen;

const WINDOW_TITLE: &str = "Mesmer";
/// Double-precision shaders need GL 4.x; 4.6 core is requested.
const GL_VERSION: Version = Version::new(4, 6);

// ---------------------------------------------------------------------------
// Window + contexts
// ---------------------------------------------------------------------------

/// Everything that exists only while the window does. Field order is drop
/// order: GL objects go before the context that owns them.
struct AppWindow {
    screen: Screen,
    egui: egui_glow::EguiGlow,
    gl: Arc<glow::Context>,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    window: Window,
}

impl AppWindow {
    fn create(
        event_loop: &ActiveEventLoop,
        config: &AppConfig,
        shaders_dir: &Path,
    ) -> Result<Self, Box<dyn Error>> {
        let attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(config.window_width, config.window_height));
        let template = ConfigTemplateBuilder::new().with_alpha_size(8);
        let (window, gl_config) = DisplayBuilder::new()
            .with_window_attributes(Some(attributes))
            .build(event_loop, template, pick_config)?;
        let window = window.ok_or("window creation failed")?;
        let raw_window_handle = window.window_handle().ok().map(|h| h.as_raw());

        let gl_display = gl_config.display();
        let main_attributes = ContextAttributesBuilder::new()
            .with_profile(GlProfile::Core)
            .with_context_api(ContextApi::OpenGl(Some(GL_VERSION)))
            .build(raw_window_handle);
        let main_context = unsafe { gl_display.create_context(&gl_config, &main_attributes)? };

        let worker_attributes = ContextAttributesBuilder::new()
            .with_profile(GlProfile::Core)
            .with_context_api(ContextApi::OpenGl(Some(GL_VERSION)))
            .with_sharing(&main_context)
            .build(raw_window_handle);
        let worker = match unsafe { gl_display.create_context(&gl_config, &worker_attributes) } {
            Ok(context) => Some(WorkerContext::new(context)),
            Err(e) => {
                warn!("No shared context, pre-rendering disabled: {e}");
                None
            }
        };

        let surface_attributes = window.build_surface_attributes(Default::default())?;
        let surface = unsafe { gl_display.create_window_surface(&gl_config, &surface_attributes)? };
        let context = main_context.make_current(&surface)?;

        let interval = if config.vsync {
            SwapInterval::Wait(NonZeroU32::MIN)
        } else {
            SwapInterval::DontWait
        };
        if let Err(e) = surface.set_swap_interval(&context, interval) {
            warn!("Failed to set swap interval: {e}");
        }

        let gl = Arc::new(unsafe {
            glow::Context::from_loader_function_cstr(|s| gl_display.get_proc_address(s))
        });
        unsafe {
            info!("OpenGL vendor: {}", gl.get_parameter_string(glow::VENDOR));
            info!("OpenGL renderer: {}", gl.get_parameter_string(glow::RENDERER));
            info!("OpenGL version: {}", gl.get_parameter_string(glow::VERSION));
            info!(
                "GLSL version: {}",
                gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION)
            );
        }

        let shaders = ShaderLibrary::load(shaders_dir)?;
        let gpu = Rc::new(GlowGpu::new(Arc::clone(&gl)));
        let mut explorer = Explorer::new(gpu, worker, shaders)?;
        explorer.iterations = config.iterations;
        explorer.palettes = config.palettes.clone();
        explorer.prerender = config.prerender;
        explorer.background_density = config.background_density;

        let egui = egui_glow::EguiGlow::new(event_loop, Arc::clone(&gl), None, None, true);

        let size = window.inner_size();
        let screen = Screen::new(
            explorer,
            config.default_save_path.clone(),
            ScreenSize::new(size.width, size.height),
        );

        Ok(Self {
            screen,
            egui,
            gl,
            surface,
            context,
            window,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) {
            self.surface.resize(&self.context, w, h);
            debug!("Resized to {width}x{height}");
        }
        self.screen.size = ScreenSize::new(width, height);
    }

    fn redraw(&mut self) -> Result<(), glutin::error::Error> {
        let size = self.window.inner_size();
        self.screen.size = ScreenSize::new(size.width, size.height);

        // egui leaves blending on.
        unsafe { self.gl.disable(glow::BLEND) };
        self.screen.explorer.frame(self.screen.size);

        self.egui.run(&self.window, |ctx| self.screen.draw(ctx));
        self.egui.paint(&self.window);
        self.surface.swap_buffers(&self.context)
    }
}

impl Drop for AppWindow {
    fn drop(&mut self) {
        self.egui.destroy();
    }
}

/// Prefer the config with the fewest samples; the fractal shaders do
/// their own filtering.
fn pick_config(configs: Box<dyn Iterator<Item = Config> + '_>) -> Config {
    configs
        .reduce(|best, c| {
            if c.num_samples() < best.num_samples() {
                c
            } else {
                best
            }
        })
        // glutin only calls the picker with at least one config.
        .expect("no GL config offered")
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

pub struct MesmerApp {
    settings: Settings,
    config: AppConfig,
    shaders_dir: PathBuf,
    input: InputTranslator,
    window: Option<AppWindow>,
    frame_interval: Duration,
    next_frame: Instant,
    fatal: Option<Box<dyn Error>>,
}

impl MesmerApp {
    pub fn new(settings: Settings, config: AppConfig, shaders_dir: PathBuf) -> Self {
        let frame_interval = if config.vsync || config.max_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / f64::from(config.max_fps))
        };
        Self {
            settings,
            config,
            shaders_dir,
            input: InputTranslator::default(),
            window: None,
            frame_interval,
            next_frame: Instant::now(),
            fatal: None,
        }
    }

    /// The initialization error that ended the event loop, if any.
    pub fn take_fatal(&mut self) -> Option<Box<dyn Error>> {
        self.fatal.take()
    }

    /// Write the explorer's current preferences back to the settings file.
    fn persist(&mut self) {
        if let Some(app) = self.window.as_ref() {
            let explorer = &app.screen.explorer;
            self.config.iterations = explorer.iterations;
            self.config.palettes = explorer.palettes.clone();
            self.config.prerender = PreRenderSettings {
                overrides: None,
                ..explorer.prerender
            };
            self.config.background_density = explorer.background_density;
            let size = app
                .window
                .inner_size()
                .to_logical::<u32>(app.window.scale_factor());
            self.config.window_width = size.width.max(1);
            self.config.window_height = size.height.max(1);
        }
        self.config.store(&mut self.settings);
        if let Err(e) = self.settings.save() {
            error!("Failed to save settings: {e}");
        }
    }
}

impl ApplicationHandler for MesmerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match AppWindow::create(event_loop, &self.config, &self.shaders_dir) {
            Ok(app) => {
                info!("Mesmer initialized");
                app.window.request_redraw();
                self.window = Some(app);
            }
            Err(e) => {
                error!("Initialization failed: {e}");
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(app) = self.window.as_mut() else {
            return;
        };
        let response = app.egui.on_window_event(&app.window, &event);

        match &event {
            WindowEvent::Resized(size) => app.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                if let Err(e) = app.redraw() {
                    error!("Failed to present frame: {e}");
                }
                if app.screen.quit_requested() {
                    event_loop.exit();
                }
                return;
            }
            _ => {}
        }

        // Releases and motion always reach the explorer so a drag that
        // ends over a panel still finishes.
        let passthrough = matches!(
            event,
            WindowEvent::CloseRequested
                | WindowEvent::CursorMoved { .. }
                | WindowEvent::MouseInput {
                    state: ElementState::Released,
                    ..
                }
        );
        if !response.consumed || passthrough {
            if let Some(input) = self.input.translate(&event) {
                app.screen.handle_input(input);
                if app.screen.quit_requested() {
                    event_loop.exit();
                }
            }
        }
        if response.repaint {
            app.window.request_redraw();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(app) = self.window.as_ref() else {
            return;
        };
        let now = Instant::now();
        if now >= self.next_frame {
            app.window.request_redraw();
            self.next_frame = now + self.frame_interval;
        }
        event_loop.set_control_flow(if self.frame_interval.is_zero() {
            ControlFlow::Poll
        } else {
            ControlFlow::WaitUntil(self.next_frame)
        });
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.persist();
        // Drop GL state while the context is still current.
        self.window = None;
        info!("Mesmer shut down");
    }
}
