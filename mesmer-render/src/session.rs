//! The explorer's mode state machine.
//!
//! [`Explorer`] owns every piece of fractal-specific GPU state and is the
//! only place that switches between them. Exactly one shader program is
//! held on the main context at any time; every transition releases the
//! previous program before creating the next one.

use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use mesmer_core::uniforms::{bind_background, bind_live, bind_loading};
use mesmer_core::{
    FractalKind, FractalParams, FrameInputs, InputEvent, IterationPolicy, Key, MouseButton,
    PaletteSet, PreRenderInputs, ScreenSize, ViewportState,
};
use tracing::{debug, error, info, warn};

use crate::error::RenderError;
use crate::export::{export_png, ExportMetadata};
use crate::gpu::{Gpu, Rect, SharedContext};
use crate::prerender::{PreRenderJob, PreRenderPoll, PreRenderer, DEFAULT_RESOLUTION};
use crate::quad::QuadMesh;
use crate::shader::{ShaderLibrary, ShaderProgram};
use crate::tile::DEFAULT_TILE_SIZE;
use crate::viewer::TextureViewer;
use crate::Result;

/// Default density of the idle background animation.
pub const DEFAULT_BACKGROUND_DENSITY: f32 = 1.0;

const CLEAR_COLOR: [f32; 4] = [0.02, 0.02, 0.03, 1.0];

/// Which screen the explorer is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    MainMenu,
    FractalSelection,
    FractalActive(FractalKind),
    PreRenderLoading(FractalKind),
    PreRenderView(FractalKind),
}

impl Mode {
    /// The fractal this mode is about, or `None` for the menus.
    pub fn kind(self) -> FractalKind {
        match self {
            Self::MainMenu | Self::FractalSelection => FractalKind::None,
            Self::FractalActive(k) | Self::PreRenderLoading(k) | Self::PreRenderView(k) => k,
        }
    }
}

/// What the caller should do after an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Continue,
    Quit,
    /// Save the texture being viewed; the caller picks the path.
    Export,
}

/// View parameters captured for a pre-render of one kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreRenderOverride {
    pub kind: FractalKind,
    pub center: (f64, f64),
    pub zoom: f64,
    pub params: FractalParams,
    pub max_iterations: u32,
}

impl PreRenderOverride {
    pub fn from_view(kind: FractalKind, view: &ViewportState, iterations: &IterationPolicy) -> Self {
        Self {
            kind,
            center: view.center,
            zoom: view.zoom(),
            params: view.params,
            max_iterations: iterations.effective_iterations(view.zoom()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreRenderSettings {
    /// Route fractal selection through the tiled pre-render.
    pub enabled: bool,
    pub resolution: u32,
    pub tile_size: u32,
    /// Use `overrides` instead of the kind defaults when it matches the kind.
    pub use_overrides: bool,
    pub overrides: Option<PreRenderOverride>,
}

impl Default for PreRenderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            resolution: DEFAULT_RESOLUTION,
            tile_size: DEFAULT_TILE_SIZE,
            use_overrides: false,
            overrides: None,
        }
    }
}

/// See the module documentation.
pub struct Explorer<C: SharedContext> {
    gpu: Rc<C::Gpu>,
    shaders: ShaderLibrary,
    quad: QuadMesh<C::Gpu>,
    program: Option<ShaderProgram<C::Gpu>>,
    prerenderer: PreRenderer<C>,
    viewer: Option<TextureViewer<C::Gpu>>,
    mode: Mode,
    pub viewport: ViewportState,
    pub iterations: IterationPolicy,
    pub palettes: PaletteSet,
    pub prerender: PreRenderSettings,
    pub background_density: f32,
    clock: Instant,
    last_error: Option<String>,
}

impl<C: SharedContext> Explorer<C> {
    /// Build the explorer on the main menu with the background shader bound.
    ///
    /// Failure here is an initialization failure and should be fatal.
    pub fn new(gpu: Rc<C::Gpu>, context: Option<C>, shaders: ShaderLibrary) -> Result<Self> {
        if context.is_none() {
            warn!("No shared context; pre-rendering is disabled");
        }
        let quad = QuadMesh::new(&gpu)?;
        let background = ShaderProgram::new(&gpu, &shaders.quad_vertex, &shaders.background_fragment)?;
        Ok(Self {
            prerenderer: PreRenderer::new(Rc::clone(&gpu), context),
            gpu,
            shaders,
            quad,
            program: Some(background),
            viewer: None,
            mode: Mode::MainMenu,
            viewport: ViewportState::default(),
            iterations: IterationPolicy::default(),
            palettes: PaletteSet::default(),
            prerender: PreRenderSettings::default(),
            background_density: DEFAULT_BACKGROUND_DENSITY,
            clock: Instant::now(),
            last_error: None,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn kind(&self) -> FractalKind {
        self.mode.kind()
    }

    /// Label of the bound program, if any.
    pub fn program_label(&self) -> Option<&str> {
        self.program.as_ref().map(ShaderProgram::label)
    }

    /// Pre-render progress as `(tiles done, tiles total)`.
    pub fn prerender_tiles(&self) -> (usize, usize) {
        self.prerenderer.progress().tiles()
    }

    pub fn can_prerender(&self) -> bool {
        self.prerenderer.has_context()
    }

    /// The pan/zoom state of the texture viewer while one is shown.
    pub fn viewer(&self) -> Option<&TextureViewer<C::Gpu>> {
        self.viewer.as_ref()
    }

    /// Most recent recoverable failure, for display. Cleared on read.
    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    // -- Transitions --------------------------------------------------------

    pub fn open_selection(&mut self) {
        if self.mode == Mode::MainMenu {
            self.mode = Mode::FractalSelection;
        }
    }

    /// Switch to `kind`, tearing down whatever fractal was active.
    ///
    /// With pre-rendering enabled this enters the loading screen. On a
    /// shader failure the explorer ends up in `FractalSelection` with the
    /// background shader bound, and the error is returned.
    pub fn select_fractal(&mut self, kind: FractalKind) -> Result<()> {
        if kind == FractalKind::None {
            return Err(RenderError::InvalidFractalKind);
        }
        self.teardown();
        self.viewport.reset_to_defaults(kind);
        if self.prerender.enabled {
            let inputs = self.prerender_inputs(kind);
            self.start_prerender(inputs)
        } else {
            self.activate_live(kind)
        }
    }

    /// Bake the live view of the active fractal.
    pub fn prerender_current_view(&mut self) -> Result<()> {
        let Mode::FractalActive(kind) = self.mode else {
            return Err(RenderError::InvalidFractalKind);
        };
        self.prerender.overrides = Some(PreRenderOverride::from_view(
            kind,
            &self.viewport,
            &self.iterations,
        ));
        self.prerender.use_overrides = true;
        let inputs = self.prerender_inputs(kind);
        self.teardown();
        self.start_prerender(inputs)
    }

    /// Leave the current screen. Any fractal state is torn down and the
    /// explorer returns to the main menu with the background shader.
    pub fn back(&mut self) {
        match self.mode {
            Mode::MainMenu => {}
            Mode::FractalSelection => self.mode = Mode::MainMenu,
            Mode::FractalActive(kind) | Mode::PreRenderLoading(kind) | Mode::PreRenderView(kind) => {
                self.teardown();
                self.restore_background();
                self.mode = Mode::MainMenu;
                info!(%kind, "Returned to main menu");
            }
        }
    }

    /// Restore the default view of whatever is being looked at.
    pub fn reset_view(&mut self) {
        match self.mode {
            Mode::FractalActive(kind) => self.viewport.reset_to_defaults(kind),
            Mode::PreRenderView(_) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.reset_view();
                }
            }
            _ => {}
        }
    }

    /// Parameters the next pre-render of `kind` will use.
    pub fn prerender_inputs(&self, kind: FractalKind) -> PreRenderInputs {
        let settings = &self.prerender;
        let chosen = settings
            .overrides
            .filter(|o| settings.use_overrides && o.kind == kind);
        let (center, zoom, params, max_iterations) = match chosen {
            Some(o) => (o.center, o.zoom, o.params, o.max_iterations),
            None => {
                let defaults = ViewportState::for_kind(kind);
                (
                    defaults.center,
                    defaults.zoom(),
                    defaults.params,
                    self.iterations.effective_iterations(defaults.zoom()),
                )
            }
        };
        PreRenderInputs {
            kind,
            center,
            zoom,
            params,
            max_iterations,
            palette: *self.palettes.select(kind),
            resolution: settings.resolution,
            tile_size: settings.tile_size,
        }
    }

    fn release_program(&mut self) {
        self.program = None;
    }

    fn teardown(&mut self) {
        self.prerenderer.cancel();
        self.viewer = None;
        self.release_program();
    }

    fn restore_background(&mut self) {
        self.release_program();
        match ShaderProgram::new(
            &self.gpu,
            &self.shaders.quad_vertex,
            &self.shaders.background_fragment,
        ) {
            Ok(p) => self.program = Some(p),
            Err(e) => error!("Background shader unavailable: {e}"),
        }
    }

    fn activate_live(&mut self, kind: FractalKind) -> Result<()> {
        self.release_program();
        let created = self.shaders.fractal_variant(kind, false).and_then(|fragment| {
            ShaderProgram::new(&self.gpu, &self.shaders.quad_vertex, &fragment)
        });
        match created {
            Ok(program) => {
                self.program = Some(program);
                self.mode = Mode::FractalActive(kind);
                info!(%kind, "Fractal active");
                Ok(())
            }
            Err(e) => {
                error!(%kind, "Cannot activate fractal: {e}");
                self.last_error = Some(format!("{kind}: {e}"));
                self.restore_background();
                self.mode = Mode::FractalSelection;
                Err(e)
            }
        }
    }

    fn start_prerender(&mut self, inputs: PreRenderInputs) -> Result<()> {
        let kind = inputs.kind;
        let job = PreRenderJob {
            inputs,
            vertex: self.shaders.quad_vertex.clone(),
            fragment: self.shaders.fractal_variant(kind, true)?,
            quad: self.quad.buffers(),
        };
        self.release_program();
        if let Err(e) = self.prerenderer.start(job) {
            warn!(%kind, "Pre-render unavailable, rendering live: {e}");
            self.last_error = Some(format!("Pre-render unavailable: {e}"));
            return self.activate_live(kind);
        }
        match ShaderProgram::new(&self.gpu, &self.shaders.quad_vertex, &self.shaders.loading_fragment) {
            Ok(p) => self.program = Some(p),
            Err(e) => error!("Loading shader unavailable: {e}"),
        }
        self.mode = Mode::PreRenderLoading(kind);
        Ok(())
    }

    fn advance_prerender(&mut self, kind: FractalKind) {
        match self.prerenderer.poll() {
            PreRenderPoll::Pending => {}
            PreRenderPoll::Ready => {
                let Some(texture) = self.prerenderer.take_ready() else {
                    return;
                };
                self.release_program();
                match ShaderProgram::new(
                    &self.gpu,
                    &self.shaders.quad_vertex,
                    &self.shaders.viewer_fragment,
                ) {
                    Ok(p) => {
                        info!(%kind, resolution = texture.resolution(), "Showing pre-rendered texture");
                        self.program = Some(p);
                        self.viewer = Some(TextureViewer::new(texture));
                        self.mode = Mode::PreRenderView(kind);
                    }
                    Err(e) => {
                        self.last_error = Some(format!("Viewer unavailable: {e}"));
                        drop(texture);
                        let _ = self.activate_live(kind);
                    }
                }
            }
            PreRenderPoll::Failed(e) => {
                warn!(%kind, "Pre-render failed, rendering live: {e}");
                self.last_error = Some(format!("Pre-render failed: {e}"));
                let _ = self.activate_live(kind);
            }
            PreRenderPoll::Idle => {
                debug!(%kind, "Loading without a job");
                let _ = self.activate_live(kind);
            }
        }
    }

    // -- Per frame ------------------------------------------------------------

    /// Advance any pre-render and draw the current mode into the default
    /// framebuffer.
    pub fn frame(&mut self, size: ScreenSize) {
        if let Mode::PreRenderLoading(kind) = self.mode {
            self.advance_prerender(kind);
        }

        self.gpu.bind_framebuffer(None);
        self.gpu.set_scissor(None);
        self.gpu.set_viewport(Rect::full(size.width, size.height));
        self.gpu.clear(CLEAR_COLOR);

        let Some(program) = self.program.as_ref() else {
            return;
        };
        let time = self.clock.elapsed().as_secs_f32();
        match self.mode {
            Mode::MainMenu | Mode::FractalSelection => {
                program.apply(&bind_background(time, size, self.background_density));
                self.quad.draw();
            }
            Mode::FractalActive(kind) => {
                let inputs = FrameInputs {
                    kind,
                    viewport: &self.viewport,
                    iterations: &self.iterations,
                    palettes: &self.palettes,
                    size,
                };
                match bind_live(&inputs) {
                    Ok(uniforms) => {
                        program.apply(&uniforms);
                        self.quad.draw();
                    }
                    Err(e) => error!(%kind, "Cannot bind fractal uniforms: {e}"),
                }
            }
            Mode::PreRenderLoading(_) => {
                let progress = self.prerenderer.progress().fraction();
                program.apply(&bind_loading(time, size, progress));
                self.quad.draw();
            }
            Mode::PreRenderView(_) => {
                if let Some(viewer) = self.viewer.as_ref() {
                    viewer.draw(&self.gpu, program, &self.quad, size);
                }
            }
        }
    }

    /// Route one input event to whichever view is active.
    pub fn handle_event(&mut self, event: InputEvent, size: ScreenSize) -> Response {
        match event {
            InputEvent::Close => return Response::Quit,
            InputEvent::Key(Key::Back) => self.back(),
            InputEvent::Key(Key::ResetView) => self.reset_view(),
            InputEvent::Key(Key::Export) => {
                if matches!(self.mode, Mode::PreRenderView(_)) {
                    return Response::Export;
                }
            }
            pointer => {
                if let Some(view) = self.active_view_mut() {
                    apply_pointer(view, pointer, size);
                }
            }
        }
        Response::Continue
    }

    fn active_view_mut(&mut self) -> Option<&mut ViewportState> {
        match self.mode {
            Mode::FractalActive(_) => Some(&mut self.viewport),
            Mode::PreRenderView(_) => self.viewer.as_mut().map(|v| &mut v.view),
            _ => None,
        }
    }

    /// Write the texture being viewed to `path` as PNG.
    pub fn export_prerender(&self, path: &Path) -> Result<()> {
        let viewer = self.viewer.as_ref().ok_or(RenderError::NothingToExport)?;
        let baked = viewer.texture();
        let pixels = baked.read_pixels()?;
        let metadata = ExportMetadata::from_inputs(baked.inputs());
        export_png(&pixels, baked.resolution(), path, &metadata)?;
        info!(path = %path.display(), resolution = baked.resolution(), "Exported pre-render");
        Ok(())
    }
}

impl<C: SharedContext> Drop for Explorer<C> {
    fn drop(&mut self) {
        // The worker may still be reading the quad buffers.
        self.prerenderer.cancel();
    }
}

/// Apply a pointer event to a pan/zoom state.
pub fn apply_pointer(view: &mut ViewportState, event: InputEvent, size: ScreenSize) {
    match event {
        InputEvent::Wheel { position, delta } => view.zoom_at(position, delta, size),
        InputEvent::MouseDown {
            position,
            button: MouseButton::Left,
        } => view.begin_drag(position),
        InputEvent::MouseUp {
            button: MouseButton::Left,
            ..
        } => view.end_drag(),
        InputEvent::MouseMotion { position } => view.drag_to(position, size),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_kind() {
        assert_eq!(Mode::MainMenu.kind(), FractalKind::None);
        assert_eq!(
            Mode::PreRenderView(FractalKind::Spider).kind(),
            FractalKind::Spider
        );
    }

    #[test]
    fn pointer_drag_round_trip_restores_center() {
        let size = ScreenSize::new(800, 600);
        let mut view = ViewportState::for_kind(FractalKind::Julia);
        let start = view.center;
        apply_pointer(
            &mut view,
            InputEvent::MouseDown {
                position: (100.0, 100.0),
                button: MouseButton::Left,
            },
            size,
        );
        apply_pointer(&mut view, InputEvent::MouseMotion { position: (350.0, 420.0) }, size);
        apply_pointer(&mut view, InputEvent::MouseMotion { position: (100.0, 100.0) }, size);
        apply_pointer(
            &mut view,
            InputEvent::MouseUp {
                position: (100.0, 100.0),
                button: MouseButton::Left,
            },
            size,
        );
        assert!((view.center.0 - start.0).abs() < 1e-12);
        assert!((view.center.1 - start.1).abs() < 1e-12);
        assert!(!view.drag_active);
    }

    #[test]
    fn right_button_does_not_drag() {
        let size = ScreenSize::new(800, 600);
        let mut view = ViewportState::default();
        apply_pointer(
            &mut view,
            InputEvent::MouseDown {
                position: (0.0, 0.0),
                button: MouseButton::Right,
            },
            size,
        );
        apply_pointer(&mut view, InputEvent::MouseMotion { position: (50.0, 50.0) }, size);
        assert_eq!(view.center, (0.0, 0.0));
    }
}
