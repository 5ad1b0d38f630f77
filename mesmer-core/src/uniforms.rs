//! Per-frame mapping from explorer state to shader uniforms.
//!
//! Everything here is a pure function of its inputs: a fresh [`UniformSet`]
//! is built every frame and nothing is cached between frames.

use crate::error::CoreError;
use crate::fractal::{FractalKind, FractalParams};
use crate::iteration::IterationPolicy;
use crate::palette::{PaletteParams, PaletteSet};
use crate::viewport::{ScreenSize, ViewportState};

pub const U_RESOLUTION: &str = "u_resolution";
pub const U_CENTER: &str = "u_center";
pub const U_ZOOM: &str = "u_zoom";
pub const U_AB_CENTER: &str = "u_ab_center";
pub const U_AB_ZOOM: &str = "u_ab_zoom";
pub const U_MAX_ITERATIONS: &str = "u_max_iterations";
pub const U_PALETTE: [&str; 4] = ["u_palette_a", "u_palette_b", "u_palette_c", "u_palette_d"];
pub const U_JULIA_C: &str = "u_julia_c";
pub const U_PHOENIX_C: &str = "u_phoenix_c";
pub const U_PHOENIX_EXPONENT: &str = "u_phoenix_exponent";
pub const U_POWER: &str = "u_power";
pub const U_RELAXATION: &str = "u_relaxation";
pub const U_TILE: &str = "u_tile";
pub const U_TILE_SIZE: &str = "u_tile_size";
pub const U_TIME: &str = "u_time";
pub const U_DENSITY: &str = "u_density";
pub const U_PROGRESS: &str = "u_progress";
pub const U_PAN: &str = "u_pan";
pub const U_VIEW_ZOOM: &str = "u_view_zoom";
pub const U_TEXTURE: &str = "u_texture";

/// A value for one named uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Double(f64),
    Vec2([f32; 2]),
    DVec2([f64; 2]),
    IVec2([i32; 2]),
    Vec4([f32; 4]),
}

/// Ordered list of uniform assignments for one draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformSet {
    entries: Vec<(&'static str, UniformValue)>,
}

impl UniformSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing an earlier assignment of the same uniform.
    pub fn set(&mut self, name: &'static str, value: UniformValue) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, UniformValue)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Live-view inputs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    pub kind: FractalKind,
    pub viewport: &'a ViewportState,
    pub iterations: &'a IterationPolicy,
    pub palettes: &'a PaletteSet,
    pub size: ScreenSize,
}

/// Inputs for a tiled pre-render job. Everything is resolved up front so
/// the worker thread does not need access to live state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreRenderInputs {
    pub kind: FractalKind,
    pub center: (f64, f64),
    pub zoom: f64,
    pub params: FractalParams,
    pub max_iterations: u32,
    pub palette: PaletteParams,
    pub resolution: u32,
    pub tile_size: u32,
}

/// Uniforms for the live fractal shader of `inputs.kind`.
///
/// The iteration count is resolved from the policy at call time.
pub fn bind_live(inputs: &FrameInputs<'_>) -> crate::Result<UniformSet> {
    let vp = inputs.viewport;
    let mut set = UniformSet::new();
    set.set(
        U_RESOLUTION,
        UniformValue::Vec2([inputs.size.width as f32, inputs.size.height as f32]),
    );
    bind_fractal(
        &mut set,
        inputs.kind,
        vp.center,
        vp.zoom(),
        &vp.params,
        inputs.iterations.effective_iterations(vp.zoom()),
        inputs.palettes.select(inputs.kind),
    )?;
    Ok(set)
}

/// Uniforms shared by every tile of a pre-render job. The per-tile
/// [`U_TILE`] value is set by the worker.
pub fn bind_prerender(inputs: &PreRenderInputs) -> crate::Result<UniformSet> {
    let mut set = UniformSet::new();
    let r = inputs.resolution as f32;
    set.set(U_RESOLUTION, UniformValue::Vec2([r, r]));
    set.set(
        U_TILE_SIZE,
        UniformValue::Int(i32::try_from(inputs.tile_size).unwrap_or(i32::MAX)),
    );
    bind_fractal(
        &mut set,
        inputs.kind,
        inputs.center,
        inputs.zoom,
        &inputs.params,
        inputs.max_iterations,
        &inputs.palette,
    )?;
    Ok(set)
}

fn bind_fractal(
    set: &mut UniformSet,
    kind: FractalKind,
    center: (f64, f64),
    zoom: f64,
    params: &FractalParams,
    max_iterations: u32,
    palette: &PaletteParams,
) -> crate::Result<()> {
    if kind == FractalKind::None {
        return Err(CoreError::NoFractalKind);
    }

    if kind.uses_parameter_plane() {
        set.set(U_AB_CENTER, UniformValue::DVec2([center.0, center.1]));
        set.set(U_AB_ZOOM, UniformValue::Double(zoom));
    } else {
        set.set(U_CENTER, UniformValue::DVec2([center.0, center.1]));
        set.set(U_ZOOM, UniformValue::Double(zoom));
    }

    set.set(
        U_MAX_ITERATIONS,
        UniformValue::Int(i32::try_from(max_iterations).unwrap_or(i32::MAX)),
    );

    for (name, v) in U_PALETTE
        .into_iter()
        .zip([palette.a, palette.b, palette.c, palette.d])
    {
        set.set(name, UniformValue::Vec4(v));
    }

    match kind {
        FractalKind::Julia => {
            set.set(U_JULIA_C, UniformValue::DVec2([params.julia_c.0, params.julia_c.1]));
        }
        FractalKind::Phoenix => {
            set.set(
                U_PHOENIX_C,
                UniformValue::DVec2([params.phoenix_c.0, params.phoenix_c.1]),
            );
            set.set(U_PHOENIX_EXPONENT, UniformValue::Double(params.phoenix_exponent));
        }
        FractalKind::Multibrot => {
            set.set(U_POWER, UniformValue::Double(params.power));
        }
        FractalKind::Nova => {
            set.set(U_POWER, UniformValue::Double(params.power));
            set.set(U_RELAXATION, UniformValue::Double(params.relaxation));
        }
        _ => {}
    }
    Ok(())
}

/// Uniforms for the animated idle background.
pub fn bind_background(time: f32, size: ScreenSize, density: f32) -> UniformSet {
    let mut set = UniformSet::new();
    set.set(U_TIME, UniformValue::Float(time));
    set.set(
        U_RESOLUTION,
        UniformValue::Vec2([size.width as f32, size.height as f32]),
    );
    set.set(U_DENSITY, UniformValue::Float(density));
    set
}

/// Uniforms for the loading screen shown while a pre-render is in flight.
pub fn bind_loading(time: f32, size: ScreenSize, progress: f32) -> UniformSet {
    let mut set = UniformSet::new();
    set.set(U_TIME, UniformValue::Float(time));
    set.set(
        U_RESOLUTION,
        UniformValue::Vec2([size.width as f32, size.height as f32]),
    );
    set.set(U_PROGRESS, UniformValue::Float(progress.clamp(0.0, 1.0)));
    set
}

/// Uniforms for drawing a baked texture: pan, zoom and screen size only.
pub fn bind_viewer(view: &ViewportState, size: ScreenSize) -> UniformSet {
    let mut set = UniformSet::new();
    set.set(
        U_PAN,
        UniformValue::Vec2([view.center.0 as f32, view.center.1 as f32]),
    );
    set.set(U_VIEW_ZOOM, UniformValue::Float(view.zoom() as f32));
    set.set(
        U_RESOLUTION,
        UniformValue::Vec2([size.width as f32, size.height as f32]),
    );
    set.set(U_TEXTURE, UniformValue::Int(0));
    set
}
