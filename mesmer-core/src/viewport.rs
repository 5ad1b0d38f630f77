use tracing::warn;

use crate::error::CoreError;
use crate::fractal::{FractalKind, FractalParams};

/// Multiplicative zoom change per mouse-wheel notch.
pub const ZOOM_STEP: f64 = 1.1;

/// Drawable surface size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Half extents as floats, never zero so the mapping stays finite.
    fn half_extents(self) -> (f64, f64) {
        (
            0.5 * f64::from(self.width.max(1)),
            0.5 * f64::from(self.height.max(1)),
        )
    }
}

/// Pan/zoom state of the visible region plus the active kind's extra constants.
///
/// The horizontal span of the screen covers `2 / zoom` units of the plane,
/// and likewise vertically, centred on `center`. Screen y grows downward
/// while the imaginary axis grows upward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub center: (f64, f64),
    zoom: f64,
    pub drag_active: bool,
    pub drag_anchor: (f32, f32),
    pub params: FractalParams,
}

impl ViewportState {
    pub fn new(center: (f64, f64), zoom: f64) -> crate::Result<Self> {
        if zoom <= 0.0 || !zoom.is_finite() {
            return Err(CoreError::InvalidZoom(zoom));
        }
        Ok(Self {
            center,
            zoom,
            drag_active: false,
            drag_anchor: (0.0, 0.0),
            params: FractalParams::DEFAULT,
        })
    }

    /// Default state for `kind`. The idle kind gets an identity view.
    pub fn for_kind(kind: FractalKind) -> Self {
        let mut vp = Self::default();
        vp.reset_to_defaults(kind);
        vp
    }

    #[inline]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) -> crate::Result<()> {
        if zoom <= 0.0 || !zoom.is_finite() {
            return Err(CoreError::InvalidZoom(zoom));
        }
        self.zoom = zoom;
        Ok(())
    }

    /// Map a screen position to plane coordinates.
    #[inline]
    pub fn screen_to_complex(&self, point: (f32, f32), size: ScreenSize) -> (f64, f64) {
        let (half_w, half_h) = size.half_extents();
        (
            self.center.0 + (f64::from(point.0) - half_w) / (half_w * self.zoom),
            self.center.1 - (f64::from(point.1) - half_h) / (half_h * self.zoom),
        )
    }

    /// Zoom by `ZOOM_STEP^wheel_delta`, keeping the point under `point` fixed.
    ///
    /// Positive deltas zoom in. A step that would make the zoom non-finite
    /// or non-positive is ignored.
    pub fn zoom_at(&mut self, point: (f32, f32), wheel_delta: f32, size: ScreenSize) {
        if wheel_delta == 0.0 {
            return;
        }
        let new_zoom = self.zoom * ZOOM_STEP.powf(f64::from(wheel_delta));
        if new_zoom <= 0.0 || !new_zoom.is_finite() {
            warn!(zoom = self.zoom, wheel_delta, "Zoom step out of range, ignored");
            return;
        }

        let before = self.screen_to_complex(point, size);
        self.zoom = new_zoom;
        let after = self.screen_to_complex(point, size);

        self.center.0 += before.0 - after.0;
        self.center.1 += before.1 - after.1;
    }

    pub fn begin_drag(&mut self, point: (f32, f32)) {
        self.drag_active = true;
        self.drag_anchor = point;
    }

    pub fn end_drag(&mut self) {
        self.drag_active = false;
    }

    /// Pan so the plane follows the cursor. No-op unless a drag is active.
    pub fn drag_to(&mut self, point: (f32, f32), size: ScreenSize) {
        if !self.drag_active {
            return;
        }
        let (half_w, half_h) = size.half_extents();
        let dx = f64::from(point.0) - f64::from(self.drag_anchor.0);
        let dy = f64::from(point.1) - f64::from(self.drag_anchor.1);

        self.center.0 -= dx / (half_w * self.zoom);
        self.center.1 += dy / (half_h * self.zoom);
        self.drag_anchor = point;
    }

    /// Restore the documented center, zoom and extra constants of `kind`.
    pub fn reset_to_defaults(&mut self, kind: FractalKind) {
        match kind.info() {
            Some(info) => {
                self.center = info.default_center;
                self.zoom = info.default_zoom;
                self.params = info.default_params;
            }
            None => {
                self.center = (0.0, 0.0);
                self.zoom = 1.0;
                self.params = FractalParams::DEFAULT;
            }
        }
        self.drag_active = false;
    }
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            center: (0.0, 0.0),
            zoom: 1.0,
            drag_active: false,
            drag_anchor: (0.0, 0.0),
            params: FractalParams::DEFAULT,
        }
    }
}
