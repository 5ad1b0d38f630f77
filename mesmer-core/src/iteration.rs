/// Extra iterations per unit of `ln(zoom)` in adaptive mode.
pub const ADAPTIVE_ITERATION_RATE: f64 = 150.0;

/// How many escape-time iterations the shaders are allowed per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationPolicy {
    /// Grow the budget with magnification instead of using `manual_max`.
    pub adaptive: bool,
    pub base_iterations: u32,
    pub manual_max: u32,
}

impl IterationPolicy {
    pub const DEFAULT_BASE: u32 = 200;
    pub const DEFAULT_MANUAL_MAX: u32 = 500;

    /// Iteration count for the given zoom.
    ///
    /// Adaptive: `base + floor(150 * ln(zoom))` when `zoom > 1`, else `base`.
    /// Manual: always `manual_max`.
    pub fn effective_iterations(&self, zoom: f64) -> u32 {
        if !self.adaptive {
            return self.manual_max;
        }
        if zoom > 1.0 {
            let extra = (ADAPTIVE_ITERATION_RATE * zoom.ln()).floor();
            // `as` saturates for huge zooms.
            self.base_iterations.saturating_add(extra as u32)
        } else {
            self.base_iterations
        }
    }
}

impl Default for IterationPolicy {
    fn default() -> Self {
        Self {
            adaptive: true,
            base_iterations: Self::DEFAULT_BASE,
            manual_max: Self::DEFAULT_MANUAL_MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_formula_at_zoom_100() {
        let p = IterationPolicy::default();
        assert_eq!(p.effective_iterations(100.0), 890);
    }

    #[test]
    fn adaptive_is_base_at_or_below_unit_zoom() {
        let p = IterationPolicy::default();
        assert_eq!(p.effective_iterations(1.0), 200);
        assert_eq!(p.effective_iterations(0.5), 200);
        assert_eq!(p.effective_iterations(1e-9), 200);
    }

    #[test]
    fn adaptive_never_drops_below_base() {
        let p = IterationPolicy {
            adaptive: true,
            base_iterations: 64,
            manual_max: 10,
        };
        for zoom in [0.01, 0.9, 1.0, 1.0001, 2.0, 1e3, 1e12] {
            assert!(p.effective_iterations(zoom) >= 64);
        }
    }

    #[test]
    fn adaptive_saturates_instead_of_overflowing() {
        let p = IterationPolicy {
            adaptive: true,
            base_iterations: u32::MAX - 5,
            manual_max: 0,
        };
        assert_eq!(p.effective_iterations(1e300), u32::MAX);
    }

    #[test]
    fn manual_ignores_zoom() {
        let p = IterationPolicy {
            adaptive: false,
            base_iterations: 200,
            manual_max: 1234,
        };
        assert_eq!(p.effective_iterations(0.1), 1234);
        assert_eq!(p.effective_iterations(1e8), 1234);
    }
}
