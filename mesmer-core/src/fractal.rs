use serde::{Deserialize, Serialize};

use crate::palette::PaletteParams;

/// Number of selectable kinds (everything except [`FractalKind::None`]).
pub const KIND_COUNT: usize = 10;

/// Every fractal family the explorer knows how to render.
///
/// `None` is the idle state (main menu, selection screen). All other
/// variants have an entry in the kind table returned by [`FractalKind::info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FractalKind {
    #[default]
    None,
    Mandelbrot,
    Julia,
    BurningShip,
    Tricorn,
    Phoenix,
    Lyapunov,
    Newton,
    Multibrot,
    Nova,
    Spider,
}

impl FractalKind {
    /// All selectable kinds, in menu order.
    pub const ALL: [FractalKind; KIND_COUNT] = [
        FractalKind::Mandelbrot,
        FractalKind::Julia,
        FractalKind::BurningShip,
        FractalKind::Tricorn,
        FractalKind::Phoenix,
        FractalKind::Lyapunov,
        FractalKind::Newton,
        FractalKind::Multibrot,
        FractalKind::Nova,
        FractalKind::Spider,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Mandelbrot => "Mandelbrot",
            Self::Julia => "Julia",
            Self::BurningShip => "Burning Ship",
            Self::Tricorn => "Tricorn",
            Self::Phoenix => "Phoenix",
            Self::Lyapunov => "Lyapunov",
            Self::Newton => "Newton",
            Self::Multibrot => "Multibrot",
            Self::Nova => "Nova",
            Self::Spider => "Spider",
        }
    }

    /// Stable identifier used for settings keys.
    pub fn key(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Mandelbrot => "mandelbrot",
            Self::Julia => "julia",
            Self::BurningShip => "burning_ship",
            Self::Tricorn => "tricorn",
            Self::Phoenix => "phoenix",
            Self::Lyapunov => "lyapunov",
            Self::Newton => "newton",
            Self::Multibrot => "multibrot",
            Self::Nova => "nova",
            Self::Spider => "spider",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        if key == Self::None.key() {
            return Some(Self::None);
        }
        Self::ALL.into_iter().find(|k| k.key() == key)
    }

    /// Preprocessor symbol that selects this kind's branch of the fractal
    /// fragment shader.
    pub fn shader_define(self) -> &'static str {
        match self {
            Self::None => "KIND_NONE",
            Self::Mandelbrot => "KIND_MANDELBROT",
            Self::Julia => "KIND_JULIA",
            Self::BurningShip => "KIND_BURNING_SHIP",
            Self::Tricorn => "KIND_TRICORN",
            Self::Phoenix => "KIND_PHOENIX",
            Self::Lyapunov => "KIND_LYAPUNOV",
            Self::Newton => "KIND_NEWTON",
            Self::Multibrot => "KIND_MULTIBROT",
            Self::Nova => "KIND_NOVA",
            Self::Spider => "KIND_SPIDER",
        }
    }

    /// Position in [`FractalKind::ALL`]; `None` for the idle kind.
    pub fn index(self) -> Option<usize> {
        Self::ALL.iter().position(|&k| k == self)
    }

    /// Static metadata for this kind. Returns `None` for [`FractalKind::None`].
    pub fn info(self) -> Option<&'static KindInfo> {
        self.index().map(|i| &KIND_TABLE[i])
    }

    /// Lyapunov fractals are drawn in the (a, b) parameter plane rather
    /// than the complex plane.
    pub fn uses_parameter_plane(self) -> bool {
        self == Self::Lyapunov
    }
}

impl std::fmt::Display for FractalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Extra per-kind constants fed to the shaders on top of center and zoom.
///
/// Every kind carries the full set; each shader variant reads only the
/// fields relevant to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractalParams {
    /// Julia constant `c`.
    pub julia_c: (f64, f64),
    /// Phoenix constant: real part is added to `z`, imaginary part weights the previous orbit value.
    pub phoenix_c: (f64, f64),
    /// Real exponent applied to `z` in the Phoenix recurrence.
    pub phoenix_exponent: f64,
    /// Power used by Multibrot and Nova.
    pub power: f64,
    /// Nova relaxation factor.
    pub relaxation: f64,
}

impl FractalParams {
    pub const DEFAULT: Self = Self {
        julia_c: (-0.8, 0.156),
        phoenix_c: (0.5667, -0.5),
        phoenix_exponent: 2.0,
        power: 3.0,
        relaxation: 1.0,
    };

    /// Default constants for `kind`, or the shared defaults for `None`.
    pub fn for_kind(kind: FractalKind) -> Self {
        kind.info().map_or(Self::DEFAULT, |s| s.default_params)
    }
}

impl Default for FractalParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Table entry describing one fractal kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindInfo {
    pub kind: FractalKind,
    pub default_center: (f64, f64),
    pub default_zoom: f64,
    pub default_params: FractalParams,
    pub palette: PaletteParams,
}

const fn palette(d: [f32; 4]) -> PaletteParams {
    PaletteParams {
        a: [0.5, 0.5, 0.5, 1.0],
        b: [0.5, 0.5, 0.5, 0.0],
        c: [1.0, 1.0, 1.0, 0.0],
        d,
    }
}

static KIND_TABLE: [KindInfo; KIND_COUNT] = [
    KindInfo {
        kind: FractalKind::Mandelbrot,
        default_center: (-0.75, 0.0),
        default_zoom: 1.0,
        default_params: FractalParams::DEFAULT,
        palette: palette([0.0, 0.10, 0.20, 0.0]),
    },
    KindInfo {
        kind: FractalKind::Julia,
        default_center: (0.0, 0.0),
        default_zoom: 0.7,
        default_params: FractalParams::DEFAULT,
        palette: palette([0.30, 0.20, 0.20, 0.0]),
    },
    KindInfo {
        kind: FractalKind::BurningShip,
        default_center: (-1.75, -0.04),
        default_zoom: 22.0,
        default_params: FractalParams::DEFAULT,
        palette: palette([0.80, 0.90, 0.30, 0.0]),
    },
    KindInfo {
        kind: FractalKind::Tricorn,
        default_center: (-0.3, 0.0),
        default_zoom: 0.8,
        default_params: FractalParams::DEFAULT,
        palette: palette([0.0, 0.33, 0.67, 0.0]),
    },
    KindInfo {
        kind: FractalKind::Phoenix,
        default_center: (0.0, 0.0),
        default_zoom: 0.75,
        default_params: FractalParams::DEFAULT,
        palette: palette([0.50, 0.20, 0.25, 0.0]),
    },
    KindInfo {
        kind: FractalKind::Lyapunov,
        default_center: (3.0, 3.0),
        default_zoom: 1.0,
        default_params: FractalParams::DEFAULT,
        palette: PaletteParams {
            a: [0.5, 0.5, 0.5, 1.0],
            b: [0.5, 0.5, 0.5, 0.0],
            c: [1.0, 0.7, 0.4, 0.0],
            d: [0.0, 0.15, 0.20, 0.0],
        },
    },
    KindInfo {
        kind: FractalKind::Newton,
        default_center: (0.0, 0.0),
        default_zoom: 0.8,
        default_params: FractalParams::DEFAULT,
        palette: palette([0.80, 0.90, 0.30, 0.0]),
    },
    KindInfo {
        kind: FractalKind::Multibrot,
        default_center: (0.0, 0.0),
        default_zoom: 0.8,
        default_params: FractalParams {
            power: 3.0,
            ..FractalParams::DEFAULT
        },
        palette: palette([0.10, 0.20, 0.30, 0.0]),
    },
    KindInfo {
        kind: FractalKind::Nova,
        default_center: (-0.5, 0.0),
        default_zoom: 1.0,
        default_params: FractalParams {
            power: 3.0,
            relaxation: 1.0,
            ..FractalParams::DEFAULT
        },
        palette: palette([0.0, 0.25, 0.25, 0.0]),
    },
    KindInfo {
        kind: FractalKind::Spider,
        default_center: (-0.5, 0.0),
        default_zoom: 1.0,
        default_params: FractalParams::DEFAULT,
        palette: palette([0.60, 0.10, 0.0, 0.0]),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_kind() {
        for kind in FractalKind::ALL {
            let info = kind.info().expect("every selectable kind has an entry");
            assert_eq!(info.kind, kind);
            assert!(info.default_zoom > 0.0);
        }
        assert!(FractalKind::None.info().is_none());
    }

    #[test]
    fn documented_defaults() {
        let m = FractalKind::Mandelbrot.info().unwrap();
        assert_eq!(m.default_center, (-0.75, 0.0));
        assert_eq!(m.default_zoom, 1.0);

        let bs = FractalKind::BurningShip.info().unwrap();
        assert_eq!(bs.default_center, (-1.75, -0.04));
        assert_eq!(bs.default_zoom, 22.0);
    }

    #[test]
    fn keys_are_unique_and_parse_back() {
        for kind in FractalKind::ALL {
            assert_eq!(FractalKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(FractalKind::from_key("none"), Some(FractalKind::None));
        assert_eq!(FractalKind::from_key(" burning_ship "), Some(FractalKind::BurningShip));
        assert_eq!(FractalKind::from_key("mandelbulb"), None);
    }

    #[test]
    fn only_lyapunov_uses_parameter_plane() {
        let planar: Vec<_> = FractalKind::ALL
            .into_iter()
            .filter(|k| k.uses_parameter_plane())
            .collect();
        assert_eq!(planar, vec![FractalKind::Lyapunov]);
    }

    #[test]
    fn kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&FractalKind::BurningShip).unwrap();
        assert_eq!(json, "\"burning_ship\"");
    }
}
