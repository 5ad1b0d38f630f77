use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::fractal::{FractalKind, KIND_COUNT};

/// Coefficients of the cosine palette `a + b * cos(2π(c·t + d))`.
///
/// Each vector is RGBA; the shaders use the RGB lanes, alpha is carried
/// along so the settings format stays four components wide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaletteParams {
    pub a: [f32; 4],
    pub b: [f32; 4],
    pub c: [f32; 4],
    pub d: [f32; 4],
}

/// Names of the four palette vectors, in settings order.
pub const PALETTE_COMPONENTS: [&str; 4] = ["a", "b", "c", "d"];

impl PaletteParams {
    pub const CLASSIC: Self = Self {
        a: [0.5, 0.5, 0.5, 1.0],
        b: [0.5, 0.5, 0.5, 0.0],
        c: [1.0, 1.0, 1.0, 0.0],
        d: [0.0, 0.33, 0.67, 0.0],
    };

    /// Default palette for `kind`, falling back to [`PaletteParams::CLASSIC`].
    pub fn for_kind(kind: FractalKind) -> Self {
        kind.info().map_or(Self::CLASSIC, |s| s.palette)
    }

    /// The vector named `a`, `b`, `c` or `d`.
    pub fn component(&self, name: &str) -> Option<&[f32; 4]> {
        match name {
            "a" => Some(&self.a),
            "b" => Some(&self.b),
            "c" => Some(&self.c),
            "d" => Some(&self.d),
            _ => None,
        }
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut [f32; 4]> {
        match name {
            "a" => Some(&mut self.a),
            "b" => Some(&mut self.b),
            "c" => Some(&mut self.c),
            "d" => Some(&mut self.d),
            _ => None,
        }
    }

    /// Evaluate the palette at `t` on the CPU (used for UI swatches).
    pub fn sample(&self, t: f32) -> [f32; 3] {
        let mut rgb = [0.0; 3];
        for (i, out) in rgb.iter_mut().enumerate() {
            let phase = std::f32::consts::TAU * (self.c[i] * t + self.d[i]);
            *out = (self.a[i] + self.b[i] * phase.cos()).clamp(0.0, 1.0);
        }
        rgb
    }
}

impl Default for PaletteParams {
    fn default() -> Self {
        Self::CLASSIC
    }
}

/// Parse `"x, y, z, w"` into a vector. All four entries must be finite numbers.
pub fn parse_vec4(value: &str) -> crate::Result<[f32; 4]> {
    let malformed = || CoreError::MalformedVector {
        value: value.to_string(),
        expected: 4,
    };
    let mut out = [0.0f32; 4];
    let mut parts = value.split(',');
    for slot in out.iter_mut() {
        let part = parts.next().ok_or_else(malformed)?;
        let v: f32 = part.trim().parse().map_err(|_| malformed())?;
        if !v.is_finite() {
            return Err(malformed());
        }
        *slot = v;
    }
    if parts.next().is_some() {
        return Err(malformed());
    }
    Ok(out)
}

/// Inverse of [`parse_vec4`].
pub fn format_vec4(v: &[f32; 4]) -> String {
    format!("{},{},{},{}", v[0], v[1], v[2], v[3])
}

/// One palette per kind plus a shared palette that can override them all.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteSet {
    pub common: PaletteParams,
    pub apply_common: bool,
    per_kind: [PaletteParams; KIND_COUNT],
}

impl PaletteSet {
    /// The palette a shader should be bound with for `kind`.
    pub fn select(&self, kind: FractalKind) -> &PaletteParams {
        if self.apply_common {
            return &self.common;
        }
        match kind.index() {
            Some(i) => &self.per_kind[i],
            None => &self.common,
        }
    }

    pub fn per_kind(&self, kind: FractalKind) -> Option<&PaletteParams> {
        kind.index().map(|i| &self.per_kind[i])
    }

    pub fn per_kind_mut(&mut self, kind: FractalKind) -> Option<&mut PaletteParams> {
        kind.index().map(|i| &mut self.per_kind[i])
    }
}

impl Default for PaletteSet {
    fn default() -> Self {
        Self {
            common: PaletteParams::CLASSIC,
            apply_common: false,
            per_kind: FractalKind::ALL.map(PaletteParams::for_kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_spaces() {
        assert_eq!(
            parse_vec4(" 0.5, 0.25 ,1,  0 ").unwrap(),
            [0.5, 0.25, 1.0, 0.0]
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(parse_vec4("").is_err());
        assert!(parse_vec4("1,2,3").is_err());
        assert!(parse_vec4("1,2,3,4,5").is_err());
        assert!(parse_vec4("1,2,x,4").is_err());
        assert!(parse_vec4("1,2,inf,4").is_err());
    }

    #[test]
    fn format_parses_back() {
        let v = [0.1, 0.2, 0.30000001, 1.0];
        assert_eq!(parse_vec4(&format_vec4(&v)).unwrap(), v);
    }

    #[test]
    fn select_honours_common_flag() {
        let mut set = PaletteSet::default();
        set.common.d = [0.9, 0.9, 0.9, 0.0];
        assert_eq!(
            set.select(FractalKind::BurningShip),
            &PaletteParams::for_kind(FractalKind::BurningShip)
        );
        set.apply_common = true;
        assert_eq!(set.select(FractalKind::BurningShip), &set.common);
    }

    #[test]
    fn idle_kind_uses_common_palette() {
        let set = PaletteSet::default();
        assert_eq!(set.select(FractalKind::None), &set.common);
        assert!(set.per_kind(FractalKind::None).is_none());
    }

    #[test]
    fn sample_stays_in_unit_range() {
        let p = PaletteParams {
            a: [0.9, 0.9, 0.9, 1.0],
            b: [0.9, 0.9, 0.9, 0.0],
            ..PaletteParams::CLASSIC
        };
        for i in 0..=16 {
            let rgb = p.sample(i as f32 / 16.0);
            assert!(rgb.iter().all(|c| (0.0..=1.0).contains(c)));
        }
    }
}
