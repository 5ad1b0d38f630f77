//! Flat `key=value` settings file stored next to the executable.
//!
//! Unknown keys are preserved. Every typed reader falls back to the
//! compiled-in default when a value is absent or malformed, logging a
//! warning for the latter.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mesmer_core::palette::{format_vec4, parse_vec4, PALETTE_COMPONENTS};
use mesmer_core::{FractalKind, IterationPolicy, PaletteParams, PaletteSet};
use mesmer_render::PreRenderSettings;
use tracing::{debug, error, info, warn};

pub const SETTINGS_FILE: &str = "settings.cfg";

const HEADER: &str = "# Mesmer settings\n# One key=value per line. Palettes are four comma-separated floats.\n";

pub struct Settings {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    fresh: bool,
}

impl Settings {
    /// Read `path`. A missing or unreadable file yields empty settings.
    pub fn load(path: &Path) -> Self {
        let mut settings = Self {
            path: path.to_path_buf(),
            entries: BTreeMap::new(),
            fresh: false,
        };
        match fs::read_to_string(path) {
            Ok(text) => {
                settings.parse(&text);
                info!("Loaded {} settings from {}", settings.entries.len(), path.display());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No settings file at {}", path.display());
                settings.fresh = true;
            }
            Err(e) => error!("Failed to read settings file: {e}"),
        }
        settings
    }

    fn parse(&mut self, text: &str) {
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    self.entries
                        .insert(key.trim().to_string(), value.trim().to_string());
                }
                _ => warn!("Ignoring settings line {}: {line:?}", n + 1),
            }
        }
    }

    /// True when no file existed at load time.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = String::from(HEADER);
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        fs::write(&self.path, out)?;
        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    // -- Typed readers --------------------------------------------------------

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(key, value = raw, "Malformed setting, using default");
                default
            }),
        }
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        let v = self.parsed(key, default);
        if v.is_finite() {
            v
        } else {
            warn!(key, "Non-finite setting, using default");
            default
        }
    }

    pub fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.parsed(key, default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(str::to_ascii_lowercase).as_deref() {
            None => default,
            Some("true" | "1" | "yes" | "on") => true,
            Some("false" | "0" | "no" | "off") => false,
            Some(raw) => {
                warn!(key, value = raw, "Malformed setting, using default");
                default
            }
        }
    }

    /// Read `<prefix>.a` .. `<prefix>.d`; each malformed component keeps
    /// its default independently.
    pub fn get_palette(&self, prefix: &str, default: &PaletteParams) -> PaletteParams {
        let mut palette = *default;
        for name in PALETTE_COMPONENTS {
            let key = format!("{prefix}.{name}");
            let Some(raw) = self.get(&key) else {
                continue;
            };
            match parse_vec4(raw) {
                Ok(v) => {
                    if let Some(slot) = palette.component_mut(name) {
                        *slot = v;
                    }
                }
                Err(e) => warn!(key = %key, "{e}, using default"),
            }
        }
        palette
    }

    pub fn set_palette(&mut self, prefix: &str, palette: &PaletteParams) {
        for name in PALETTE_COMPONENTS {
            if let Some(v) = palette.component(name) {
                self.set(&format!("{prefix}.{name}"), format_vec4(v));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Typed view of the documented keys
// ---------------------------------------------------------------------------

pub const DEFAULT_WINDOW_WIDTH: u32 = 1280;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 720;
pub const DEFAULT_MAX_FPS: u32 = 60;

/// Everything the application reads from settings at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub vsync: bool,
    /// Frame cap used when vsync is off; 0 means uncapped.
    pub max_fps: u32,
    pub default_save_path: PathBuf,
    pub background_density: f32,
    pub iterations: IterationPolicy,
    pub palettes: PaletteSet,
    pub prerender: PreRenderSettings,
}

impl AppConfig {
    pub fn defaults(save_path: PathBuf) -> Self {
        Self {
            window_width: DEFAULT_WINDOW_WIDTH,
            window_height: DEFAULT_WINDOW_HEIGHT,
            vsync: true,
            max_fps: DEFAULT_MAX_FPS,
            default_save_path: save_path,
            background_density: mesmer_render::session::DEFAULT_BACKGROUND_DENSITY,
            iterations: IterationPolicy::default(),
            palettes: PaletteSet::default(),
            prerender: PreRenderSettings::default(),
        }
    }

    /// Overlay `settings` on [`AppConfig::defaults`].
    pub fn from_settings(settings: &Settings, save_path: PathBuf) -> Self {
        let d = Self::defaults(save_path);

        let mut palettes = PaletteSet {
            common: settings.get_palette("palette.common", &d.palettes.common),
            apply_common: settings.get_bool("palette.apply_common", d.palettes.apply_common),
            ..d.palettes.clone()
        };
        for kind in FractalKind::ALL {
            if let Some(slot) = palettes.per_kind_mut(kind) {
                *slot = settings.get_palette(&format!("palette.{}", kind.key()), slot);
            }
        }

        let density = settings.get_f64("background_density", f64::from(d.background_density));
        let resolution = settings.get_u32("prerender.resolution", d.prerender.resolution);
        let tile_size = settings.get_u32("prerender.tile_size", d.prerender.tile_size);

        Self {
            window_width: settings.get_u32("window_width", d.window_width).max(1),
            window_height: settings.get_u32("window_height", d.window_height).max(1),
            vsync: settings.get_bool("vsync", d.vsync),
            max_fps: settings.get_u32("max_fps", d.max_fps),
            default_save_path: settings
                .get("default_save_path")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .unwrap_or(d.default_save_path),
            background_density: density as f32,
            iterations: IterationPolicy {
                adaptive: settings.get_bool("iterations.adaptive", d.iterations.adaptive),
                base_iterations: settings.get_u32("iterations.base", d.iterations.base_iterations),
                manual_max: settings.get_u32("iterations.manual_max", d.iterations.manual_max),
            },
            palettes,
            prerender: PreRenderSettings {
                enabled: settings.get_bool("prerender.enabled", d.prerender.enabled),
                resolution: if resolution == 0 {
                    warn!("prerender.resolution must be positive, using default");
                    d.prerender.resolution
                } else {
                    resolution
                },
                tile_size: if tile_size == 0 {
                    warn!("prerender.tile_size must be positive, using default");
                    d.prerender.tile_size
                } else {
                    tile_size
                },
                use_overrides: settings
                    .get_bool("prerender.use_overrides", d.prerender.use_overrides),
                overrides: None,
            },
        }
    }

    /// Write every documented key into `settings`.
    pub fn store(&self, settings: &mut Settings) {
        settings.set("window_width", self.window_width);
        settings.set("window_height", self.window_height);
        settings.set("vsync", self.vsync);
        settings.set("max_fps", self.max_fps);
        settings.set("default_save_path", self.default_save_path.display());
        settings.set("background_density", self.background_density);
        settings.set("iterations.adaptive", self.iterations.adaptive);
        settings.set("iterations.base", self.iterations.base_iterations);
        settings.set("iterations.manual_max", self.iterations.manual_max);
        settings.set("palette.apply_common", self.palettes.apply_common);
        settings.set_palette("palette.common", &self.palettes.common);
        for kind in FractalKind::ALL {
            if let Some(palette) = self.palettes.per_kind(kind) {
                settings.set_palette(&format!("palette.{}", kind.key()), palette);
            }
        }
        settings.set("prerender.enabled", self.prerender.enabled);
        settings.set("prerender.resolution", self.prerender.resolution);
        settings.set("prerender.tile_size", self.prerender.tile_size);
        settings.set("prerender.use_overrides", self.prerender.use_overrides);
    }
}
