//! egui overlays drawn on top of the explorer, one module per screen.

mod controls;
mod hud;
mod main_menu;
mod selection;

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use mesmer_core::{FractalKind, InputEvent, ScreenSize};
use mesmer_render::{Explorer, Mode, Response};
use tracing::{info, warn};

use crate::gl_backend::WorkerContext;

pub(crate) const HUD_MARGIN: f32 = 8.0;
pub(crate) const HUD_CORNER_RADIUS: f32 = 6.0;
pub(crate) const CYAN: egui::Color32 = egui::Color32::from_rgb(80, 200, 255);

/// How long a status line stays on screen.
const STATUS_LIFETIME: Duration = Duration::from_secs(6);

/// Something a widget asked for; applied after the frame's UI is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UiAction {
    OpenSelection,
    Select(FractalKind),
    PreRenderView,
    ResetView,
    Back,
    Export,
    Quit,
}

pub(crate) struct Status {
    text: String,
    is_error: bool,
    shown_at: Instant,
}

/// Explorer plus the UI state that goes with it.
pub(crate) struct Screen {
    pub(crate) explorer: Explorer<WorkerContext>,
    pub(crate) save_dir: PathBuf,
    pub(crate) size: ScreenSize,
    status: Option<Status>,
    quit: bool,
}

impl Screen {
    pub(crate) fn new(explorer: Explorer<WorkerContext>, save_dir: PathBuf, size: ScreenSize) -> Self {
        Self {
            explorer,
            save_dir,
            size,
            status: None,
            quit: false,
        }
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Build this frame's overlays and apply whatever they asked for.
    pub(crate) fn draw(&mut self, ctx: &egui::Context) {
        if let Some(e) = self.explorer.take_error() {
            self.set_error(e);
        }

        let action = match self.explorer.mode() {
            Mode::MainMenu => self.draw_main_menu(ctx),
            Mode::FractalSelection => self.draw_selection(ctx),
            Mode::FractalActive(kind) => self.draw_controls(ctx, kind),
            Mode::PreRenderLoading(kind) => self.draw_loading(ctx, kind),
            Mode::PreRenderView(kind) => self.draw_viewer_hud(ctx, kind),
        };
        self.draw_status(ctx);

        if let Some(action) = action {
            self.apply(action);
        }
    }

    /// Forward an input event the UI did not consume.
    pub(crate) fn handle_input(&mut self, event: InputEvent) {
        match self.explorer.handle_event(event, self.size) {
            Response::Continue => {}
            Response::Quit => self.quit = true,
            Response::Export => self.export(),
        }
    }

    fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::OpenSelection => self.explorer.open_selection(),
            UiAction::Select(kind) => {
                if let Err(e) = self.explorer.select_fractal(kind) {
                    self.set_error(format!("{kind}: {e}"));
                }
            }
            UiAction::PreRenderView => {
                if let Err(e) = self.explorer.prerender_current_view() {
                    self.set_error(format!("Pre-render: {e}"));
                }
            }
            UiAction::ResetView => self.explorer.reset_view(),
            UiAction::Back => self.explorer.back(),
            UiAction::Export => self.export(),
            UiAction::Quit => self.quit = true,
        }
    }

    fn export(&mut self) {
        let kind = self.explorer.kind();
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        if let Err(e) = fs::create_dir_all(&self.save_dir) {
            warn!("Failed to create {}: {e}", self.save_dir.display());
            self.set_error(format!("Cannot create {}: {e}", self.save_dir.display()));
            return;
        }
        let path = self.save_dir.join(format!("mesmer_{}_{stamp}.png", kind.key()));
        match self.explorer.export_prerender(&path) {
            Ok(()) => {
                info!("Saved {}", path.display());
                self.set_info(format!("Saved {}", path.display()));
            }
            Err(e) => {
                warn!("Export failed: {e}");
                self.set_error(format!("Export failed: {e}"));
            }
        }
    }

    fn set_info(&mut self, text: String) {
        self.status = Some(Status {
            text,
            is_error: false,
            shown_at: Instant::now(),
        });
    }

    fn set_error(&mut self, text: String) {
        self.status = Some(Status {
            text,
            is_error: true,
            shown_at: Instant::now(),
        });
    }
}

/// Horizontal strip showing a palette from t = 0 to 1.
pub(crate) fn palette_swatch(ui: &mut egui::Ui, palette: &mesmer_core::PaletteParams, size: egui::Vec2) {
    const STEPS: usize = 48;
    let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
    if !ui.is_rect_visible(rect) {
        return;
    }
    let painter = ui.painter();
    let step = rect.width() / STEPS as f32;
    for i in 0..STEPS {
        let [r, g, b] = palette.sample(i as f32 / (STEPS - 1) as f32);
        let x = rect.min.x + i as f32 * step;
        let slice = egui::Rect::from_min_max(
            egui::pos2(x, rect.min.y),
            egui::pos2(x + step + 0.5, rect.max.y),
        );
        painter.rect_filled(
            slice,
            0.0,
            egui::Color32::from_rgb((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8),
        );
    }
}
