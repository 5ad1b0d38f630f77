use mesmer_core::FractalKind;

use super::{palette_swatch, Screen, UiAction, CYAN};

const RESOLUTIONS: [u32; 5] = [1024, 2048, 4096, 8192, 16384];
const TILE_SIZES: [u32; 4] = [64, 128, 256, 512];
const TILE_WIDTH: f32 = 150.0;
const COLUMNS: usize = 5;

impl Screen {
    pub(crate) fn draw_selection(&mut self, ctx: &egui::Context) -> Option<UiAction> {
        let mut action = None;

        egui::Window::new("Choose a fractal")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                egui::Grid::new("fractal_grid")
                    .spacing([10.0, 10.0])
                    .show(ui, |ui| {
                        for (i, kind) in FractalKind::ALL.into_iter().enumerate() {
                            ui.vertical(|ui| {
                                let button = egui::Button::new(
                                    egui::RichText::new(kind.label()).size(15.0).color(CYAN),
                                )
                                .min_size(egui::vec2(TILE_WIDTH, 32.0));
                                if ui.add(button).clicked() {
                                    action = Some(UiAction::Select(kind));
                                }
                                let palette = self.explorer.palettes.select(kind);
                                palette_swatch(ui, palette, egui::vec2(TILE_WIDTH, 8.0));
                            });
                            if (i + 1) % COLUMNS == 0 {
                                ui.end_row();
                            }
                        }
                    });

                ui.separator();
                self.prerender_options(ui);
                ui.separator();

                if ui.button("Back").clicked() {
                    action = Some(UiAction::Back);
                }
            });

        action
    }

    fn prerender_options(&mut self, ui: &mut egui::Ui) {
        let available = self.explorer.can_prerender();
        let settings = &mut self.explorer.prerender;

        ui.add_enabled_ui(available, |ui| {
            ui.checkbox(&mut settings.enabled, "Pre-render at high resolution");
            ui.horizontal(|ui| {
                ui.label("Resolution:");
                egui::ComboBox::from_id_salt("prerender_resolution")
                    .selected_text(format!("{0}×{0}", settings.resolution))
                    .show_ui(ui, |ui| {
                        for r in RESOLUTIONS {
                            ui.selectable_value(&mut settings.resolution, r, format!("{r}×{r}"));
                        }
                    });
                ui.label("Tile:");
                egui::ComboBox::from_id_salt("prerender_tile")
                    .selected_text(settings.tile_size.to_string())
                    .show_ui(ui, |ui| {
                        for t in TILE_SIZES {
                            ui.selectable_value(&mut settings.tile_size, t, t.to_string());
                        }
                    });
            });
            let has_overrides = settings.overrides.is_some();
            ui.add_enabled(
                has_overrides,
                egui::Checkbox::new(&mut settings.use_overrides, "Use last captured view"),
            );
        });
        if !available {
            ui.colored_label(
                egui::Color32::from_rgb(255, 180, 50),
                "Pre-rendering is unavailable: no shared GL context.",
            );
        }
    }
}
