use mesmer_core::palette::PALETTE_COMPONENTS;
use mesmer_core::{FractalKind, PaletteParams};

use super::{palette_swatch, Screen, UiAction, CYAN};

const PANEL_WIDTH: f32 = 300.0;

impl Screen {
    /// Side panel shown while a fractal renders live.
    pub(crate) fn draw_controls(&mut self, ctx: &egui::Context, kind: FractalKind) -> Option<UiAction> {
        let mut action = None;

        egui::SidePanel::right("controls")
            .resizable(false)
            .exact_width(PANEL_WIDTH)
            .frame(
                egui::Frame::side_top_panel(&ctx.style())
                    .fill(egui::Color32::from_rgba_unmultiplied(10, 10, 14, 215)),
            )
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.label(egui::RichText::new(kind.label()).size(20.0).color(CYAN));
                    self.view_section(ui, kind);
                    ui.separator();
                    self.iteration_section(ui);
                    ui.separator();
                    parameter_section(ui, kind, &mut self.explorer.viewport.params);
                    ui.separator();
                    self.palette_section(ui, kind);
                    ui.separator();

                    let can_prerender = self.explorer.can_prerender();
                    if ui
                        .add_enabled(can_prerender, egui::Button::new("Pre-render this view"))
                        .clicked()
                    {
                        action = Some(UiAction::PreRenderView);
                    }
                    ui.horizontal(|ui| {
                        if ui.button("Reset view (Space)").clicked() {
                            action = Some(UiAction::ResetView);
                        }
                        if ui.button("Back (Esc)").clicked() {
                            action = Some(UiAction::Back);
                        }
                    });
                });
            });

        action
    }

    fn view_section(&mut self, ui: &mut egui::Ui, kind: FractalKind) {
        let view = &self.explorer.viewport;
        let axis = if kind.uses_parameter_plane() {
            "(a, b)"
        } else {
            "Center"
        };
        ui.label(format!("{axis}: {:.12} {:+.12}", view.center.0, view.center.1));
        ui.label(format!("Zoom: {:.4e}", view.zoom()));
        ui.label(format!(
            "Iterations: {}",
            self.explorer.iterations.effective_iterations(view.zoom())
        ));
    }

    fn iteration_section(&mut self, ui: &mut egui::Ui) {
        let policy = &mut self.explorer.iterations;
        ui.heading("Iterations");
        ui.checkbox(&mut policy.adaptive, "Adaptive (grows with zoom)");
        if policy.adaptive {
            ui.horizontal(|ui| {
                ui.label("Base:");
                ui.add(egui::Slider::new(&mut policy.base_iterations, 16..=5000).logarithmic(true));
            });
        } else {
            ui.horizontal(|ui| {
                ui.label("Max:");
                ui.add(egui::Slider::new(&mut policy.manual_max, 16..=20000).logarithmic(true));
            });
        }
    }

    fn palette_section(&mut self, ui: &mut egui::Ui, kind: FractalKind) {
        let palettes = &mut self.explorer.palettes;
        ui.heading("Palette");
        ui.checkbox(&mut palettes.apply_common, "Use common palette");

        let target = if palettes.apply_common {
            Some(&mut palettes.common)
        } else {
            palettes.per_kind_mut(kind)
        };
        if let Some(palette) = target {
            palette_editor(ui, palette);
            if ui.small_button("Restore default").clicked() {
                *palette = PaletteParams::for_kind(kind);
            }
        }
    }
}

fn palette_editor(ui: &mut egui::Ui, palette: &mut PaletteParams) {
    let width = ui.available_width();
    palette_swatch(ui, palette, egui::vec2(width, 14.0));
    egui::Grid::new("palette_grid").num_columns(5).show(ui, |ui| {
        for name in PALETTE_COMPONENTS {
            ui.label(name);
            if let Some(v) = palette.component_mut(name) {
                for c in v.iter_mut() {
                    ui.add(egui::DragValue::new(c).speed(0.005).max_decimals(3));
                }
            }
            ui.end_row();
        }
    });
}

fn parameter_section(ui: &mut egui::Ui, kind: FractalKind, params: &mut mesmer_core::FractalParams) {
    let complex = |ui: &mut egui::Ui, label: &str, value: &mut (f64, f64)| {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(&mut value.0).speed(0.001).max_decimals(6));
            ui.add(egui::DragValue::new(&mut value.1).speed(0.001).max_decimals(6));
        });
    };
    let real = |ui: &mut egui::Ui, label: &str, value: &mut f64| {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).speed(0.01).max_decimals(4));
        });
    };

    ui.heading("Parameters");
    match kind {
        FractalKind::Julia => complex(ui, "c:", &mut params.julia_c),
        FractalKind::Phoenix => {
            complex(ui, "c:", &mut params.phoenix_c);
            real(ui, "Exponent:", &mut params.phoenix_exponent);
        }
        FractalKind::Multibrot => real(ui, "Power:", &mut params.power),
        FractalKind::Nova => {
            real(ui, "Power:", &mut params.power);
            real(ui, "Relaxation:", &mut params.relaxation);
        }
        _ => {
            ui.label("None for this fractal.");
        }
    }
    if ui.small_button("Restore defaults").clicked() {
        *params = mesmer_core::FractalParams::for_kind(kind);
    }
}
