use mesmer_core::FractalKind;

use super::{Screen, UiAction, CYAN, HUD_CORNER_RADIUS, HUD_MARGIN, STATUS_LIFETIME};

fn hud_frame() -> egui::Frame {
    egui::Frame::NONE
        .fill(egui::Color32::from_black_alpha(170))
        .inner_margin(egui::Margin::same(8))
        .corner_radius(HUD_CORNER_RADIUS)
}

impl Screen {
    pub(crate) fn draw_loading(&mut self, ctx: &egui::Context, kind: FractalKind) -> Option<UiAction> {
        let mut action = None;
        let (done, total) = self.explorer.prerender_tiles();
        let fraction = if total == 0 {
            0.0
        } else {
            done as f32 / total as f32
        };

        egui::Area::new(egui::Id::new("prerender_loading"))
            .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -48.0])
            .show(ctx, |ui| {
                hud_frame().show(ui, |ui| {
                    ui.set_width(320.0);
                    ui.label(egui::RichText::new(format!("Pre-rendering {kind}")).color(CYAN));
                    ui.add(
                        egui::ProgressBar::new(fraction)
                            .text(format!("{done} / {total} tiles"))
                            .animate(done < total || total == 0),
                    );
                    if ui.button("Cancel").clicked() {
                        action = Some(UiAction::Back);
                    }
                });
            });

        action
    }

    pub(crate) fn draw_viewer_hud(&mut self, ctx: &egui::Context, kind: FractalKind) -> Option<UiAction> {
        let mut action = None;

        egui::Area::new(egui::Id::new("viewer_hud"))
            .anchor(egui::Align2::LEFT_TOP, [HUD_MARGIN, HUD_MARGIN])
            .show(ctx, |ui| {
                hud_frame().show(ui, |ui| {
                    ui.style_mut().visuals.override_text_color =
                        Some(egui::Color32::from_rgb(220, 220, 220));
                    ui.label(egui::RichText::new(kind.label()).color(CYAN));
                    if let Some(viewer) = self.explorer.viewer() {
                        let baked = viewer.texture();
                        let inputs = baked.inputs();
                        ui.label(format!("{0}×{0} pre-render", baked.resolution()));
                        ui.label(format!(
                            "Center: {:.10} {:+.10}  Zoom: {:.3e}",
                            inputs.center.0, inputs.center.1, inputs.zoom
                        ));
                        ui.label(format!("Iterations: {}", inputs.max_iterations));
                        ui.label(format!("View zoom: {:.2}×", viewer.view.zoom()));
                    }
                    ui.horizontal(|ui| {
                        if ui.button("Export PNG (S)").clicked() {
                            action = Some(UiAction::Export);
                        }
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

    /// Last status message, bottom left, until it expires.
    pub(crate) fn draw_status(&mut self, ctx: &egui::Context) {
        if self
            .status
            .as_ref()
            .is_some_and(|s| s.shown_at.elapsed() > STATUS_LIFETIME)
        {
            self.status = None;
        }
        let Some(status) = self.status.as_ref() else {
            return;
        };

        let color = if status.is_error {
            egui::Color32::from_rgb(255, 120, 100)
        } else {
            egui::Color32::from_rgb(140, 230, 140)
        };
        egui::Area::new(egui::Id::new("status_line"))
            .anchor(egui::Align2::LEFT_BOTTOM, [HUD_MARGIN, -HUD_MARGIN])
            .show(ctx, |ui| {
                hud_frame().show(ui, |ui| {
                    ui.colored_label(color, &status.text);
                });
            });
        ctx.request_repaint_after(STATUS_LIFETIME);
    }
}
