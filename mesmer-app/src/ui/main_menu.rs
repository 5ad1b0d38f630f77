use super::{Screen, UiAction, CYAN};

const MENU_WIDTH: f32 = 280.0;
const BUTTON_HEIGHT: f32 = 36.0;

impl Screen {
    pub(crate) fn draw_main_menu(&mut self, ctx: &egui::Context) -> Option<UiAction> {
        let mut action = None;

        egui::Window::new("main_menu")
            .title_bar(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .fixed_size([MENU_WIDTH, 0.0])
            .frame(
                egui::Frame::window(&ctx.style())
                    .fill(egui::Color32::from_rgba_unmultiplied(10, 10, 14, 200)),
            )
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(8.0);
                    ui.label(egui::RichText::new("Mesmer").size(32.0).color(CYAN));
                    ui.label(
                        egui::RichText::new("A fractal generator and explorer")
                            .color(egui::Color32::from_gray(150)),
                    );
                    ui.add_space(16.0);

                    let button = |text: &str| {
                        egui::Button::new(egui::RichText::new(text).size(16.0))
                            .min_size(egui::vec2(MENU_WIDTH - 40.0, BUTTON_HEIGHT))
                    };
                    if ui.add(button("Explore fractals")).clicked() {
                        action = Some(UiAction::OpenSelection);
                    }
                    ui.add_space(6.0);
                    if ui.add(button("Quit")).clicked() {
                        action = Some(UiAction::Quit);
                    }

                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.label("Background density");
                        ui.add(egui::Slider::new(
                            &mut self.explorer.background_density,
                            0.25..=4.0,
                        ));
                    });
                    ui.add_space(4.0);
                });
            });

        action
    }
}
