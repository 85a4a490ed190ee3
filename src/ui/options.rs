use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use crate::ui::ui_types::App;
use crate::vision::ColorMap;

impl App {
    pub fn display_options(&mut self, ui: &mut egui::Ui) {
        let prev = self.display.clone();

        ui.heading("Display");

        ui.horizontal(|ui| {
            ui.label("Colormap: ");
            ui.radio_value(&mut self.display.cmap, ColorMap::Gray, "gray");
            ui.radio_value(&mut self.display.cmap, ColorMap::Jet, "jet");
        });

        ui.horizontal(|ui| {
            ui.label("Fill: ");
            ui.add(
                egui::DragValue::new(&mut self.display.fill)
                    .range(0.0..=0.75)
                    .speed(0.05),
            );
        });

        ui.checkbox(&mut self.display.draw_label, "Label overlay");

        ui.add_enabled(
            self.segmenter.is_some(),
            egui::Checkbox::new(&mut self.display.draw_prediction, "Prediction overlay"),
        );

        ui.checkbox(&mut self.display.saturate, "Saturate");

        ui.separator();

        egui::widgets::global_theme_preference_buttons(ui);

        /// fill only changes the polygon painter, not the texture
        if prev.cmap != self.display.cmap
            || prev.draw_label != self.display.draw_label
            || prev.draw_prediction != self.display.draw_prediction
            || prev.saturate != self.display.saturate
        {
            debug!("Display options changed: {:?}", self.display);
            self.texture_dirty = true;
        }
    }
}
