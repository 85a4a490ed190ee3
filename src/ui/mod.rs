pub mod canvas;
pub mod options;
pub mod ui_types;
pub mod utils;

use ui_types::*;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use egui::{Key, RichText};
use egui_extras::{Column, TableBuilder};
use ndarray::Array3;

use crate::annotation::AnnotationSession;
use crate::storage::FileImageSource;
use crate::vision::{compose_view, predict, Overlay, Segmenter};

/// Key, action. The first `INSTRUCTION_ROWS * 2` entries also make up the
/// instruction grid above the image.
pub const KEY_HELP: &[(&str, &str)] = &[
    ("left click", "add point"),
    ("right click / Enter", "close object"),
    ("Up / Down", "change label"),
    ("Left / Right / scroll", "change image"),
    ("Backspace", "undo"),
    ("Escape", "save and quit"),
    ("f", "cycle fill"),
    ("i", "help"),
    ("j", "jet colormap"),
    ("g", "gray colormap"),
    ("l", "label overlay"),
    ("m", "prediction overlay"),
    ("s", "saturate"),
    ("c", "copy previous annotations"),
    ("w", "write labels now"),
];

const INSTRUCTION_ROWS: usize = 4;

/// Rows of 2 key/action pairs for the top panel
pub fn instruction_rows() -> impl Iterator<Item = &'static [(&'static str, &'static str)]> {
    KEY_HELP.chunks(2).take(INSTRUCTION_ROWS)
}

/// New
impl App {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        session: AnnotationSession,
        source: FileImageSource,
        first_image: Array3<u8>,
        segmenter: Option<Box<dyn Segmenter>>,
    ) -> Self {
        let display: DisplayOptions = if let Some(storage) = cc.storage {
            eframe::get_value(storage, eframe::APP_KEY).unwrap_or_default()
        } else {
            Default::default()
        };

        Self {
            session,
            source,
            display,
            segmenter,
            current_image: first_image,
            texture: None,
            texture_dirty: true,
            show_help: false,
            finished: false,
            errors: vec![],
        }
    }
}

/// Session actions
impl App {
    pub fn change_image(&mut self, step: isize) {
        match self.session.change_image(step, &self.source) {
            Ok(im) => {
                self.current_image = im;
                self.texture_dirty = true;
                debug!(
                    "image {}/{}: {}",
                    self.session.current_index() + 1,
                    self.session.len(),
                    self.session.current_filename().display()
                );
            }
            Err(e) => {
                error!("Failed to change image: {:#}", e);
                self.errors.push(format!("{:#}", e));
            }
        }
    }

    pub fn write_labels(&mut self) {
        self.session.commit();
        match self
            .source
            .save_label_images(self.session.filenames(), self.session.polygons())
        {
            Ok(n) => info!("Wrote {} label images", n),
            Err(e) => {
                error!("Failed to write labels: {:#}", e);
                self.errors.push(format!("Failed to write labels: {:#}", e));
            }
        }
        self.texture_dirty = true;
    }

    /// Commit, write labels if configured. Runs once.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        self.session.close();
        if self.source.settings.save_on_close {
            self.write_labels();
        }
    }

    /// Current image with colormap and overlays applied
    fn render_image(&self) -> Result<egui::ColorImage> {
        let path = self.session.current_filename().to_path_buf();

        let labels = if self.display.draw_label {
            self.source.read_labeled(&path)?
        } else {
            None
        };

        let prediction = match (&self.segmenter, self.display.draw_prediction) {
            (Some(seg), true) => Some(predict(seg.as_ref(), &self.current_image)?),
            _ => None,
        };

        let overlay = match (&prediction, &labels) {
            (Some(pred), _) => Overlay::Prediction(pred),
            (None, Some(labels)) => Overlay::Labels(labels),
            (None, None) => Overlay::None,
        };

        let rgb = compose_view(
            &self.current_image,
            self.display.cmap,
            self.display.saturate,
            overlay,
        );
        let (h, w, _) = rgb.dim();
        let data: Vec<u8> = rgb.iter().copied().collect();

        Ok(egui::ColorImage::from_rgb([w, h], &data))
    }

    fn update_texture(&mut self, ctx: &egui::Context) {
        if !self.texture_dirty && self.texture.is_some() {
            return;
        }
        self.texture_dirty = false;

        let image = match self.render_image() {
            Ok(image) => image,
            Err(e) => {
                error!("Failed to render image: {:#}", e);
                self.errors.push(format!("{:#}", e));
                return;
            }
        };

        match self.texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::NEAREST),
            None => {
                self.texture =
                    Some(ctx.load_texture("annotation_image", image, egui::TextureOptions::NEAREST));
            }
        }
    }
}

/// Keys
impl App {
    fn handle_keys(&mut self, ctx: &egui::Context) {
        let pressed = |k: Key| ctx.input(|i| i.key_pressed(k));

        if pressed(Key::ArrowRight) {
            self.change_image(1);
        }
        if pressed(Key::ArrowLeft) {
            self.change_image(-1);
        }
        if pressed(Key::ArrowUp) {
            self.session.label_up();
        }
        if pressed(Key::ArrowDown) {
            self.session.label_down();
        }
        if pressed(Key::Enter) {
            self.session.submit_polygon();
        }
        if pressed(Key::Backspace) {
            self.session.undo();
        }
        if pressed(Key::C) {
            self.session.copy_previous();
        }

        if pressed(Key::F) {
            self.display.cycle_fill();
        }
        if pressed(Key::J) {
            self.display.cmap = crate::vision::ColorMap::Jet;
            self.texture_dirty = true;
        }
        if pressed(Key::G) {
            self.display.cmap = crate::vision::ColorMap::Gray;
            self.texture_dirty = true;
        }
        if pressed(Key::L) {
            self.display.draw_label = !self.display.draw_label;
            self.texture_dirty = true;
        }
        if pressed(Key::M) {
            if self.segmenter.is_some() {
                self.display.draw_prediction = !self.display.draw_prediction;
                self.texture_dirty = true;
            } else {
                warn!("No segmenter configured, set prediction_threshold");
            }
        }
        if pressed(Key::S) {
            self.display.saturate = !self.display.saturate;
            self.texture_dirty = true;
        }

        if pressed(Key::I) {
            self.show_help = !self.show_help;
        }
        if pressed(Key::W) {
            self.write_labels();
        }

        if pressed(Key::Escape) {
            self.finish();
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }
}

/// Panels
impl App {
    fn instructions(&self, ui: &mut egui::Ui) {
        egui::Grid::new("instructions")
            .num_columns(4)
            .spacing([20., 2.])
            .show(ui, |ui| {
                for row in instruction_rows() {
                    for (key, action) in row {
                        ui.label(RichText::new(*key).strong());
                        ui.label(*action);
                    }
                    ui.end_row();
                }
            });
    }

    fn status(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let name = self.session.current_filename().to_string_lossy();
            ui.label(utils::truncate_front(&name, 20));
            ui.separator();

            let label = self.session.label_index();
            let [r, g, b] = crate::vision::color::label_color(label);
            ui.label(
                RichText::new(format!("Label {}", label)).color(egui::Color32::from_rgb(r, g, b)),
            );
            ui.separator();

            ui.label(format!(
                "{}/{}",
                self.session.current_index() + 1,
                self.session.len()
            ));
        });

        if !self.errors.is_empty() {
            ui.horizontal(|ui| {
                if ui.button("Clear").clicked() {
                    self.errors.clear();
                }
                if let Some(e) = self.errors.last() {
                    ui.label(RichText::new(e).color(egui::Color32::from_rgb(255, 100, 100)));
                }
            });
        }
    }

    fn help_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_help;
        egui::Window::new("Help")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                TableBuilder::new(ui)
                    .id_salt("key help")
                    .column(Column::exact(160.))
                    .column(Column::remainder())
                    .striped(true)
                    .header(20., |mut row| {
                        row.col(|ui| {
                            ui.strong("Key");
                        });
                        row.col(|ui| {
                            ui.strong("Action");
                        });
                    })
                    .body(|mut body| {
                        for (key, action) in KEY_HELP {
                            body.row(18., |mut row| {
                                row.col(|ui| {
                                    ui.label(*key);
                                });
                                row.col(|ui| {
                                    ui.label(*action);
                                });
                            });
                        }
                    });
            });
        self.show_help = open;
    }
}

impl eframe::App for App {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, &self.display);
    }

    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            self.finish();
        }

        self.handle_keys(ctx);
        self.update_texture(ctx);

        egui::TopBottomPanel::top("instructions").show(ctx, |ui| {
            self.instructions(ui);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            self.status(ui);
        });

        egui::SidePanel::right("display")
            .resizable(false)
            .default_width(180.)
            .show(ctx, |ui| {
                self.display_options(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.canvas(ui);
        });

        if self.show_help {
            self.help_window(ctx);
        }
    }
}
