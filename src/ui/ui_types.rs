use ndarray::Array3;

use crate::annotation::AnnotationSession;
use crate::storage::FileImageSource;
use crate::vision::{ColorMap, Segmenter};

pub struct App {
    pub session: AnnotationSession,

    pub source: FileImageSource,

    /// persisted between runs
    pub display: DisplayOptions,

    pub segmenter: Option<Box<dyn Segmenter>>,

    pub current_image: Array3<u8>,

    pub texture: Option<egui::TextureHandle>,

    /// rebuild the texture on the next frame
    pub texture_dirty: bool,

    pub show_help: bool,

    /// polygons committed and labels written, don't do it twice
    pub finished: bool,

    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    pub cmap: ColorMap,
    /// polygon fill alpha
    pub fill: f32,
    pub draw_label: bool,
    pub draw_prediction: bool,
    pub saturate: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        DisplayOptions {
            cmap: ColorMap::Gray,
            fill: 0.25,
            draw_label: false,
            draw_prediction: false,
            saturate: false,
        }
    }
}

impl DisplayOptions {
    pub fn cycle_fill(&mut self) {
        self.fill = (self.fill + 0.25) % 1.;
    }
}
