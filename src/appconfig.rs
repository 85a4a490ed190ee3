use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// marker in flat image filenames, swapped for `label_suffix` on save
    pub input_suffix: String,
    pub label_suffix: String,

    /// HDF5 dataset holding the image
    pub image_dataset: String,
    /// HDF5 dataset the label image is written to
    pub labels_dataset: String,

    pub marker_radius: i64,
    pub save_on_close: bool,
    pub exclude_labeled: bool,

    /// intensity above which the built in segmenter marks a pixel
    pub prediction_threshold: Option<f32>,

    pub frame_start: usize,
    pub frame_end: usize,
    pub frame_stride: usize,
    pub out_dir: PathBuf,

    pub window_size: (f32, f32),
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            input_suffix: "_input".to_string(),
            label_suffix: "_label".to_string(),
            image_dataset: "mask_data".to_string(),
            labels_dataset: "labels".to_string(),
            marker_radius: crate::annotation::MARKER_RADIUS,
            save_on_close: true,
            exclude_labeled: true,
            prediction_threshold: None,
            frame_start: 5000,
            frame_end: 50000,
            frame_stride: 1000,
            out_dir: PathBuf::from("./training"),
            window_size: (1300., 1100.),
        }
    }
}

impl AppSettings {
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = toml::to_string_pretty(self).context("Failed to serialize AppSettings to TOML")?;
        std::fs::write(path, s)?;
        Ok(())
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        let settings: AppSettings = toml::from_str(&s)?;
        Ok(settings)
    }

    /// Missing or broken config falls back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::read_from_file(&path) {
            Ok(settings) => {
                debug!("Loaded settings from {}", path.as_ref().display());
                settings
            }
            Err(e) => {
                info!("Using default settings: {:#}", e);
                Self::default()
            }
        }
    }
}
