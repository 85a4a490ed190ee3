pub mod h5;
pub mod image_io;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use ndarray::{Array2, Array3};

use crate::annotation::{gen_index_image, has_rasterizable, ImageSource, PolygonRecord};
use crate::appconfig::AppSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// single image per file, labels go to a sibling file
    Flat,
    /// HDF5, labels go to a dataset inside the same file
    Container,
}

impl DatasetKind {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let name = path.as_ref().to_string_lossy().to_lowercase();
        if name.ends_with(".h5") || name.ends_with(".hdf5") {
            Some(DatasetKind::Container)
        } else if [".jpg", ".jpeg", ".tif", ".tiff", ".png"]
            .iter()
            .any(|ext| name.ends_with(ext))
        {
            Some(DatasetKind::Flat)
        } else {
            None
        }
    }
}

/// Reads images from disk according to [`AppSettings`]
#[derive(Debug, Clone)]
pub struct FileImageSource {
    pub settings: AppSettings,
}

impl FileImageSource {
    pub fn new(settings: AppSettings) -> Self {
        Self { settings }
    }

    pub fn try_read_image(&self, path: &Path) -> Result<Option<Array3<u8>>> {
        match DatasetKind::from_path(path) {
            Some(DatasetKind::Flat) => Ok(Some(image_io::read_flat_image(path)?)),
            Some(DatasetKind::Container) => h5::read_h5_image(path, &self.settings.image_dataset),
            None => {
                warn!("Unsupported file type: {}", path.display());
                Ok(None)
            }
        }
    }

    /// Stored label image for `path`, if one was saved before
    pub fn read_labeled(&self, path: &Path) -> Result<Option<Array2<u8>>> {
        match DatasetKind::from_path(path) {
            Some(DatasetKind::Flat) => {
                let label_path = image_io::label_path(
                    path,
                    &self.settings.input_suffix,
                    &self.settings.label_suffix,
                )?;
                if !label_path.exists() {
                    return Ok(None);
                }
                Ok(Some(image_io::read_flat_label(label_path)?))
            }
            Some(DatasetKind::Container) => {
                h5::read_h5_labels(path, &self.settings.labels_dataset)
            }
            None => Ok(None),
        }
    }

    pub fn save_labeled(&self, path: &Path, labels: &Array2<u8>) -> Result<()> {
        match DatasetKind::from_path(path) {
            Some(DatasetKind::Flat) => {
                let out = image_io::label_path(
                    path,
                    &self.settings.input_suffix,
                    &self.settings.label_suffix,
                )?;
                image_io::save_flat_label(&out, labels)?;
                info!("Saved labels to {}", out.display());
            }
            Some(DatasetKind::Container) => {
                h5::add_dataset(path, labels, &self.settings.labels_dataset)?;
                info!(
                    "Saved labels to {}:{}",
                    path.display(),
                    self.settings.labels_dataset
                );
            }
            None => bail!("Unsupported file type: {}", path.display()),
        }
        Ok(())
    }

    pub fn is_labeled(&self, path: &Path) -> Result<bool> {
        match DatasetKind::from_path(path) {
            Some(DatasetKind::Flat) => {
                if !self.has_label_slot(path) {
                    return Ok(false);
                }
                Ok(image_io::label_path(
                    path,
                    &self.settings.input_suffix,
                    &self.settings.label_suffix,
                )?
                .exists())
            }
            Some(DatasetKind::Container) => h5::has_dataset(path, &self.settings.labels_dataset),
            None => Ok(false),
        }
    }

    /// Whether labels for `path` have somewhere to go. Flat files need the
    /// input marker in their name, containers always qualify.
    pub fn has_label_slot(&self, path: &Path) -> bool {
        match DatasetKind::from_path(path) {
            Some(DatasetKind::Flat) => path
                .file_name()
                .map_or(false, |n| n.to_string_lossy().contains(self.settings.input_suffix.as_str())),
            Some(DatasetKind::Container) => true,
            None => false,
        }
    }

    /// Expand directories into their supported image files, sorted.
    ///
    /// Label images written next to inputs are skipped.
    pub fn collect_images(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut out = vec![];
        for input in inputs {
            if !input.is_dir() {
                out.push(input.clone());
                continue;
            }

            let mut files = vec![];
            for entry in std::fs::read_dir(input)
                .with_context(|| format!("Failed to list {}", input.display()))?
            {
                let path = entry?.path();
                if path.is_file() && DatasetKind::from_path(&path).is_some() && !self.is_label_file(&path)
                {
                    files.push(path);
                }
            }
            files.sort();
            debug!("{}: {} images", input.display(), files.len());
            out.extend(files);
        }
        Ok(out)
    }

    fn is_label_file(&self, path: &Path) -> bool {
        let suffix = &self.settings.label_suffix;
        !suffix.is_empty()
            && path
                .file_name()
                .map_or(false, |n| n.to_string_lossy().contains(suffix.as_str()))
    }

    /// Drop files that already have labels or can't hold any
    pub fn filter_unlabeled(&self, filenames: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
        let mut out = Vec::with_capacity(filenames.len());
        for f in filenames {
            if !self.has_label_slot(&f) {
                warn!(
                    "{}: no '{}' marker, can't hold labels, skipping",
                    f.display(),
                    self.settings.input_suffix
                );
                continue;
            }
            if self.is_labeled(&f)? {
                trace!("already labeled: {}", f.display());
                continue;
            }
            out.push(f);
        }
        debug!("{} unlabeled files", out.len());
        Ok(out)
    }

    /// Rasterize and persist labels for every image with at least one record.
    ///
    /// A placeholder-only list writes an all-zero label image, which marks the
    /// image as background. A failing image doesn't stop the others, the
    /// failures are reported together after the loop.
    ///
    /// Returns the number of label images written.
    pub fn save_label_images(
        &self,
        filenames: &[PathBuf],
        polygons: &[Vec<PolygonRecord>],
    ) -> Result<usize> {
        let mut n = 0;
        let mut failed: Vec<String> = vec![];

        for (path, poly) in filenames.iter().zip(polygons) {
            if poly.is_empty() {
                continue;
            }

            if has_rasterizable(poly) {
                info!("saving labels for {} objects: {}", poly.len(), path.display());
            } else {
                info!("marking {} as background", path.display());
            }

            if let Err(e) = self.save_one(path, poly) {
                error!("{}: {:#}", path.display(), e);
                failed.push(format!("{}: {:#}", path.display(), e));
                continue;
            }
            n += 1;
        }

        if !failed.is_empty() {
            bail!(
                "wrote {} label images, {} failed: {}",
                n,
                failed.len(),
                failed.join("; ")
            );
        }
        Ok(n)
    }

    fn save_one(&self, path: &Path, poly: &[PolygonRecord]) -> Result<()> {
        let Some(im) = self.try_read_image(path)? else {
            bail!("can't read image anymore, labels not saved");
        };
        let (h, w, _) = im.dim();

        let labeled = gen_index_image((h, w), poly, self.settings.marker_radius);
        self.save_labeled(path, &labeled)
    }
}

impl ImageSource for FileImageSource {
    fn read_image(&self, path: &Path) -> Option<Array3<u8>> {
        match self.try_read_image(path) {
            Ok(im) => im,
            Err(e) => {
                debug!("{:#}", e);
                None
            }
        }
    }
}
