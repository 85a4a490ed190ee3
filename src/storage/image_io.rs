use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use image::{DynamicImage, GrayImage};
use ndarray::{Array2, Array3};

pub fn read_flat_image<P: AsRef<Path>>(path: P) -> Result<Array3<u8>> {
    let path = path.as_ref();
    let img = image::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
    dynamic_to_array(img)
}

/// Grayscale stays single channel, everything else becomes RGB
pub fn dynamic_to_array(img: DynamicImage) -> Result<Array3<u8>> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let (channels, raw) = match img {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLumaA16(_) => (1, img.into_luma8().into_raw()),
        img => (3, img.into_rgb8().into_raw()),
    };
    Ok(Array3::from_shape_vec((h, w, channels), raw)?)
}

/// Swap the input marker in the file name for the label marker
pub fn label_path<P: AsRef<Path>>(path: P, input_suffix: &str, label_suffix: &str) -> Result<PathBuf> {
    let path = path.as_ref();
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        bail!("bad filename: {}", path.display());
    };
    ensure!(
        name.contains(input_suffix),
        "{} has no '{}' marker, refusing to overwrite it with labels",
        path.display(),
        input_suffix
    );
    Ok(path.with_file_name(name.replace(input_suffix, label_suffix)))
}

pub fn save_flat_label<P: AsRef<Path>>(path: P, labels: &Array2<u8>) -> Result<()> {
    let path = path.as_ref();
    let (h, w) = labels.dim();
    let raw = labels.iter().copied().collect::<Vec<u8>>();
    let Some(img) = GrayImage::from_raw(w as u32, h as u32, raw) else {
        bail!("label buffer doesn't match {}x{}", w, h);
    };
    img.save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_flat_label<P: AsRef<Path>>(path: P) -> Result<Array2<u8>> {
    let path = path.as_ref();
    let img = image::open(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .into_luma8();
    let (w, h) = (img.width() as usize, img.height() as usize);
    Ok(Array2::from_shape_vec((h, w), img.into_raw())?)
}

/// Nearest neighbour resample, keeps label values intact
pub fn resize_nearest(labels: &Array2<u8>, (h, w): (usize, usize)) -> Result<Array2<u8>> {
    let (h0, w0) = labels.dim();
    let raw = labels.iter().copied().collect::<Vec<u8>>();
    let Some(img) = GrayImage::from_raw(w0 as u32, h0 as u32, raw) else {
        bail!("label buffer doesn't match {}x{}", w0, h0);
    };
    let resized = image::imageops::resize(&img, w as u32, h as u32, image::imageops::FilterType::Nearest);
    Ok(Array2::from_shape_vec((h, w), resized.into_raw())?)
}
