use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use ndarray::{Array2, Array3, ArrayD, Axis, Ix2, Ix3};

/// Read a dataset as 8 bit.
///
/// Non `u8` data in 0..=1 is scaled to 0..=255, anything else is clamped.
/// Returns `None` when the dataset doesn't exist.
pub fn read_h5<P: AsRef<Path>>(path: P, dataset: &str) -> Result<Option<ArrayD<u8>>> {
    let path = path.as_ref();
    let file = hdf5::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    if !file.link_exists(dataset) {
        info!(
            "{}: no dataset '{}', members: {:?}",
            path.display(),
            dataset,
            file.member_names()?
        );
        return Ok(None);
    }

    let ds = file.dataset(dataset)?;

    if ds.dtype()?.is::<u8>() {
        return Ok(Some(ds.read_dyn::<u8>()?));
    }

    let data = ds.read_dyn::<f32>()?;
    let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let scale = if max <= 1. { 255. } else { 1. };

    Ok(Some(data.mapv(|v| (v * scale).clamp(0., 255.) as u8)))
}

/// Image as (height, width, channels)
pub fn read_h5_image<P: AsRef<Path>>(path: P, dataset: &str) -> Result<Option<Array3<u8>>> {
    let Some(data) = read_h5(&path, dataset)? else {
        return Ok(None);
    };

    let im = match data.ndim() {
        2 => data.into_dimensionality::<Ix2>()?.insert_axis(Axis(2)),
        3 => data.into_dimensionality::<Ix3>()?,
        n => bail!("{}: expected 2 or 3 dimensions, got {}", path.as_ref().display(), n),
    };

    Ok(Some(im))
}

pub fn read_h5_labels<P: AsRef<Path>>(path: P, dataset: &str) -> Result<Option<Array2<u8>>> {
    let Some(data) = read_h5(&path, dataset)? else {
        return Ok(None);
    };
    let labels = match data.ndim() {
        2 => data.into_dimensionality::<Ix2>()?,
        3 if data.shape()[2] == 1 => data.into_dimensionality::<Ix3>()?.index_axis_move(Axis(2), 0),
        _ => bail!(
            "{}: label dataset has shape {:?}",
            path.as_ref().display(),
            data.shape()
        ),
    };
    Ok(Some(labels))
}

/// Full precision (t, h, w) volume for frame extraction
pub fn read_volume<P: AsRef<Path>>(path: P, dataset: &str) -> Result<Array3<f32>> {
    let path = path.as_ref();
    let file = hdf5::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let ds = file.dataset(dataset).with_context(|| {
        format!(
            "{}: no dataset '{}', members: {:?}",
            path.display(),
            dataset,
            file.member_names().unwrap_or_default()
        )
    })?;

    let data = ds.read_dyn::<f32>()?;
    let volume = data
        .into_dimensionality::<Ix3>()
        .with_context(|| format!("{}: '{}' is not a (t, h, w) volume", path.display(), dataset))?;

    Ok(volume)
}

/// Write `data` as `dataset`, LZF compressed.
///
/// An existing dataset of the same name is unlinked first.
pub fn add_dataset<P: AsRef<Path>>(path: P, data: &Array2<u8>, dataset: &str) -> Result<()> {
    let path = path.as_ref();
    let file = hdf5::File::open_rw(path)
        .with_context(|| format!("Failed to open {} for writing", path.display()))?;

    if file.link_exists(dataset) {
        debug!("{}: replacing dataset '{}'", path.display(), dataset);
        file.unlink(dataset)?;
    }

    let (h, w) = data.dim();
    ensure!(h > 0 && w > 0, "refusing to write empty dataset '{}'", dataset);
    let chunk = (h.min(256), w.min(256));

    file.new_dataset_builder()
        .with_data(data.view())
        .chunk(chunk)
        .lzf()
        .create(dataset)
        .with_context(|| format!("Failed to write '{}' to {}", dataset, path.display()))?;

    Ok(())
}

pub fn has_dataset<P: AsRef<Path>>(path: P, dataset: &str) -> Result<bool> {
    let path = path.as_ref();
    let file = hdf5::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(file.link_exists(dataset))
}

/// Resample the label dataset to the image dataset's height / width
pub fn resize_label<P: AsRef<Path>>(path: P, labels_dataset: &str, image_dataset: &str) -> Result<()> {
    let path = path.as_ref();

    let Some(labels) = read_h5_labels(path, labels_dataset)? else {
        return Ok(());
    };

    let Some(im) = read_h5(path, image_dataset)? else {
        bail!("{}: no '{}' to resize labels to", path.display(), image_dataset);
    };
    ensure!(im.ndim() >= 2, "'{}' has {} dimensions", image_dataset, im.ndim());
    let (h, w) = (im.shape()[0], im.shape()[1]);

    if labels.dim() == (h, w) {
        debug!("{}: labels already {}x{}", path.display(), h, w);
        return Ok(());
    }

    debug!(
        "{}: resizing labels {:?} -> ({}, {})",
        path.display(),
        labels.dim(),
        h,
        w
    );

    let resized = super::image_io::resize_nearest(&labels, (h, w))?;
    add_dataset(path, &resized, labels_dataset)
}
