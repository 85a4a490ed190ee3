use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use ndarray::{Array2, Array3, Axis};
use opencv::{core::Vector, highgui, imgcodecs, prelude::*, videoio};

use crate::vision::utilities::{gray_to_mat, norm_uint8};

const WINDOW: &str = "frames";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSelection {
    pub start: usize,
    /// inclusive
    pub end: usize,
    pub stride: usize,
    /// how long each frame is shown while waiting for a key
    pub wait_ms: i32,
}

impl Default for FrameSelection {
    fn default() -> Self {
        Self {
            start: 5000,
            end: 50000,
            stride: 1000,
            wait_ms: 1,
        }
    }
}

impl FrameSelection {
    pub fn from_settings(settings: &crate::appconfig::AppSettings) -> Self {
        Self {
            start: settings.frame_start,
            end: settings.frame_end,
            stride: settings.frame_stride,
            ..Default::default()
        }
    }

    /// Frame indices in `0..len` inside the range and on the stride
    pub fn candidates(&self, len: usize) -> impl Iterator<Item = usize> + '_ {
        let stride = self.stride.max(1);
        (0..len).filter(move |t| *t >= self.start && *t <= self.end && t % stride == 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Skip,
    Save,
    Quit,
}

impl KeyAction {
    /// `key` as returned by `wait_key_ex`, negative when nothing was pressed
    pub fn from_key(key: i32) -> Self {
        if key < 0 {
            KeyAction::Skip
        } else if key == 'q' as i32 || key == 'Q' as i32 {
            KeyAction::Quit
        } else {
            KeyAction::Save
        }
    }
}

pub fn check_keys(wait_ms: i32) -> Result<KeyAction> {
    let key = highgui::wait_key_ex(wait_ms)?;
    Ok(KeyAction::from_key(key))
}

/// File name up to the first dot, e.g. `run_03` for `C:\videos\run_03.raw.avi`
pub fn source_stem<P: AsRef<Path>>(path: P) -> String {
    let name = path.as_ref().to_string_lossy();
    let name = name.rsplit(&['/', '\\'][..]).next().unwrap_or_default();
    name.split('.').next().unwrap_or_default().to_string()
}

pub fn frame_path<P: AsRef<Path>>(out_dir: P, stem: &str, t: usize) -> PathBuf {
    out_dir.as_ref().join(format!("{}_f{}_input.tiff", stem, t))
}

fn ensure_dir(out_dir: &Path) -> Result<()> {
    if !out_dir.exists() {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    }
    Ok(())
}

/// Write a Mat as uncompressed TIFF
pub fn save_frame(out_dir: &Path, stem: &str, im: &Mat, t: usize) -> Result<PathBuf> {
    let path = frame_path(out_dir, stem, t);
    let Some(path_str) = path.to_str() else {
        bail!("non UTF-8 path: {}", path.display());
    };

    let params = Vector::<i32>::from_slice(&[imgcodecs::IMWRITE_TIFF_COMPRESSION, 1]);
    ensure!(
        imgcodecs::imwrite(path_str, im, &params)?,
        "Failed to write {}",
        path.display()
    );
    info!("{}", path.display());
    Ok(path)
}

/// Write an 8 bit frame as uncompressed TIFF
pub fn save_gray_frame(out_dir: &Path, stem: &str, im: &Array2<u8>, t: usize) -> Result<PathBuf> {
    let path = frame_path(out_dir, stem, t);
    crate::storage::image_io::save_flat_label(&path, im)?;
    info!("{}", path.display());
    Ok(path)
}

/// Play a video, any key saves the frame on screen, `q` quits.
///
/// Returns the saved files.
pub fn select_video_frames<P: AsRef<Path>>(
    filename: P,
    out_dir: P,
    wait_ms: i32,
) -> Result<Vec<PathBuf>> {
    let (filename, out_dir) = (filename.as_ref(), out_dir.as_ref());
    ensure_dir(out_dir)?;

    let Some(name) = filename.to_str() else {
        bail!("non UTF-8 path: {}", filename.display());
    };
    let mut cap = videoio::VideoCapture::from_file(name, videoio::CAP_ANY)?;
    ensure!(cap.is_opened()?, "Failed to open video {}", filename.display());

    let stem = source_stem(filename);
    let mut saved = vec![];

    let mut frame = Mat::default();
    let mut f_num = 0;
    loop {
        if !cap.read(&mut frame)? || frame.empty() {
            debug!("End of video after {} frames", f_num);
            break;
        }

        highgui::imshow(WINDOW, &frame)?;
        match check_keys(wait_ms)? {
            KeyAction::Quit => break,
            KeyAction::Save => saved.push(save_frame(out_dir, &stem, &frame, f_num)?),
            KeyAction::Skip => {}
        }

        f_num += 1;
    }

    cap.release()?;
    highgui::destroy_all_windows()?;

    Ok(saved)
}

/// Save frames of a (t, h, w) volume.
///
/// Non-interactive saves every candidate. Interactive shows each candidate,
/// any key saves it, `q` quits.
pub fn select_dataset_frames<P: AsRef<Path>>(
    filename: P,
    data: &Array3<f32>,
    out_dir: P,
    selection: &FrameSelection,
    interactive: bool,
) -> Result<Vec<PathBuf>> {
    let (filename, out_dir) = (filename.as_ref(), out_dir.as_ref());
    ensure_dir(out_dir)?;

    let stem = source_stem(filename);

    if interactive {
        highgui::named_window(WINDOW, highgui::WINDOW_NORMAL)?;
        highgui::resize_window(WINDOW, 900, 600)?;
    }

    let mut saved = vec![];
    for t in selection.candidates(data.len_of(Axis(0))) {
        let im = norm_uint8(&data.index_axis(Axis(0), t));

        if !interactive {
            saved.push(save_gray_frame(out_dir, &stem, &im, t)?);
            continue;
        }

        highgui::imshow(WINDOW, &gray_to_mat(&im)?)?;
        match check_keys(selection.wait_ms)? {
            KeyAction::Quit => break,
            KeyAction::Save => saved.push(save_gray_frame(out_dir, &stem, &im, t)?),
            KeyAction::Skip => {}
        }
    }

    if interactive {
        highgui::destroy_all_windows()?;
    }

    Ok(saved)
}

/// Seek to frame `n`, `None` past the end
pub fn read_frame<P: AsRef<Path>>(filename: P, n: usize) -> Result<Option<Mat>> {
    let filename = filename.as_ref();
    let Some(name) = filename.to_str() else {
        bail!("non UTF-8 path: {}", filename.display());
    };
    let mut reader = videoio::VideoCapture::from_file(name, videoio::CAP_ANY)?;
    ensure!(reader.is_opened()?, "Failed to open video {}", filename.display());

    let len_frames = reader.get(videoio::CAP_PROP_FRAME_COUNT)?;
    trace!("{}: {} frames", filename.display(), len_frames);

    reader.set(videoio::CAP_PROP_POS_FRAMES, n as f64)?;

    let mut im = Mat::default();
    if !reader.read(&mut im)? || im.empty() {
        return Ok(None);
    }
    Ok(Some(im))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_count() {
        let sel = FrameSelection::default();
        let c: Vec<usize> = sel.candidates(100000).collect();
        assert_eq!(c.len(), 46);
        assert_eq!(c.first(), Some(&5000));
        assert_eq!(c.last(), Some(&50000));
    }

    #[test]
    fn test_candidates_short_data() {
        let sel = FrameSelection {
            start: 2,
            end: 100,
            stride: 3,
            ..Default::default()
        };
        assert_eq!(sel.candidates(10).collect::<Vec<_>>(), vec![3, 6, 9]);
    }

    #[test]
    fn test_key_action() {
        assert_eq!(KeyAction::from_key(-1), KeyAction::Skip);
        assert_eq!(KeyAction::from_key('q' as i32), KeyAction::Quit);
        assert_eq!(KeyAction::from_key('s' as i32), KeyAction::Save);
        assert_eq!(KeyAction::from_key(13), KeyAction::Save);
    }

    #[test]
    fn test_naming() {
        assert_eq!(source_stem("C:\\videos\\run_03.avi"), "run_03");
        assert_eq!(source_stem("/data/vol.1.h5"), "vol");
        assert_eq!(
            frame_path("./training", "run_03", 7000),
            PathBuf::from("./training/run_03_f7000_input.tiff")
        );
    }

    #[test]
    fn test_dataset_frames_non_interactive() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("training");

        let data = Array3::from_shape_fn((10, 4, 5), |(t, r, c)| (t + r * c) as f32);
        let sel = FrameSelection {
            start: 2,
            end: 8,
            stride: 2,
            ..Default::default()
        };

        let saved = select_dataset_frames(
            dir.path().join("vol.h5"),
            &data,
            out.clone(),
            &sel,
            false,
        )
        .unwrap();

        assert_eq!(saved.len(), 4);
        assert_eq!(saved[0], out.join("vol_f2_input.tiff"));

        let frame = image::open(&saved[0]).unwrap().into_luma8();
        assert_eq!(frame.dimensions(), (5, 4));
        assert_eq!(frame.get_pixel(0, 0).0[0], 0);
        assert_eq!(frame.get_pixel(4, 3).0[0], 255);
    }
}
