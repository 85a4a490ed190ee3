use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use ndarray::{s, Array2, Array3, Axis, Zip};

/// Channel -> RGB for masks and predictions
pub const CHANNEL_COLORS: [[f32; 3]; 6] = [
    [1., 0., 0.],
    [0., 1., 0.],
    [0., 0., 1.],
    [1., 1., 0.],
    [1., 0., 1.],
    [0., 1., 1.],
];

/// Polygon colors "rgbcym", cycled by label index
pub const LABEL_COLORS: [[u8; 3]; 6] = [
    [255, 0, 0],
    [0, 128, 0],
    [0, 0, 255],
    [0, 191, 191],
    [191, 191, 0],
    [191, 0, 191],
];

pub fn label_color(label_index: usize) -> [u8; 3] {
    LABEL_COLORS[label_index % LABEL_COLORS.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ColorMap {
    Gray,
    Jet,
}

impl Default for ColorMap {
    fn default() -> Self {
        ColorMap::Gray
    }
}

/// Multi channel mask in 0..=1 to 8 bit RGB.
///
/// 1 channel is repeated, 3 channels are used as is, anything else is mixed
/// through [`CHANNEL_COLORS`].
pub fn channels2rgb(pd: &Array3<f32>) -> Array3<u8> {
    let (h, w, c) = pd.dim();

    let rgb: Array3<f32> = match c {
        1 => {
            let ch = pd.index_axis(Axis(2), 0);
            let mut out = Array3::zeros((h, w, 3));
            for k in 0..3 {
                out.index_axis_mut(Axis(2), k).assign(&ch);
            }
            out
        }
        3 => pd.clone(),
        _ => {
            let mut out = Array3::<f32>::zeros((h, w, 3));
            for k in 0..c {
                let color = CHANNEL_COLORS[k % CHANNEL_COLORS.len()];
                let ch = pd.index_axis(Axis(2), k);
                for (j, weight) in color.iter().enumerate() {
                    if *weight == 0. {
                        continue;
                    }
                    let mut dst = out.index_axis_mut(Axis(2), j);
                    dst.scaled_add(*weight, &ch);
                }
            }
            out
        }
    };

    rgb.mapv(|v| (v * 255.).clamp(0., 255.) as u8)
}

/// One channel per label value, channel k is set where `labels == k + 1`
pub fn labels_to_channels(labels: &Array2<u8>) -> Array3<f32> {
    let n = labels.iter().copied().max().unwrap_or(0).max(1) as usize;
    let (h, w) = labels.dim();

    /// 1 and 3 channels skip the palette in channels2rgb, pad them
    let c = match n {
        1 => 2,
        3 => 4,
        n => n,
    };

    let mut out = Array3::<f32>::zeros((h, w, c));
    for ((r, col), v) in labels.indexed_iter() {
        if *v > 0 {
            out[[r, col, *v as usize - 1]] = 1.;
        }
    }
    out
}

/// Blend `mask_rgb` over `im` wherever any mask channel is set
pub fn overlay_mask(im: &mut Array3<u8>, mask_rgb: &Array3<u8>, alpha: f32) {
    let (h, w, _) = im.dim();
    if mask_rgb.dim() != (h, w, 3) || im.dim().2 != 3 {
        warn!(
            "overlay shape mismatch: image {:?}, mask {:?}",
            im.dim(),
            mask_rgb.dim()
        );
        return;
    }

    Zip::from(im.lanes_mut(Axis(2)))
        .and(mask_rgb.lanes(Axis(2)))
        .for_each(|mut px, m| {
            if m.iter().any(|v| *v > 0) {
                for k in 0..3 {
                    let v = px[k] as f32 * (1. - alpha) + m[k] as f32 * alpha;
                    px[k] = v as u8;
                }
            }
        });
}

/// Contrast stretch to the full 8 bit range
pub fn saturate(im: &Array3<u8>) -> Array3<u8> {
    let min = im.iter().copied().min().unwrap_or(0) as f32;
    let max = im.iter().copied().max().unwrap_or(0) as f32 - min;
    if max <= 0. {
        return im.mapv(|_| 0);
    }
    im.mapv(|v| ((v as f32 - min) / max * 255.) as u8)
}

/// Average over channels
pub fn to_gray(im: &Array3<u8>) -> Array2<f32> {
    im.mapv(|v| v as f32)
        .mean_axis(Axis(2))
        .unwrap_or_else(|| Array2::zeros((im.dim().0, im.dim().1)))
}

pub fn to_rgb(im: &Array3<u8>) -> Array3<u8> {
    let (h, w, c) = im.dim();
    match c {
        3 => im.clone(),
        1 => {
            let mut out = Array3::zeros((h, w, 3));
            for k in 0..3 {
                out.slice_mut(s![.., .., k]).assign(&im.slice(s![.., .., 0]));
            }
            out
        }
        _ => {
            let gray = to_gray(im).mapv(|v| v as u8).insert_axis(Axis(2));
            to_rgb(&gray)
        }
    }
}

/// Classic jet colormap, `v` in 0..=1
pub fn jet(v: f32) -> [u8; 3] {
    let v = v.clamp(0., 1.);
    let f = |x: f32| ((1.5 - (4. * v - x).abs()).clamp(0., 1.) * 255.) as u8;
    [f(3.), f(2.), f(1.)]
}

pub fn apply_colormap(im: &Array3<u8>, cmap: ColorMap) -> Array3<u8> {
    match cmap {
        ColorMap::Gray => to_rgb(im),
        /// only meaningful for single channel data
        ColorMap::Jet if im.dim().2 == 1 => {
            let (h, w, _) = im.dim();
            let mut out = Array3::zeros((h, w, 3));
            for ((r, c, _), v) in im.indexed_iter() {
                let rgb = jet(*v as f32 / 255.);
                for k in 0..3 {
                    out[[r, c, k]] = rgb[k];
                }
            }
            out
        }
        ColorMap::Jet => to_rgb(im),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels2rgb_single() {
        let pd = Array3::from_elem((2, 2, 1), 0.5f32);
        let rgb = channels2rgb(&pd);
        assert_eq!(rgb.dim(), (2, 2, 3));
        assert!(rgb.iter().all(|v| *v == 127));
    }

    #[test]
    fn test_channels2rgb_palette() {
        let mut pd = Array3::<f32>::zeros((1, 3, 5));
        pd[[0, 0, 0]] = 1.;
        pd[[0, 1, 3]] = 1.;
        pd[[0, 2, 4]] = 1.;
        let rgb = channels2rgb(&pd);
        assert_eq!(rgb.slice(s![0, 0, ..]).to_vec(), vec![255, 0, 0]);
        assert_eq!(rgb.slice(s![0, 1, ..]).to_vec(), vec![255, 255, 0]);
        assert_eq!(rgb.slice(s![0, 2, ..]).to_vec(), vec![255, 0, 255]);
    }

    #[test]
    fn test_labels_to_channels() {
        let labels = Array2::from_shape_vec((1, 4), vec![0, 1, 3, 2]).unwrap();
        let ch = labels_to_channels(&labels);
        assert_eq!(ch.dim(), (1, 4, 4));
        let rgb = channels2rgb(&ch);
        assert_eq!(rgb.slice(s![0, 0, ..]).to_vec(), vec![0, 0, 0]);
        assert_eq!(rgb.slice(s![0, 1, ..]).to_vec(), vec![255, 0, 0]);
        assert_eq!(rgb.slice(s![0, 2, ..]).to_vec(), vec![0, 0, 255]);
        assert_eq!(rgb.slice(s![0, 3, ..]).to_vec(), vec![0, 255, 0]);
    }

    #[test]
    fn test_overlay_only_masked_pixels() {
        let mut im = Array3::from_elem((1, 2, 3), 100u8);
        let mut mask = Array3::zeros((1, 2, 3));
        mask[[0, 1, 0]] = 200;
        overlay_mask(&mut im, &mask, 0.5);
        assert_eq!(im.slice(s![0, 0, ..]).to_vec(), vec![100, 100, 100]);
        assert_eq!(im.slice(s![0, 1, ..]).to_vec(), vec![150, 50, 50]);
    }

    #[test]
    fn test_saturate() {
        let im = Array3::from_shape_vec((1, 3, 1), vec![10, 20, 30]).unwrap();
        assert_eq!(saturate(&im).into_raw_vec_and_offset().0, vec![0, 127, 255]);

        let flat = Array3::from_elem((2, 2, 1), 42u8);
        assert!(saturate(&flat).iter().all(|v| *v == 0));
    }

    #[test]
    fn test_jet_ends() {
        assert_eq!(jet(0.), [0, 0, 127]);
        assert_eq!(jet(1.), [127, 0, 0]);
        assert_eq!(jet(0.5), [127, 255, 127]);
    }

    #[test]
    fn test_colormap_keeps_rgb() {
        let im = Array3::from_elem((2, 2, 3), 7u8);
        assert_eq!(apply_colormap(&im, ColorMap::Jet), im);
        let gray = Array3::from_elem((2, 2, 1), 7u8);
        assert_eq!(apply_colormap(&gray, ColorMap::Gray), Array3::from_elem((2, 2, 3), 7u8));
    }
}
