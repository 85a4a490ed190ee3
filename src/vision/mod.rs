pub mod color;
pub mod segmenter;
pub mod utilities;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use ndarray::{Array2, Array3, Axis};

pub use self::color::ColorMap;
pub use self::segmenter::{Segmenter, ThresholdSegmenter};

pub const OVERLAY_ALPHA: f32 = 0.5;

#[derive(Debug, Clone, Copy)]
pub enum Overlay<'a> {
    None,
    /// (h, w, channels) in 0..=1
    Prediction(&'a Array3<f32>),
    /// label image, 0 = background
    Labels(&'a Array2<u8>),
}

/// Build the RGB view of an image with the display options applied
pub fn compose_view(im: &Array3<u8>, cmap: ColorMap, saturate: bool, overlay: Overlay) -> Array3<u8> {
    let im = if saturate {
        color::saturate(im)
    } else {
        im.clone()
    };

    match overlay {
        Overlay::None => color::apply_colormap(&im, cmap),
        Overlay::Prediction(pred) => {
            let gray = color::to_gray(&im).mapv(|v| v as u8).insert_axis(Axis(2));
            let mut rgb = color::to_rgb(&gray);
            color::overlay_mask(&mut rgb, &color::channels2rgb(pred), OVERLAY_ALPHA);
            rgb
        }
        Overlay::Labels(labels) => {
            let mut rgb = color::apply_colormap(&im, cmap);
            let mask = color::channels2rgb(&color::labels_to_channels(labels));
            color::overlay_mask(&mut rgb, &mask, OVERLAY_ALPHA);
            rgb
        }
    }
}

/// Run `segmenter` on the channel mean of `im`
pub fn predict(segmenter: &dyn Segmenter, im: &Array3<u8>) -> Result<Array3<f32>> {
    let gray = color::to_gray(im);
    let pred = segmenter.segment(&gray)?;
    ensure!(
        pred.dim().0 == gray.dim().0 && pred.dim().1 == gray.dim().1,
        "prediction shape {:?} doesn't match image {:?}",
        pred.dim(),
        gray.dim()
    );
    Ok(pred)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    #[test]
    fn test_compose_labels_overlay() {
        let im = Array3::from_elem((2, 2, 1), 100u8);
        let mut labels = Array2::zeros((2, 2));
        labels[[1, 1]] = 1;

        let view = compose_view(&im, ColorMap::Gray, false, Overlay::Labels(&labels));
        assert_eq!(view.slice(s![0, 0, ..]).to_vec(), vec![100, 100, 100]);
        assert_eq!(view.slice(s![1, 1, ..]).to_vec(), vec![177, 50, 50]);
    }

    #[test]
    fn test_compose_prediction() {
        let mut im = Array3::from_elem((1, 2, 3), 0u8);
        im[[0, 1, 0]] = 255;
        im[[0, 1, 1]] = 255;
        im[[0, 1, 2]] = 255;

        let pred = predict(&ThresholdSegmenter::new(0.5), &im).unwrap();
        let view = compose_view(&im, ColorMap::Jet, false, Overlay::Prediction(&pred));
        assert_eq!(view.slice(s![0, 0, ..]).to_vec(), vec![0, 0, 0]);
        assert_eq!(view.slice(s![0, 1, ..]).to_vec(), vec![255, 255, 255]);
    }

    #[test]
    fn test_compose_saturate() {
        let im = Array3::from_shape_vec((1, 2, 1), vec![50u8, 60]).unwrap();
        let view = compose_view(&im, ColorMap::Gray, true, Overlay::None);
        assert_eq!(view.slice(s![0, 0, ..]).to_vec(), vec![0, 0, 0]);
        assert_eq!(view.slice(s![0, 1, ..]).to_vec(), vec![255, 255, 255]);
    }
}
