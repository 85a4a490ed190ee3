use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use ndarray::{Array2, Array3, Axis};

/// Produces a per-pixel prediction for the prediction overlay
pub trait Segmenter {
    /// `im` is (h, w) intensity in 0..=255, output is (h, w, channels) in 0..=1
    fn segment(&self, im: &Array2<f32>) -> Result<Array3<f32>>;
}

/// Marks pixels brighter than `threshold` (0..=1 of full scale)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSegmenter {
    pub threshold: f32,
}

impl ThresholdSegmenter {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Segmenter for ThresholdSegmenter {
    fn segment(&self, im: &Array2<f32>) -> Result<Array3<f32>> {
        ensure!(
            (0. ..=1.).contains(&self.threshold),
            "threshold {} outside 0..=1",
            self.threshold
        );
        let t = self.threshold * 255.;
        let mask = im.mapv(|v| if v > t { 1. } else { 0. });
        Ok(mask.insert_axis(Axis(2)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        let im = Array2::from_shape_vec((1, 3), vec![0., 128., 255.]).unwrap();
        let pred = ThresholdSegmenter::new(0.5).segment(&im).unwrap();
        assert_eq!(pred.dim(), (1, 3, 1));
        assert_eq!(pred.into_raw_vec_and_offset().0, vec![0., 1., 1.]);

        assert!(ThresholdSegmenter::new(2.).segment(&im).is_err());
    }
}
