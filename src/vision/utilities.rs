use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use ndarray::Array2;
use opencv::prelude::*;

/// Copy an 8 bit grayscale array into a new single channel Mat
pub fn gray_to_mat(img: &Array2<u8>) -> Result<Mat> {
    let (h, w) = img.dim();

    let mut mat =
        Mat::new_rows_cols_with_default(h as i32, w as i32, opencv::core::CV_8UC1, 0.0f64.into())?;

    let img = img.as_standard_layout();
    let Some(src) = img.as_slice() else {
        bail!("array not contiguous");
    };

    let dst = mat.data_bytes_mut()?;
    ensure!(
        dst.len() == src.len(),
        "Size mismatch: {} != {}",
        dst.len(),
        src.len()
    );
    dst.copy_from_slice(src);

    Ok(mat)
}

/// Min-subtract, max-scale to 0..=255
pub fn norm_uint8(im: &ndarray::ArrayView2<f32>) -> Array2<u8> {
    let min = im.iter().copied().fold(f32::INFINITY, f32::min);
    let shifted = im.mapv(|v| v - min);
    let max = shifted.iter().copied().fold(0f32, f32::max);
    if !max.is_finite() || max <= 0. {
        return Array2::zeros(im.dim());
    }
    shifted.mapv(|v| (v / max * 255.) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_uint8() {
        let im = Array2::from_shape_vec((2, 2), vec![-1.0f32, 0., 1., 3.]).unwrap();
        let n = norm_uint8(&im.view());
        assert_eq!(n.into_raw_vec_and_offset().0, vec![0, 63, 127, 255]);

        let flat = Array2::from_elem((3, 3), 5.0f32);
        assert!(norm_uint8(&flat.view()).iter().all(|v| *v == 0));
    }

    #[test]
    fn test_gray_to_mat() {
        let im = Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as u8);
        let mat = gray_to_mat(&im).unwrap();
        assert_eq!(mat.rows(), 3);
        assert_eq!(mat.cols(), 4);
        assert_eq!(*mat.at_2d::<u8>(2, 1).unwrap(), 9);
    }
}
