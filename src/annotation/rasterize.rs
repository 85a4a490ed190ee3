use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use ndarray::Array2;

use super::annotation_types::{PolygonRecord, RecordShape};

pub const MARKER_RADIUS: i64 = 10;

/// Rasterize all records of one image into a label image.
///
/// Each pixel holds `label_index + 1`, 0 is background. Later records win
/// where shapes overlap.
pub fn gen_index_image(
    shape: (usize, usize),
    records: &[PolygonRecord],
    marker_radius: i64,
) -> Array2<u8> {
    let mut label_im = Array2::<u8>::zeros(shape);
    for record in records {
        draw_record(&mut label_im, record, marker_radius);
    }
    label_im
}

pub fn draw_record(label_im: &mut Array2<u8>, record: &PolygonRecord, marker_radius: i64) {
    let value = label_value(record.label_index);
    match record.shape() {
        RecordShape::Placeholder => {}
        RecordShape::Marker => {
            let (r0, c0) = record.points[0].to_pixel();
            fill_disc(label_im, (r0, c0), marker_radius, value);
        }
        /// two points don't make an area
        RecordShape::Segment => {
            trace!("skipping 2 point record, label {}", record.label_index);
        }
        RecordShape::Polygon => {
            let coords: Vec<(f64, f64)> = record
                .points
                .iter()
                .map(|p| {
                    let (r, c) = p.to_pixel();
                    (r as f64, c as f64)
                })
                .collect();
            fill_polygon(label_im, &coords, value);
        }
    }
}

fn label_value(label_index: usize) -> u8 {
    match u8::try_from(label_index + 1) {
        Ok(v) => v,
        Err(_) => {
            warn!("label index {} does not fit in u8, clamping", label_index);
            u8::MAX
        }
    }
}

/// Pixels strictly closer than `radius` to the center
pub fn fill_disc(label_im: &mut Array2<u8>, (r0, c0): (i64, i64), radius: i64, value: u8) {
    let (h, w) = label_im.dim();
    let (h, w) = (h as i64, w as i64);

    let rows = (r0 - radius).max(0)..(r0 + radius + 1).min(h);
    let cols = (c0 - radius).max(0)..(c0 + radius + 1).min(w);

    for r in rows {
        for c in cols.clone() {
            let d2 = (r - r0).pow(2) + (c - c0).pow(2);
            if d2 < radius.pow(2) {
                label_im[[r as usize, c as usize]] = value;
            }
        }
    }
}

/// Even-odd scanline fill, vertices given as (row, col)
pub fn fill_polygon(label_im: &mut Array2<u8>, vertices: &[(f64, f64)], value: u8) {
    if vertices.len() < 3 {
        return;
    }

    let (h, w) = label_im.dim();

    let r_min = vertices.iter().map(|v| v.0).fold(f64::INFINITY, f64::min);
    let r_max = vertices.iter().map(|v| v.0).fold(f64::NEG_INFINITY, f64::max);

    let r_start = r_min.floor().max(0.) as usize;
    let r_end = (r_max.ceil() as i64 + 1).clamp(0, h as i64) as usize;

    let mut crossings: Vec<f64> = Vec::with_capacity(vertices.len());

    for r in r_start..r_end {
        let py = r as f64;
        scanline_crossings(vertices, py, &mut crossings);

        /// a pixel is inside when an odd number of crossings lie to its right
        for pair in crossings.chunks_exact(2) {
            let c0 = pair[0].ceil().max(0.);
            let c1 = pair[1].ceil().min(w as f64);
            if c1 <= c0 {
                continue;
            }
            for c in c0 as usize..c1 as usize {
                label_im[[r, c]] = value;
            }
        }
    }
}

/// Column positions where the polygon boundary crosses row `py`, sorted
fn scanline_crossings(vertices: &[(f64, f64)], py: f64, out: &mut Vec<f64>) {
    out.clear();
    let n = vertices.len();
    let mut j = n - 1;
    for i in 0..n {
        let (yi, xi) = vertices[i];
        let (yj, xj) = vertices[j];
        if (yi > py) != (yj > py) {
            out.push((xj - xi) * (py - yi) / (yj - yi) + xi);
        }
        j = i;
    }
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}
