use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use ndarray::Array3;

use super::annotation_types::{Point, PolygonRecord};

/// Anything that can turn a dataset path into pixels.
///
/// `None` means the file is missing or unreadable, the session drops it.
pub trait ImageSource {
    fn read_image(&self, path: &Path) -> Option<Array3<u8>>;
}

#[derive(Debug, Clone)]
pub struct AnnotationSession {
    filenames: Vec<PathBuf>,
    /// committed records, one list per filename
    polygons: Vec<Vec<PolygonRecord>>,
    im_idx: usize,
    label_idx: usize,
    /// records of the image currently shown, committed on navigation / close
    cur_polygons: Vec<PolygonRecord>,
}

/// New
impl AnnotationSession {
    pub fn new(filenames: Vec<PathBuf>) -> Result<Self> {
        if filenames.is_empty() {
            bail!("no images");
        }

        info!("Annotating {} images", filenames.len());

        let polygons = vec![vec![]; filenames.len()];

        Ok(Self {
            filenames,
            polygons,
            im_idx: 0,
            label_idx: 0,
            cur_polygons: vec![],
        })
    }
}

/// Getters
impl AnnotationSession {
    pub fn filenames(&self) -> &[PathBuf] {
        &self.filenames
    }

    pub fn polygons(&self) -> &[Vec<PolygonRecord>] {
        &self.polygons
    }

    pub fn current_index(&self) -> usize {
        self.im_idx
    }

    pub fn current_filename(&self) -> &Path {
        &self.filenames[self.im_idx]
    }

    pub fn label_index(&self) -> usize {
        self.label_idx
    }

    pub fn current_polygons(&self) -> &[PolygonRecord] {
        &self.cur_polygons
    }

    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_drawing(&self) -> bool {
        self.cur_polygons.last().map_or(false, |r| !r.is_empty())
    }
}

/// Drawing
impl AnnotationSession {
    pub fn add_point(&mut self, pos: Point) {
        if self.cur_polygons.is_empty() {
            self.cur_polygons.push(PolygonRecord::new(self.label_idx));
        }

        if let Some(last) = self.cur_polygons.last_mut() {
            last.points.push(pos);
        }
    }

    /// Finish the current object and start an empty one under the current label
    pub fn submit_polygon(&mut self) {
        let new_poly = PolygonRecord::new(self.label_idx);

        match self.cur_polygons.last_mut() {
            None => self.cur_polygons.push(new_poly),
            Some(last) if last.is_empty() => *last = new_poly,
            Some(_) => self.cur_polygons.push(new_poly),
        }
    }

    pub fn undo(&mut self) {
        let n = self.cur_polygons.len();
        let Some(last) = self.cur_polygons.last_mut() else {
            return;
        };

        if last.points.pop().is_none() && n > 1 {
            self.cur_polygons.pop();
        }
    }

    pub fn label_up(&mut self) {
        self.label_idx += 1;
        self.submit_polygon();
    }

    pub fn label_down(&mut self) {
        self.label_idx = self.label_idx.saturating_sub(1);
        self.submit_polygon();
    }

    /// Replace the in progress records with a copy of the previous image's
    pub fn copy_previous(&mut self) {
        let prev = (self.im_idx + self.len() - 1) % self.len();
        let last_poly = &self.polygons[prev];
        if last_poly.is_empty() {
            debug!("No annotations on image {} to copy", prev);
            return;
        }
        self.cur_polygons = last_poly.clone();
    }
}

/// Navigation
impl AnnotationSession {
    pub fn commit(&mut self) {
        self.polygons[self.im_idx] = self.cur_polygons.clone();
    }

    pub fn close(&mut self) {
        self.commit();
        debug!("Closed session on image {}", self.im_idx);
    }

    pub fn change_image(&mut self, step: isize, source: &impl ImageSource) -> Result<Array3<u8>> {
        self.commit();

        let len = self.len() as isize;
        self.im_idx = (self.im_idx as isize + step).rem_euclid(len) as usize;
        self.cur_polygons = self.polygons[self.im_idx].clone();

        self.load_data(source)
    }

    /// Read the image at the current index.
    ///
    /// Unreadable files are removed together with their polygon slot, and the
    /// next file at the same index is tried.
    pub fn load_data(&mut self, source: &impl ImageSource) -> Result<Array3<u8>> {
        let mut dropped = false;
        loop {
            ensure!(!self.filenames.is_empty(), "no readable images left");

            self.im_idx %= self.filenames.len();

            let filename = &self.filenames[self.im_idx];
            if let Some(im) = source.read_image(filename) {
                if dropped {
                    self.cur_polygons = self.polygons[self.im_idx].clone();
                }
                return Ok(im);
            }

            warn!("{}: Not Found ({})", self.im_idx, filename.display());
            self.filenames.remove(self.im_idx);
            self.polygons.remove(self.im_idx);
            dropped = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::annotation::{gen_index_image, has_rasterizable};

    struct FakeSource {
        missing: HashSet<PathBuf>,
        shape: (usize, usize),
    }

    impl FakeSource {
        fn new(missing: &[&str]) -> Self {
            Self {
                missing: missing.iter().map(PathBuf::from).collect(),
                shape: (40, 50),
            }
        }
    }

    impl ImageSource for FakeSource {
        fn read_image(&self, path: &Path) -> Option<Array3<u8>> {
            if self.missing.contains(path) {
                None
            } else {
                Some(Array3::zeros((self.shape.0, self.shape.1, 1)))
            }
        }
    }

    fn session(names: &[&str]) -> AnnotationSession {
        AnnotationSession::new(names.iter().map(PathBuf::from).collect()).unwrap()
    }

    #[test]
    fn test_empty_file_list() {
        assert!(AnnotationSession::new(vec![]).is_err());
    }

    #[test]
    fn test_add_point_creates_record() {
        let mut s = session(&["a_input.tif"]);
        s.label_up();
        s.label_up();
        /// label_up leaves an empty record behind, so clear to check creation
        s.cur_polygons.clear();

        s.add_point(Point::new(1., 2.));
        assert_eq!(s.current_polygons().len(), 1);
        assert_eq!(s.current_polygons()[0].label_index, 2);
        assert_eq!(s.current_polygons()[0].points, vec![Point::new(1., 2.)]);
        assert!(s.is_drawing());
    }

    #[test]
    fn test_submit_polygon() {
        let mut s = session(&["a_input.tif"]);

        s.submit_polygon();
        assert_eq!(s.current_polygons(), &[PolygonRecord::new(0)]);

        /// empty last record is replaced, not duplicated
        s.submit_polygon();
        assert_eq!(s.current_polygons().len(), 1);

        s.add_point(Point::new(3., 3.));
        s.submit_polygon();
        assert_eq!(s.current_polygons().len(), 2);
        assert_eq!(s.current_polygons()[0].points.len(), 1);
        assert!(s.current_polygons()[1].is_empty());
        assert!(!s.is_drawing());
    }

    #[test]
    fn test_undo() {
        let mut s = session(&["a_input.tif"]);

        /// nothing to undo
        s.undo();
        assert!(s.current_polygons().is_empty());

        for i in 0..3 {
            s.add_point(Point::new(i as f32, 0.));
        }
        s.undo();
        assert_eq!(s.current_polygons()[0].points.len(), 2);

        s.submit_polygon();
        assert_eq!(s.current_polygons().len(), 2);

        /// empty record with another one present is removed
        s.undo();
        assert_eq!(s.current_polygons().len(), 1);
        assert_eq!(s.current_polygons()[0].points.len(), 2);

        s.undo();
        s.undo();
        assert_eq!(s.current_polygons().len(), 1);
        assert!(s.current_polygons()[0].is_empty());

        /// sole record stays
        s.undo();
        assert_eq!(s.current_polygons().len(), 1);
    }

    #[test]
    fn test_label_index_bounded_below() {
        let mut s = session(&["a_input.tif"]);
        s.label_down();
        assert_eq!(s.label_index(), 0);

        s.add_point(Point::new(5., 5.));
        s.label_up();
        assert_eq!(s.label_index(), 1);

        /// changing label closes the object in progress
        assert_eq!(s.current_polygons().len(), 2);
        assert_eq!(s.current_polygons()[0].label_index, 0);
        assert_eq!(s.current_polygons()[1], PolygonRecord::new(1));

        s.label_down();
        assert_eq!(s.current_polygons().len(), 2);
        assert_eq!(s.current_polygons()[1], PolygonRecord::new(0));
    }

    #[test]
    fn test_empty_record_not_rasterizable_after_navigation() {
        let src = FakeSource::new(&[]);
        let mut s = session(&["a_input.tif", "b_input.tif"]);

        s.submit_polygon();
        s.change_image(1, &src).unwrap();

        assert_eq!(s.polygons()[0].len(), 1);
        assert!(!has_rasterizable(&s.polygons()[0]));
    }

    #[test]
    fn test_navigation_wraps() {
        let src = FakeSource::new(&[]);
        let mut s = session(&["a", "b", "c"]);

        s.change_image(-1, &src).unwrap();
        assert_eq!(s.current_index(), 2);

        s.change_image(1, &src).unwrap();
        assert_eq!(s.current_index(), 0);

        s.change_image(5, &src).unwrap();
        assert_eq!(s.current_index(), 2);
    }

    #[test]
    fn test_navigation_restores_records() {
        let src = FakeSource::new(&[]);
        let mut s = session(&["a", "b"]);

        s.add_point(Point::new(1., 1.));
        s.change_image(1, &src).unwrap();
        assert!(s.current_polygons().is_empty());

        s.change_image(1, &src).unwrap();
        assert_eq!(s.current_polygons()[0].points, vec![Point::new(1., 1.)]);
    }

    #[test]
    fn test_missing_images_are_dropped() {
        let src = FakeSource::new(&["b", "c"]);
        let mut s = session(&["a", "b", "c", "d"]);

        s.add_point(Point::new(2., 2.));
        let im = s.change_image(1, &src).unwrap();

        assert_eq!(im.dim(), (40, 50, 1));
        assert_eq!(s.filenames(), &[PathBuf::from("a"), PathBuf::from("d")]);
        assert_eq!(s.polygons().len(), 2);
        assert_eq!(s.current_index(), 1);
        assert_eq!(s.current_filename(), Path::new("d"));
        assert!(s.current_polygons().is_empty());
        assert_eq!(s.polygons()[0][0].points.len(), 1);
    }

    #[test]
    fn test_all_images_missing() {
        let src = FakeSource::new(&["a", "b"]);
        let mut s = session(&["a", "b"]);
        assert!(s.load_data(&src).is_err());
    }

    #[test]
    fn test_copy_previous_is_deep() {
        let src = FakeSource::new(&[]);
        let mut s = session(&["a", "b"]);

        s.add_point(Point::new(1., 1.));
        s.add_point(Point::new(2., 1.));
        s.change_image(1, &src).unwrap();

        s.copy_previous();
        assert_eq!(s.current_polygons(), s.polygons()[0].as_slice());

        s.add_point(Point::new(9., 9.));
        s.close();

        assert_eq!(s.polygons()[0][0].points.len(), 2);
        assert_eq!(s.polygons()[1][0].points.len(), 3);
    }

    #[test]
    fn test_copy_previous_without_annotations() {
        let src = FakeSource::new(&[]);
        let mut s = session(&["a", "b"]);

        s.change_image(1, &src).unwrap();
        s.add_point(Point::new(4., 4.));
        s.copy_previous();

        assert_eq!(s.current_polygons()[0].points.len(), 1);
    }

    #[test]
    fn test_draw_polygon_then_navigate() {
        let src = FakeSource::new(&[]);
        let mut s = session(&["a_input.tif", "b_input.tif"]);

        let pts = [(10., 5.), (30., 5.), (30., 25.), (10., 25.)];
        for p in pts {
            s.add_point(Point::from(p));
        }
        s.submit_polygon();
        s.change_image(1, &src).unwrap();

        assert!(s.polygons()[1].is_empty());

        let labels = gen_index_image((40, 50), &s.polygons()[0], 10);
        let expected = gen_index_image(
            (40, 50),
            &[PolygonRecord::with_points(0, pts.map(Point::from))],
            10,
        );
        assert_eq!(labels, expected);

        for ((r, c), v) in labels.indexed_iter() {
            let inside = (5..=25).contains(&r) && (10..=30).contains(&c);
            if (6..25).contains(&r) && (11..30).contains(&c) {
                assert_eq!(*v, 1, "({}, {})", r, c);
            }
            if !inside {
                assert_eq!(*v, 0, "({}, {})", r, c);
            }
        }
    }
}
