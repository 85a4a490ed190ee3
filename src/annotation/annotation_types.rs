/// Image-space position, x = column, y = row
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// (row, col) after rounding
    pub fn to_pixel(&self) -> (i64, i64) {
        (self.y.round() as i64, self.x.round() as i64)
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// One object drawn by the user.
///
/// - 0 points: placeholder for the next object, never rasterized
/// - 1 point: fixed radius marker
/// - 2 points: kept, but never rasterized
/// - 3+ points: filled polygon
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PolygonRecord {
    pub label_index: usize,
    pub points: Vec<Point>,
}

impl PolygonRecord {
    pub fn new(label_index: usize) -> Self {
        Self {
            label_index,
            points: vec![],
        }
    }

    pub fn with_points(label_index: usize, points: impl IntoIterator<Item = Point>) -> Self {
        Self {
            label_index,
            points: points.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn shape(&self) -> RecordShape {
        match self.points.len() {
            0 => RecordShape::Placeholder,
            1 => RecordShape::Marker,
            2 => RecordShape::Segment,
            _ => RecordShape::Polygon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    Placeholder,
    Marker,
    Segment,
    Polygon,
}

/// Returns true if any record in the list would produce pixels
pub fn has_rasterizable(records: &[PolygonRecord]) -> bool {
    records
        .iter()
        .any(|r| matches!(r.shape(), RecordShape::Marker | RecordShape::Polygon))
}
