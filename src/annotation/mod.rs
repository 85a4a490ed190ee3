pub mod annotation_types;
pub mod rasterize;
pub mod session;

pub use self::annotation_types::*;
pub use self::rasterize::{gen_index_image, MARKER_RADIUS};
pub use self::session::{AnnotationSession, ImageSource};
