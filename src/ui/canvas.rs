use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use egui::{epaint::Mesh, Color32, Pos2, Shape, Stroke, Vec2};

use crate::annotation::{Point, PolygonRecord};
use crate::ui::ui_types::App;
use crate::ui::utils::{color32, scroll_step};
use crate::vision::color::label_color;

const POINT_RADIUS: f32 = 3.;

/// Maps between image pixels and screen positions inside the image rect
#[derive(Debug, Clone, Copy)]
pub struct ImageTransform {
    pub min: Pos2,
    pub scale: f32,
}

impl ImageTransform {
    /// Largest scale that fits `image_size` into `available`
    pub fn fit(min: Pos2, image_size: Vec2, available: Vec2) -> Self {
        let scale = (available.x / image_size.x).min(available.y / image_size.y);
        let scale = if scale.is_finite() && scale > 0. { scale } else { 1. };
        Self { min, scale }
    }

    /// Pixel centers sit at integer coordinates
    pub fn to_image(&self, pos: Pos2) -> Point {
        let p = (pos - self.min) / self.scale;
        Point::new(p.x - 0.5, p.y - 0.5)
    }

    pub fn to_screen(&self, p: &Point) -> Pos2 {
        self.min + Vec2::new(p.x + 0.5, p.y + 0.5) * self.scale
    }
}

/// Ear clipped triangles of a polygon, `None` if it can't be triangulated
pub fn polygon_mesh(points: &[Pos2], color: Color32) -> Option<Mesh> {
    if points.len() < 3 {
        return None;
    }

    let mut coords: Vec<f64> = Vec::with_capacity(points.len() * 2);
    for p in points {
        coords.push(p.x as f64);
        coords.push(p.y as f64);
    }

    let indices = match earcutr::earcut(&coords, &[], 2) {
        Ok(indices) => indices,
        Err(e) => {
            trace!("earcut failed: {:?}", e);
            return None;
        }
    };
    if indices.is_empty() {
        return None;
    }

    let mut mesh = Mesh::default();
    for p in points {
        mesh.colored_vertex(*p, color);
    }
    for tri in indices.chunks_exact(3) {
        mesh.add_triangle(tri[0] as u32, tri[1] as u32, tri[2] as u32);
    }
    Some(mesh)
}

impl App {
    pub fn canvas(&mut self, ui: &mut egui::Ui) {
        let Some(texture) = self.texture.as_ref() else {
            ui.label("No image");
            return;
        };

        let image_size = texture.size_vec2();
        let transform = ImageTransform::fit(ui.cursor().min, image_size, ui.available_size());
        let size = image_size * transform.scale;

        let img = egui::Image::from_texture((texture.id(), size))
            .fit_to_exact_size(size)
            .max_size(size)
            .sense(egui::Sense::click());

        let resp = ui.add(img);
        let transform = ImageTransform {
            min: resp.rect.min,
            ..transform
        };

        if resp.clicked() {
            if let Some(pos) = resp.interact_pointer_pos() {
                let p = transform.to_image(pos);
                trace!("click at ({:.1}, {:.1})", p.x, p.y);
                self.session.add_point(p);
            }
        }

        /// right click closes the object
        if resp.secondary_clicked() {
            self.session.submit_polygon();
        }

        /// scroll to change image
        if let Some(step) = scroll_step(ui, &resp) {
            self.change_image(step);
        }

        let painter = ui.painter_at(resp.rect);
        for record in self.session.current_polygons() {
            paint_record(&painter, &transform, record, self.display.fill);
        }
    }
}

fn paint_record(painter: &egui::Painter, transform: &ImageTransform, record: &PolygonRecord, fill: f32) {
    if record.is_empty() {
        return;
    }

    let rgb = label_color(record.label_index);
    let color = color32(rgb, 1.);
    let points: Vec<Pos2> = record.points.iter().map(|p| transform.to_screen(p)).collect();

    if fill > 0. {
        if let Some(mesh) = polygon_mesh(&points, color32(rgb, fill)) {
            painter.add(Shape::mesh(mesh));
        }
    }

    if points.len() > 1 {
        painter.add(Shape::line(points.clone(), Stroke::new(1.5, color)));
    }

    for p in &points {
        painter.circle_filled(*p, POINT_RADIUS, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_mesh_square() {
        let pts = vec![
            Pos2::new(0., 0.),
            Pos2::new(10., 0.),
            Pos2::new(10., 10.),
            Pos2::new(0., 10.),
        ];
        let mesh = polygon_mesh(&pts, Color32::RED).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);

        assert!(polygon_mesh(&pts[..2], Color32::RED).is_none());
    }

    #[test]
    fn test_transform_roundtrip() {
        let t = ImageTransform::fit(Pos2::new(10., 20.), Vec2::new(100., 50.), Vec2::new(400., 400.));
        assert_eq!(t.scale, 4.);

        let p = t.to_image(Pos2::new(10. + 4. * 12.5, 20. + 4. * 3.5));
        assert_eq!((p.x, p.y), (12., 3.));
        assert_eq!(t.to_screen(&p), Pos2::new(60., 34.));
    }
}
