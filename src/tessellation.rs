use bevy::{
    asset::RenderAssetUsages,
    math::{Vec2, Vec3},
    prelude::{Mesh, debug, error},
};
use bevy_mesh::{Indices, PrimitiveTopology};
use fdsm::{bezier::Order, transform::Transform};
use lyon::{
    math::point as lyon_point,
    path::{Path, PathEvent, iterator::PathIterator},
    tessellation::{BuffersBuilder, FillOptions, FillTessellator, FillVertex, VertexBuffers},
};
use nalgebra::{Affine2, Similarity2, Vector2};
use owned_ttf_parser::AsFaceRef;

use crate::font::{Font, GlyphId};

/// Positions, normals and indices for one material slot of an extruded glyph run.
#[derive(Clone, Debug, Default)]
pub struct MeshBuffers {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Appends an indexed triangle list, flipping any triangle whose winding
    /// disagrees with `normal` so it stays front-facing.
    pub fn push_indexed(&mut self, vertices: &[Vec3], indices: &[u32], normal: Vec3) {
        let base = self.positions.len() as u32;
        self.positions.extend(vertices.iter().map(|v| v.to_array()));
        self.normals
            .extend(std::iter::repeat_n(normal.to_array(), vertices.len()));
        for tri in indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]];
            let (pa, pb, pc) = (
                vertices[a as usize],
                vertices[b as usize],
                vertices[c as usize],
            );
            if (pb - pa).cross(pc - pa).dot(normal) < 0.0 {
                self.indices.extend([base + a, base + c, base + b]);
            } else {
                self.indices.extend([base + a, base + b, base + c]);
            }
        }
    }

    /// Appends a planar quad `a b c d` (in order around its edge).
    pub fn push_quad(&mut self, quad: [Vec3; 4], normal: Vec3) {
        self.push_indexed(&quad, &[0, 1, 2, 0, 2, 3], normal);
    }

    pub fn append(&mut self, mut other: MeshBuffers) {
        let base = self.positions.len() as u32;
        self.positions.append(&mut other.positions);
        self.normals.append(&mut other.normals);
        self.indices.extend(other.indices.into_iter().map(|i| i + base));
    }

    pub fn translate(&mut self, offset: Vec3) {
        for p in &mut self.positions {
            *p = (Vec3::from_array(*p) + offset).to_array();
        }
    }

    /// Minimum and maximum corner over all positions.
    pub fn extent(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.positions.iter().map(|p| Vec3::from_array(*p));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    pub fn into_mesh(self) -> Mesh {
        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
        );
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions);
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals);
        mesh.insert_indices(Indices::U32(self.indices));
        mesh
    }
}

/// The two material slots of an extruded glyph: front/back caps and side walls.
#[derive(Clone, Debug, Default)]
pub struct ExtrudedGlyph {
    pub faces: MeshBuffers,
    pub sides: MeshBuffers,
}

impl ExtrudedGlyph {
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.sides.is_empty()
    }

    pub fn append(&mut self, other: ExtrudedGlyph) {
        self.faces.append(other.faces);
        self.sides.append(other.sides);
    }
}

impl Font {
    /// Build the outline of a glyph as a lyon path, scaled from font units by
    /// `scale` and moved so the glyph origin sits at `origin`.
    ///
    /// Returns `None` for glyphs without an outline (spaces and the like).
    pub fn glyph_outline_path(
        &self,
        glyph_id: GlyphId,
        code_point: char,
        origin: Vec2,
        scale: f64,
    ) -> Option<Path> {
        let face = self.face.as_ref().as_face_ref();
        face.glyph_bounding_box(glyph_id)?;

        let mut shape = Self::load_from_face(face, glyph_id, code_point);
        let placement = nalgebra::convert::<_, Affine2<f64>>(Similarity2::new(
            Vector2::new(origin.x as f64, origin.y as f64),
            0.0,
            scale,
        ));
        shape.transform(&placement);

        // Each contour becomes a closed lyon sub-path.
        let mut glyph_outline_builder = Path::builder();
        for contour in &shape.contours {
            let Some(first_seg) = contour.segments.first() else {
                continue;
            };

            let start = first_seg.start();
            glyph_outline_builder.begin(lyon_point(start.x as f32, start.y as f32));

            for segment in &contour.segments {
                match segment.order() {
                    Order::Linear => {
                        let end = segment.end();
                        glyph_outline_builder.line_to(lyon_point(end.x as f32, end.y as f32));
                    }
                    Order::Quadratic => {
                        let ctrl = segment.control_point(1);
                        let end = segment.end();
                        glyph_outline_builder.quadratic_bezier_to(
                            lyon_point(ctrl.x as f32, ctrl.y as f32),
                            lyon_point(end.x as f32, end.y as f32),
                        );
                    }
                    Order::Cubic => {
                        let ctrl1 = segment.control_point(1);
                        let ctrl2 = segment.control_point(2);
                        let end = segment.end();
                        glyph_outline_builder.cubic_bezier_to(
                            lyon_point(ctrl1.x as f32, ctrl1.y as f32),
                            lyon_point(ctrl2.x as f32, ctrl2.y as f32),
                            lyon_point(end.x as f32, end.y as f32),
                        );
                    }
                }
            }

            glyph_outline_builder.close();
        }

        let glyph_outline = glyph_outline_builder.build();
        if glyph_outline.iter().next().is_none() {
            debug!(
                "Glyph {:?} {:?} has no contours; nothing to extrude",
                code_point, glyph_id
            );
            return None;
        }
        Some(glyph_outline)
    }

    /// Extrude a single glyph placed at `origin` along +Z by `depth`.
    pub fn extrude_glyph(
        &self,
        glyph_id: GlyphId,
        code_point: char,
        origin: Vec2,
        scale: f64,
        depth: f32,
        tolerance: f32,
    ) -> Option<ExtrudedGlyph> {
        let outline = self.glyph_outline_path(glyph_id, code_point, origin, scale)?;
        let extruded = extrude_path(&outline, depth, tolerance);
        if extruded.is_none() {
            error!(
                "Tessellation failed for glyph {:?} {:?}; it will be missing from the line",
                code_point, glyph_id
            );
        }
        extruded
    }
}

/// Sweep a closed 2D outline from z = 0 to z = `depth`.
///
/// Caps are fill-tessellated with the non-zero rule; side walls come from the
/// flattened contours with outward-facing normals.
pub fn extrude_path(outline: &Path, depth: f32, tolerance: f32) -> Option<ExtrudedGlyph> {
    let mut geometry: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    let mut fill_tessellator = FillTessellator::new();
    let fill_options = FillOptions::non_zero().with_tolerance(tolerance);

    if let Err(err) = fill_tessellator.tessellate_path(
        outline,
        &fill_options,
        &mut BuffersBuilder::new(&mut geometry, |v: FillVertex| v.position().to_array()),
    ) {
        debug!("Fill tessellation error: {:?}", err);
        return None;
    }

    let mut extruded = ExtrudedGlyph::default();
    let front: Vec<Vec3> = geometry
        .vertices
        .iter()
        .map(|[x, y]| Vec3::new(*x, *y, depth))
        .collect();
    let back: Vec<Vec3> = geometry
        .vertices
        .iter()
        .map(|[x, y]| Vec3::new(*x, *y, 0.0))
        .collect();
    extruded
        .faces
        .push_indexed(&front, &geometry.indices, Vec3::Z);
    extruded
        .faces
        .push_indexed(&back, &geometry.indices, Vec3::NEG_Z);

    let contours = flatten_contours(outline, tolerance);
    // TrueType outlines wind clockwise, CFF counter-clockwise; the outer
    // contours dominate the summed area either way.
    let clockwise = contours.iter().map(|c| signed_area(c)).sum::<f32>() < 0.0;
    for contour in &contours {
        for (i, &p) in contour.iter().enumerate() {
            let q = contour[(i + 1) % contour.len()];
            let edge = q - p;
            if edge.length_squared() <= f32::EPSILON {
                continue;
            }
            let outward = if clockwise {
                Vec2::new(-edge.y, edge.x)
            } else {
                Vec2::new(edge.y, -edge.x)
            }
            .normalize();
            extruded.sides.push_quad(
                [
                    p.extend(0.0),
                    q.extend(0.0),
                    q.extend(depth),
                    p.extend(depth),
                ],
                outward.extend(0.0),
            );
        }
    }

    Some(extruded)
}

/// Flatten every sub-path into a closed polyline (closing point not repeated).
fn flatten_contours(outline: &Path, tolerance: f32) -> Vec<Vec<Vec2>> {
    let mut contours = Vec::new();
    let mut current: Vec<Vec2> = Vec::new();
    for event in outline.iter().flattened(tolerance) {
        match event {
            PathEvent::Begin { at } => {
                current.clear();
                current.push(Vec2::new(at.x, at.y));
            }
            PathEvent::Line { to, .. } => current.push(Vec2::new(to.x, to.y)),
            PathEvent::End { .. } => {
                if current.len() > 1 && current.first() == current.last() {
                    current.pop();
                }
                if current.len() >= 3 {
                    contours.push(std::mem::take(&mut current));
                }
                current.clear();
            }
            // Curves never survive flattening.
            PathEvent::Quadratic { .. } | PathEvent::Cubic { .. } => {}
        }
    }
    contours
}

/// Shoelace area; positive for counter-clockwise contours (y up).
fn signed_area(contour: &[Vec2]) -> f32 {
    let n = contour.len();
    (0..n)
        .map(|i| {
            let (a, b) = (contour[i], contour[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f32>()
        * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(clockwise: bool) -> Path {
        let mut builder = Path::builder();
        let corners = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let ordered: Vec<_> = if clockwise {
            corners.iter().rev().copied().collect()
        } else {
            corners.to_vec()
        };
        builder.begin(lyon_point(ordered[0].0, ordered[0].1));
        for (x, y) in &ordered[1..] {
            builder.line_to(lyon_point(*x, *y));
        }
        builder.close();
        builder.build()
    }

    fn assert_sides_face_outward(extruded: &ExtrudedGlyph) {
        let center = Vec3::new(5.0, 5.0, 2.0);
        for tri in extruded.sides.indices.chunks_exact(3) {
            let n = Vec3::from_array(extruded.sides.normals[tri[0] as usize]);
            let p = Vec3::from_array(extruded.sides.positions[tri[0] as usize]);
            assert!((p - center).dot(n) > 0.0, "side normal {n:?} at {p:?} points inward");
        }
    }

    #[test]
    fn square_extrudes_into_a_closed_box() {
        for clockwise in [false, true] {
            let extruded = extrude_path(&square(clockwise), 4.0, 0.1).unwrap();
            // At least two triangles per cap, two caps.
            assert!(extruded.faces.triangle_count() >= 4);
            // Two triangles per wall, four walls.
            assert_eq!(extruded.sides.triangle_count(), 8);
            assert_sides_face_outward(&extruded);

            let (min, max) = extruded.faces.extent().unwrap();
            assert!(min.abs_diff_eq(Vec3::ZERO, 1e-4), "{min:?}");
            assert!(max.abs_diff_eq(Vec3::new(10.0, 10.0, 4.0), 1e-4), "{max:?}");
        }
    }

    #[test]
    fn triangles_wind_with_their_normals() {
        let extruded = extrude_path(&square(true), 4.0, 0.1).unwrap();
        for buffers in [&extruded.faces, &extruded.sides] {
            for tri in buffers.indices.chunks_exact(3) {
                let [a, b, c] =
                    [0, 1, 2].map(|k| Vec3::from_array(buffers.positions[tri[k] as usize]));
                let n = Vec3::from_array(buffers.normals[tri[0] as usize]);
                assert!((b - a).cross(c - a).dot(n) > 0.0);
            }
        }
    }

    #[test]
    fn append_offsets_indices() {
        let mut a = extrude_path(&square(false), 1.0, 0.1).unwrap();
        let b = extrude_path(&square(false), 1.0, 0.1).unwrap();
        let vertex_count = a.faces.positions.len() as u32;
        a.append(b);
        assert!(a.faces.indices.iter().any(|&i| i >= vertex_count));
        assert!(
            a.faces
                .indices
                .iter()
                .all(|&i| (i as usize) < a.faces.positions.len())
        );
    }

    #[test]
    fn signed_area_orientation() {
        let ccw = [Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y];
        assert!((signed_area(&ccw) - 1.0).abs() < 1e-6);
        let cw: Vec<Vec2> = ccw.iter().rev().copied().collect();
        assert!((signed_area(&cw) + 1.0).abs() < 1e-6);
    }
}
