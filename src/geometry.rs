use bevy::{
    color::Color,
    math::{Vec2, Vec3},
    pbr::StandardMaterial,
    prelude::{Mesh, Transform},
};
use bevy_camera::primitives::Aabb;
use bevy_log::{debug, warn};

use crate::{
    bounds::bounds_from_pairs,
    font::Font,
    input::TextState,
    tessellation::ExtrudedGlyph,
};

/// Sizes and colors used to turn text into extruded geometry.
#[derive(Clone, Debug)]
pub struct TextGeometryOptions {
    /// Em size in world units.
    pub size: f32,
    /// Extrusion depth along Z.
    pub depth: f32,
    /// Distance between consecutive line origins.
    pub line_height: f32,
    /// Maximum distance between a curve and its flattened approximation.
    pub tolerance: f32,
    pub face_color: Color,
    pub side_color: Color,
}

impl Default for TextGeometryOptions {
    fn default() -> Self {
        Self {
            size: 20.0,
            depth: 100.0,
            line_height: 30.0,
            tolerance: 0.2,
            face_color: Color::srgb_u8(255, 120, 120),
            side_color: Color::srgb_u8(255, 0, 0),
        }
    }
}

/// The fixed material pair of a line: front/back caps and extrusion walls.
#[derive(Clone, Debug)]
pub struct LineMaterials {
    pub face: StandardMaterial,
    pub side: StandardMaterial,
}

impl LineMaterials {
    fn unlit(color: Color) -> StandardMaterial {
        StandardMaterial {
            base_color: color,
            unlit: true,
            ..Default::default()
        }
    }

    pub fn from_options(options: &TextGeometryOptions) -> Self {
        Self {
            face: Self::unlit(options.face_color),
            side: Self::unlit(options.side_color),
        }
    }
}

/// One extruded line of text, centered on its own origin.
#[derive(Debug)]
pub struct LineGeometry {
    pub index: usize,
    pub text: String,
    /// Places the line in the group: line `i` sits at `y = -i * line_height`.
    pub transform: Transform,
    pub faces: Mesh,
    pub sides: Mesh,
    pub materials: LineMaterials,
    /// Bounds in line space; `None` when the line produced no triangles.
    pub local_bounds: Option<Aabb>,
}

impl LineGeometry {
    pub fn is_empty(&self) -> bool {
        self.local_bounds.is_none()
    }
}

/// A freshly built, not yet attached text object: one [`LineGeometry`] per line.
#[derive(Debug)]
pub struct TextGeometryGroup {
    lines: Vec<LineGeometry>,
    /// Identity after [`GeometryBuilder::build`]; the fit is applied afterwards.
    pub transform: Transform,
}

impl TextGeometryGroup {
    pub fn lines(&self) -> &[LineGeometry] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<LineGeometry> {
        self.lines
    }

    /// Bounds of every line in group space (before the group transform).
    pub fn bounds(&self) -> Option<Aabb> {
        bounds_from_pairs(
            self.lines
                .iter()
                .filter_map(|line| line.local_bounds.as_ref().map(|b| (&line.transform, b))),
        )
    }

    /// Meshes that will be created when the group is attached (two per non-empty line).
    pub fn mesh_count(&self) -> usize {
        self.lines.iter().filter(|line| !line.is_empty()).count() * 2
    }

    pub fn material_count(&self) -> usize {
        self.mesh_count()
    }
}

/// Turns a text snapshot into extruded, per-line centered geometry.
#[derive(Clone, Debug, Default)]
pub struct GeometryBuilder {
    options: TextGeometryOptions,
}

impl GeometryBuilder {
    pub fn new(options: TextGeometryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TextGeometryOptions {
        &self.options
    }

    /// Returns `None` when there is nothing to show: blank text or no font yet.
    pub fn build(&self, text: &TextState, font: Option<&Font>) -> Option<TextGeometryGroup> {
        if text.is_blank() {
            debug!("Text is blank; no geometry to build");
            return None;
        }
        let Some(font) = font else {
            debug!("Font not ready; skipping geometry build");
            return None;
        };

        let lines = text
            .lines()
            .enumerate()
            .map(|(index, line)| self.build_line(index, line, font))
            .collect();
        Some(TextGeometryGroup {
            lines,
            transform: Transform::IDENTITY,
        })
    }

    fn build_line(&self, index: usize, line: &str, font: &Font) -> LineGeometry {
        let options = &self.options;
        let mut extruded = ExtrudedGlyph::default();

        let units_per_em = font.units_per_em();
        if units_per_em == 0 {
            warn!("Font has units_per_em == 0; line {} stays empty", index);
        } else {
            let scale = options.size as f64 / units_per_em as f64;
            let mut cursor = 0.0f32;
            for c in line.chars() {
                let Some(info) = font.glyph(c) else {
                    continue;
                };
                if let Some(glyph) = font.extrude_glyph(
                    info.id,
                    c,
                    Vec2::new(cursor, 0.0),
                    scale,
                    options.depth,
                    options.tolerance,
                ) {
                    extruded.append(glyph);
                }
                cursor += info.advance.x * options.size;
            }
        }

        let extent = match (extruded.faces.extent(), extruded.sides.extent()) {
            (Some((a_min, a_max)), Some((b_min, b_max))) => {
                Some((a_min.min(b_min), a_max.max(b_max)))
            }
            (Some(e), None) | (None, Some(e)) => Some(e),
            (None, None) => None,
        };

        // Center this line on its own origin, on all three axes.
        let local_bounds = extent.map(|(min, max)| {
            let center = (min + max) * 0.5;
            extruded.faces.translate(-center);
            extruded.sides.translate(-center);
            Aabb::from_min_max(min - center, max - center)
        });

        debug!(
            "Built line {} {:?}: {} face triangles, {} side triangles",
            index,
            line,
            extruded.faces.triangle_count(),
            extruded.sides.triangle_count()
        );

        LineGeometry {
            index,
            text: line.to_string(),
            transform: Transform::from_translation(Vec3::new(
                0.0,
                -(index as f32) * options.line_height,
                0.0,
            )),
            faces: extruded.faces.into_mesh(),
            sides: extruded.sides.into_mesh(),
            materials: LineMaterials::from_options(options),
            local_bounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy_camera::primitives::MeshAabb;

    use super::*;
    use crate::bounds;
    use crate::fit::{CameraState, fit};

    fn test_font() -> Font {
        let bytes = include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/assets/fonts/DejaVuSans.ttf"
        ));
        Font::from_bytes(bytes.to_vec()).expect("bundled font should parse")
    }

    #[test]
    fn blank_text_or_missing_font_builds_nothing() {
        let font = test_font();
        let builder = GeometryBuilder::default();
        assert!(builder.build(&TextState::from(""), Some(&font)).is_none());
        assert!(builder.build(&TextState::from(" "), Some(&font)).is_none());
        assert!(builder.build(&TextState::from("\n \n"), Some(&font)).is_none());
        assert!(builder.build(&TextState::from("A"), None).is_none());
    }

    #[test]
    fn lines_stack_downwards_and_center_individually() {
        let font = test_font();
        let builder = GeometryBuilder::default();
        let group = builder.build(&TextState::from("AB\nC"), Some(&font)).unwrap();

        assert_eq!(group.lines().len(), 2);
        assert_eq!(group.transform, Transform::IDENTITY);
        assert_eq!(group.lines()[0].transform.translation, Vec3::ZERO);
        assert_eq!(
            group.lines()[1].transform.translation,
            Vec3::new(0.0, -30.0, 0.0)
        );
        for line in group.lines() {
            let local = line.local_bounds.expect("line has geometry");
            let center = bounds::center(&local);
            assert!(center.abs_diff_eq(Vec3::ZERO, 1e-3), "{center:?}");
            assert!(bounds::size(&local).x > 0.0);
        }
        // "AB" is wider than "C".
        let width = |i: usize| bounds::size(&group.lines()[i].local_bounds.unwrap()).x;
        assert!(width(0) > width(1));
        assert_eq!(group.mesh_count(), 4);
        assert_eq!(group.material_count(), 4);
    }

    #[test]
    fn extrusion_depth_and_size_follow_options() {
        let font = test_font();
        let builder = GeometryBuilder::default();
        let group = builder.build(&TextState::from("H"), Some(&font)).unwrap();
        let size = bounds::size(&group.bounds().unwrap());
        assert!((size.z - 100.0).abs() < 1e-3, "{size:?}");
        // Cap height of a 20 unit em is a bit under 20.
        assert!(size.y > 10.0 && size.y < 20.0, "{size:?}");
    }

    #[test]
    fn mesh_aabb_matches_line_bounds() {
        let font = test_font();
        let builder = GeometryBuilder::default();
        let group = builder.build(&TextState::from("Wg"), Some(&font)).unwrap();
        let line = &group.lines()[0];
        let local = line.local_bounds.unwrap();
        let faces = line.faces.compute_aabb().expect("faces have positions");
        let sides = line.sides.compute_aabb().expect("sides have positions");
        let min = Vec3::from(faces.min()).min(Vec3::from(sides.min()));
        let max = Vec3::from(faces.max()).max(Vec3::from(sides.max()));
        assert!(min.abs_diff_eq(Vec3::from(local.min()), 1e-3));
        assert!(max.abs_diff_eq(Vec3::from(local.max()), 1e-3));
    }

    #[test]
    fn whitespace_line_keeps_its_slot() {
        let font = test_font();
        let builder = GeometryBuilder::default();
        let group = builder.build(&TextState::from("A\n \nB"), Some(&font)).unwrap();
        assert_eq!(group.lines().len(), 3);
        assert!(group.lines()[1].is_empty());
        assert_eq!(
            group.lines()[2].transform.translation,
            Vec3::new(0.0, -60.0, 0.0)
        );
        assert_eq!(group.mesh_count(), 4);
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let font = test_font();
        let builder = GeometryBuilder::default();
        let camera = CameraState::from_degrees(75.0, 16.0 / 9.0, 1000.0);
        let text = TextState::from("Hello\nworld");
        let first = builder.build(&text, Some(&font)).unwrap();
        let second = builder.build(&text, Some(&font)).unwrap();
        assert_eq!(first.bounds(), second.bounds());
        assert_eq!(fit(&first, &camera, 0.9), fit(&second, &camera, 0.9));
    }

    #[test]
    fn characters_missing_from_the_font_are_skipped() {
        let font = test_font();
        let builder = GeometryBuilder::default();
        // Private use area code point; DejaVu Sans has no glyph for it.
        let group = builder
            .build(&TextState::from("A\u{F8FF}"), Some(&font))
            .unwrap();
        assert!(!group.lines()[0].is_empty());
    }
}
