use std::sync::{Arc, OnceLock};

use bevy::{
    asset::{AssetLoader, Assets, Handle, LoadContext, io::Reader},
    math::Vec2,
    prelude::{App, Asset, AssetApp, Plugin, Res, Resource, Update},
    reflect::TypePath,
};
use bevy_log::{debug, error, info, warn};
use fdsm::{
    bezier::{Point, Segment},
    shape::{Contour, Shape},
};
pub use owned_ttf_parser::GlyphId;
use owned_ttf_parser::{AsFaceRef, OutlineBuilder, Rect as TtfRect};
use thiserror::Error;

/// Em-normalized metrics of a single glyph.
#[derive(Debug, Clone)]
pub struct GlyphInfo {
    pub id: GlyphId,
    pub advance: Vec2,
    pub offset: Vec2,
    pub size: Vec2,
}

#[derive(Asset, TypePath, Clone)]
pub struct Font {
    pub(crate) face: Arc<owned_ttf_parser::OwnedFace>,
}

impl Font {
    pub fn from(face: owned_ttf_parser::OwnedFace) -> Self {
        let font = Self {
            face: Arc::new(face),
        };
        if let Some(name) = font.name() {
            debug!("Font asset instantiated from parsed TTF face: {}", name);
        } else {
            warn!("Font asset instantiated from parsed TTF face with unknown name");
        }
        font
    }

    /// Parses a font from raw TTF/OTF bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FontLoaderError> {
        let face = owned_ttf_parser::OwnedFace::from_vec(bytes, 0)?;
        Ok(Self::from(face))
    }

    /// Returns the font family name if available, for debugging purposes.
    pub fn name(&self) -> Option<String> {
        let face = self.face.as_ref().as_face_ref();
        // Family name (name ID 1) from the Windows platform table.
        for name in face.names() {
            if name.name_id == 1
                && name.platform_id == owned_ttf_parser::PlatformId::Windows
                && name.encoding_id == 1
            {
                if let Some(name_str) = name.to_string() {
                    return Some(name_str);
                }
                if let Ok(name_str) = String::from_utf8(name.name.to_vec()) {
                    return Some(name_str);
                }
            }
        }
        None
    }

    pub fn units_per_em(&self) -> u16 {
        self.face.as_ref().as_face_ref().units_per_em()
    }

    /// Get information about a glyph given its Unicode code point.
    pub fn glyph(&self, code_point: char) -> Option<GlyphInfo> {
        let face = self.face.as_ref().as_face_ref();
        let Some(id) = face.glyph_index(code_point) else {
            warn!("Glyph not found for code point: {:?}", code_point);
            return None;
        };

        let bounds = face.glyph_bounding_box(id).unwrap_or_else(|| {
            debug!(
                "No bounding box for glyph: {:?}; using zero rect (expected for empty glyphs)",
                id
            );
            TtfRect {
                x_min: 0,
                y_min: 0,
                x_max: 0,
                y_max: 0,
            }
        });

        let units_per_em = face.units_per_em();
        if units_per_em == 0 {
            error!(
                "Font face has units_per_em == 0; cannot compute scale for glyph {:?}",
                id
            );
            return Some(GlyphInfo {
                id,
                advance: Vec2::ZERO,
                offset: Vec2::ZERO,
                size: Vec2::ZERO,
            });
        }

        let scale = 1f32 / units_per_em as f32;

        let advance = Vec2::new(
            face.glyph_hor_advance(id).unwrap_or_default() as f32,
            face.glyph_ver_advance(id).unwrap_or_default() as f32,
        ) * scale;

        let offset = Vec2::new(bounds.x_min as f32, bounds.y_min as f32) * scale;

        let size = Vec2::new(
            (bounds.x_max as f32) - (bounds.x_min as f32),
            (bounds.y_max as f32) - (bounds.y_min as f32),
        ) * scale;

        Some(GlyphInfo {
            id,
            advance,
            offset,
            size,
        })
    }

    /// Load the outline of a glyph in font units.
    pub fn load_from_face(
        face: &owned_ttf_parser::Face,
        glyph_id: GlyphId,
        code_point: char,
    ) -> Shape<Contour> {
        let mut builder = ShapeBuilder {
            shape: Shape::default(),
            start_point: None,
            last_point: None,
        };
        face.outline_glyph(glyph_id, &mut builder);
        debug!(
            "Loaded shape from face for glyph {:?} ('{}') with {} contours",
            glyph_id,
            code_point,
            builder.shape.contours.len()
        );
        builder.shape
    }
}

impl std::fmt::Debug for Font {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Font")
            .field("name", &self.name())
            .field("units_per_em", &self.units_per_em())
            .finish()
    }
}

// Borrowed from MIT Licensed https://gitlab.com/Kyarei/fdsm
#[derive(Debug)]
struct ShapeBuilder {
    shape: Shape<Contour>,
    start_point: Option<Point>,
    last_point: Option<Point>,
}

impl ShapeBuilder {
    fn push_segment(&mut self, segment: Segment) {
        if let Some(contour) = self.shape.contours.last_mut() {
            contour.segments.push(segment);
        }
    }
}

impl OutlineBuilder for ShapeBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.close();
        self.start_point = Some(Point::new(x.into(), y.into()));
        self.last_point = self.start_point;
        self.shape.contours.push(Contour::default());
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let next_point = Point::new(x.into(), y.into());
        if let Some(last) = self.last_point {
            self.push_segment(Segment::line(last, next_point));
        }
        self.last_point = Some(next_point);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let next_point = Point::new(x.into(), y.into());
        if let Some(last) = self.last_point {
            self.push_segment(Segment::quad(
                last,
                Point::new(x1.into(), y1.into()),
                next_point,
            ));
        }
        self.last_point = Some(next_point);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let next_point = Point::new(x.into(), y.into());
        if let Some(last) = self.last_point {
            self.push_segment(Segment::cubic(
                last,
                Point::new(x1.into(), y1.into()),
                Point::new(x2.into(), y2.into()),
                next_point,
            ));
        }
        self.last_point = Some(next_point);
    }

    fn close(&mut self) {
        if let (Some(last), Some(start)) = (self.last_point, self.start_point)
            && last != start
        {
            self.push_segment(Segment::line(last, start));
        }
        self.last_point = self.start_point;
    }
}

#[derive(Debug, Error)]
pub enum FontProviderError {
    #[error("font provider is already ready; the font slot is write-once")]
    AlreadyReady,
}

/// Holds the single font used for text geometry.
///
/// The slot is written exactly once, when the asset finishes loading. Every
/// rebuild reads it and must tolerate it still being empty.
#[derive(Resource, Default)]
pub struct FontProvider {
    source: Option<Handle<Font>>,
    slot: OnceLock<Font>,
}

impl FontProvider {
    /// A provider waiting for `handle` to finish loading.
    pub fn pending(handle: Handle<Font>) -> Self {
        Self {
            source: Some(handle),
            slot: OnceLock::new(),
        }
    }

    /// A provider that is ready from the start.
    pub fn ready(font: Font) -> Self {
        let slot = OnceLock::new();
        let _ = slot.set(font);
        Self { source: None, slot }
    }

    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn get(&self) -> Option<&Font> {
        self.slot.get()
    }

    pub fn source(&self) -> Option<&Handle<Font>> {
        self.source.as_ref()
    }

    pub fn fill(&self, font: Font) -> Result<(), FontProviderError> {
        self.slot
            .set(font)
            .map_err(|_| FontProviderError::AlreadyReady)
    }
}

impl std::fmt::Debug for FontProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontProvider")
            .field("source", &self.source)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Fills the [`FontProvider`] once its source asset is available.
pub fn populate_font_provider_system(provider: Res<FontProvider>, fonts: Res<Assets<Font>>) {
    if provider.is_ready() {
        return;
    }
    let Some(font) = provider.source().and_then(|handle| fonts.get(handle)) else {
        return;
    };
    match provider.fill(font.clone()) {
        Ok(()) => info!(
            "Font {:?} is ready for text geometry",
            font.name().unwrap_or_default()
        ),
        Err(err) => warn!("Ignoring late font load: {}", err),
    }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FontLoaderError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    FontInvalid(#[from] owned_ttf_parser::FaceParsingError),
}

#[derive(Default)]
pub struct FontLoader;

impl AssetLoader for FontLoader {
    type Asset = Font;
    type Settings = ();
    type Error = FontLoaderError;
    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        Font::from_bytes(bytes)
    }

    fn extensions(&self) -> &[&str] {
        &["ttf", "otf"]
    }
}

pub struct FontPlugin;

impl Plugin for FontPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<Font>()
            .init_asset_loader::<FontLoader>()
            .init_resource::<FontProvider>()
            .add_systems(Update, populate_font_provider_system);
    }
}

