use bevy::{
    prelude::{MessageReader, Projection, Query, ResMut, Resource, Window, With},
    window::WindowResized,
};
use bevy_log::{debug, error};
use thiserror::Error;

use crate::pipeline::FitCamera;

#[derive(Debug, Error, PartialEq)]
pub enum ViewportError {
    #[error("viewport width must be a positive number, got {0}")]
    InvalidWidth(f32),
    #[error("viewport height must be a positive number, got {0}")]
    InvalidHeight(f32),
    #[error("pixel ratio must be a positive number, got {0}")]
    InvalidPixelRatio(f32),
}

/// A validated drawing surface size in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    width: f32,
    height: f32,
    pixel_ratio: f32,
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

impl Viewport {
    /// Rejects zero, negative or non-finite sizes: a degenerate viewport would
    /// leave the camera with an unusable aspect ratio.
    pub fn new(width: f32, height: f32, pixel_ratio: f32) -> Result<Self, ViewportError> {
        if !positive(width) {
            return Err(ViewportError::InvalidWidth(width));
        }
        if !positive(height) {
            return Err(ViewportError::InvalidHeight(height));
        }
        if !positive(pixel_ratio) {
            return Err(ViewportError::InvalidPixelRatio(pixel_ratio));
        }
        Ok(Self {
            width,
            height,
            pixel_ratio,
        })
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }

    /// Size in physical pixels, rounded to whole pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        (
            (self.width * self.pixel_ratio).round() as u32,
            (self.height * self.pixel_ratio).round() as u32,
        )
    }

    /// Point a perspective projection at this viewport. Other projections are left alone.
    pub fn apply_to(&self, projection: &mut Projection) {
        if let Projection::Perspective(perspective) = projection {
            perspective.aspect_ratio = self.aspect_ratio();
        }
    }
}

/// Last viewport accepted by [`apply_viewport_resize_system`].
#[derive(Resource, Debug, Default)]
pub struct ViewportState {
    pub current: Option<Viewport>,
}

/// Keeps the fit camera's aspect ratio in step with the window.
///
/// The text group is not refitted here; the new aspect ratio is picked up by
/// the next settled text change.
pub fn apply_viewport_resize_system(
    mut resized: MessageReader<WindowResized>,
    windows: Query<&Window>,
    mut cameras: Query<&mut Projection, With<FitCamera>>,
    mut state: ResMut<ViewportState>,
) {
    for event in resized.read() {
        let pixel_ratio = windows
            .get(event.window)
            .map(|window| window.scale_factor())
            .unwrap_or(1.0);
        let viewport = match Viewport::new(event.width, event.height, pixel_ratio) {
            Ok(viewport) => viewport,
            Err(err) => {
                error!("Ignoring resize of window {:?}: {}", event.window, err);
                continue;
            }
        };

        let (physical_width, physical_height) = viewport.physical_size();
        debug!(
            "Viewport resized to {}x{} ({}x{} physical, pixel ratio {}), aspect {}",
            viewport.width(),
            viewport.height(),
            physical_width,
            physical_height,
            viewport.pixel_ratio(),
            viewport.aspect_ratio()
        );
        for mut projection in cameras.iter_mut() {
            viewport.apply_to(&mut projection);
        }
        state.current = Some(viewport);
    }
}
