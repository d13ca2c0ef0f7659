use bevy::prelude::{Projection, Transform, Vec3};
use bevy_camera::primitives::Aabb;
use bevy_log::debug;

use crate::bounds;
use crate::geometry::TextGeometryGroup;

/// Fraction of the visible frustum the fitted text may occupy.
pub const DEFAULT_FIT_MARGIN: f32 = 0.9;

/// The camera parameters the fit depends on. Read fresh on every rebuild.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect_ratio: f32,
    /// Distance from the camera to the text plane along the view axis.
    pub distance: f32,
}

impl CameraState {
    pub fn new(fov: f32, aspect_ratio: f32, distance: f32) -> Self {
        Self {
            fov,
            aspect_ratio,
            distance,
        }
    }

    pub fn from_degrees(fov_degrees: f32, aspect_ratio: f32, distance: f32) -> Self {
        Self::new(fov_degrees.to_radians(), aspect_ratio, distance)
    }

    /// Reads a perspective camera looking towards `target`. Orthographic and
    /// custom projections have no field of view and yield `None`.
    pub fn from_projection(
        projection: &Projection,
        camera: &Transform,
        target: Vec3,
    ) -> Option<Self> {
        let Projection::Perspective(perspective) = projection else {
            return None;
        };
        let distance = (target - camera.translation).dot(*camera.forward());
        Some(Self::new(perspective.fov, perspective.aspect_ratio, distance))
    }

    pub fn visible_height(&self) -> f32 {
        2.0 * (self.fov / 2.0).tan() * self.distance
    }

    pub fn visible_width(&self) -> f32 {
        self.visible_height() * self.aspect_ratio
    }
}

/// Uniform scale and translation that fit a group into the view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewFit {
    pub scale: f32,
    pub translation: Vec3,
    /// Scale that would make the width exactly fill the margin, if the width is non-zero.
    pub width_scale: Option<f32>,
    pub height_scale: Option<f32>,
}

impl ViewFit {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        translation: Vec3::ZERO,
        width_scale: None,
        height_scale: None,
    };

    pub fn apply(&self, transform: &mut Transform) {
        transform.scale = Vec3::splat(self.scale);
        transform.translation = self.translation;
    }

    pub fn to_transform(&self) -> Transform {
        let mut transform = Transform::IDENTITY;
        self.apply(&mut transform);
        transform
    }
}

/// A candidate only exists for an axis with extent; a zero-size axis puts no
/// constraint on the scale.
fn axis_candidate(visible: f32, extent: f32, margin: f32) -> Option<f32> {
    if extent <= f32::EPSILON {
        return None;
    }
    let candidate = visible * margin / extent;
    candidate.is_finite().then_some(candidate)
}

/// Fit `bounds` into `margin` of the camera's visible extents at its distance,
/// keeping the aspect ratio, and move the box center to the origin.
pub fn fit_bounds(bounds: Option<&Aabb>, camera: &CameraState, margin: f32) -> ViewFit {
    let Some(bounds) = bounds else {
        return ViewFit::IDENTITY;
    };
    let size = bounds::size(bounds);
    let center = bounds::center(bounds);

    let width_scale = axis_candidate(camera.visible_width(), size.x, margin);
    let height_scale = axis_candidate(camera.visible_height(), size.y, margin);
    let scale = match (width_scale, height_scale) {
        (Some(x), Some(y)) => x.min(y),
        (Some(s), None) | (None, Some(s)) => s,
        (None, None) => 1.0,
    };

    let translation = Vec3::new(-center.x * scale, -center.y * scale, 0.0);
    debug!(
        "Fit size={:?} center={:?} into {}x{} -> scale={} (width {:?}, height {:?})",
        size,
        center,
        camera.visible_width(),
        camera.visible_height(),
        scale,
        width_scale,
        height_scale
    );
    ViewFit {
        scale,
        translation,
        width_scale,
        height_scale,
    }
}

pub fn fit(group: &TextGeometryGroup, camera: &CameraState, margin: f32) -> ViewFit {
    fit_bounds(group.bounds().as_ref(), camera, margin)
}
