use bevy::prelude::*;
use bevy_camera::primitives::Aabb;

/// Enclose a set of local-space boxes after moving each one by its transform.
/// Returns `None` if the iterator is empty.
pub fn bounds_from_pairs<'a, I>(pairs: I) -> Option<Aabb>
where
    I: IntoIterator<Item = (&'a Transform, &'a Aabb)>,
{
    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for (transform, aabb) in pairs {
        let center: Vec3 = Vec3::from(aabb.center);
        let half: Vec3 = Vec3::from(aabb.half_extents);
        for &sx in &[-1.0f32, 1.0f32] {
            for &sy in &[-1.0f32, 1.0f32] {
                for &sz in &[-1.0f32, 1.0f32] {
                    let local_corner = center + Vec3::new(sx * half.x, sy * half.y, sz * half.z);
                    let corner = transform.transform_point(local_corner);
                    min = min.min(corner);
                    max = max.max(corner);
                }
            }
        }
    }

    if min.x <= max.x {
        Some(Aabb::from_min_max(min, max))
    } else {
        None
    }
}

/// Full extents of a box along each axis.
pub fn size(aabb: &Aabb) -> Vec3 {
    Vec3::from(aabb.half_extents) * 2.0
}

pub fn center(aabb: &Aabb) -> Vec3 {
    Vec3::from(aabb.center)
}
