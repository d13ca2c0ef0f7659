//! Orbit controls for the viewing camera, plus a double-click that glides the
//! camera back to its home position.

use std::{f32::consts::FRAC_PI_2, time::Duration};

use bevy::{
    input::{
        ButtonState,
        mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll, MouseButtonInput, MouseScrollUnit},
    },
    prelude::*,
};
use bevy_log::debug;

pub const HOME_POSITION: Vec3 = Vec3::new(0.0, 0.0, 1000.0);
pub const HOME_TARGET: Vec3 = Vec3::ZERO;
pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(500);
pub const RESET_DURATION: Duration = Duration::from_secs(1);

const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;
const PIXELS_PER_SCROLL_LINE: f32 = 100.0;

/// Slow-down curve used for the reset glide.
pub fn ease_out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// An in-flight glide from one camera pose to another.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraReset {
    from_position: Vec3,
    from_target: Vec3,
    to_position: Vec3,
    to_target: Vec3,
    elapsed: Duration,
    duration: Duration,
}

impl CameraReset {
    pub fn new(from_position: Vec3, from_target: Vec3, to_position: Vec3, to_target: Vec3) -> Self {
        Self {
            from_position,
            from_target,
            to_position,
            to_target,
            elapsed: Duration::ZERO,
            duration: RESET_DURATION,
        }
    }

    /// Advance by `delta` and return the eased (position, target) pair.
    pub fn advance(&mut self, delta: Duration) -> (Vec3, Vec3) {
        self.elapsed = (self.elapsed + delta).min(self.duration);
        let t = if self.duration.is_zero() {
            1.0
        } else {
            ease_out_quad(self.elapsed.as_secs_f32() / self.duration.as_secs_f32())
        };
        (
            self.from_position.lerp(self.to_position, t),
            self.from_target.lerp(self.to_target, t),
        )
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Spherical camera rig around `target`, with damped rotation and zoom.
#[derive(Component, Clone, Debug)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    goal_yaw: f32,
    goal_pitch: f32,
    goal_distance: f32,
    /// Fraction of the remaining motion applied each frame.
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Radians per pixel of mouse drag.
    pub rotate_speed: f32,
    /// Fraction of the distance per scroll line.
    pub zoom_speed: f32,
    reset: Option<CameraReset>,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::looking_from(HOME_POSITION, HOME_TARGET)
    }
}

impl OrbitCamera {
    /// Creates a new rig whose camera sits at `position` and looks at `target`.
    pub fn looking_from(position: Vec3, target: Vec3) -> Self {
        let mut camera = Self {
            target,
            yaw: 0.0,
            pitch: 0.0,
            distance: 1.0,
            goal_yaw: 0.0,
            goal_pitch: 0.0,
            goal_distance: 1.0,
            damping: 0.1,
            min_distance: 500.0,
            max_distance: 10000.0,
            rotate_speed: 0.005,
            zoom_speed: 0.1,
            reset: None,
        };
        camera.snap_to(position, target);
        camera
    }

    /// Jump straight to a pose, without damping.
    pub fn snap_to(&mut self, position: Vec3, target: Vec3) {
        let offset = position - target;
        let distance = offset.length().max(f32::EPSILON);
        self.target = target;
        self.distance = distance;
        self.pitch = (offset.y / distance).clamp(-1.0, 1.0).asin();
        self.yaw = offset.x.atan2(offset.z);
        self.goal_yaw = self.yaw;
        self.goal_pitch = self.pitch;
        self.goal_distance = self.distance;
    }

    pub fn position(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target
            + Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position()).looking_at(self.target, Vec3::Y)
    }

    /// Rotate by a mouse drag delta in pixels.
    pub fn orbit(&mut self, drag: Vec2) {
        self.goal_yaw -= drag.x * self.rotate_speed;
        self.goal_pitch =
            (self.goal_pitch + drag.y * self.rotate_speed).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Zoom in for positive `lines`, out for negative.
    pub fn zoom(&mut self, lines: f32) {
        let factor = (1.0 - lines * self.zoom_speed).max(0.1);
        self.goal_distance =
            (self.goal_distance * factor).clamp(self.min_distance, self.max_distance);
    }

    pub fn start_reset(&mut self, position: Vec3, target: Vec3) {
        debug!("Camera reset from {:?} to {:?}", self.position(), position);
        self.reset = Some(CameraReset::new(self.position(), self.target, position, target));
    }

    pub fn is_resetting(&self) -> bool {
        self.reset.is_some()
    }

    /// Step the rig by one frame: either the reset glide or the damped motion.
    pub fn update(&mut self, delta: Duration) {
        if let Some(reset) = self.reset.as_mut() {
            let (position, target) = reset.advance(delta);
            let finished = reset.is_finished();
            self.snap_to(position, target);
            if finished {
                self.reset = None;
            }
            return;
        }
        self.yaw += (self.goal_yaw - self.yaw) * self.damping;
        self.pitch += (self.goal_pitch - self.pitch) * self.damping;
        self.distance += (self.goal_distance - self.distance) * self.damping;
    }
}

/// Recognises two presses within [`DOUBLE_CLICK_WINDOW`].
#[derive(Resource, Debug)]
pub struct DoubleClickDetector {
    window: Duration,
    last_press: Option<Duration>,
}

impl Default for DoubleClickDetector {
    fn default() -> Self {
        Self::new(DOUBLE_CLICK_WINDOW)
    }
}

impl DoubleClickDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_press: None,
        }
    }

    /// Record a press at `now`; true when it completes a double click.
    pub fn press(&mut self, now: Duration) -> bool {
        match self.last_press {
            Some(last) if now.saturating_sub(last) <= self.window => {
                self.last_press = None;
                true
            }
            _ => {
                self.last_press = Some(now);
                false
            }
        }
    }
}

pub fn orbit_camera_input_system(
    buttons: Res<ButtonInput<MouseButton>>,
    motion: Res<AccumulatedMouseMotion>,
    scroll: Res<AccumulatedMouseScroll>,
    mut cameras: Query<&mut OrbitCamera>,
) {
    let lines = match scroll.unit {
        MouseScrollUnit::Line => scroll.delta.y,
        MouseScrollUnit::Pixel => scroll.delta.y / PIXELS_PER_SCROLL_LINE,
    };
    for mut camera in cameras.iter_mut() {
        if camera.is_resetting() {
            continue;
        }
        if buttons.pressed(MouseButton::Left) && motion.delta != Vec2::ZERO {
            camera.orbit(motion.delta);
        }
        if lines != 0.0 {
            camera.zoom(lines);
        }
    }
}

pub fn double_click_reset_system(
    mut presses: MessageReader<MouseButtonInput>,
    time: Res<Time>,
    mut detector: ResMut<DoubleClickDetector>,
    mut cameras: Query<&mut OrbitCamera>,
) {
    for press in presses.read() {
        if press.button != MouseButton::Left || press.state != ButtonState::Pressed {
            continue;
        }
        if detector.press(time.elapsed()) {
            for mut camera in cameras.iter_mut() {
                camera.start_reset(HOME_POSITION, HOME_TARGET);
            }
        }
    }
}

pub fn orbit_camera_update_system(
    time: Res<Time>,
    mut cameras: Query<(&mut OrbitCamera, &mut Transform)>,
) {
    for (mut camera, mut transform) in cameras.iter_mut() {
        camera.update(time.delta());
        *transform = camera.transform();
    }
}

/// Drives every [`OrbitCamera`] from mouse input. Needs Bevy's input plugin.
pub struct OrbitCameraPlugin;

impl Plugin for OrbitCameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DoubleClickDetector>().add_systems(
            Update,
            (
                orbit_camera_input_system,
                double_click_reset_system,
                orbit_camera_update_system,
            )
                .chain(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_pose_round_trips() {
        let camera = OrbitCamera::default();
        assert!(camera.position().abs_diff_eq(HOME_POSITION, 1e-3));
        let transform = camera.transform();
        assert!((*transform.forward()).abs_diff_eq(Vec3::NEG_Z, 1e-5));
    }

    #[test]
    fn zoom_respects_distance_limits() {
        let mut camera = OrbitCamera::default();
        for _ in 0..200 {
            camera.zoom(5.0);
            camera.update(Duration::from_millis(16));
        }
        assert!(camera.distance >= camera.min_distance - 1e-3);
        for _ in 0..400 {
            camera.zoom(-5.0);
            camera.update(Duration::from_millis(16));
        }
        assert!(camera.distance <= camera.max_distance + 1e-3);
    }

    #[test]
    fn orbit_is_damped_and_pitch_is_clamped() {
        let mut camera = OrbitCamera::default();
        camera.orbit(Vec2::new(0.0, 10_000.0));
        camera.update(Duration::from_millis(16));
        assert!(camera.pitch > 0.0 && camera.pitch < PITCH_LIMIT * 0.2);
        for _ in 0..500 {
            camera.update(Duration::from_millis(16));
        }
        assert!((camera.pitch - PITCH_LIMIT).abs() < 1e-3);
    }

    #[test]
    fn reset_glides_home_in_one_second() {
        let mut camera =
            OrbitCamera::looking_from(Vec3::new(800.0, 300.0, 200.0), Vec3::new(5.0, 5.0, 0.0));
        camera.start_reset(HOME_POSITION, HOME_TARGET);
        camera.update(Duration::from_millis(500));
        assert!(camera.is_resetting());
        assert!(!camera.position().abs_diff_eq(HOME_POSITION, 1.0));
        camera.update(Duration::from_millis(500));
        assert!(!camera.is_resetting());
        assert!(camera.position().abs_diff_eq(HOME_POSITION, 1e-2));
        assert!(camera.target.abs_diff_eq(HOME_TARGET, 1e-5));
    }

    #[test]
    fn ease_curve_endpoints() {
        assert_eq!(ease_out_quad(0.0), 0.0);
        assert_eq!(ease_out_quad(1.0), 1.0);
        assert!(ease_out_quad(0.5) > 0.5);
    }

    #[test]
    fn double_click_needs_two_quick_presses() {
        let mut detector = DoubleClickDetector::default();
        assert!(!detector.press(Duration::from_millis(0)));
        assert!(!detector.press(Duration::from_millis(900)));
        assert!(detector.press(Duration::from_millis(1200)));
        // A third press starts a new pair.
        assert!(!detector.press(Duration::from_millis(1300)));
    }
}
