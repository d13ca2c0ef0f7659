use bevy::prelude::{Entity, Resource};
use bevy_log::{debug, info, warn};

use crate::{
    fit::{CameraState, DEFAULT_FIT_MARGIN, ViewFit, fit},
    font::Font,
    geometry::{GeometryBuilder, TextGeometryGroup},
    input::TextState,
};

/// The scene a text group is attached to.
///
/// `attach` takes ownership of a built group and returns a handle to it;
/// `release` must detach that group and free every mesh and material it owns.
pub trait TextScene {
    type Group;

    fn attach(&mut self, group: TextGeometryGroup) -> Self::Group;
    fn release(&mut self, group: Self::Group);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    /// No rebuild pending.
    #[default]
    Idle,
    /// The debounced text settled; a rebuild is due.
    Settled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    BlankText,
    FontNotReady,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RebuildOutcome {
    /// Nothing attached; the scene holds no text group.
    Skipped(SkipReason),
    Attached { lines: usize, scale: f32 },
}

/// Owns the currently displayed text group and replaces it on every settled change.
#[derive(Resource, Debug)]
pub struct SceneSynchronizer<G: Send + Sync + 'static = Entity> {
    builder: GeometryBuilder,
    margin: f32,
    state: SyncState,
    current: Option<G>,
}

impl<G: Send + Sync + 'static> Default for SceneSynchronizer<G> {
    fn default() -> Self {
        Self::new(GeometryBuilder::default(), DEFAULT_FIT_MARGIN)
    }
}

impl<G: Send + Sync + 'static> SceneSynchronizer<G> {
    pub fn new(builder: GeometryBuilder, margin: f32) -> Self {
        Self {
            builder,
            margin,
            state: SyncState::Idle,
            current: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_settled(&self) -> bool {
        self.state == SyncState::Settled
    }

    /// Idle -> Settled. Called when the debounce fires.
    pub fn mark_settled(&mut self) {
        self.state = SyncState::Settled;
    }

    /// The group currently attached to the scene, if any.
    pub fn current(&self) -> Option<&G> {
        self.current.as_ref()
    }

    /// Dispose, build, fit and attach, in that order, then return to Idle.
    ///
    /// The previous group is released before anything else, so a blank text or
    /// a font that is not ready yet leaves the scene empty. Without a camera the
    /// group is attached unfitted.
    pub fn rebuild<S>(
        &mut self,
        scene: &mut S,
        text: &TextState,
        font: Option<&Font>,
        camera: Option<&CameraState>,
    ) -> RebuildOutcome
    where
        S: TextScene<Group = G>,
    {
        self.state = SyncState::Idle;

        if let Some(previous) = self.current.take() {
            debug!("Releasing previous text group");
            scene.release(previous);
        }

        if text.is_blank() {
            debug!("Settled text is blank; scene left empty");
            return RebuildOutcome::Skipped(SkipReason::BlankText);
        }
        let Some(font) = font else {
            debug!("Font not ready at rebuild; scene left empty");
            return RebuildOutcome::Skipped(SkipReason::FontNotReady);
        };
        let Some(mut group) = self.builder.build(text, Some(font)) else {
            return RebuildOutcome::Skipped(SkipReason::BlankText);
        };

        let view_fit = match camera {
            Some(camera) => fit(&group, camera, self.margin),
            None => {
                warn!("No camera to fit the text group against; attaching it unscaled");
                ViewFit::IDENTITY
            }
        };
        view_fit.apply(&mut group.transform);

        let lines = group.lines().len();
        info!(
            "Rebuilt text group: {} line(s), {} mesh(es), scale {}",
            lines,
            group.mesh_count(),
            view_fit.scale
        );
        self.current = Some(scene.attach(group));
        RebuildOutcome::Attached {
            lines,
            scale: view_fit.scale,
        }
    }

    /// Releases the current group, if any, and drops any pending rebuild.
    pub fn teardown<S>(&mut self, scene: &mut S)
    where
        S: TextScene<Group = G>,
    {
        self.state = SyncState::Idle;
        if let Some(previous) = self.current.take() {
            scene.release(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Counts what a real scene would allocate so leaks show up as numbers.
    #[derive(Default)]
    struct MockScene {
        next_id: u32,
        attached: HashMap<u32, (usize, usize)>,
        live_meshes: usize,
        live_materials: usize,
        attach_calls: usize,
    }

    impl TextScene for MockScene {
        type Group = u32;

        fn attach(&mut self, group: TextGeometryGroup) -> u32 {
            let id = self.next_id;
            self.next_id += 1;
            self.attach_calls += 1;
            self.live_meshes += group.mesh_count();
            self.live_materials += group.material_count();
            self.attached
                .insert(id, (group.mesh_count(), group.material_count()));
            id
        }

        fn release(&mut self, group: u32) {
            let (meshes, materials) = self
                .attached
                .remove(&group)
                .expect("released a group that was never attached");
            self.live_meshes -= meshes;
            self.live_materials -= materials;
        }
    }

    fn test_font() -> Font {
        let bytes = include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/assets/fonts/DejaVuSans.ttf"
        ));
        Font::from_bytes(bytes.to_vec()).expect("bundled font should parse")
    }

    fn camera() -> CameraState {
        CameraState::from_degrees(75.0, 16.0 / 9.0, 1000.0)
    }

    #[test]
    fn at_most_one_group_is_ever_attached() {
        let font = test_font();
        let mut scene = MockScene::default();
        let mut sync = SceneSynchronizer::<u32>::default();

        for text in ["H", "He", "Hel\nlo", " ", "", "x", "\n", "last\nline\nhere"] {
            sync.mark_settled();
            sync.rebuild(&mut scene, &TextState::from(text), Some(&font), Some(&camera()));
            assert!(scene.attached.len() <= 1, "after {text:?}");
            let expected_meshes: usize = scene.attached.values().map(|(m, _)| m).sum();
            assert_eq!(scene.live_meshes, expected_meshes);
            assert_eq!(scene.live_materials, expected_meshes);
        }
        assert_eq!(scene.attached.len(), 1);
        assert_eq!(scene.live_meshes, 6);
    }

    #[test]
    fn blank_text_leaves_scene_empty() {
        let font = test_font();
        let mut scene = MockScene::default();
        let mut sync = SceneSynchronizer::<u32>::default();

        sync.rebuild(&mut scene, &TextState::from("AB"), Some(&font), Some(&camera()));
        assert_eq!(scene.attached.len(), 1);

        let outcome = sync.rebuild(
            &mut scene,
            &TextState::from("  "),
            Some(&font),
            Some(&camera()),
        );
        assert_eq!(outcome, RebuildOutcome::Skipped(SkipReason::BlankText));
        assert!(scene.attached.is_empty());
        assert_eq!(scene.live_meshes, 0);
        assert_eq!(scene.live_materials, 0);
        assert!(sync.current().is_none());
    }

    #[test]
    fn font_not_ready_skips_without_attaching() {
        let mut scene = MockScene::default();
        let mut sync = SceneSynchronizer::<u32>::default();
        let outcome = sync.rebuild(&mut scene, &TextState::from("AB"), None, Some(&camera()));
        assert_eq!(outcome, RebuildOutcome::Skipped(SkipReason::FontNotReady));
        assert_eq!(scene.attach_calls, 0);
    }

    #[test]
    fn state_returns_to_idle_after_rebuild() {
        let font = test_font();
        let mut scene = MockScene::default();
        let mut sync = SceneSynchronizer::<u32>::default();
        assert_eq!(sync.state(), SyncState::Idle);
        sync.mark_settled();
        assert!(sync.is_settled());
        sync.rebuild(&mut scene, &TextState::from("A"), Some(&font), Some(&camera()));
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[test]
    fn rebuild_is_deterministic() {
        let font = test_font();
        let mut scene = MockScene::default();
        let mut sync = SceneSynchronizer::<u32>::default();
        let text = TextState::from("AB\nC");
        let first = sync.rebuild(&mut scene, &text, Some(&font), Some(&camera()));
        let second = sync.rebuild(&mut scene, &text, Some(&font), Some(&camera()));
        assert_eq!(first, second);
        assert!(matches!(first, RebuildOutcome::Attached { lines: 2, .. }));
    }

    #[test]
    fn missing_camera_attaches_unscaled() {
        let font = test_font();
        let mut scene = MockScene::default();
        let mut sync = SceneSynchronizer::<u32>::default();
        let outcome = sync.rebuild(&mut scene, &TextState::from("A"), Some(&font), None);
        assert_eq!(outcome, RebuildOutcome::Attached { lines: 1, scale: 1.0 });
    }

    #[test]
    fn teardown_releases_everything() {
        let font = test_font();
        let mut scene = MockScene::default();
        let mut sync = SceneSynchronizer::<u32>::default();
        sync.rebuild(&mut scene, &TextState::from("A\nB"), Some(&font), Some(&camera()));
        sync.mark_settled();
        sync.teardown(&mut scene);
        assert!(scene.attached.is_empty());
        assert_eq!(scene.live_meshes, 0);
        assert_eq!(sync.state(), SyncState::Idle);
    }
}
