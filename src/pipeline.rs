use std::time::Duration;

use bevy::{
    app::AppExit,
    ecs::system::SystemParam,
    input::keyboard::KeyboardInput,
    math::Vec3,
    pbr::StandardMaterial,
    prelude::{
        App, Assets, Children, Commands, Component, Entity, IntoScheduleConfigs, Last, Mesh,
        Mesh3d, MeshMaterial3d, MessageReader, Plugin, Projection, Query, Res, ResMut, Resource,
        Time, Transform, Update, Visibility, With, resource_changed,
    },
    window::WindowResized,
};
use bevy_log::{debug, info, warn};

use crate::{
    debounce::{DEFAULT_QUIET_PERIOD, DebounceScheduler},
    fit::{CameraState, DEFAULT_FIT_MARGIN},
    font::{FontProvider, populate_font_provider_system},
    geometry::{GeometryBuilder, TextGeometryGroup, TextGeometryOptions},
    input::{InputBuffer, keyboard_input_system},
    sync::{RebuildOutcome, SceneSynchronizer, TextScene},
    viewport::{ViewportState, apply_viewport_resize_system},
};

/// Marks the camera the text is fitted against. Exactly one is expected.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct FitCamera;

/// Root entity of the currently displayed text. Carries the fit transform.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct TextGroupRoot;

/// One line of text under a [`TextGroupRoot`].
#[derive(Component, Debug, Clone)]
pub struct TextLine {
    pub index: usize,
    pub text: String,
}

/// Which half of a line's material pair a mesh child uses.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLinePart {
    Faces,
    Sides,
}

/// The Bevy world as a [`TextScene`]: groups become entity hierarchies and
/// releasing one frees every mesh and material asset it created.
#[derive(SystemParam)]
pub struct BevyTextScene<'w, 's> {
    commands: Commands<'w, 's>,
    meshes: ResMut<'w, Assets<Mesh>>,
    materials: ResMut<'w, Assets<StandardMaterial>>,
    children: Query<'w, 's, &'static Children>,
    parts: Query<
        'w,
        's,
        (
            &'static Mesh3d,
            &'static MeshMaterial3d<StandardMaterial>,
        ),
    >,
}

impl TextScene for BevyTextScene<'_, '_> {
    type Group = Entity;

    fn attach(&mut self, group: TextGeometryGroup) -> Entity {
        let root = self
            .commands
            .spawn((TextGroupRoot, group.transform, Visibility::default()))
            .id();

        for line in group.into_lines() {
            let line_entity = self
                .commands
                .spawn((
                    TextLine {
                        index: line.index,
                        text: line.text.clone(),
                    },
                    line.transform,
                    Visibility::Inherited,
                ))
                .id();
            self.commands.entity(root).add_child(line_entity);

            if line.is_empty() {
                debug!("Line {} has no geometry; no meshes spawned", line.index);
                continue;
            }

            for (part, mesh, material) in [
                (TextLinePart::Faces, line.faces, line.materials.face),
                (TextLinePart::Sides, line.sides, line.materials.side),
            ] {
                let child = self
                    .commands
                    .spawn((
                        part,
                        Mesh3d(self.meshes.add(mesh)),
                        MeshMaterial3d(self.materials.add(material)),
                        Transform::IDENTITY,
                        Visibility::Inherited,
                    ))
                    .id();
                self.commands.entity(line_entity).add_child(child);
            }
        }

        debug!("Attached text group {:?}", root);
        root
    }

    fn release(&mut self, root: Entity) {
        let descendants: Vec<Entity> = self.children.iter_descendants(root).collect();
        let mut released = 0usize;
        for entity in descendants {
            if let Ok((mesh, material)) = self.parts.get(entity) {
                self.meshes.remove(&mesh.0);
                self.materials.remove(&material.0);
                released += 1;
            }
        }

        match self.commands.get_entity(root) {
            Ok(mut entity) => {
                entity.despawn();
                debug!(
                    "Released text group {:?} ({} mesh/material pairs)",
                    root, released
                );
            }
            Err(err) => warn!("Text group {:?} was already gone: {}", root, err),
        }
    }
}

/// Configuration options for the TextMeshPlugin.
#[derive(Clone, Debug, Resource)]
pub struct TextMeshPluginConfig {
    /// Size, depth, line height, tolerance and colors of the generated geometry.
    pub geometry: TextGeometryOptions,
    /// How long typing must pause before the text is rebuilt.
    pub quiet_period: Duration,
    /// Fraction of the visible frustum the fitted text may fill.
    pub fit_margin: f32,
    /// Point the fitted text is centered on; distance is measured to it.
    pub fit_target: Vec3,
}

impl Default for TextMeshPluginConfig {
    fn default() -> Self {
        Self {
            geometry: TextGeometryOptions::default(),
            quiet_period: DEFAULT_QUIET_PERIOD,
            fit_margin: DEFAULT_FIT_MARGIN,
            fit_target: Vec3::ZERO,
        }
    }
}

/// Restarts the quiet period whenever the input buffer changed.
pub fn notify_debounce_system(buffer: Res<InputBuffer>, mut debounce: ResMut<DebounceScheduler>) {
    debug!("Text changed ({} chars); restarting quiet period", buffer.as_str().chars().count());
    debounce.notify();
}

pub fn tick_debounce_system(
    time: Res<Time>,
    mut debounce: ResMut<DebounceScheduler>,
    mut sync: ResMut<SceneSynchronizer>,
) {
    if debounce.tick(time.delta()) {
        sync.mark_settled();
    }
}

/// Run condition: a debounced change is waiting to be rebuilt.
pub fn text_settled(sync: Res<SceneSynchronizer>) -> bool {
    sync.is_settled()
}

/// Replaces the displayed text group with one built from the current buffer.
pub fn rebuild_text_system(
    mut sync: ResMut<SceneSynchronizer>,
    mut scene: BevyTextScene,
    buffer: Res<InputBuffer>,
    provider: Res<FontProvider>,
    config: Res<TextMeshPluginConfig>,
    cameras: Query<(&Projection, &Transform), With<FitCamera>>,
) {
    let camera = match cameras.single() {
        Ok((projection, transform)) => {
            let state = CameraState::from_projection(projection, transform, config.fit_target);
            if state.is_none() {
                warn!("Fit camera has no perspective projection; text will not be fitted");
            }
            state
        }
        Err(err) => {
            debug!("No single fit camera: {}", err);
            None
        }
    };

    let text = buffer.snapshot();
    match sync.rebuild(&mut scene, &text, provider.get(), camera.as_ref()) {
        RebuildOutcome::Attached { lines, scale } => {
            info!("Displaying {} line(s) of text at scale {}", lines, scale);
        }
        RebuildOutcome::Skipped(reason) => {
            debug!("Rebuild skipped: {:?}", reason);
        }
    }
}

/// Drops any pending rebuild and the displayed group when the app exits.
pub fn teardown_on_exit_system(
    mut exits: MessageReader<AppExit>,
    mut debounce: ResMut<DebounceScheduler>,
    mut sync: ResMut<SceneSynchronizer>,
    mut scene: BevyTextScene,
) {
    if exits.read().next().is_none() {
        return;
    }
    info!("App exiting; cancelling pending text rebuild");
    debounce.cancel();
    sync.teardown(&mut scene);
}

/// Plugin that adds the typed-text pipeline: keyboard input, debounce,
/// rebuild and fit, viewport resize handling and teardown.
pub struct TextMeshPlugin {
    config: TextMeshPluginConfig,
}

impl TextMeshPlugin {
    /// Creates a new TextMeshPlugin with default configuration.
    pub fn new() -> Self {
        Self {
            config: Default::default(),
        }
    }

    /// Creates a new TextMeshPlugin with custom configuration.
    pub fn with_config(config: TextMeshPluginConfig) -> Self {
        Self { config }
    }
}

impl Default for TextMeshPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for TextMeshPlugin {
    fn build(&self, app: &mut App) {
        let config = self.config.clone();
        app.add_message::<KeyboardInput>()
            .add_message::<WindowResized>()
            .init_resource::<InputBuffer>()
            .init_resource::<ViewportState>()
            .insert_resource(DebounceScheduler::new(config.quiet_period))
            .insert_resource(SceneSynchronizer::<Entity>::new(
                GeometryBuilder::new(config.geometry.clone()),
                config.fit_margin,
            ))
            .insert_resource(config)
            .add_systems(
                Update,
                (
                    keyboard_input_system,
                    notify_debounce_system.run_if(resource_changed::<InputBuffer>),
                    tick_debounce_system,
                    rebuild_text_system
                        .run_if(text_settled)
                        .after(populate_font_provider_system),
                )
                    .chain(),
            )
            .add_systems(Update, apply_viewport_resize_system)
            .add_systems(Last, teardown_on_exit_system);
    }
}
