use bevy::prelude::*;
use bevy_log::info;
use bevy_typed_text3d::{
    FitCamera, FontProvider, InputBuffer, OrbitCamera, OrbitCameraPlugin, Text3dPlugin,
};

/// Mirrors the typed text in the top-left corner.
#[derive(Component)]
struct TypedTextOverlay;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let mut app = App::new();

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Typed text".into(),
            ..Default::default()
        }),
        ..Default::default()
    }))
    .add_plugins(Text3dPlugin)
    .add_plugins(OrbitCameraPlugin)
    .insert_resource(ClearColor(Color::srgb_u8(120, 200, 120)))
    .add_systems(Startup, setup)
    .add_systems(
        Update,
        update_overlay_system.run_if(resource_changed::<InputBuffer>),
    );

    app.run();
    Ok(())
}

fn setup(mut commands: Commands, asset_server: Res<AssetServer>) {
    let font_handle = asset_server.load("fonts/DejaVuSans.ttf");
    info!(
        "Font load state: {:?}",
        asset_server.get_load_state(font_handle.id())
    );
    commands.insert_resource(FontProvider::pending(font_handle));

    let orbit = OrbitCamera::default();
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: 75f32.to_radians(),
            near: 0.1,
            far: 100_000.0,
            ..Default::default()
        }),
        orbit.transform(),
        orbit,
        FitCamera,
    ));

    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 3000.0,
        ..Default::default()
    });

    commands.spawn((
        TypedTextOverlay,
        Text::new(""),
        TextFont {
            font_size: 14.0,
            ..Default::default()
        },
        TextColor(Color::WHITE),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(16.0),
            left: Val::Px(16.0),
            ..Default::default()
        },
    ));

    info!("Type to see your text in 3D. Drag to orbit, scroll to zoom, double-click to reset.");
}

fn update_overlay_system(
    buffer: Res<InputBuffer>,
    mut overlays: Query<&mut Text, With<TypedTextOverlay>>,
) {
    for mut text in overlays.iter_mut() {
        text.0 = buffer.as_str().to_string();
    }
}
