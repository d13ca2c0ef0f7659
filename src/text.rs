use bevy::{app::Plugin, prelude::*};

use crate::{
    font::FontPlugin,
    pipeline::{TextMeshPlugin, TextMeshPluginConfig},
};

#[derive(Resource, Default)]
pub struct Text3dConfig {
    pub text_mesh_config: TextMeshPluginConfig,
}

/// Font loading plus the typed-text pipeline.
pub struct Text3dPlugin;

impl Text3dPlugin {
    /// Stores a custom configuration for the plugin.
    /// Call this before adding the plugin to set the configuration.
    pub fn with_config(app: &mut App, config: TextMeshPluginConfig) -> &mut App {
        app.insert_resource(Text3dConfig {
            text_mesh_config: config,
        });
        app
    }
}

impl Plugin for Text3dPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<Text3dConfig>()
            .map(|c| c.text_mesh_config.clone())
            .unwrap_or_default();
        app.add_plugins(FontPlugin)
            .add_plugins(TextMeshPlugin::with_config(config));
    }
}
