pub mod bounds;
pub mod camera;
pub mod debounce;
pub mod fit;
pub mod font;
pub mod geometry;
pub mod input;
mod pipeline;
pub mod sync;
pub mod tessellation;
mod text;
pub mod viewport;

pub use camera::{OrbitCamera, OrbitCameraPlugin};
pub use debounce::DebounceScheduler;
pub use fit::{CameraState, ViewFit};
pub use font::{Font, FontPlugin, FontProvider};
pub use geometry::{GeometryBuilder, TextGeometryGroup, TextGeometryOptions};
pub use input::{InputBuffer, TextEdit, TextState};
pub use pipeline::{
    BevyTextScene, FitCamera, TextGroupRoot, TextLine, TextLinePart, TextMeshPlugin,
    TextMeshPluginConfig, notify_debounce_system, rebuild_text_system, teardown_on_exit_system,
    text_settled, tick_debounce_system,
};
pub use sync::{RebuildOutcome, SceneSynchronizer, SkipReason, SyncState, TextScene};
pub use text::{Text3dConfig, Text3dPlugin};
pub use viewport::{Viewport, ViewportError, ViewportState};
