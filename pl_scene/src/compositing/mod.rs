//! Compositing module
//!
//! Scene renderers (ordered pass lists), the pass trait and its per-frame
//! context, the built-in passes, the pass class registry, definition loaders
//! and the scene renderer resource manager.

mod scene_renderer_pass;
mod passes;
mod scene_renderer;
mod pass_registry;
mod loader;
mod scene_renderer_manager;

pub use scene_renderer_pass::{SceneRendererPass, PassContext, DrawParts};
pub use passes::{BeginPass, DrawPhasePass, CustomPass};
pub use scene_renderer::{SceneRenderer, SceneRendererDesc, PassDesc, FrameReport};
pub use pass_registry::PassRegistry;
pub use loader::{
    SceneRendererLoader, RonSceneRendererLoader, MemorySceneRendererLoader, parse_scene_renderer,
};
pub use scene_renderer_manager::{SceneRendererManager, SceneRendererHandle};
