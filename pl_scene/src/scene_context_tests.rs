//! Unit tests for scene_context.rs

use std::sync::Arc;
use glam::Vec3;
use crate::camera::Camera;
use crate::compositing::{CustomPass, MemorySceneRendererLoader, SceneRenderer};
use crate::config::{SceneContextConfig, SceneRendererManagerConfig};
use crate::error::Error;
use crate::math::AABB;
use crate::renderer::mock_renderer::MockRenderer;
use crate::renderer::TransformSlot;
use crate::scene::SceneNodeKey;
use super::*;

const FORWARD: &str = r#"(
    name: "Forward",
    passes: [
        (class: "Begin"),
        (class: "DrawSolid"),
    ],
)"#;

fn context(default: Option<&str>) -> SceneContext {
    let config = SceneContextConfig {
        default_scene_renderer: default.map(str::to_string),
        ..SceneContextConfig::default()
    };
    let loader = MemorySceneRendererLoader::new()
        .with_source("Forward.sr", FORWARD)
        .with_source("Other.sr", "(passes: [(class: \"Begin\")])");
    SceneContext::with_loader(config, Box::new(loader)).unwrap()
}

fn add_camera(ctx: &mut SceneContext) -> SceneNodeKey {
    let root = ctx.graph().root();
    ctx.graph_mut().create_camera(root, "camera", Camera::new()).unwrap()
}

// ============================================================================
// Tests: Construction
// ============================================================================

#[test]
fn test_new_rejects_invalid_config() {
    let mut config = SceneContextConfig::default();
    config.cull.max_portal_depth = 0;
    assert!(matches!(SceneContext::new(config), Err(Error::InvalidConfiguration(_))));
}

// ============================================================================
// Tests: Active camera
// ============================================================================

#[test]
fn test_set_camera_requires_camera_node() {
    let mut ctx = context(None);
    let root = ctx.graph().root();
    let node = ctx.graph_mut().create_node(root, "node").unwrap();

    let result = ctx.set_camera(Some(node), None);
    assert!(matches!(result, Err(Error::InvalidSceneNode(_))));
    assert_eq!(ctx.camera(), None);
}

#[test]
fn test_set_camera_pushes_matrices() {
    let mut ctx = context(None);
    let camera = add_camera(&mut ctx);
    let mut renderer = MockRenderer::new();

    ctx.set_camera(Some(camera), Some(&mut renderer)).unwrap();
    assert_eq!(ctx.camera(), Some(camera));
    assert!(renderer.transform(TransformSlot::Projection).is_some());
    assert!(renderer.transform(TransformSlot::View).is_some());

    ctx.set_camera(None, Some(&mut renderer)).unwrap();
    assert_eq!(ctx.camera(), None);
}

#[test]
fn test_destroying_active_camera_clears_it() {
    let mut ctx = context(Some("Forward.sr"));
    let camera = add_camera(&mut ctx);
    ctx.set_camera(Some(camera), None).unwrap();
    let root = ctx.graph().root();
    ctx.draw(&mut MockRenderer::new(), root).unwrap();
    assert!(ctx.visibility(camera).is_some());

    ctx.destroy_node(camera).unwrap();
    assert_eq!(ctx.camera(), None);
    assert!(ctx.visibility(camera).is_none());
}

#[test]
fn test_camera_destroyed_through_graph_is_not_active() {
    let mut ctx = context(None);
    let camera = add_camera(&mut ctx);
    ctx.set_camera(Some(camera), None).unwrap();
    ctx.graph_mut().destroy_node(camera).unwrap();
    assert_eq!(ctx.camera(), None);
}

// ============================================================================
// Tests: Frames
// ============================================================================

#[test]
fn test_draw_without_camera_is_a_noop() {
    let mut ctx = context(Some("Forward.sr"));
    let mut renderer = MockRenderer::new();
    let root = ctx.graph().root();

    let report = ctx.draw(&mut renderer, root).unwrap();
    assert_eq!(report, FrameReport::default());
    assert!(renderer.commands.is_empty());
    assert_eq!(ctx.frame(), 1);
}

#[test]
fn test_draw_without_scene_renderer_is_a_noop() {
    let mut ctx = context(None);
    let camera = add_camera(&mut ctx);
    ctx.set_camera(Some(camera), None).unwrap();
    let mut renderer = MockRenderer::new();
    let root = ctx.graph().root();

    let report = ctx.draw(&mut renderer, root).unwrap();
    assert_eq!(report.executed, 0);
    assert!(renderer.commands.is_empty());
}

#[test]
fn test_draw_runs_default_scene_renderer() {
    let mut ctx = context(Some("Forward.sr"));
    let camera = add_camera(&mut ctx);
    let root = ctx.graph().root();
    let node = ctx.graph_mut().create_node(root, "box").unwrap();
    ctx.graph_mut().set_bounding_box(node, Some(AABB::new(Vec3::splat(-1.0), Vec3::ONE))).unwrap();
    ctx.graph_mut().set_position(node, Vec3::new(0.0, 0.0, 10.0)).unwrap();
    ctx.set_camera(Some(camera), None).unwrap();

    let mut renderer = MockRenderer::new();
    let report = ctx.draw(&mut renderer, root).unwrap();

    assert_eq!(report.executed, 2);
    assert!(report.is_success());
    assert!(ctx.visibility(camera).unwrap().contains(node));
    assert_eq!(ctx.cull_statistics(camera).unwrap().visible_nodes, 2);
    assert!(renderer.transform(TransformSlot::View).is_some());
}

#[test]
fn test_camera_filename_overrides_default_and_is_cached() {
    let mut ctx = context(Some("Forward.sr"));
    let camera = add_camera(&mut ctx);
    ctx.graph_mut().camera_mut(camera).unwrap().set_scene_renderer_filename("Other.sr");
    ctx.set_camera(Some(camera), None).unwrap();

    let first = ctx.scene_renderer_for(camera).unwrap();
    let second = ctx.scene_renderer_for(camera).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.lock().unwrap().pass_count(), 1);
    assert!(!ctx.scene_renderers().contains("Forward.sr"));

    ctx.graph_mut().camera_mut(camera).unwrap().set_scene_renderer_filename("Forward.sr");
    let third = ctx.scene_renderer_for(camera).unwrap();
    assert_eq!(third.lock().unwrap().pass_count(), 2);
}

#[test]
fn test_missing_scene_renderer_file_skips_frame() {
    let mut ctx = context(Some("Missing.sr"));
    let camera = add_camera(&mut ctx);
    ctx.set_camera(Some(camera), None).unwrap();
    let root = ctx.graph().root();

    let report = ctx.draw(&mut MockRenderer::new(), root).unwrap();
    assert_eq!(report.executed, 0);
    assert!(ctx.scene_renderer_for(camera).is_none());
}

#[test]
fn test_visibility_is_shared_between_passes_of_a_frame() {
    let mut ctx = context(None);
    let camera = add_camera(&mut ctx);
    let mut sr = SceneRenderer::new("Overlay");
    sr.add_pass(Box::new(CustomPass::new("first", |ctx| {
        ctx.visibility();
        Ok(())
    })));
    sr.add_pass(Box::new(CustomPass::new("second", |ctx| {
        assert!(ctx.is_culled());
        Ok(())
    })));
    ctx.scene_renderers_mut().insert("Overlay", sr).unwrap();
    ctx.graph_mut().camera_mut(camera).unwrap().set_scene_renderer_filename("Overlay");
    ctx.set_camera(Some(camera), None).unwrap();

    let root = ctx.graph().root();
    let report = ctx.draw(&mut MockRenderer::new(), root).unwrap();
    assert_eq!(report.executed, 2);
}

#[test]
fn test_unused_scene_renderers_are_evicted_after_delay() {
    let config = SceneContextConfig {
        default_scene_renderer: Some("Forward.sr".to_string()),
        scene_renderer_manager: SceneRendererManagerConfig { unload_unused: true, unload_delay_frames: 1 },
        ..SceneContextConfig::default()
    };
    let loader = MemorySceneRendererLoader::new().with_source("Forward.sr", FORWARD);
    let mut ctx = SceneContext::with_loader(config, Box::new(loader)).unwrap();
    let camera = add_camera(&mut ctx);
    ctx.set_camera(Some(camera), None).unwrap();
    let root = ctx.graph().root();
    let mut renderer = MockRenderer::new();

    ctx.draw(&mut renderer, root).unwrap();
    assert!(ctx.scene_renderers().contains("Forward.sr"));

    // The camera lets go of the handle
    ctx.graph_mut().camera_mut(camera).unwrap().set_scene_renderer_filename("Elsewhere.sr");
    ctx.set_camera(None, None).unwrap();
    ctx.draw(&mut renderer, root).unwrap();
    assert!(ctx.scene_renderers().contains("Forward.sr"));
    ctx.draw(&mut renderer, root).unwrap();
    assert!(!ctx.scene_renderers().contains("Forward.sr"));
}
