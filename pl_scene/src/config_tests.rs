//! Unit tests for config.rs

use super::*;
use crate::error::Error;

// ============================================================================
// Tests: Defaults
// ============================================================================

#[test]
fn test_cull_config_defaults() {
    let cfg = CullConfig::default();
    assert!(!cfg.sort_by_distance);
    assert!(cfg.use_max_draw_distance);
    assert_eq!(cfg.portal_reuse_frustum_radius, 0.5);
    assert_eq!(cfg.max_portal_depth, 16);
}

#[test]
fn test_scene_context_config_defaults_validate() {
    let cfg = SceneContextConfig::default();
    assert!(cfg.validate().is_ok());
    assert!(cfg.default_scene_renderer.is_none());
}

// ============================================================================
// Tests: RON loading
// ============================================================================

#[test]
fn test_from_ron_partial_document_keeps_defaults() {
    let cfg = SceneContextConfig::from_ron_str(
        "(cull: (sort_by_distance: true), default_scene_renderer: Some(\"Forward.sr\"))",
    ).unwrap();

    assert!(cfg.cull.sort_by_distance);
    assert_eq!(cfg.cull.max_portal_depth, 16);
    assert_eq!(cfg.scene_renderer_manager, SceneRendererManagerConfig::default());
    assert_eq!(cfg.default_scene_renderer.as_deref(), Some("Forward.sr"));
}

#[test]
fn test_from_ron_empty_struct() {
    let cfg = SceneContextConfig::from_ron_str("()").unwrap();
    assert_eq!(cfg, SceneContextConfig::default());
}

#[test]
fn test_from_ron_syntax_error() {
    let result = SceneContextConfig::from_ron_str("(cull: ");
    assert!(matches!(result, Err(Error::ParseError(_))));
}

#[test]
fn test_from_ron_rejects_zero_portal_depth() {
    let result = SceneContextConfig::from_ron_str("(cull: (max_portal_depth: 0))");
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}

#[test]
fn test_from_ron_rejects_negative_reuse_radius() {
    let result = SceneContextConfig::from_ron_str("(cull: (portal_reuse_frustum_radius: -1.0))");
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}

#[test]
fn test_load_missing_file() {
    let result = SceneContextConfig::load("/nonexistent/pl_scene/config.ron");
    assert!(matches!(result, Err(Error::ResourceNotFound(_))));
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!("pl_scene_config_{}.ron", std::process::id()));
    std::fs::write(&path, "(scene_renderer_manager: (unload_unused: false))").unwrap();

    let cfg = SceneContextConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert!(!cfg.scene_renderer_manager.unload_unused);
    assert_eq!(cfg.scene_renderer_manager.unload_delay_frames, 3);
}

#[test]
fn test_config_round_trips_through_ron() {
    let mut cfg = SceneContextConfig::default();
    cfg.cull.portal_reuse_frustum_radius = 2.0;
    let text = ron::to_string(&cfg).unwrap();
    assert_eq!(SceneContextConfig::from_ron_str(&text).unwrap(), cfg);
}
