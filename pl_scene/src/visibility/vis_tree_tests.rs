//! Unit tests for VisTree / VisNode

use glam::{Mat4, Vec3};
use crate::renderer::{ScreenRect, Viewport};
use crate::scene::SceneGraph;
use super::*;

fn container() -> VisKind {
    VisKind::Container {
        children: Vec::new(),
        cell: false,
        projection: VisProjection { rect: ScreenRect::new(0.0, 0.0, 800.0, 600.0), min_z: 0.0, max_z: 1.0 },
    }
}

fn tree_with_view() -> VisTree {
    let mut tree = VisTree::new();
    tree.begin(
        None,
        Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
        Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 100.0),
        Vec3::new(0.0, 0.0, 5.0),
        Viewport::new(800.0, 600.0),
    );
    tree
}

// ============================================================================
// Tests: Lazy derived matrices
// ============================================================================

#[test]
fn test_world_view_projection_is_derived_once() {
    let mut tree = tree_with_view();
    let id = tree.push(None, None, VisKind::Node, Mat4::from_translation(Vec3::X), 0.0);
    let node = tree.node(id).unwrap();

    let a = node.world_view_projection_matrix();
    let b = node.world_view_projection_matrix();
    assert_eq!(a.to_cols_array(), b.to_cols_array());
    assert_eq!(node.derivation_count(), 1);

    let expected = tree.view_projection_matrix() * Mat4::from_translation(Vec3::X);
    assert!(a.abs_diff_eq(expected, 1e-6));
}

#[test]
fn test_set_world_matrix_invalidates_every_derived_matrix() {
    let mut tree = tree_with_view();
    let id = tree.push(None, None, VisKind::Node, Mat4::IDENTITY, 0.0);
    {
        let node = tree.node(id).unwrap();
        node.inverse_world_matrix();
        node.world_view_matrix();
        node.world_view_projection_matrix();
        assert_eq!(node.derivation_count(), 3);
    }

    let m = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
    assert!(tree.set_world_matrix(id, m));
    let node = tree.node(id).unwrap();

    assert!(node.inverse_world_matrix().abs_diff_eq(m.inverse(), 1e-6));
    assert!(node.world_view_matrix().abs_diff_eq(tree.view_matrix() * m, 1e-6));
    assert!(node.world_view_projection_matrix().abs_diff_eq(tree.view_projection_matrix() * m, 1e-6));
    assert_eq!(node.derivation_count(), 6);

    // No further mutation: nothing recomputed
    node.inverse_world_matrix();
    node.world_view_matrix();
    node.world_view_projection_matrix();
    assert_eq!(node.derivation_count(), 6);
}

#[test]
fn test_set_world_matrix_does_not_touch_children() {
    let mut tree = tree_with_view();
    let parent = tree.push(None, None, container(), Mat4::IDENTITY, 0.0);
    let child = tree.push(Some(parent), None, VisKind::Node, Mat4::IDENTITY, 0.0);
    tree.node(child).unwrap().world_view_matrix();

    tree.set_world_matrix(parent, Mat4::from_translation(Vec3::Y));
    let child = tree.node(child).unwrap();
    assert_eq!(child.world_matrix(), Mat4::IDENTITY);
    child.world_view_matrix();
    assert_eq!(child.derivation_count(), 1);
}

#[test]
fn test_view_change_invalidates_camera_dependent_matrices_only() {
    let mut tree = tree_with_view();
    let id = tree.push(None, None, VisKind::Node, Mat4::IDENTITY, 0.0);
    {
        let node = tree.node(id).unwrap();
        node.inverse_world_matrix();
        node.world_view_matrix();
    }

    tree.set_view_projection(Mat4::IDENTITY, Mat4::IDENTITY);
    let node = tree.node(id).unwrap();
    node.inverse_world_matrix();
    assert_eq!(node.world_view_matrix(), Mat4::IDENTITY);
    assert_eq!(node.derivation_count(), 3);
}

// ============================================================================
// Tests: Structure
// ============================================================================

#[test]
fn test_push_links_children_in_insertion_order() {
    let mut tree = tree_with_view();
    let root = tree.push(None, None, container(), Mat4::IDENTITY, 0.0);
    let a = tree.push(Some(root), None, VisKind::Node, Mat4::IDENTITY, 1.0);
    let b = tree.push(Some(root), None, container(), Mat4::IDENTITY, 2.0);
    let c = tree.push(Some(b), None, VisKind::Node, Mat4::IDENTITY, 3.0);

    let root_ref = tree.root().unwrap();
    assert!(root_ref.parent().is_none());
    let children: Vec<VisNodeId> = root_ref.children().map(|n| n.id()).collect();
    assert_eq!(children, vec![a, b]);
    assert_eq!(tree.node(c).unwrap().parent().unwrap().id(), b);
    assert_eq!(tree.node(b).unwrap().squared_distance(), 2.0);
}

#[test]
fn test_iter_is_depth_first_and_follows_portals() {
    let mut tree = tree_with_view();
    let root = tree.push(None, None, container(), Mat4::IDENTITY, 0.0);
    let portal = tree.push(Some(root), None, VisKind::Portal { target: None }, Mat4::IDENTITY, 0.0);
    let after = tree.push(Some(root), None, VisKind::Node, Mat4::IDENTITY, 0.0);
    let cell = tree.push(Some(portal), None, container(), Mat4::IDENTITY, 0.0);
    let inside = tree.push(Some(cell), None, VisKind::Node, Mat4::IDENTITY, 0.0);
    tree.set_portal_target(portal, Some(cell));

    let order: Vec<VisNodeId> = tree.iter().map(|n| n.id()).collect();
    assert_eq!(order, vec![root, portal, cell, inside, after]);

    let portal_ref = tree.node(portal).unwrap();
    assert!(portal_ref.is_portal());
    assert_eq!(portal_ref.target().unwrap().id(), cell);
    // Cells hang off their portal, not off a container child list
    assert_eq!(tree.root().unwrap().children().count(), 2);
}

#[test]
fn test_scene_node_is_none_after_destroy() {
    let mut graph = SceneGraph::new();
    let key = graph.create_node(graph.root(), "node").unwrap();

    let mut tree = tree_with_view();
    let id = tree.push(None, Some(key), VisKind::Node, Mat4::IDENTITY, 0.0);
    assert_eq!(tree.node(id).unwrap().scene_node(&graph).unwrap().name(), "node");
    assert!(tree.contains(key));

    graph.destroy_node(key).unwrap();
    let vis = tree.find(key).unwrap();
    assert!(vis.scene_node(&graph).is_none());
    assert_eq!(vis.scene_node_key(), Some(key));
}

#[test]
fn test_clear_empties_tree() {
    let mut tree = tree_with_view();
    tree.push(None, None, container(), Mat4::IDENTITY, 0.0);
    tree.clear();
    assert!(tree.is_empty());
    assert!(tree.root().is_none());
    assert_eq!(tree.iter().count(), 0);
    assert!(!tree.set_world_matrix(VisNodeId(0), Mat4::IDENTITY));
}
