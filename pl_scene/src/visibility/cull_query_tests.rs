//! Unit tests for the cull traversal

use glam::{Mat4, Vec3};
use crate::camera::Camera;
use crate::config::CullConfig;
use crate::math::{AABB, Polygon};
use crate::renderer::Viewport;
use crate::scene::{BillboardModifier, SceneGraph, SceneNodeFlags, SceneNodeKey, Transform};
use super::*;

// ============================================================================
// Helpers
// ============================================================================

fn viewport() -> Viewport {
    Viewport::new(800.0, 600.0)
}

fn half_box() -> AABB {
    AABB::new(Vec3::splat(-0.5), Vec3::splat(0.5))
}

fn boxed_node(graph: &mut SceneGraph, parent: SceneNodeKey, name: &str, position: Vec3) -> SceneNodeKey {
    let key = graph.create_node(parent, name).unwrap();
    graph.set_bounding_box(key, Some(half_box())).unwrap();
    graph.set_position(key, position).unwrap();
    key
}

fn run(graph: &mut SceneGraph, camera: SceneNodeKey, config: CullConfig) -> CullQuery {
    let view = CullView::from_camera(graph, camera, &viewport()).unwrap();
    let mut query = CullQuery::new(config);
    let root = graph.root();
    query.perform(graph, root, &view);
    query
}

/// Square opening at z = `z` facing +Z (toward the target cell)
fn opening(z: f32) -> Polygon {
    Polygon::new(vec![
        Vec3::new(-1.0, -1.0, z),
        Vec3::new(1.0, -1.0, z),
        Vec3::new(1.0, 1.0, z),
        Vec3::new(-1.0, 1.0, z),
    ])
}

struct Cells {
    graph: SceneGraph,
    camera: SceneNodeKey,
    cell_a: SceneNodeKey,
    cell_b: SceneNodeKey,
    portal: SceneNodeKey,
    inside: SceneNodeKey,
    beside: SceneNodeKey,
}

/// Camera in cell A at the origin looking at a portal 5 units ahead that
/// leads into cell B. Cell B holds one node behind the opening and one
/// inside the camera frustum but outside the opening.
fn cells() -> Cells {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let cell_a = graph.create_cell(root, "cell_a").unwrap();
    let cell_b = graph.create_cell(root, "cell_b").unwrap();
    let camera = graph.create_camera(cell_a, "camera", Camera::new()).unwrap();
    let portal = graph.create_portal(cell_a, "portal", opening(5.0), Some(cell_b)).unwrap();
    let inside = boxed_node(&mut graph, cell_b, "inside", Vec3::new(0.0, 0.0, 10.0));
    let beside = boxed_node(&mut graph, cell_b, "beside", Vec3::new(5.0, 0.0, 10.0));
    Cells { graph, camera, cell_a, cell_b, portal, inside, beside }
}

// ============================================================================
// Tests: Frustum culling
// ============================================================================

#[test]
fn test_inside_outside_and_no_culling_children() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let group = graph.create_container(root, "group").unwrap();
    let a = boxed_node(&mut graph, group, "a", Vec3::new(0.0, 0.0, 10.0));
    let b = boxed_node(&mut graph, group, "b", Vec3::new(0.0, 0.0, -10.0));
    let c = boxed_node(&mut graph, group, "c", Vec3::new(0.0, 0.0, -10.0));
    graph.node_mut(c).unwrap().set_flags(SceneNodeFlags::NO_CULLING);

    let query = run(&mut graph, camera, CullConfig::default());
    let tree = query.tree();

    let group_vis = tree.find(group).unwrap();
    let children: Vec<_> = group_vis.children().map(|n| n.scene_node_key().unwrap()).collect();
    assert_eq!(children, vec![a, c]);
    assert!(!tree.contains(b));

    let stats = query.statistics();
    assert_eq!(stats.frustum_culled, 1);
    assert!(stats.skipped_frustum_tests >= 1);
}

#[test]
fn test_degenerate_box_is_never_culled() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let marker = graph.create_node(root, "marker").unwrap();
    graph.set_position(marker, Vec3::new(0.0, 0.0, -50.0)).unwrap();

    let query = run(&mut graph, camera, CullConfig::default());
    assert!(query.tree().contains(marker));
}

#[test]
fn test_flat_box_behind_camera_is_never_culled() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let ground = graph.create_node(root, "ground").unwrap();
    graph.set_bounding_box(ground, Some(AABB::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 0.0, 1.0)))).unwrap();
    graph.set_position(ground, Vec3::new(0.0, 0.0, -50.0)).unwrap();

    let query = run(&mut graph, camera, CullConfig::default());
    assert!(query.tree().contains(ground));
    assert_eq!(query.statistics().frustum_culled, 0);
}

#[test]
fn test_no_culling_node_inside_culled_container() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let overlay_group = graph.create_container(root, "overlay_group").unwrap();
    let nested = graph.create_container(overlay_group, "nested").unwrap();
    let overlay = boxed_node(&mut graph, nested, "overlay", Vec3::new(0.0, 0.0, -10.0));
    let hidden = boxed_node(&mut graph, nested, "hidden", Vec3::new(0.0, 0.0, -12.0));
    graph.node_mut(overlay).unwrap().set_flags(SceneNodeFlags::NO_CULLING);

    let query = run(&mut graph, camera, CullConfig::default());
    let tree = query.tree();
    assert!(tree.contains(overlay_group));
    assert!(tree.contains(nested));
    assert!(tree.contains(overlay));
    assert!(!tree.contains(hidden));

    // Without the flag the whole group is culled again
    graph.node_mut(overlay).unwrap().set_flags(SceneNodeFlags::empty());
    let query = run(&mut graph, camera, CullConfig::default());
    assert!(!query.tree().contains(overlay_group));
    assert!(!query.tree().contains(overlay));
}

#[test]
fn test_invisible_no_culling_node_does_not_keep_container() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let group = graph.create_container(root, "group").unwrap();
    let overlay = boxed_node(&mut graph, group, "overlay", Vec3::new(0.0, 0.0, -10.0));
    graph.node_mut(overlay).unwrap().set_flags(SceneNodeFlags::NO_CULLING | SceneNodeFlags::INVISIBLE);

    let query = run(&mut graph, camera, CullConfig::default());
    assert!(!query.tree().contains(group));
}

#[test]
fn test_inactive_and_invisible_nodes_are_skipped() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let hidden = boxed_node(&mut graph, root, "hidden", Vec3::new(0.0, 0.0, 10.0));
    let inactive = boxed_node(&mut graph, root, "inactive", Vec3::new(0.0, 0.0, 10.0));
    graph.node_mut(hidden).unwrap().set_flags(SceneNodeFlags::INVISIBLE | SceneNodeFlags::NO_CULLING);
    graph.node_mut(inactive).unwrap().set_flags(SceneNodeFlags::INACTIVE);

    let query = run(&mut graph, camera, CullConfig::default());
    assert!(!query.tree().contains(hidden));
    assert!(!query.tree().contains(inactive));
}

#[test]
fn test_no_recursion_keeps_container_but_not_children() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let group = graph.create_container(root, "group").unwrap();
    let child = boxed_node(&mut graph, group, "child", Vec3::new(0.0, 0.0, 10.0));
    graph.node_mut(group).unwrap().set_flags(SceneNodeFlags::NO_RECURSION);

    let query = run(&mut graph, camera, CullConfig::default());
    let group_vis = query.tree().find(group).unwrap();
    assert!(group_vis.is_container());
    assert_eq!(group_vis.children().count(), 0);
    assert!(!query.tree().contains(child));
}

// ============================================================================
// Tests: Anti-portals
// ============================================================================

#[test]
fn test_anti_portal_hides_nodes_completely_behind_it() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let wall = graph.create_anti_portal(root, "wall", opening(5.0)).unwrap();
    let hidden = boxed_node(&mut graph, root, "hidden", Vec3::new(0.0, 0.0, 10.0));
    let straddling = boxed_node(&mut graph, root, "straddling", Vec3::new(2.0, 0.0, 10.0));
    let aside = boxed_node(&mut graph, root, "aside", Vec3::new(5.0, 0.0, 10.0));
    let before = boxed_node(&mut graph, root, "before", Vec3::new(0.0, 0.0, 3.0));

    let query = run(&mut graph, camera, CullConfig::default());
    let tree = query.tree();
    assert!(tree.contains(wall));
    assert!(!tree.contains(hidden));
    assert!(tree.contains(straddling));
    assert!(tree.contains(aside));
    assert!(tree.contains(before));
    assert_eq!(query.statistics().anti_portal_culled, 1);
}

#[test]
fn test_anti_portal_seen_from_front_does_not_occlude() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let reversed = Polygon::new(opening(5.0).vertices().iter().rev().copied().collect());
    graph.create_anti_portal(root, "wall", reversed).unwrap();
    let node = boxed_node(&mut graph, root, "node", Vec3::new(0.0, 0.0, 10.0));

    let query = run(&mut graph, camera, CullConfig::default());
    assert!(query.tree().contains(node));
    assert_eq!(query.statistics().anti_portal_culled, 0);
}

#[test]
fn test_inactive_anti_portal_and_no_culling_nodes_are_not_occluded() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let wall = graph.create_anti_portal(root, "wall", opening(5.0)).unwrap();
    let overlay = boxed_node(&mut graph, root, "overlay", Vec3::new(0.0, 0.0, 10.0));
    let node = boxed_node(&mut graph, root, "node", Vec3::new(0.0, 0.0, 12.0));
    graph.node_mut(overlay).unwrap().set_flags(SceneNodeFlags::NO_CULLING);

    let query = run(&mut graph, camera, CullConfig::default());
    assert!(query.tree().contains(overlay));
    assert!(!query.tree().contains(node));

    graph.node_mut(wall).unwrap().set_flags(SceneNodeFlags::INACTIVE);
    let query = run(&mut graph, camera, CullConfig::default());
    assert!(query.tree().contains(node));
}

// ============================================================================
// Tests: World matrices and rebasing
// ============================================================================

#[test]
fn test_nested_container_world_matrix() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let a = graph.create_container(root, "A").unwrap();
    let b = graph.create_container(a, "B").unwrap();
    let c = graph.create_container(b, "C").unwrap();
    let leaf = graph.create_node(c, "L").unwrap();
    graph.set_position(a, Vec3::new(1.0, 0.0, 0.0)).unwrap();
    graph.set_position(b, Vec3::new(0.0, 2.0, 0.0)).unwrap();
    graph.set_position(c, Vec3::new(0.0, 0.0, 3.0)).unwrap();

    let query = run(&mut graph, camera, CullConfig::default());
    let world = query.tree().find(leaf).unwrap().world_matrix();

    let expected = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    assert!(world.abs_diff_eq(expected, 1e-6));
    let product = graph.transform(a).unwrap().matrix()
        * graph.transform(b).unwrap().matrix()
        * graph.transform(c).unwrap().matrix()
        * graph.transform(leaf).unwrap().matrix();
    assert!(world.abs_diff_eq(product, 1e-6));
}

#[test]
fn test_camera_in_translated_container_is_rebased() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let rig = graph.create_container(root, "rig").unwrap();
    graph.set_position(rig, Vec3::new(0.0, 0.0, -10.0)).unwrap();
    let camera = graph.create_camera(rig, "camera", Camera::new()).unwrap();
    let ahead = boxed_node(&mut graph, root, "ahead", Vec3::ZERO);
    let behind = boxed_node(&mut graph, root, "behind", Vec3::new(0.0, 0.0, -20.0));

    let query = run(&mut graph, camera, CullConfig::default());
    let tree = query.tree();
    assert!(tree.contains(ahead));
    assert!(!tree.contains(behind));
    assert!(tree.camera_position().abs_diff_eq(Vec3::new(0.0, 0.0, -10.0), 1e-5));
    assert_eq!(tree.camera(), Some(camera));
    assert!(tree.view_matrix().transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(0.0, 0.0, -10.0), 1e-4));
}

#[test]
fn test_camera_outside_root_gives_empty_tree() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let island = graph.create_container(root, "island").unwrap();
    boxed_node(&mut graph, island, "node", Vec3::new(0.0, 0.0, 10.0));

    let view = CullView::from_camera(&mut graph, camera, &viewport()).unwrap();
    let mut query = CullQuery::new(CullConfig::default());
    assert!(query.perform(&mut graph, island, &view).is_empty());
    assert!(CullView::from_camera(&mut graph, island, &viewport()).is_none());
}

#[test]
fn test_raw_view_without_camera_node() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let node = boxed_node(&mut graph, root, "node", Vec3::new(0.0, 0.0, -10.0));

    // Looking down -Z from the origin
    let view = CullView::new(root, Mat4::IDENTITY, Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 100.0), viewport(), false);
    let mut query = CullQuery::new(CullConfig::default());
    let tree = query.perform(&mut graph, root, &view);
    assert!(tree.contains(node));
    assert_eq!(tree.camera(), None);
}

// ============================================================================
// Tests: Distances and ordering
// ============================================================================

#[test]
fn test_squared_distance_is_container_relative() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let group = graph.create_container(root, "group").unwrap();
    graph.set_position(group, Vec3::new(0.0, 0.0, 10.0)).unwrap();
    let node = boxed_node(&mut graph, group, "node", Vec3::new(0.0, 3.0, 0.0));

    let query = run(&mut graph, camera, CullConfig::default());
    let distance = query.tree().find(node).unwrap().squared_distance();
    assert!((distance - 109.0).abs() < 1e-3);
}

#[test]
fn test_max_draw_distance() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let near = boxed_node(&mut graph, root, "near", Vec3::new(0.0, 0.0, 10.0));
    let far = boxed_node(&mut graph, root, "far", Vec3::new(0.0, 0.0, 30.0));
    graph.node_mut(near).unwrap().set_max_draw_distance(20.0);
    graph.node_mut(far).unwrap().set_max_draw_distance(20.0);

    let query = run(&mut graph, camera, CullConfig::default());
    assert!(query.tree().contains(near));
    assert!(!query.tree().contains(far));
    assert_eq!(query.statistics().distance_culled, 1);

    let config = CullConfig { use_max_draw_distance: false, ..CullConfig::default() };
    let query = run(&mut graph, camera, config);
    assert!(query.tree().contains(far));
}

#[test]
fn test_insertion_order_without_sorting() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let group = graph.create_container(root, "group").unwrap();
    let far = boxed_node(&mut graph, group, "far", Vec3::new(0.0, 0.0, 30.0));
    let near = boxed_node(&mut graph, group, "near", Vec3::new(0.0, 0.0, 10.0));

    let query = run(&mut graph, camera, CullConfig::default());
    let order: Vec<_> = query.tree().find(group).unwrap().children().map(|n| n.scene_node_key().unwrap()).collect();
    assert_eq!(order, vec![far, near]);
}

#[test]
fn test_sort_by_distance_front_to_back_with_negative_priority() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let group = graph.create_container(root, "group").unwrap();
    let far = boxed_node(&mut graph, group, "far", Vec3::new(0.0, 0.0, 30.0));
    let near = boxed_node(&mut graph, group, "near", Vec3::new(0.0, 0.0, 10.0));
    let middle = boxed_node(&mut graph, group, "middle", Vec3::new(0.0, 0.0, 20.0));
    let sky = boxed_node(&mut graph, group, "sky", Vec3::new(0.0, 0.0, 40.0));
    graph.node_mut(sky).unwrap().set_max_draw_distance(-1.0);

    let config = CullConfig { sort_by_distance: true, ..CullConfig::default() };
    let query = run(&mut graph, camera, config);
    let order: Vec<_> = query.tree().find(group).unwrap().children().map(|n| n.scene_node_key().unwrap()).collect();
    assert_eq!(order, vec![sky, near, middle, far]);
}

// ============================================================================
// Tests: Modifiers
// ============================================================================

#[test]
fn test_billboard_turns_toward_camera() {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let camera = graph.create_camera(root, "camera", Camera::new()).unwrap();
    let sprite = graph.create_node(root, "sprite").unwrap();
    graph.set_transform(sprite, Transform {
        position: Vec3::new(10.0, 0.0, 10.0),
        scale: Vec3::splat(2.0),
        ..Transform::default()
    }).unwrap();
    graph.add_modifier(sprite, Box::new(BillboardModifier::new("billboard"))).unwrap();

    let query = run(&mut graph, camera, CullConfig::default());
    let world = query.tree().find(sprite).unwrap().world_matrix();

    let facing = world.transform_vector3(Vec3::Z).normalize();
    assert!(facing.abs_diff_eq(Vec3::new(-1.0, 0.0, -1.0).normalize(), 1e-4));
    assert!(world.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(10.0, 0.0, 10.0), 1e-4));
    assert!((world.transform_vector3(Vec3::Z).length() - 2.0).abs() < 1e-4);
    // The authored transform is untouched
    assert_eq!(graph.transform(sprite).unwrap().rotation, glam::Quat::IDENTITY);
}

// ============================================================================
// Tests: Cells and portals
// ============================================================================

#[test]
fn test_portal_narrows_view_into_target_cell() {
    let Cells { mut graph, camera, cell_b, portal, inside, beside, .. } = cells();
    let query = run(&mut graph, camera, CullConfig::default());
    let tree = query.tree();

    let portal_vis = tree.find(portal).unwrap();
    let target = portal_vis.target().unwrap();
    assert_eq!(target.scene_node_key(), Some(cell_b));
    assert!(target.is_cell());
    assert_eq!(target.parent().unwrap().id(), portal_vis.id());

    assert!(tree.contains(inside));
    assert!(!tree.contains(beside));
    assert_eq!(query.statistics().portals_traversed, 1);

    // The opening only covers part of the screen
    let rect = target.projection().unwrap().rect;
    assert!(rect.width() < 800.0 && rect.width() > 0.0);
}

#[test]
fn test_other_cells_are_only_reached_through_portals() {
    let Cells { mut graph, camera, cell_a, cell_b, portal, .. } = cells();
    graph.node_mut(portal).unwrap().set_flags(SceneNodeFlags::NO_SEE_THROUGH);

    let query = run(&mut graph, camera, CullConfig::default());
    let tree = query.tree();
    assert!(tree.contains(cell_a));
    assert!(!tree.contains(cell_b));
}

#[test]
fn test_no_see_through_portal_has_no_target() {
    let Cells { mut graph, camera, portal, inside, .. } = cells();
    graph.node_mut(portal).unwrap().set_flags(SceneNodeFlags::NO_SEE_THROUGH);

    let query = run(&mut graph, camera, CullConfig::default());
    let portal_vis = query.tree().find(portal).unwrap();
    assert!(portal_vis.target().is_none());
    assert!(!query.tree().contains(inside));
}

#[test]
fn test_destroyed_target_cell_gives_null_target() {
    let Cells { mut graph, camera, cell_b, portal, .. } = cells();
    graph.destroy_node(cell_b).unwrap();

    let query = run(&mut graph, camera, CullConfig::default());
    assert!(query.tree().find(portal).unwrap().target().is_none());
    assert_eq!(query.statistics().portals_blocked, 1);
}

#[test]
fn test_portal_behind_camera_leads_nowhere() {
    let Cells { mut graph, camera, portal, inside, .. } = cells();
    graph.set_rotation(camera, glam::Quat::from_rotation_y(std::f32::consts::PI)).unwrap();

    let query = run(&mut graph, camera, CullConfig::default());
    // A flat opening is never frustum culled, but nothing of it is visible
    assert!(query.tree().find(portal).unwrap().target().is_none());
    assert!(!query.tree().contains(inside));
    assert_eq!(query.statistics().portals_blocked, 1);
}

#[test]
fn test_portal_seen_from_front_is_skipped() {
    let Cells { mut graph, camera, cell_b, .. } = cells();
    // Way back from cell B into cell A, facing toward A: the camera is in front of it
    let back = graph.create_portal(cell_b, "back", Polygon::new(opening(5.0).vertices().iter().rev().copied().collect()), None).unwrap();

    let query = run(&mut graph, camera, CullConfig::default());
    assert!(query.tree().contains(cell_b));
    assert!(!query.tree().contains(back));
}

#[test]
fn test_portal_depth_limit() {
    let Cells { mut graph, camera, cell_b, .. } = cells();
    let root = graph.root();
    let cell_c = graph.create_cell(root, "cell_c").unwrap();
    let second = graph.create_portal(cell_b, "second", opening(15.0), Some(cell_c)).unwrap();
    let deep = boxed_node(&mut graph, cell_c, "deep", Vec3::new(0.0, 0.0, 20.0));

    let query = run(&mut graph, camera, CullConfig::default());
    assert!(query.tree().contains(deep));
    assert_eq!(query.statistics().portals_traversed, 2);

    let config = CullConfig { max_portal_depth: 1, ..CullConfig::default() };
    let query = run(&mut graph, camera, config);
    assert!(query.tree().find(second).unwrap().target().is_none());
    assert!(!query.tree().contains(deep));
    assert_eq!(query.statistics().portals_blocked, 1);
}

#[test]
fn test_portal_warp_keeps_world_positions() {
    let Cells { mut graph, camera, cell_b, inside, .. } = cells();
    graph.set_position(cell_b, Vec3::new(100.0, 0.0, 0.0)).unwrap();
    graph.set_position(inside, Vec3::new(-100.0, 0.0, 10.0)).unwrap();

    let query = run(&mut graph, camera, CullConfig::default());
    let world = query.tree().find(inside).unwrap().world_matrix();
    assert!(world.abs_diff_eq(graph.world_matrix(inside).unwrap(), 1e-4));
}

#[test]
fn test_portal_near_camera_reuses_frustum() {
    let Cells { mut graph, camera, portal, beside, .. } = cells();
    graph.set_portal_polygon(portal, opening(0.3)).unwrap();

    let query = run(&mut graph, camera, CullConfig::default());
    // Not narrowed: everything in the camera frustum behind the opening shows
    assert!(query.tree().contains(beside));
}
