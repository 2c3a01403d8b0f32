/// CullQuery: builds the visibility tree of one camera.
///
/// A single forward depth-first pass over the scene graph, starting at a
/// root container:
///
/// - skips inactive and invisible nodes, nodes already in the tree and,
///   while the camera stands inside a cell, cells off the camera's chain
/// - culls nodes beyond their maximum draw distance, nodes whose
///   container-space bounding box misses the current frustum and nodes
///   hidden behind an anti-portal of the same container
/// - adds every remaining node (optionally sorted front to back), runs its
///   modifiers and recurses into containers
/// - looks through cell portals with a frustum narrowed to the visible
///   part of the portal polygon, warped into the target cell
///
/// The traversal never fails. Anything it cannot resolve is left out, and a
/// portal it cannot look through keeps a `None` target.

use std::time::{Duration, Instant};
use glam::{Mat4, Vec2, Vec3};
use rustc_hash::FxHashSet;
use crate::config::CullConfig;
use crate::math::{classify_point, plane_distance, FrustumTest, PlaneSet, PlaneSide, Polygon};
use crate::renderer::{ScreenRect, Viewport};
use crate::scene::{SceneGraph, SceneNodeFlags, SceneNodeKey};
use crate::{pl_debug, pl_trace, pl_warn};
use super::distance_sort;
use super::vis_node::{VisKind, VisNodeId, VisProjection};
use super::vis_tree::VisTree;

// ===== STATISTICS =====

/// Counters of the last traversal
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CullStatistics {
    /// Child nodes examined
    pub traversed_nodes: u32,
    pub frustum_culled: u32,
    pub distance_culled: u32,
    /// Nodes completely behind an anti-portal
    pub anti_portal_culled: u32,
    /// Nodes accepted without a frustum test (no-culling flag, degenerate
    /// box, or a container holding a no-culling node)
    pub skipped_frustum_tests: u32,
    /// Scene nodes added to the tree, root excluded
    pub visible_nodes: u32,
    pub portals_traversed: u32,
    pub portals_blocked: u32,
    pub cull_time: Duration,
}

// ===== VIEW =====

/// Camera data a traversal starts from, in the camera container's space
#[derive(Debug, Clone)]
pub struct CullView {
    /// Camera node, if the view comes from one
    pub camera: Option<SceneNodeKey>,
    /// Container the camera lives in
    pub container: SceneNodeKey,
    pub view: Mat4,
    pub projection: Mat4,
    pub frustum: PlaneSet,
    /// Eye position
    pub position: Vec3,
    pub viewport: Viewport,
}

impl CullView {
    /// View from raw matrices expressed in `container`'s space
    pub fn new(container: SceneNodeKey, view: Mat4, projection: Mat4, viewport: Viewport, infinite_far: bool) -> Self {
        Self {
            camera: None,
            container,
            view,
            projection,
            frustum: PlaneSet::from_view_projection(&(projection * view), infinite_far),
            position: view.inverse().transform_point3(Vec3::ZERO),
            viewport,
        }
    }

    /// View of a camera node, deriving whatever the camera has marked
    pub fn from_camera(graph: &mut SceneGraph, camera: SceneNodeKey, viewport: &Viewport) -> Option<Self> {
        let container = graph.parent(camera)?;
        let (cam, transform) = graph.camera_with_transform(camera)?;
        let projection = cam.projection_matrix(viewport);
        let view = cam.view_matrix(transform);
        let frustum = cam.frustum(transform, viewport).clone();
        Some(Self {
            camera: Some(camera),
            container,
            view,
            projection,
            frustum,
            position: transform.position,
            viewport: *viewport,
        })
    }
}

// ===== TRAVERSAL STATE =====

/// Where the traversal currently is: a container's space as seen by the
/// camera
struct Space {
    /// Container to root space
    world: Mat4,
    frustum: PlaneSet,
    camera_position: Vec3,
    rect: ScreenRect,
    portal_depth: u32,
}

/// Camera placement, fixed for one traversal
struct CameraChain {
    container: SceneNodeKey,
    /// Camera container and every container above it
    chain: FxHashSet<SceneNodeKey>,
    in_cell: bool,
}

// ===== QUERY =====

/// Reusable visibility query. Keeps its tree allocation between frames.
#[derive(Debug, Default)]
pub struct CullQuery {
    config: CullConfig,
    tree: VisTree,
    statistics: CullStatistics,
    touched: FxHashSet<SceneNodeKey>,
    /// Containers with a visible no-culling node somewhere below them
    no_culling_containers: FxHashSet<SceneNodeKey>,
}

impl CullQuery {
    pub fn new(config: CullConfig) -> Self {
        Self {
            config,
            tree: VisTree::new(),
            statistics: CullStatistics::default(),
            touched: FxHashSet::default(),
            no_culling_containers: FxHashSet::default(),
        }
    }

    pub fn config(&self) -> &CullConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CullConfig) {
        self.config = config;
    }

    /// Tree of the last traversal
    pub fn tree(&self) -> &VisTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut VisTree {
        &mut self.tree
    }

    pub fn statistics(&self) -> &CullStatistics {
        &self.statistics
    }

    /// Build the visibility tree of `view` below `root`.
    ///
    /// The tree is expressed in `root`'s space: the root VisContainer has an
    /// identity world matrix and the camera data is rebased accordingly.
    /// The camera's container must be `root` or lie below it; otherwise the
    /// tree stays empty.
    pub fn perform(&mut self, graph: &mut SceneGraph, root: SceneNodeKey, view: &CullView) -> &VisTree {
        let start = Instant::now();
        self.statistics = CullStatistics::default();
        self.touched.clear();

        let Some(container_to_root) = graph.relative_matrix(root, view.container) else {
            pl_warn!("plscene::CullQuery", "Camera container is not below the traversal root");
            self.tree.begin(view.camera, view.view, view.projection, view.position, view.viewport);
            return &self.tree;
        };
        let root_to_container = container_to_root.inverse();
        let camera_position = container_to_root.transform_point3(view.position);
        self.tree.begin(
            view.camera,
            view.view * root_to_container,
            view.projection,
            camera_position,
            view.viewport,
        );

        let Some(root_node) = graph.node(root).filter(|n| n.is_container()) else {
            return &self.tree;
        };
        let root_is_cell = root_node.is_cell();

        let mut chain = FxHashSet::default();
        let mut in_cell = false;
        let mut current = Some(view.container);
        while let Some(key) = current {
            in_cell |= graph.node(key).is_some_and(|n| n.is_cell());
            chain.insert(key);
            if key == root {
                break;
            }
            current = graph.parent(key);
        }
        let camera = CameraChain { container: view.container, chain, in_cell };
        self.collect_no_culling_containers(graph);

        let rect = view.viewport.rect();
        let root_vis = self.tree.push(
            None,
            Some(root),
            VisKind::Container {
                children: Vec::new(),
                cell: root_is_cell,
                projection: VisProjection { rect, min_z: view.viewport.min_depth, max_z: view.viewport.max_depth },
            },
            Mat4::IDENTITY,
            0.0,
        );
        self.touched.insert(root);

        let space = Space {
            world: Mat4::IDENTITY,
            frustum: view.frustum.transformed(&container_to_root),
            camera_position,
            rect,
            portal_depth: 0,
        };
        self.traverse(graph, root, root_vis, &space, &camera);

        self.statistics.visible_nodes = (self.tree.len() - 1) as u32;
        self.statistics.cull_time = start.elapsed();
        let s = &self.statistics;
        pl_trace!("plscene::CullQuery",
            "traversed {}, visible {}, frustum culled {}, distance culled {}, portals {}/{} blocked, {:?}",
            s.traversed_nodes, s.visible_nodes, s.frustum_culled, s.distance_culled,
            s.portals_traversed, s.portals_blocked, s.cull_time);
        &self.tree
    }

    /// Visit the children of `container`
    fn traverse(
        &mut self,
        graph: &mut SceneGraph,
        container: SceneNodeKey,
        container_vis: VisNodeId,
        space: &Space,
        camera: &CameraChain,
    ) {
        // Gather
        let children = graph.children(container).to_vec();
        let occluders = self.anti_portals(graph, &children, space);
        let mut visible: Vec<SceneNodeKey> = Vec::with_capacity(children.len());
        let mut distances: Vec<f32> = Vec::with_capacity(children.len());
        let mut sort_keys: Vec<f32> = Vec::with_capacity(children.len());

        for child in children {
            let Some(node) = graph.node(child) else {
                continue;
            };
            self.statistics.traversed_nodes += 1;

            if !node.is_visible() || self.touched.contains(&child) {
                continue;
            }
            if node.is_cell() && camera.in_cell && !camera.chain.contains(&child) {
                continue;
            }
            // Portals leading out of other cells only count when seen from behind
            if camera.in_cell && container != camera.container {
                if let Some(plane) = node.portal().and_then(|p| p.polygon().plane()) {
                    let eye = node.local_matrix().inverse().transform_point3(space.camera_position);
                    if classify_point(plane, eye) == PlaneSide::InFront {
                        continue;
                    }
                }
            }

            let no_culling = node.flags().contains(SceneNodeFlags::NO_CULLING);
            let max_draw_distance = node.max_draw_distance();
            let Some(aabb) = graph.container_bounding_box(child) else {
                continue;
            };

            let distance = aabb.center().distance_squared(space.camera_position);
            let mut sort_key = distance;
            if self.config.use_max_draw_distance {
                let limit = max_draw_distance * max_draw_distance;
                if max_draw_distance > 0.0 && distance > limit {
                    self.statistics.distance_culled += 1;
                    continue;
                }
                if max_draw_distance < 0.0 {
                    sort_key = -limit;
                }
            }

            if no_culling || aabb.is_degenerate() || self.no_culling_containers.contains(&child) {
                self.statistics.skipped_frustum_tests += 1;
            } else if !space.frustum.intersects_aabb(&aabb) {
                self.statistics.frustum_culled += 1;
                continue;
            } else if occluders
                .iter()
                .any(|(occluder, volume)| *occluder != child && volume.classify_aabb(&aabb) == FrustumTest::Inside)
            {
                self.statistics.anti_portal_culled += 1;
                continue;
            }

            self.touched.insert(child);
            visible.push(child);
            distances.push(distance);
            sort_keys.push(sort_key);
        }

        let order: Vec<usize> = if self.config.sort_by_distance {
            distance_sort::front_to_back(&sort_keys)
        } else {
            (0..visible.len()).collect()
        };

        // Add, notify, recurse
        for i in order {
            let child = visible[i];
            let Some(node) = graph.node(child) else {
                continue;
            };
            let local = node.local_matrix();
            let world = space.world * local;
            let recurse = node.is_container() && !node.flags().contains(SceneNodeFlags::NO_RECURSION);
            let is_portal = node.is_portal();
            let kind = if node.is_container() {
                VisKind::Container {
                    children: Vec::new(),
                    cell: node.is_cell(),
                    projection: VisProjection { rect: space.rect, min_z: 0.0, max_z: 1.0 },
                }
            } else if is_portal {
                VisKind::Portal { target: None }
            } else {
                VisKind::Node
            };

            let id = self.tree.push(Some(container_vis), Some(child), kind, world, distances[i]);
            graph.notify_added_to_visibility_tree(child, &mut self.tree, id);

            if recurse {
                let to_child = local.inverse();
                let child_space = Space {
                    world,
                    frustum: space.frustum.transformed(&to_child),
                    camera_position: to_child.transform_point3(space.camera_position),
                    rect: space.rect,
                    portal_depth: space.portal_depth,
                };
                self.traverse(graph, child, id, &child_space, camera);
            } else if is_portal {
                self.traverse_portal(graph, child, id, &local, space, camera);
            }
        }
    }

    /// Containers that must not be frustum culled because a visible
    /// no-culling node lives below them
    fn collect_no_culling_containers(&mut self, graph: &SceneGraph) {
        self.no_culling_containers.clear();
        for (key, node) in graph.iter() {
            if !node.is_visible() || !node.flags().contains(SceneNodeFlags::NO_CULLING) {
                continue;
            }
            let mut current = graph.parent(key);
            while let Some(container) = current {
                if !self.no_culling_containers.insert(container) {
                    break;
                }
                current = graph.parent(container);
            }
        }
    }

    /// Occlusion volumes of the anti-portals among `children`.
    ///
    /// An anti-portal counts when it is visible, the camera is not in front
    /// of it and it is inside the current frustum. Its volume runs from the
    /// eye through the polygon edges and is closed by the polygon plane, so
    /// only what lies behind the occluder is inside.
    fn anti_portals(&self, graph: &mut SceneGraph, children: &[SceneNodeKey], space: &Space) -> Vec<(SceneNodeKey, PlaneSet)> {
        let mut occluders = Vec::new();
        for &child in children {
            let Some(node) = graph.node(child) else {
                continue;
            };
            if !node.is_visible() {
                continue;
            }
            let Some(anti_portal) = node.anti_portal() else {
                continue;
            };
            let local = node.local_matrix();
            if let Some(plane) = anti_portal.polygon().plane() {
                let eye = local.inverse().transform_point3(space.camera_position);
                if classify_point(plane, eye) == PlaneSide::InFront {
                    continue;
                }
            }
            let polygon = anti_portal.polygon().transformed(&local);
            let no_culling = node.flags().contains(SceneNodeFlags::NO_CULLING);
            if polygon.len() < 3 {
                continue;
            }
            if !no_culling {
                let Some(aabb) = graph.container_bounding_box(child) else {
                    continue;
                };
                if !aabb.is_degenerate() && !space.frustum.intersects_aabb(&aabb) {
                    continue;
                }
            }

            let Some(plane) = polygon.plane() else {
                continue;
            };
            let near = if plane_distance(plane, space.camera_position) > 0.0 { -plane } else { plane };
            let volume = PlaneSet::from_view_polygon(polygon.vertices(), space.camera_position, Some(near), None);
            if volume.len() > 1 {
                occluders.push((child, volume));
            }
        }
        occluders
    }

    /// Look through a cell portal into its target cell
    fn traverse_portal(
        &mut self,
        graph: &mut SceneGraph,
        portal: SceneNodeKey,
        portal_vis: VisNodeId,
        portal_local: &Mat4,
        space: &Space,
        camera: &CameraChain,
    ) {
        let Some(node) = graph.node(portal) else {
            return;
        };
        if node.flags().contains(SceneNodeFlags::NO_SEE_THROUGH) {
            return;
        }
        let name = node.name().to_string();
        let Some(polygon) = node.portal().map(|p| p.polygon().transformed(portal_local)) else {
            return;
        };

        let Some(target) = graph.portal_target(portal) else {
            pl_debug!("plscene::CullQuery", "Portal '{}' has no target cell", name);
            self.statistics.portals_blocked += 1;
            return;
        };
        if self.touched.contains(&target) {
            return;
        }
        if space.portal_depth >= self.config.max_portal_depth {
            pl_debug!("plscene::CullQuery", "Portal '{}' exceeds the portal depth limit", name);
            self.statistics.portals_blocked += 1;
            return;
        }
        let Some(warp) = graph.portal_warp_matrix(portal) else {
            self.statistics.portals_blocked += 1;
            return;
        };

        let Some((clipped, rect)) = self.visible_opening(&polygon, space) else {
            self.statistics.portals_blocked += 1;
            return;
        };

        // Close to the opening a narrowed frustum degenerates: keep the current one
        let radius = self.config.portal_reuse_frustum_radius;
        let reuse = graph
            .container_bounding_box(portal)
            .is_some_and(|aabb| aabb.squared_distance_to_point(space.camera_position) <= radius * radius);
        let frustum = if reuse {
            space.frustum.clone()
        } else {
            let near = clipped.plane().map(|plane| {
                if plane_distance(plane, space.camera_position) > 0.0 { -plane } else { plane }
            });
            PlaneSet::from_view_polygon(clipped.vertices(), space.camera_position, near, space.frustum.far_plane())
        };

        let target_space = Space {
            world: space.world * warp.inverse(),
            frustum: frustum.transformed(&warp),
            camera_position: warp.transform_point3(space.camera_position),
            rect,
            portal_depth: space.portal_depth + 1,
        };

        let distance = self.tree.node(portal_vis).map_or(0.0, |v| v.squared_distance());
        let target_vis = self.tree.push(
            Some(portal_vis),
            Some(target),
            VisKind::Container {
                children: Vec::new(),
                cell: true,
                projection: VisProjection { rect, min_z: 0.0, max_z: 1.0 },
            },
            target_space.world,
            distance,
        );
        self.tree.set_portal_target(portal_vis, Some(target_vis));
        self.touched.insert(target);
        self.statistics.portals_traversed += 1;
        graph.notify_added_to_visibility_tree(target, &mut self.tree, target_vis);

        self.traverse(graph, target, target_vis, &target_space, camera);
    }

    /// Part of a container-space portal polygon inside the current frustum,
    /// with its screen rectangle (clipped against the current one and grown
    /// by one pixel). `None` when nothing of the opening is visible.
    fn visible_opening(&self, polygon: &Polygon, space: &Space) -> Option<(Polygon, ScreenRect)> {
        if !polygon.is_valid() {
            return None;
        }
        let clipped = polygon.clipped_by(&space.frustum);
        if !clipped.is_valid() {
            return None;
        }

        let mvp = self.tree.view_projection_matrix() * space.world;
        let rect = screen_rect(&clipped, &mvp, &self.tree.viewport())?.intersection(&space.rect)?;
        let grown = ScreenRect::new(rect.x0 - 1.0, rect.y0 - 1.0, rect.x1 + 1.0, rect.y1 + 1.0);
        Some((clipped, grown))
    }
}

/// Pixel rectangle covered by a polygon (y grows downward).
///
/// A vertex at or behind the eye plane makes the projection meaningless; the
/// whole viewport is returned then.
fn screen_rect(polygon: &Polygon, mvp: &Mat4, viewport: &Viewport) -> Option<ScreenRect> {
    let mut min = Vec2::splat(f32::MAX);
    let mut max = Vec2::splat(f32::MIN);
    for v in polygon.vertices() {
        let clip = *mvp * v.extend(1.0);
        if clip.w <= f32::EPSILON {
            return Some(viewport.rect());
        }
        let ndc = clip.truncate() / clip.w;
        let pixel = Vec2::new(
            viewport.x + (ndc.x * 0.5 + 0.5) * viewport.width,
            viewport.y + (0.5 - ndc.y * 0.5) * viewport.height,
        );
        min = min.min(pixel);
        max = max.max(pixel);
    }
    if polygon.is_empty() {
        return None;
    }
    Some(ScreenRect::new(min.x, min.y, max.x, max.y))
}

#[cfg(test)]
#[path = "cull_query_tests.rs"]
mod tests;
