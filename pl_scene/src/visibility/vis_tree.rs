/// VisTree: per-frame, camera-relative tree of visible scene nodes.
///
/// Nodes are stored in a flat vector addressed by `VisNodeId`; the tree
/// structure lives in container child lists and portal targets. The tree
/// also carries the ambient camera data (root-space view and projection,
/// eye position, viewport) every derived VisNode matrix depends on.
///
/// A tree is rebuilt from scratch by each traversal. `clear()` keeps the
/// allocations for the next frame.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use crate::renderer::Viewport;
use crate::scene::{SceneGraph, SceneNode, SceneNodeKey};
use super::vis_node::{VisKind, VisNode, VisNodeId, VisProjection};

#[derive(Debug)]
pub struct VisTree {
    nodes: Vec<VisNode>,
    /// First VisNode of each scene node
    index: FxHashMap<SceneNodeKey, VisNodeId>,
    camera: Option<SceneNodeKey>,
    view: Mat4,
    projection: Mat4,
    view_projection: Mat4,
    camera_position: Vec3,
    viewport: Viewport,
}

impl Default for VisTree {
    fn default() -> Self {
        Self::new()
    }
}

impl VisTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: FxHashMap::default(),
            camera: None,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            viewport: Viewport::new(0.0, 0.0),
        }
    }

    /// Drop every node, keep the allocations
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
    }

    /// Start a new tree for a camera
    pub(crate) fn begin(
        &mut self,
        camera: Option<SceneNodeKey>,
        view: Mat4,
        projection: Mat4,
        camera_position: Vec3,
        viewport: Viewport,
    ) {
        self.clear();
        self.camera = camera;
        self.view = view;
        self.projection = projection;
        self.view_projection = projection * view;
        self.camera_position = camera_position;
        self.viewport = viewport;
    }

    /// Append a node and link it into its parent container
    pub(crate) fn push(
        &mut self,
        parent: Option<VisNodeId>,
        scene_node: Option<SceneNodeKey>,
        kind: VisKind,
        world: Mat4,
        squared_distance: f32,
    ) -> VisNodeId {
        let id = VisNodeId(self.nodes.len() as u32);
        self.nodes.push(VisNode::new(parent, scene_node, kind, world, squared_distance));

        if let Some(VisKind::Container { children, .. }) = parent.and_then(|p| self.nodes.get_mut(p.index())).map(|n| &mut n.kind) {
            children.push(id);
        }
        if let Some(key) = scene_node {
            self.index.entry(key).or_insert(id);
        }
        id
    }

    pub(crate) fn set_portal_target(&mut self, portal: VisNodeId, target: Option<VisNodeId>) {
        if let Some(VisKind::Portal { target: slot }) = self.nodes.get_mut(portal.index()).map(|n| &mut n.kind) {
            *slot = target;
        }
    }

    // ===== AMBIENT CAMERA DATA =====

    /// Camera node this tree was built for
    pub fn camera(&self) -> Option<SceneNodeKey> {
        self.camera
    }

    /// Root-space view matrix
    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_projection
    }

    /// Eye position in root space
    pub fn camera_position(&self) -> Vec3 {
        self.camera_position
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Replace the ambient matrices; camera-dependent VisNode matrices are
    /// derived again on their next access
    pub fn set_view_projection(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
        self.view_projection = projection * view;
        for node in &self.nodes {
            node.invalidate_camera_dependent();
        }
    }

    // ===== NODES =====

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: VisNodeId) -> Option<VisNodeRef<'_>> {
        self.nodes.get(id.index()).map(|_| VisNodeRef { tree: self, id })
    }

    /// VisContainer of the traversal root
    pub fn root(&self) -> Option<VisNodeRef<'_>> {
        self.node(VisNodeId(0))
    }

    /// Overwrite a node's world matrix. Does not touch its children.
    pub fn set_world_matrix(&mut self, id: VisNodeId, world: Mat4) -> bool {
        match self.nodes.get_mut(id.index()) {
            Some(node) => {
                node.set_world_matrix(world);
                true
            }
            None => false,
        }
    }

    /// VisNode of a scene node, if it made it into this tree
    pub fn find(&self, key: SceneNodeKey) -> Option<VisNodeRef<'_>> {
        self.index.get(&key).and_then(|&id| self.node(id))
    }

    pub fn contains(&self, key: SceneNodeKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Depth-first walk from the root. Portal targets follow their portal.
    pub fn iter(&self) -> VisTreeIter<'_> {
        VisTreeIter {
            tree: self,
            stack: if self.nodes.is_empty() { Vec::new() } else { vec![VisNodeId(0)] },
        }
    }

    fn raw(&self, id: VisNodeId) -> &VisNode {
        &self.nodes[id.index()]
    }
}

/// Depth-first iterator over a `VisTree`
pub struct VisTreeIter<'a> {
    tree: &'a VisTree,
    stack: Vec<VisNodeId>,
}

impl<'a> Iterator for VisTreeIter<'a> {
    type Item = VisNodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.raw(id);
        match &node.kind {
            VisKind::Container { children, .. } => self.stack.extend(children.iter().rev().copied()),
            VisKind::Portal { target: Some(target) } => self.stack.push(*target),
            _ => {}
        }
        Some(VisNodeRef { tree: self.tree, id })
    }
}

// ===== NODE REFERENCE =====

/// Borrowed view of one VisNode together with its tree's ambient camera
/// data. Derived matrices are computed lazily and cached per node.
#[derive(Clone, Copy)]
pub struct VisNodeRef<'a> {
    tree: &'a VisTree,
    id: VisNodeId,
}

impl<'a> std::fmt::Debug for VisNodeRef<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisNodeRef")
            .field("id", &self.id)
            .field("node", self.node())
            .finish()
    }
}

impl<'a> VisNodeRef<'a> {
    pub fn id(&self) -> VisNodeId {
        self.id
    }

    pub fn tree(&self) -> &'a VisTree {
        self.tree
    }

    pub fn node(&self) -> &'a VisNode {
        self.tree.raw(self.id)
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.node().world_matrix()
    }

    pub fn inverse_world_matrix(&self) -> Mat4 {
        self.node().inverse_world_matrix()
    }

    pub fn world_view_matrix(&self) -> Mat4 {
        self.node().world_view_matrix(&self.tree.view)
    }

    pub fn world_view_projection_matrix(&self) -> Mat4 {
        self.node().world_view_projection_matrix(&self.tree.view_projection)
    }

    pub fn squared_distance(&self) -> f32 {
        self.node().squared_distance()
    }

    pub fn derivation_count(&self) -> u32 {
        self.node().derivation_count()
    }

    /// `None` exactly at the root
    pub fn parent(&self) -> Option<VisNodeRef<'a>> {
        self.node().parent.and_then(|p| self.tree.node(p))
    }

    pub fn children(&self) -> impl Iterator<Item = VisNodeRef<'a>> + 'a {
        let tree = self.tree;
        self.node().children().iter().map(move |&id| VisNodeRef { tree, id })
    }

    pub fn is_container(&self) -> bool {
        self.node().is_container()
    }

    pub fn is_cell(&self) -> bool {
        self.node().is_cell()
    }

    pub fn is_portal(&self) -> bool {
        self.node().is_portal()
    }

    /// Target VisContainer of a portal
    pub fn target(&self) -> Option<VisNodeRef<'a>> {
        self.node().target().and_then(|t| self.tree.node(t))
    }

    pub fn projection(&self) -> Option<&'a VisProjection> {
        self.node().projection()
    }

    pub fn scene_node_key(&self) -> Option<SceneNodeKey> {
        self.node().scene_node_key()
    }

    /// The mirrored scene node, `None` if it was destroyed meanwhile
    pub fn scene_node<'g>(&self, graph: &'g SceneGraph) -> Option<&'g SceneNode> {
        self.scene_node_key().and_then(|key| graph.node(key))
    }
}
