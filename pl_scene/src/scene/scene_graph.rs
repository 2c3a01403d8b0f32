/// Scene graph: node table of the authored world.
///
/// Uses a SlotMap for O(1) insert/remove with stable keys. A key of a
/// destroyed node simply stops resolving, which is how VisNodes, portals and
/// the active camera hold "weak" references to scene nodes.
///
/// The graph always owns a root container named "Root". Every other node is
/// owned by a container and destroyed together with it.

use glam::{Mat4, Quat, Vec3};
use slotmap::SlotMap;
use crate::camera::Camera;
use crate::error::Result;
use crate::math::{AABB, Polygon};
use crate::visibility::{VisNodeId, VisTree};
use crate::{pl_bail, pl_debug};
use super::drawable::Drawable;
use super::modifier::SceneNodeModifier;
use super::scene_node::{
    AntiPortal, CellPortal, DrawFunctionFlags, ModifierKey, SceneNode, SceneNodeKey, SceneNodeKind,
};
use super::transform::Transform;

pub struct SceneGraph {
    nodes: SlotMap<SceneNodeKey, SceneNode>,
    modifiers: SlotMap<ModifierKey, Box<dyn SceneNodeModifier>>,
    root: SceneNodeKey,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub const ROOT_NAME: &'static str = "Root";

    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new(
            Self::ROOT_NAME,
            None,
            SceneNodeKind::Container { children: Vec::new(), cell: false },
        ));
        Self {
            nodes,
            modifiers: SlotMap::with_key(),
            root,
        }
    }

    // ===== LOOKUP =====

    pub fn root(&self) -> SceneNodeKey {
        self.root
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, key: SceneNodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node(&self, key: SceneNodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    /// Mutable access to flags and attributes. Transforms, bounding boxes
    /// and structure change through the graph methods.
    pub fn node_mut(&mut self, key: SceneNodeKey) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key)
    }

    pub fn parent(&self, key: SceneNodeKey) -> Option<SceneNodeKey> {
        self.nodes.get(key).and_then(|n| n.parent)
    }

    pub fn children(&self, key: SceneNodeKey) -> &[SceneNodeKey] {
        self.nodes.get(key).map(|n| n.children()).unwrap_or(&[])
    }

    /// Iterate over all nodes (unordered)
    pub fn iter(&self) -> impl Iterator<Item = (SceneNodeKey, &SceneNode)> {
        self.nodes.iter()
    }

    /// `key` and every node below it, depth first
    pub fn descendants(&self, key: SceneNodeKey) -> Vec<SceneNodeKey> {
        let mut result = Vec::new();
        if !self.contains(key) {
            return result;
        }
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        result
    }

    /// First node named `name`, in depth-first order from the root
    pub fn find(&self, name: &str) -> Option<SceneNodeKey> {
        self.descendants(self.root)
            .into_iter()
            .find(|&key| self.nodes[key].name() == name)
    }

    // ===== CREATION =====

    fn insert(&mut self, parent: SceneNodeKey, name: &str, kind: SceneNodeKind) -> Result<SceneNodeKey> {
        match self.nodes.get(parent) {
            Some(node) if node.is_container() => {}
            Some(node) => pl_bail!("plscene::SceneGraph", InvalidSceneNode,
                "Cannot add '{}': parent '{}' is not a container", name, node.name()),
            None => pl_bail!("plscene::SceneGraph", InvalidSceneNode,
                "Cannot add '{}': parent does not exist", name),
        }

        let key = self.nodes.insert(SceneNode::new(name, Some(parent), kind));
        if let SceneNodeKind::Container { children, .. } = &mut self.nodes[parent].kind {
            children.push(key);
        }
        self.mark_bounding_box_dirty(parent);
        Ok(key)
    }

    pub fn create_node(&mut self, parent: SceneNodeKey, name: &str) -> Result<SceneNodeKey> {
        self.insert(parent, name, SceneNodeKind::Node)
    }

    pub fn create_container(&mut self, parent: SceneNodeKey, name: &str) -> Result<SceneNodeKey> {
        self.insert(parent, name, SceneNodeKind::Container { children: Vec::new(), cell: false })
    }

    /// Container only reachable through cell portals while the camera is
    /// inside another cell
    pub fn create_cell(&mut self, parent: SceneNodeKey, name: &str) -> Result<SceneNodeKey> {
        self.insert(parent, name, SceneNodeKind::Container { children: Vec::new(), cell: true })
    }

    pub fn create_camera(&mut self, parent: SceneNodeKey, name: &str, camera: Camera) -> Result<SceneNodeKey> {
        self.insert(parent, name, SceneNodeKind::Camera(Box::new(camera)))
    }

    /// Cell portal with `polygon` in its local space leading into `target`
    pub fn create_portal(
        &mut self,
        parent: SceneNodeKey,
        name: &str,
        polygon: Polygon,
        target: Option<SceneNodeKey>,
    ) -> Result<SceneNodeKey> {
        self.insert(parent, name, SceneNodeKind::Portal(CellPortal::new(polygon, target)))
    }

    /// Occluder hiding the nodes of `parent` that lie behind `polygon`
    pub fn create_anti_portal(&mut self, parent: SceneNodeKey, name: &str, polygon: Polygon) -> Result<SceneNodeKey> {
        self.insert(parent, name, SceneNodeKind::AntiPortal(AntiPortal::new(polygon)))
    }

    // ===== DESTRUCTION =====

    /// Destroy a node together with everything it owns.
    ///
    /// Returns the number of destroyed nodes. The root cannot be destroyed.
    pub fn destroy_node(&mut self, key: SceneNodeKey) -> Result<usize> {
        if key == self.root {
            pl_bail!("plscene::SceneGraph", InvalidSceneNode, "The root container cannot be destroyed");
        }
        let Some(parent) = self.nodes.get(key).map(|n| n.parent) else {
            pl_bail!("plscene::SceneGraph", InvalidSceneNode, "Cannot destroy a node that does not exist");
        };

        if let Some(parent) = parent {
            if let Some(SceneNodeKind::Container { children, .. }) = self.nodes.get_mut(parent).map(|n| &mut n.kind) {
                children.retain(|&child| child != key);
            }
            self.mark_bounding_box_dirty(parent);
        }

        let doomed = self.descendants(key);
        for &node in &doomed {
            self.nodes.remove(node);
        }
        pl_debug!("plscene::SceneGraph", "Destroyed {} node(s)", doomed.len());
        Ok(doomed.len())
    }

    /// Move a node (and its subtree) to another container
    pub fn set_parent(&mut self, key: SceneNodeKey, new_parent: SceneNodeKey) -> Result<()> {
        if key == self.root || !self.contains(key) {
            pl_bail!("plscene::SceneGraph", InvalidSceneNode, "Cannot move this node");
        }
        if !self.nodes.get(new_parent).is_some_and(|n| n.is_container()) {
            pl_bail!("plscene::SceneGraph", InvalidSceneNode, "New parent is not a container");
        }
        if self.descendants(key).contains(&new_parent) {
            pl_bail!("plscene::SceneGraph", InvalidSceneNode, "Cannot move a node below itself");
        }

        if let Some(old_parent) = self.nodes[key].parent {
            if let SceneNodeKind::Container { children, .. } = &mut self.nodes[old_parent].kind {
                children.retain(|&child| child != key);
            }
            self.mark_bounding_box_dirty(old_parent);
        }
        if let SceneNodeKind::Container { children, .. } = &mut self.nodes[new_parent].kind {
            children.push(key);
        }
        self.nodes[key].parent = Some(new_parent);
        self.mark_bounding_box_dirty(new_parent);
        Ok(())
    }

    // ===== TRANSFORM =====

    pub fn transform(&self, key: SceneNodeKey) -> Option<Transform> {
        self.nodes.get(key).map(|n| n.transform)
    }

    fn modify_transform(&mut self, key: SceneNodeKey, f: impl FnOnce(&mut Transform)) -> Result<()> {
        let Some(node) = self.nodes.get_mut(key) else {
            pl_bail!("plscene::SceneGraph", InvalidSceneNode, "Cannot transform a node that does not exist");
        };
        let before = node.transform;
        f(&mut node.transform);
        if node.transform == before {
            return Ok(());
        }
        if let SceneNodeKind::Camera(camera) = &mut node.kind {
            camera.on_transform_changed();
        }
        if let Some(parent) = node.parent {
            self.mark_bounding_box_dirty(parent);
        }
        Ok(())
    }

    pub fn set_transform(&mut self, key: SceneNodeKey, transform: Transform) -> Result<()> {
        self.modify_transform(key, |t| *t = transform)
    }

    pub fn set_position(&mut self, key: SceneNodeKey, position: Vec3) -> Result<()> {
        self.modify_transform(key, |t| t.position = position)
    }

    pub fn set_rotation(&mut self, key: SceneNodeKey, rotation: Quat) -> Result<()> {
        self.modify_transform(key, |t| t.rotation = rotation)
    }

    pub fn set_scale(&mut self, key: SceneNodeKey, scale: Vec3) -> Result<()> {
        self.modify_transform(key, |t| t.scale = scale)
    }

    /// Node-to-root matrix
    pub fn world_matrix(&self, key: SceneNodeKey) -> Option<Mat4> {
        self.relative_matrix(self.root, key)
    }

    /// Matrix from `key`'s local space into `ancestor`'s local space.
    ///
    /// Identity when both are the same node, `None` when `ancestor` is not
    /// on `key`'s parent chain.
    pub fn relative_matrix(&self, ancestor: SceneNodeKey, key: SceneNodeKey) -> Option<Mat4> {
        let mut matrix = Mat4::IDENTITY;
        let mut current = key;
        loop {
            if current == ancestor {
                return Some(matrix);
            }
            let node = self.nodes.get(current)?;
            matrix = node.local_matrix() * matrix;
            current = node.parent?;
        }
    }

    // ===== BOUNDING BOX =====

    /// Flag `key` and every container above it for recomputation
    pub(crate) fn mark_bounding_box_dirty(&mut self, key: SceneNodeKey) {
        let mut current = Some(key);
        while let Some(k) = current {
            let Some(node) = self.nodes.get_mut(k) else {
                break;
            };
            node.bounding_box_dirty = true;
            current = node.parent;
        }
    }

    /// Fix the local bounding box (`None` = derive it again)
    pub fn set_bounding_box(&mut self, key: SceneNodeKey, aabb: Option<AABB>) -> Result<()> {
        let Some(node) = self.nodes.get_mut(key) else {
            pl_bail!("plscene::SceneGraph", InvalidSceneNode, "Cannot set the box of a node that does not exist");
        };
        node.explicit_bounding_box = aabb;
        self.mark_bounding_box_dirty(key);
        Ok(())
    }

    /// Local bounding box, recomputed if marked.
    ///
    /// An explicitly set box wins. Otherwise containers merge their
    /// children's boxes, cameras enclose their frustum, portals their
    /// polygon and plain nodes ask their drawable. Nodes without any source
    /// get a degenerate box, which the traversal never culls.
    pub fn update_bounding_box(&mut self, key: SceneNodeKey) -> Option<AABB> {
        let node = self.nodes.get(key)?;
        if !node.bounding_box_dirty {
            return Some(node.bounding_box);
        }

        let aabb = if let Some(explicit) = node.explicit_bounding_box {
            explicit
        } else {
            match &node.kind {
                SceneNodeKind::Container { children, .. } => {
                    let children = children.clone();
                    let mut merged: Option<AABB> = None;
                    for child in children {
                        let Some(child_box) = self.update_bounding_box(child) else {
                            continue;
                        };
                        let in_container = child_box.transformed(&self.nodes[child].local_matrix());
                        merged = Some(match merged {
                            Some(m) => m.merged(&in_container),
                            None => in_container,
                        });
                    }
                    merged.unwrap_or_default()
                }
                SceneNodeKind::Camera(_) => {
                    let node = &mut self.nodes[key];
                    let transform = node.transform;
                    match &mut node.kind {
                        SceneNodeKind::Camera(camera) => camera.local_bounding_box(&transform).unwrap_or_default(),
                        _ => AABB::default(),
                    }
                }
                SceneNodeKind::Portal(portal) => portal.polygon().bounding_box().unwrap_or_default(),
                SceneNodeKind::AntiPortal(anti_portal) => anti_portal.polygon().bounding_box().unwrap_or_default(),
                SceneNodeKind::Node => node
                    .drawable
                    .as_ref()
                    .and_then(|d| d.local_bounding_box())
                    .unwrap_or_default(),
            }
        };

        let node = &mut self.nodes[key];
        node.bounding_box = aabb;
        node.bounding_box_dirty = false;
        Some(aabb)
    }

    /// Up-to-date bounding box in the parent container's space
    pub fn container_bounding_box(&mut self, key: SceneNodeKey) -> Option<AABB> {
        let aabb = self.update_bounding_box(key)?;
        Some(aabb.transformed(&self.nodes[key].local_matrix()))
    }

    // ===== DRAWABLE =====

    /// Attach (or detach with `None`) the draw capability.
    ///
    /// The node's draw function mask becomes the drawable's mask, plus the
    /// built-in debug phase of cameras and portals.
    pub fn set_drawable(&mut self, key: SceneNodeKey, drawable: Option<Box<dyn Drawable>>) -> Result<()> {
        let Some(node) = self.nodes.get_mut(key) else {
            pl_bail!("plscene::SceneGraph", InvalidSceneNode, "Cannot attach a drawable to a node that does not exist");
        };
        let mut functions = if node.is_camera() || node.is_portal() {
            DrawFunctionFlags::DEBUG
        } else {
            DrawFunctionFlags::empty()
        };
        if let Some(drawable) = &drawable {
            functions |= drawable.draw_functions();
        }
        node.set_draw_functions(functions);
        node.drawable = drawable;
        self.mark_bounding_box_dirty(key);
        Ok(())
    }

    // ===== CAMERA =====

    pub fn camera(&self, key: SceneNodeKey) -> Option<&Camera> {
        self.nodes.get(key).and_then(|n| n.camera())
    }

    /// Camera settings may change the frustum, so the node's box is marked
    pub fn camera_mut(&mut self, key: SceneNodeKey) -> Option<&mut Camera> {
        if !self.nodes.get(key)?.is_camera() {
            return None;
        }
        self.mark_bounding_box_dirty(key);
        match &mut self.nodes.get_mut(key)?.kind {
            SceneNodeKind::Camera(camera) => Some(&mut **camera),
            _ => None,
        }
    }

    /// Camera together with its node transform, for matrix derivation
    pub fn camera_with_transform(&mut self, key: SceneNodeKey) -> Option<(&mut Camera, &Transform)> {
        let node = self.nodes.get_mut(key)?;
        match &mut node.kind {
            SceneNodeKind::Camera(camera) => Some((&mut **camera, &node.transform)),
            _ => None,
        }
    }

    // ===== PORTALS =====

    fn portal_mut(&mut self, key: SceneNodeKey) -> Result<&mut CellPortal> {
        match self.nodes.get_mut(key).map(|n| &mut n.kind) {
            Some(SceneNodeKind::Portal(portal)) => Ok(portal),
            _ => pl_bail!("plscene::SceneGraph", InvalidSceneNode, "Node is not a cell portal"),
        }
    }

    pub fn set_portal_target(&mut self, key: SceneNodeKey, target: Option<SceneNodeKey>) -> Result<()> {
        self.portal_mut(key)?.set_target(target);
        Ok(())
    }

    /// Override the derived container-to-target matrix (mirrors, teleports)
    pub fn set_portal_warp(&mut self, key: SceneNodeKey, warp: Option<Mat4>) -> Result<()> {
        self.portal_mut(key)?.set_warp_override(warp);
        Ok(())
    }

    /// Replace the polygon of a cell portal or anti-portal
    pub fn set_portal_polygon(&mut self, key: SceneNodeKey, polygon: Polygon) -> Result<()> {
        match self.nodes.get_mut(key).map(|n| &mut n.kind) {
            Some(SceneNodeKind::Portal(portal)) => portal.set_polygon(polygon),
            Some(SceneNodeKind::AntiPortal(anti_portal)) => anti_portal.set_polygon(polygon),
            _ => pl_bail!("plscene::SceneGraph", InvalidSceneNode, "Node is not a portal"),
        }
        self.mark_bounding_box_dirty(key);
        Ok(())
    }

    /// Live target cell of a portal (`None` when unset, destroyed or not a cell)
    pub fn portal_target(&self, key: SceneNodeKey) -> Option<SceneNodeKey> {
        let target = self.nodes.get(key)?.portal()?.target()?;
        self.nodes.get(target).filter(|n| n.is_cell()).map(|_| target)
    }

    /// Matrix mapping the portal's container space into its target cell's
    /// space
    pub fn portal_warp_matrix(&self, key: SceneNodeKey) -> Option<Mat4> {
        let node = self.nodes.get(key)?;
        let portal = node.portal()?;
        if let Some(warp) = portal.warp_override() {
            return Some(*warp);
        }
        let target = self.portal_target(key)?;
        let container = node.parent?;
        Some(self.world_matrix(target)?.inverse() * self.world_matrix(container)?)
    }

    // ===== MODIFIERS =====

    /// Store a modifier and attach it to `node`
    pub fn add_modifier(&mut self, node: SceneNodeKey, modifier: Box<dyn SceneNodeModifier>) -> Result<ModifierKey> {
        if !self.contains(node) {
            pl_bail!("plscene::SceneGraph", InvalidSceneNode,
                "Cannot add modifier '{}' to a node that does not exist", modifier.name());
        }
        let key = self.modifiers.insert(modifier);
        self.nodes[node].modifiers.push(key);
        Ok(key)
    }

    /// Share an existing modifier with another node
    pub fn attach_modifier(&mut self, node: SceneNodeKey, modifier: ModifierKey) -> Result<()> {
        if !self.modifiers.contains_key(modifier) {
            pl_bail!("plscene::SceneGraph", InvalidSceneNode, "Modifier does not exist");
        }
        let Some(node) = self.nodes.get_mut(node) else {
            pl_bail!("plscene::SceneGraph", InvalidSceneNode, "Cannot attach a modifier to a node that does not exist");
        };
        if !node.modifiers.contains(&modifier) {
            node.modifiers.push(modifier);
        }
        Ok(())
    }

    /// Remove a modifier and detach it from every node
    pub fn remove_modifier(&mut self, key: ModifierKey) -> Option<Box<dyn SceneNodeModifier>> {
        let modifier = self.modifiers.remove(key)?;
        for (_, node) in self.nodes.iter_mut() {
            node.modifiers.retain(|&m| m != key);
        }
        Some(modifier)
    }

    pub fn modifier(&self, key: ModifierKey) -> Option<&dyn SceneNodeModifier> {
        self.modifiers.get(key).map(|m| m.as_ref())
    }

    pub fn modifier_count(&self) -> usize {
        self.modifiers.len()
    }

    /// Tell the node's active modifiers that its VisNode was added
    pub(crate) fn notify_added_to_visibility_tree(&mut self, key: SceneNodeKey, tree: &mut VisTree, vis: VisNodeId) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        for modifier_key in &node.modifiers {
            if let Some(modifier) = self.modifiers.get_mut(*modifier_key) {
                if modifier.is_active() {
                    modifier.on_added_to_visibility_tree(node, tree, vis);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "scene_graph_tests.rs"]
mod tests;
