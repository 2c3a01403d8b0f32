/// Scene node modifiers: behaviours attached to nodes by key.
///
/// A modifier lives in the `SceneGraph` modifier table and is referenced by
/// the nodes it is attached to. The visibility traversal calls
/// `on_added_to_visibility_tree` right after it created a node's VisNode,
/// which lets a modifier adjust the per-frame world matrix without touching
/// the authored transform.

use glam::{Mat4, Quat, Vec3};
use crate::visibility::{VisNodeId, VisTree};
use super::scene_node::SceneNode;

/// Behaviour attached to one or more scene nodes
pub trait SceneNodeModifier: Send + Sync {
    fn name(&self) -> &str;

    /// Inactive modifiers are not notified
    fn is_active(&self) -> bool {
        true
    }

    /// The node's VisNode `vis` was just added to `tree`
    fn on_added_to_visibility_tree(&mut self, node: &SceneNode, tree: &mut VisTree, vis: VisNodeId);
}

// ===== BILLBOARD =====

/// Turns the node's local +Z axis toward the camera every frame
///
/// Position and scale of the VisNode world matrix are kept; only its
/// rotation is replaced. With `up_axis` set the rotation is restricted to
/// that axis (cylindrical billboard).
#[derive(Debug, Clone)]
pub struct BillboardModifier {
    name: String,
    active: bool,
    up_axis: Option<Vec3>,
}

impl BillboardModifier {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            active: true,
            up_axis: None,
        }
    }

    /// Cylindrical billboard rotating around `axis` only
    pub fn with_up_axis(mut self, axis: Vec3) -> Self {
        self.up_axis = Some(axis.normalize_or_zero()).filter(|a| *a != Vec3::ZERO);
        self
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

impl SceneNodeModifier for BillboardModifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn on_added_to_visibility_tree(&mut self, _node: &SceneNode, tree: &mut VisTree, vis: VisNodeId) {
        let Some(world) = tree.node(vis).map(|v| v.world_matrix()) else {
            return;
        };
        let (scale, _, position) = world.to_scale_rotation_translation();

        let mut to_camera = tree.camera_position() - position;
        if let Some(axis) = self.up_axis {
            to_camera -= axis * axis.dot(to_camera);
        }
        let Some(direction) = to_camera.try_normalize() else {
            return;
        };

        let rotation = Quat::from_rotation_arc(Vec3::Z, direction);
        tree.set_world_matrix(vis, Mat4::from_scale_rotation_translation(scale, rotation, position));
    }
}
