/// VisNode: one camera-relative appearance of a scene node in the
/// per-frame visibility tree.
///
/// The world matrix is canonical and set by the traversal (or a modifier).
/// The inverse world, world-view and world-view-projection matrices are
/// derived on first access and cached until invalidated, each behind its
/// own dirty bit. Reads go through `&self`, so the caches live in `Cell`s.

use std::cell::Cell;
use glam::Mat4;
use bitflags::bitflags;
use crate::renderer::ScreenRect;
use crate::scene::SceneNodeKey;

/// Index of a VisNode within its `VisTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisNodeId(pub(crate) u32);

impl VisNodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Screen-space record of a VisContainer: the rectangle through which its
/// content is seen and the depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisProjection {
    pub rect: ScreenRect,
    pub min_z: f32,
    pub max_z: f32,
}

/// Variant of a VisNode
#[derive(Debug, Clone, PartialEq)]
pub enum VisKind {
    Node,
    /// Mirrors a scene container. Children keep insertion order.
    Container {
        children: Vec<VisNodeId>,
        cell: bool,
        projection: VisProjection,
    },
    /// Mirrors a cell portal; `None` = cannot see through
    Portal {
        target: Option<VisNodeId>,
    },
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct Derived: u8 {
        const INVERSE_WORLD         = 1 << 0;
        const WORLD_VIEW            = 1 << 1;
        const WORLD_VIEW_PROJECTION = 1 << 2;
    }
}

#[derive(Debug)]
pub struct VisNode {
    pub(crate) parent: Option<VisNodeId>,
    pub(crate) scene_node: Option<SceneNodeKey>,
    pub(crate) kind: VisKind,
    world: Mat4,
    squared_distance: f32,

    dirty: Cell<Derived>,
    inverse_world: Cell<Mat4>,
    world_view: Cell<Mat4>,
    world_view_projection: Cell<Mat4>,
    /// Number of derived-matrix recomputations so far
    derivations: Cell<u32>,
}

impl VisNode {
    pub(crate) fn new(
        parent: Option<VisNodeId>,
        scene_node: Option<SceneNodeKey>,
        kind: VisKind,
        world: Mat4,
        squared_distance: f32,
    ) -> Self {
        Self {
            parent,
            scene_node,
            kind,
            world,
            squared_distance,
            dirty: Cell::new(Derived::all()),
            inverse_world: Cell::new(Mat4::IDENTITY),
            world_view: Cell::new(Mat4::IDENTITY),
            world_view_projection: Cell::new(Mat4::IDENTITY),
            derivations: Cell::new(0),
        }
    }

    pub fn parent(&self) -> Option<VisNodeId> {
        self.parent
    }

    /// Key of the mirrored scene node (it may have been destroyed since)
    pub fn scene_node_key(&self) -> Option<SceneNodeKey> {
        self.scene_node
    }

    pub fn kind(&self) -> &VisKind {
        &self.kind
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, VisKind::Container { .. })
    }

    pub fn is_cell(&self) -> bool {
        matches!(self.kind, VisKind::Container { cell: true, .. })
    }

    pub fn is_portal(&self) -> bool {
        matches!(self.kind, VisKind::Portal { .. })
    }

    pub fn children(&self) -> &[VisNodeId] {
        match &self.kind {
            VisKind::Container { children, .. } => children,
            _ => &[],
        }
    }

    /// Target cell of a portal
    pub fn target(&self) -> Option<VisNodeId> {
        match self.kind {
            VisKind::Portal { target } => target,
            _ => None,
        }
    }

    pub fn projection(&self) -> Option<&VisProjection> {
        match &self.kind {
            VisKind::Container { projection, .. } => Some(projection),
            _ => None,
        }
    }

    /// Squared distance to the camera, measured in the owning container's space
    pub fn squared_distance(&self) -> f32 {
        self.squared_distance
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    pub fn derivation_count(&self) -> u32 {
        self.derivations.get()
    }

    // ===== DERIVED MATRICES =====

    pub(crate) fn set_world_matrix(&mut self, world: Mat4) {
        self.world = world;
        self.dirty.set(Derived::all());
    }

    /// View or projection of the tree changed
    pub(crate) fn invalidate_camera_dependent(&self) {
        self.dirty.set(self.dirty.get() | Derived::WORLD_VIEW | Derived::WORLD_VIEW_PROJECTION);
    }

    fn derive(&self, bit: Derived, cache: &Cell<Mat4>, compute: impl FnOnce() -> Mat4) -> Mat4 {
        let dirty = self.dirty.get();
        if dirty.contains(bit) {
            cache.set(compute());
            self.dirty.set(dirty - bit);
            self.derivations.set(self.derivations.get() + 1);
        }
        cache.get()
    }

    pub(crate) fn inverse_world_matrix(&self) -> Mat4 {
        self.derive(Derived::INVERSE_WORLD, &self.inverse_world, || self.world.inverse())
    }

    pub(crate) fn world_view_matrix(&self, view: &Mat4) -> Mat4 {
        self.derive(Derived::WORLD_VIEW, &self.world_view, || *view * self.world)
    }

    pub(crate) fn world_view_projection_matrix(&self, view_projection: &Mat4) -> Mat4 {
        self.derive(Derived::WORLD_VIEW_PROJECTION, &self.world_view_projection, || *view_projection * self.world)
    }
}
