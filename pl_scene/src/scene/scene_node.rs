/// Scene node: one entry of the scene graph.
///
/// A node is a transform plus a kind (plain node, container, cell portal,
/// anti-portal, camera), behaviour flags, an optional draw capability and the keys of the
/// modifiers attached to it. Nodes live in the `SceneGraph` node table and
/// are addressed by `SceneNodeKey`; structural changes go through the graph.

use glam::{Mat4, Vec3};
use bitflags::bitflags;
use slotmap::new_key_type;
use crate::camera::{Camera, CameraDebugFlags};
use crate::error::Result;
use crate::math::{AABB, Polygon};
use crate::renderer::{draw_debug_box, Renderer};
use crate::visibility::VisNodeRef;
use super::drawable::Drawable;
use super::transform::Transform;

// ===== SLOT MAP KEYS =====

new_key_type! {
    /// Stable key of a scene node.
    ///
    /// Stays valid until the node itself is destroyed; lookups with a key of
    /// a destroyed node return `None`.
    pub struct SceneNodeKey;

    /// Stable key of a scene node modifier
    pub struct ModifierKey;
}

// ===== FLAGS =====

bitflags! {
    /// Scene node behaviour flags
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct SceneNodeFlags: u32 {
        /// Excluded from traversal
        const INACTIVE       = 1 << 0;
        /// Excluded from traversal
        const INVISIBLE      = 1 << 1;
        /// Never frustum culled
        const NO_CULLING     = 1 << 2;
        const CAN_OCCLUDE    = 1 << 3;
        const CAST_SHADOW    = 1 << 4;
        const RECEIVE_SHADOW = 1 << 5;
        /// Container: add the container itself but not its children
        const NO_RECURSION   = 1 << 6;
        /// Cell portal: never look through
        const NO_SEE_THROUGH = 1 << 7;
    }
}

bitflags! {
    /// Draw phases a node implements
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DrawFunctionFlags: u8 {
        const PRE         = 1 << 0;
        const SOLID       = 1 << 1;
        const TRANSPARENT = 1 << 2;
        const DEBUG       = 1 << 3;
        const POST        = 1 << 4;
    }
}

bitflags! {
    /// Scene node debug flags
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct SceneNodeDebugFlags: u32 {
        /// Let the debug phase draw this node
        const ENABLED = 1 << 0;
    }
}

/// One of the five draw phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawPhase {
    Pre,
    Solid,
    Transparent,
    Post,
    Debug,
}

impl DrawPhase {
    pub const ALL: [DrawPhase; 5] = [
        DrawPhase::Pre,
        DrawPhase::Solid,
        DrawPhase::Transparent,
        DrawPhase::Post,
        DrawPhase::Debug,
    ];

    /// Bit of `DrawFunctionFlags` declaring this phase
    pub fn flag(self) -> DrawFunctionFlags {
        match self {
            DrawPhase::Pre => DrawFunctionFlags::PRE,
            DrawPhase::Solid => DrawFunctionFlags::SOLID,
            DrawPhase::Transparent => DrawFunctionFlags::TRANSPARENT,
            DrawPhase::Post => DrawFunctionFlags::POST,
            DrawPhase::Debug => DrawFunctionFlags::DEBUG,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DrawPhase::Pre => "DrawPre",
            DrawPhase::Solid => "DrawSolid",
            DrawPhase::Transparent => "DrawTransparent",
            DrawPhase::Post => "DrawPost",
            DrawPhase::Debug => "DrawDebug",
        }
    }
}

// ===== CELL PORTAL =====

/// Opening from the portal's container into a target cell
#[derive(Debug, Clone)]
pub struct CellPortal {
    /// Opening in the portal's local space. The winding defines the plane;
    /// its normal points toward the target cell.
    polygon: Polygon,
    /// Weak link, resolved at traversal time
    target: Option<SceneNodeKey>,
    /// Explicit container-to-target-cell matrix. Derived from the graph
    /// transforms when absent.
    warp: Option<Mat4>,
}

impl CellPortal {
    pub fn new(polygon: Polygon, target: Option<SceneNodeKey>) -> Self {
        Self { polygon, target, warp: None }
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn target(&self) -> Option<SceneNodeKey> {
        self.target
    }

    pub fn warp_override(&self) -> Option<&Mat4> {
        self.warp.as_ref()
    }

    pub(crate) fn set_target(&mut self, target: Option<SceneNodeKey>) {
        self.target = target;
    }

    pub(crate) fn set_warp_override(&mut self, warp: Option<Mat4>) {
        self.warp = warp;
    }

    pub(crate) fn set_polygon(&mut self, polygon: Polygon) {
        self.polygon = polygon;
    }
}

// ===== ANTI-PORTAL =====

/// Occluder polygon. Nodes of the same container lying completely behind
/// it, as seen from the camera, are culled.
#[derive(Debug, Clone)]
pub struct AntiPortal {
    /// Occluder in the node's local space. The winding defines the plane;
    /// it only occludes while the camera is not in front of it.
    polygon: Polygon,
}

impl AntiPortal {
    pub fn new(polygon: Polygon) -> Self {
        Self { polygon }
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub(crate) fn set_polygon(&mut self, polygon: Polygon) {
        self.polygon = polygon;
    }
}

// ===== NODE KIND =====

/// What a scene node is
#[derive(Debug)]
pub enum SceneNodeKind {
    /// Leaf node
    Node,
    /// Owns child nodes. Cells are containers reachable through portals.
    Container {
        children: Vec<SceneNodeKey>,
        cell: bool,
    },
    Portal(CellPortal),
    AntiPortal(AntiPortal),
    Camera(Box<Camera>),
}

// ===== SCENE NODE =====

pub struct SceneNode {
    name: String,
    pub(crate) parent: Option<SceneNodeKey>,
    pub(crate) kind: SceneNodeKind,
    pub(crate) transform: Transform,
    flags: SceneNodeFlags,
    draw_functions: DrawFunctionFlags,
    debug_flags: SceneNodeDebugFlags,
    max_draw_distance: f32,
    /// Box set by the application, wins over every derived one
    pub(crate) explicit_bounding_box: Option<AABB>,
    pub(crate) bounding_box: AABB,
    pub(crate) bounding_box_dirty: bool,
    pub(crate) drawable: Option<Box<dyn Drawable>>,
    pub(crate) modifiers: Vec<super::ModifierKey>,
}

impl std::fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneNode")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("draw_functions", &self.draw_functions)
            .field("has_drawable", &self.drawable.is_some())
            .finish()
    }
}

impl SceneNode {
    pub(crate) fn new(name: &str, parent: Option<SceneNodeKey>, kind: SceneNodeKind) -> Self {
        let draw_functions = match kind {
            SceneNodeKind::Camera(_) | SceneNodeKind::Portal(_) | SceneNodeKind::AntiPortal(_) => {
                DrawFunctionFlags::DEBUG
            }
            _ => DrawFunctionFlags::empty(),
        };
        Self {
            name: name.to_string(),
            parent,
            kind,
            transform: Transform::default(),
            flags: SceneNodeFlags::empty(),
            draw_functions,
            debug_flags: SceneNodeDebugFlags::empty(),
            max_draw_distance: 0.0,
            explicit_bounding_box: None,
            bounding_box: AABB::default(),
            bounding_box_dirty: true,
            drawable: None,
            modifiers: Vec::new(),
        }
    }

    // ===== IDENTITY =====

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<SceneNodeKey> {
        self.parent
    }

    pub fn kind(&self) -> &SceneNodeKind {
        &self.kind
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, SceneNodeKind::Container { .. })
    }

    pub fn is_cell(&self) -> bool {
        matches!(self.kind, SceneNodeKind::Container { cell: true, .. })
    }

    pub fn is_portal(&self) -> bool {
        matches!(self.kind, SceneNodeKind::Portal(_))
    }

    pub fn is_anti_portal(&self) -> bool {
        matches!(self.kind, SceneNodeKind::AntiPortal(_))
    }

    pub fn is_camera(&self) -> bool {
        matches!(self.kind, SceneNodeKind::Camera(_))
    }

    /// Child keys of a container, empty for every other kind
    pub fn children(&self) -> &[SceneNodeKey] {
        match &self.kind {
            SceneNodeKind::Container { children, .. } => children,
            _ => &[],
        }
    }

    pub fn portal(&self) -> Option<&CellPortal> {
        match &self.kind {
            SceneNodeKind::Portal(portal) => Some(portal),
            _ => None,
        }
    }

    pub fn anti_portal(&self) -> Option<&AntiPortal> {
        match &self.kind {
            SceneNodeKind::AntiPortal(anti_portal) => Some(anti_portal),
            _ => None,
        }
    }

    pub fn camera(&self) -> Option<&Camera> {
        match &self.kind {
            SceneNodeKind::Camera(camera) => Some(&**camera),
            _ => None,
        }
    }

    // ===== TRANSFORM =====

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Local-to-container matrix. Cameras ignore their scale.
    pub fn local_matrix(&self) -> Mat4 {
        if self.is_camera() {
            self.transform.matrix_no_scale()
        } else {
            self.transform.matrix()
        }
    }

    // ===== ATTRIBUTES =====

    pub fn flags(&self) -> SceneNodeFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: SceneNodeFlags) {
        self.flags = flags;
    }

    /// Active and visible: eligible for traversal
    pub fn is_visible(&self) -> bool {
        !self.flags.intersects(SceneNodeFlags::INACTIVE | SceneNodeFlags::INVISIBLE)
    }

    pub fn draw_functions(&self) -> DrawFunctionFlags {
        self.draw_functions
    }

    pub fn set_draw_functions(&mut self, flags: DrawFunctionFlags) {
        self.draw_functions = flags;
    }

    pub fn debug_flags(&self) -> SceneNodeDebugFlags {
        self.debug_flags
    }

    pub fn set_debug_flags(&mut self, flags: SceneNodeDebugFlags) {
        self.debug_flags = flags;
    }

    /// 0 = unlimited, > 0 = cull beyond this distance,
    /// < 0 = unlimited and sorted before every other sibling
    pub fn max_draw_distance(&self) -> f32 {
        self.max_draw_distance
    }

    pub fn set_max_draw_distance(&mut self, distance: f32) {
        self.max_draw_distance = distance;
    }

    /// Last computed local bounding box (see `SceneGraph::update_bounding_box`)
    pub fn bounding_box(&self) -> AABB {
        self.bounding_box
    }

    pub fn is_bounding_box_dirty(&self) -> bool {
        self.bounding_box_dirty
    }

    /// Last computed bounding box in the owning container's space
    pub fn container_bounding_box(&self) -> AABB {
        self.bounding_box.transformed(&self.local_matrix())
    }

    pub fn drawable(&self) -> Option<&dyn Drawable> {
        self.drawable.as_deref()
    }

    pub fn modifiers(&self) -> &[super::ModifierKey] {
        &self.modifiers
    }

    // ===== DRAW DISPATCH =====

    /// Run one draw phase if the node declares it.
    ///
    /// The debug phase additionally requires `SceneNodeDebugFlags::ENABLED`.
    pub fn draw(&self, phase: DrawPhase, renderer: &mut dyn Renderer, vis: Option<VisNodeRef<'_>>) -> Result<()> {
        if !self.draw_functions.contains(phase.flag()) {
            return Ok(());
        }
        if phase == DrawPhase::Debug {
            if !self.debug_flags.contains(SceneNodeDebugFlags::ENABLED) {
                return Ok(());
            }
            self.draw_builtin_debug(renderer, vis)?;
        }

        let Some(drawable) = &self.drawable else {
            return Ok(());
        };
        match phase {
            DrawPhase::Pre => drawable.draw_pre(renderer, self, vis),
            DrawPhase::Solid => drawable.draw_solid(renderer, self, vis),
            DrawPhase::Transparent => drawable.draw_transparent(renderer, self, vis),
            DrawPhase::Post => drawable.draw_post(renderer, self, vis),
            DrawPhase::Debug => drawable.draw_debug(renderer, self, vis),
        }
    }

    /// Debug visuals every camera, portal and anti-portal has
    fn draw_builtin_debug(&self, renderer: &mut dyn Renderer, vis: Option<VisNodeRef<'_>>) -> Result<()> {
        let world = match vis {
            Some(vis) => vis.world_matrix(),
            None => self.local_matrix(),
        };
        match &self.kind {
            SceneNodeKind::Camera(camera) => {
                let debug = camera.debug_flags();
                // Cached vertices are container space, `world` already holds the local matrix
                let to_local = self.local_matrix().inverse();
                let vertices = camera.cached_frustum_vertices().map(|v| to_local.transform_point3(v));
                if !debug.contains(CameraDebugFlags::NO_FRUSTUM) {
                    draw_debug_box(renderer, &vertices, [1.0, 1.0, 1.0, 1.0], &world)?;
                }
                if debug.contains(CameraDebugFlags::FRUSTUM_VERTICES) {
                    let mut points = Vec::with_capacity(vertices.len() * 6);
                    for v in vertices {
                        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
                            points.push(v - axis * 0.05);
                            points.push(v + axis * 0.05);
                        }
                    }
                    renderer.draw_debug_lines(&points, [1.0, 0.0, 0.0, 1.0], &world)?;
                }
                Ok(())
            }
            SceneNodeKind::Portal(portal) => draw_outline(renderer, portal.polygon(), [0.0, 1.0, 0.0, 1.0], &world),
            SceneNodeKind::AntiPortal(anti_portal) => {
                draw_outline(renderer, anti_portal.polygon(), [1.0, 0.0, 0.0, 1.0], &world)
            }
            _ => Ok(()),
        }
    }
}

/// Closed polygon outline as line segments
fn draw_outline(renderer: &mut dyn Renderer, polygon: &Polygon, color: [f32; 4], world: &Mat4) -> Result<()> {
    let vertices = polygon.vertices();
    if vertices.len() < 2 {
        return Ok(());
    }
    let mut points = Vec::with_capacity(vertices.len() * 2);
    for (i, &v) in vertices.iter().enumerate() {
        points.push(v);
        points.push(vertices[(i + 1) % vertices.len()]);
    }
    renderer.draw_debug_lines(&points, color, world)
}
