/// Renderer trait - the fixed-function backend the scene pipeline draws through
///
/// A backend implements the primitive operations (viewport, render-state
/// application, transforms, draw submission). Validation of render-state
/// values happens once, in the provided `set_render_state`.

use glam::{Mat4, Vec3};
use bitflags::bitflags;
use crate::error::Result;
use super::render_state::RenderState;

// ============================================================================
// Common types
// ============================================================================

/// Viewport dimensions and depth range, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-depth viewport anchored at the origin
    pub fn new(width: f32, height: f32) -> Self {
        Self { x: 0.0, y: 0.0, width, height, min_depth: 0.0, max_depth: 1.0 }
    }

    /// Width / height, 1.0 for an empty viewport
    pub fn aspect_ratio(&self) -> f32 {
        if self.width > 0.0 && self.height > 0.0 { self.width / self.height } else { 1.0 }
    }

    /// Covered screen rectangle
    pub fn rect(&self) -> ScreenRect {
        ScreenRect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

/// Axis-aligned screen rectangle in pixels (x0, y0 inclusive; x1, y1 exclusive)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl ScreenRect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Overlap of both rectangles, `None` when they do not overlap
    pub fn intersection(&self, other: &ScreenRect) -> Option<ScreenRect> {
        let rect = ScreenRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        if rect.is_empty() { None } else { Some(rect) }
    }
}

/// Matrix slots of the fixed-function transform state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformSlot {
    Projection,
    View,
    World,
}

/// Primitive topology for draw submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

bitflags! {
    /// Buffers touched by `Renderer::clear`
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Parameters of an indexed draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedDraw {
    /// Lowest vertex index referenced
    pub min_index: u32,
    /// Highest vertex index referenced
    pub max_index: u32,
    /// First index in the bound index buffer
    pub start_index: u32,
    /// Number of indices
    pub num_indices: u32,
}

// ============================================================================
// Renderer trait
// ============================================================================

/// Fixed-function rendering backend
///
/// Vertex and index buffers are bound through backend-specific means
/// before the draw calls below are issued.
pub trait Renderer {
    /// Backend name (for logs)
    fn name(&self) -> &str;

    /// Current viewport
    fn viewport(&self) -> Viewport;

    /// Set the viewport
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// Restrict rasterization to a rectangle (`None` = whole viewport)
    fn set_scissor_rect(&mut self, rect: Option<ScreenRect>) -> Result<()>;

    /// Clear the selected buffers of the current target
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4], depth: f32, stencil: u32) -> Result<()>;

    /// Current value of a render state
    fn render_state(&self, state: RenderState) -> u32;

    /// Apply an already validated render-state value
    fn apply_render_state(&mut self, state: RenderState, value: u32);

    /// Set a render state.
    ///
    /// Values outside the state's range are programmer errors: they trip a
    /// debug assertion and are ignored (returning `false`) in release builds.
    fn set_render_state(&mut self, state: RenderState, value: u32) -> bool {
        if !state.is_valid_value(value) {
            debug_assert!(false, "render state {:?}: value {} out of range", state, value);
            return false;
        }
        self.apply_render_state(state, value);
        true
    }

    /// Load a matrix into a fixed-function transform slot
    fn set_transform(&mut self, slot: TransformSlot, matrix: &Mat4);

    /// Draw non-indexed primitives from the bound vertex buffer
    fn draw_primitives(&mut self, primitive: PrimitiveType, start_vertex: u32, num_vertices: u32) -> Result<()>;

    /// Draw indexed primitives from the bound vertex and index buffers
    fn draw_indexed_primitives(&mut self, primitive: PrimitiveType, draw: IndexedDraw) -> Result<()>;

    /// Instanced variant of `draw_primitives`
    fn draw_primitives_instanced(
        &mut self,
        primitive: PrimitiveType,
        start_vertex: u32,
        num_vertices: u32,
        num_instances: u32,
    ) -> Result<()>;

    /// Instanced variant of `draw_indexed_primitives`
    fn draw_indexed_primitives_instanced(
        &mut self,
        primitive: PrimitiveType,
        draw: IndexedDraw,
        num_instances: u32,
    ) -> Result<()>;

    /// Immediate-mode debug lines (pairs of points) in world space
    fn draw_debug_lines(&mut self, points: &[Vec3], color: [f32; 4], world: &Mat4) -> Result<()>;
}

/// Push projection and view matrices into the transform state
pub fn apply_camera_matrices(renderer: &mut dyn Renderer, projection: Option<&Mat4>, view: Option<&Mat4>) {
    if let Some(projection) = projection {
        renderer.set_transform(TransformSlot::Projection, projection);
    }
    if let Some(view) = view {
        renderer.set_transform(TransformSlot::View, view);
    }
}

/// Draw the twelve edges of a box given its eight corners
/// (ordering of `AABB::corners`, or an equivalently ordered frustum).
pub fn draw_debug_box(renderer: &mut dyn Renderer, corners: &[Vec3; 8], color: [f32; 4], world: &Mat4) -> Result<()> {
    const EDGES: [(usize, usize); 12] = [
        (0, 1), (2, 3), (4, 5), (6, 7),
        (0, 2), (1, 3), (4, 6), (5, 7),
        (0, 4), (1, 5), (2, 6), (3, 7),
    ];
    let mut points = Vec::with_capacity(EDGES.len() * 2);
    for (a, b) in EDGES {
        points.push(corners[a]);
        points.push(corners[b]);
    }
    renderer.draw_debug_lines(&points, color, world)
}
