/// Draw capability attached to a scene node.
///
/// The pipeline only needs one kind of dispatch from a scene node: "does it
/// implement this draw phase, and if so call it". A `Drawable` declares the
/// phases it implements through `draw_functions()`; the node copies that mask
/// when the drawable is attached and scene renderer passes skip everything
/// the mask does not name.

use glam::Mat4;
use crate::error::Result;
use crate::math::AABB;
use crate::renderer::{IndexedDraw, PrimitiveType, Renderer};
use crate::visibility::VisNodeRef;
use super::scene_node::{DrawFunctionFlags, SceneNode};

/// Draw callbacks of a scene node
///
/// Every callback receives the backend, the owning node and, when drawn
/// from a visibility tree, the node's `VisNodeRef` carrying its world and
/// camera-relative matrices. All callbacks default to doing nothing.
pub trait Drawable: Send + Sync {
    /// Phases this drawable implements
    fn draw_functions(&self) -> DrawFunctionFlags;

    /// Bounding box in the node's local space (`None` = never culled)
    fn local_bounding_box(&self) -> Option<AABB> {
        None
    }

    fn draw_pre(&self, _renderer: &mut dyn Renderer, _node: &SceneNode, _vis: Option<VisNodeRef<'_>>) -> Result<()> {
        Ok(())
    }

    fn draw_solid(&self, _renderer: &mut dyn Renderer, _node: &SceneNode, _vis: Option<VisNodeRef<'_>>) -> Result<()> {
        Ok(())
    }

    fn draw_transparent(&self, _renderer: &mut dyn Renderer, _node: &SceneNode, _vis: Option<VisNodeRef<'_>>) -> Result<()> {
        Ok(())
    }

    fn draw_post(&self, _renderer: &mut dyn Renderer, _node: &SceneNode, _vis: Option<VisNodeRef<'_>>) -> Result<()> {
        Ok(())
    }

    fn draw_debug(&self, _renderer: &mut dyn Renderer, _node: &SceneNode, _vis: Option<VisNodeRef<'_>>) -> Result<()> {
        Ok(())
    }
}

// ===== PRIMITIVE BATCH =====

/// Geometry range submitted by a `PrimitiveDrawable`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveRange {
    Vertices { start_vertex: u32, num_vertices: u32 },
    Indexed(IndexedDraw),
}

/// Minimal drawable submitting one primitive range from buffers the
/// application bound beforehand, either in the solid or in the transparent
/// phase.
///
/// Loads the VisNode world matrix into the `World` slot first; without a
/// VisNode the node's local matrix is used.
#[derive(Debug, Clone)]
pub struct PrimitiveDrawable {
    primitive: PrimitiveType,
    range: PrimitiveRange,
    instances: u32,
    transparent: bool,
    bounding_box: Option<AABB>,
}

impl PrimitiveDrawable {
    pub fn new(primitive: PrimitiveType, range: PrimitiveRange) -> Self {
        Self {
            primitive,
            range,
            instances: 1,
            transparent: false,
            bounding_box: None,
        }
    }

    /// Draw `instances` copies (1 = plain draw call)
    pub fn with_instances(mut self, instances: u32) -> Self {
        self.instances = instances.max(1);
        self
    }

    /// Draw in the transparent phase instead of the solid one
    pub fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn with_bounding_box(mut self, bounding_box: AABB) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }

    fn submit(&self, renderer: &mut dyn Renderer, node: &SceneNode, vis: Option<VisNodeRef<'_>>) -> Result<()> {
        let world: Mat4 = match vis {
            Some(vis) => vis.world_matrix(),
            None => node.local_matrix(),
        };
        renderer.set_transform(crate::renderer::TransformSlot::World, &world);

        match (self.range, self.instances) {
            (PrimitiveRange::Vertices { start_vertex, num_vertices }, 1) => {
                renderer.draw_primitives(self.primitive, start_vertex, num_vertices)
            }
            (PrimitiveRange::Vertices { start_vertex, num_vertices }, n) => {
                renderer.draw_primitives_instanced(self.primitive, start_vertex, num_vertices, n)
            }
            (PrimitiveRange::Indexed(draw), 1) => {
                renderer.draw_indexed_primitives(self.primitive, draw)
            }
            (PrimitiveRange::Indexed(draw), n) => {
                renderer.draw_indexed_primitives_instanced(self.primitive, draw, n)
            }
        }
    }
}

impl Drawable for PrimitiveDrawable {
    fn draw_functions(&self) -> DrawFunctionFlags {
        if self.transparent { DrawFunctionFlags::TRANSPARENT } else { DrawFunctionFlags::SOLID }
    }

    fn local_bounding_box(&self) -> Option<AABB> {
        self.bounding_box
    }

    fn draw_solid(&self, renderer: &mut dyn Renderer, node: &SceneNode, vis: Option<VisNodeRef<'_>>) -> Result<()> {
        self.submit(renderer, node, vis)
    }

    fn draw_transparent(&self, renderer: &mut dyn Renderer, node: &SceneNode, vis: Option<VisNodeRef<'_>>) -> Result<()> {
        self.submit(renderer, node, vis)
    }
}
