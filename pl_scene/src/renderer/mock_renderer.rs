/// Mock Renderer for unit tests (no GPU required)
///
/// Records every backend call as a string and keeps enough state
/// (viewport, render states, transforms) for assertions.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::pl_bail;
use super::render_state::{RenderState, RenderStates};
use super::renderer::{
    Renderer, Viewport, ScreenRect, ClearFlags, TransformSlot, PrimitiveType, IndexedDraw,
};

#[derive(Debug)]
pub struct MockRenderer {
    pub commands: Vec<String>,
    pub viewport: Viewport,
    pub states: RenderStates,
    pub transforms: FxHashMap<TransformSlot, Mat4>,
    /// Make every draw call fail with a backend error
    pub fail_draws: bool,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::with_viewport(Viewport::new(800.0, 600.0))
    }

    pub fn with_viewport(viewport: Viewport) -> Self {
        Self {
            commands: Vec::new(),
            viewport,
            states: RenderStates::default(),
            transforms: FxHashMap::default(),
            fail_draws: false,
        }
    }

    pub fn transform(&self, slot: TransformSlot) -> Option<Mat4> {
        self.transforms.get(&slot).copied()
    }

    /// Recorded commands starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.commands.iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn draw(&mut self, command: String) -> Result<()> {
        if self.fail_draws {
            pl_bail!("plscene::MockRenderer", "mock draw failure");
        }
        self.commands.push(command);
        Ok(())
    }
}

impl Renderer for MockRenderer {
    fn name(&self) -> &str {
        "Mock"
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.viewport = viewport;
        self.commands.push(format!("set_viewport {}x{}", viewport.width, viewport.height));
        Ok(())
    }

    fn set_scissor_rect(&mut self, rect: Option<ScreenRect>) -> Result<()> {
        self.commands.push(format!("set_scissor_rect {}", rect.is_some()));
        Ok(())
    }

    fn clear(&mut self, flags: ClearFlags, _color: [f32; 4], _depth: f32, _stencil: u32) -> Result<()> {
        self.commands.push(format!("clear {:?}", flags));
        Ok(())
    }

    fn render_state(&self, state: RenderState) -> u32 {
        self.states.get(state)
    }

    fn apply_render_state(&mut self, state: RenderState, value: u32) {
        self.states.set(state, value);
        self.commands.push(format!("set_render_state {:?}={}", state, value));
    }

    fn set_transform(&mut self, slot: TransformSlot, matrix: &Mat4) {
        self.transforms.insert(slot, *matrix);
        self.commands.push(format!("set_transform {:?}", slot));
    }

    fn draw_primitives(&mut self, primitive: PrimitiveType, start_vertex: u32, num_vertices: u32) -> Result<()> {
        self.draw(format!("draw_primitives {:?} {} {}", primitive, start_vertex, num_vertices))
    }

    fn draw_indexed_primitives(&mut self, primitive: PrimitiveType, draw: IndexedDraw) -> Result<()> {
        self.draw(format!("draw_indexed_primitives {:?} {}", primitive, draw.num_indices))
    }

    fn draw_primitives_instanced(
        &mut self,
        primitive: PrimitiveType,
        _start_vertex: u32,
        num_vertices: u32,
        num_instances: u32,
    ) -> Result<()> {
        self.draw(format!("draw_primitives_instanced {:?} {} x{}", primitive, num_vertices, num_instances))
    }

    fn draw_indexed_primitives_instanced(
        &mut self,
        primitive: PrimitiveType,
        draw: IndexedDraw,
        num_instances: u32,
    ) -> Result<()> {
        self.draw(format!("draw_indexed_primitives_instanced {:?} {} x{}", primitive, draw.num_indices, num_instances))
    }

    fn draw_debug_lines(&mut self, points: &[Vec3], _color: [f32; 4], _world: &Mat4) -> Result<()> {
        self.draw(format!("draw_debug_lines {}", points.len() / 2))
    }
}
