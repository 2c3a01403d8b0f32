/// Built-in scene renderer passes.
///
/// `BeginPass` prepares the backend for a camera (clear, default render
/// states, camera matrices). `DrawPhasePass` walks the visibility tree and
/// dispatches one draw phase per visible node. `CustomPass` runs a closure.

use crate::camera::CameraFlags;
use crate::error::{Error, Result};
use crate::renderer::{apply_camera_matrices, ClearFlags, Cull, RenderState};
use crate::scene::{DrawPhase, SceneNode};
use crate::visibility::{distance_sort, VisNodeRef};
use crate::pl_trace;
use super::scene_renderer_pass::{DrawParts, PassContext, SceneRendererPass};

// ===== BEGIN PASS =====

/// Frame setup for one camera
///
/// Optionally clears color and depth, resets every render state to its
/// default, honours the camera's inverted cull mode and pushes the
/// projection and view matrices of the visibility tree.
pub struct BeginPass {
    name: String,
    enabled: bool,
    clear_color: Option<[f32; 4]>,
}

impl BeginPass {
    pub const CLASS: &'static str = "Begin";

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            clear_color: None,
        }
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = Some(color);
        self
    }

    pub fn clear_color(&self) -> Option<[f32; 4]> {
        self.clear_color
    }
}

impl SceneRendererPass for BeginPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &str {
        Self::CLASS
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn draw(&mut self, ctx: &mut PassContext<'_>) -> Result<()> {
        let inverted = ctx
            .camera_component()
            .is_some_and(|camera| camera.flags().contains(CameraFlags::INV_CULL_MODE));

        let Some(DrawParts { renderer, tree, .. }) = ctx.draw_parts() else {
            return Ok(());
        };

        if let Some(color) = self.clear_color {
            renderer.clear(ClearFlags::COLOR | ClearFlags::DEPTH, color, 1.0, 0)?;
        }
        renderer.set_scissor_rect(None)?;
        for state in RenderState::ALL {
            renderer.set_render_state(state, state.default_value());
        }
        if inverted {
            renderer.set_render_state(RenderState::CullMode, Cull::CounterClockwise.inverted() as u32);
        }

        let projection = tree.projection_matrix();
        let view = tree.view_matrix();
        apply_camera_matrices(renderer, Some(&projection), Some(&view));
        Ok(())
    }
}

// ===== DRAW PHASE PASS =====

/// Dispatches one draw phase to every visible node declaring it
///
/// Nodes are visited in tree order unless `sort` is set. The transparent
/// phase always draws back to front.
pub struct DrawPhasePass {
    name: String,
    enabled: bool,
    phase: DrawPhase,
    sort: bool,
}

impl DrawPhasePass {
    pub fn new(name: &str, phase: DrawPhase) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            phase,
            sort: false,
        }
    }

    /// Order solid-like phases front to back
    pub fn with_sorting(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn phase(&self) -> DrawPhase {
        self.phase
    }

    pub fn is_sorted(&self) -> bool {
        self.sort || self.phase == DrawPhase::Transparent
    }
}

impl SceneRendererPass for DrawPhasePass {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &str {
        self.phase.name()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn draw(&mut self, ctx: &mut PassContext<'_>) -> Result<()> {
        let Some(DrawParts { graph, renderer, tree }) = ctx.draw_parts() else {
            return Ok(());
        };

        let flag = self.phase.flag();
        let visible: Vec<(VisNodeRef<'_>, &SceneNode)> = tree
            .iter()
            .filter_map(|vis| {
                let node = vis.scene_node(graph)?;
                node.draw_functions().contains(flag).then_some((vis, node))
            })
            .collect();

        let order: Vec<usize> = if self.is_sorted() {
            let distances: Vec<f32> = visible.iter().map(|(vis, _)| vis.squared_distance()).collect();
            if self.phase == DrawPhase::Transparent {
                distance_sort::back_to_front(&distances)
            } else {
                distance_sort::front_to_back(&distances)
            }
        } else {
            (0..visible.len()).collect()
        };

        let mut failed = 0usize;
        let mut last_error = None;
        for index in order {
            let (vis, node) = visible[index];
            if let Err(e) = node.draw(self.phase, &mut *renderer, Some(vis)) {
                failed += 1;
                last_error = Some(e);
            }
        }

        pl_trace!("plscene::DrawPhasePass", "'{}' dispatched {} on {} nodes",
            self.name, self.phase.name(), visible.len());

        match last_error {
            None => Ok(()),
            Some(e) => Err(Error::BackendError(format!(
                "{} of {} nodes failed to draw: {}", failed, visible.len(), e
            ))),
        }
    }
}

// ===== CUSTOM PASS =====

/// Closure-based pass for techniques without a dedicated type
pub struct CustomPass {
    name: String,
    enabled: bool,
    callback: Box<dyn FnMut(&mut PassContext<'_>) -> Result<()> + Send>,
}

impl CustomPass {
    pub const CLASS: &'static str = "Custom";

    pub fn new<F>(name: &str, callback: F) -> Self
    where
        F: FnMut(&mut PassContext<'_>) -> Result<()> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            enabled: true,
            callback: Box::new(callback),
        }
    }
}

impl SceneRendererPass for CustomPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &str {
        Self::CLASS
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn draw(&mut self, ctx: &mut PassContext<'_>) -> Result<()> {
        (self.callback)(ctx)
    }
}
