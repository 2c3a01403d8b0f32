/// Scene renderer pass trait and the per-frame context passes run in.
///
/// A pass is one stage of a scene renderer (setup, solid geometry,
/// transparency, debug...). It receives a `PassContext` giving access to the
/// camera, the root container, the scene graph and the backend. The
/// visibility tree is culled on the first request and shared by every
/// later pass of the same frame.

use crate::camera::Camera;
use crate::error::Result;
use crate::renderer::Renderer;
use crate::scene::{SceneGraph, SceneNodeKey};
use crate::visibility::{CullQuery, CullStatistics, CullView, VisTree};
use crate::pl_debug;

/// One stage of a scene renderer
pub trait SceneRendererPass: Send {
    /// Instance name (unique within its scene renderer)
    fn name(&self) -> &str;

    /// Registry class this pass was created from
    fn class_name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// Execute the pass for the context's camera and root container
    fn draw(&mut self, ctx: &mut PassContext<'_>) -> Result<()>;
}

/// Everything a pass needs to draw one camera's frame
pub struct PassContext<'a> {
    graph: &'a mut SceneGraph,
    renderer: &'a mut dyn Renderer,
    camera: SceneNodeKey,
    root: SceneNodeKey,
    query: &'a mut CullQuery,
    culled: bool,
}

/// Borrows a draw pass needs at once
pub struct DrawParts<'b> {
    pub graph: &'b SceneGraph,
    pub renderer: &'b mut dyn Renderer,
    pub tree: &'b VisTree,
}

impl<'a> PassContext<'a> {
    pub fn new(
        graph: &'a mut SceneGraph,
        renderer: &'a mut dyn Renderer,
        camera: SceneNodeKey,
        root: SceneNodeKey,
        query: &'a mut CullQuery,
    ) -> Self {
        Self { graph, renderer, camera, root, query, culled: false }
    }

    pub fn camera(&self) -> SceneNodeKey {
        self.camera
    }

    pub fn root(&self) -> SceneNodeKey {
        self.root
    }

    pub fn graph(&self) -> &SceneGraph {
        self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        self.graph
    }

    pub fn renderer(&mut self) -> &mut dyn Renderer {
        &mut *self.renderer
    }

    /// Camera component of the camera node
    pub fn camera_component(&self) -> Option<&Camera> {
        self.graph.camera(self.camera)
    }

    /// Whether this frame's tree has been built already
    pub fn is_culled(&self) -> bool {
        self.culled
    }

    fn ensure_culled(&mut self) -> bool {
        if !self.culled {
            let viewport = self.renderer.viewport();
            let Some(view) = CullView::from_camera(self.graph, self.camera, &viewport) else {
                pl_debug!("plscene::PassContext", "Camera node is gone, nothing to cull");
                return false;
            };
            self.query.perform(self.graph, self.root, &view);
            self.culled = true;
        }
        true
    }

    /// Visibility tree of this frame, culled on first request.
    ///
    /// `None` when the camera node no longer exists.
    pub fn visibility(&mut self) -> Option<&VisTree> {
        if self.ensure_culled() {
            Some(self.query.tree())
        } else {
            None
        }
    }

    /// Statistics of this frame's cull, if it ran
    pub fn cull_statistics(&self) -> Option<&CullStatistics> {
        self.culled.then(|| self.query.statistics())
    }

    /// Graph, backend and visibility tree together (culls if needed)
    pub fn draw_parts(&mut self) -> Option<DrawParts<'_>> {
        if !self.ensure_culled() {
            return None;
        }
        Some(DrawParts {
            graph: &*self.graph,
            renderer: &mut *self.renderer,
            tree: self.query.tree(),
        })
    }
}
