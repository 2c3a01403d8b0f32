/// Scene context: owns the scene graph, the scene renderer manager and the
/// active camera, and drives one frame.
///
/// The active camera is context state, not a process-wide global. A camera
/// that no longer exists is never reported as active.

use rustc_hash::FxHashMap;
use crate::compositing::{
    FrameReport, PassContext, SceneRendererHandle, SceneRendererLoader, SceneRendererManager,
};
use crate::config::SceneContextConfig;
use crate::error::Result;
use crate::renderer::{apply_camera_matrices, Renderer};
use crate::scene::{SceneGraph, SceneNodeKey};
use crate::visibility::{CullQuery, CullStatistics, VisTree};
use crate::{pl_bail, pl_debug, pl_err, pl_warn};

pub struct SceneContext {
    config: SceneContextConfig,
    graph: SceneGraph,
    scene_renderers: SceneRendererManager,
    active_camera: Option<SceneNodeKey>,
    /// One query per camera, kept to recycle tree allocations
    cull_queries: FxHashMap<SceneNodeKey, CullQuery>,
    frame: u64,
}

impl std::fmt::Debug for SceneContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneContext")
            .field("nodes", &self.graph.len())
            .field("scene_renderers", &self.scene_renderers)
            .field("active_camera", &self.active_camera)
            .field("frame", &self.frame)
            .finish()
    }
}

impl SceneContext {
    /// Context whose scene renderers are RON files relative to the working directory
    pub fn new(config: SceneContextConfig) -> Result<Self> {
        config.validate()?;
        let scene_renderers = SceneRendererManager::new(config.scene_renderer_manager.clone());
        Ok(Self::assemble(config, scene_renderers))
    }

    pub fn with_loader(config: SceneContextConfig, loader: Box<dyn SceneRendererLoader>) -> Result<Self> {
        config.validate()?;
        let scene_renderers = SceneRendererManager::with_loader(config.scene_renderer_manager.clone(), loader);
        Ok(Self::assemble(config, scene_renderers))
    }

    fn assemble(config: SceneContextConfig, scene_renderers: SceneRendererManager) -> Self {
        Self {
            config,
            graph: SceneGraph::new(),
            scene_renderers,
            active_camera: None,
            cull_queries: FxHashMap::default(),
            frame: 0,
        }
    }

    pub fn config(&self) -> &SceneContextConfig {
        &self.config
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn scene_renderers(&self) -> &SceneRendererManager {
        &self.scene_renderers
    }

    pub fn scene_renderers_mut(&mut self) -> &mut SceneRendererManager {
        &mut self.scene_renderers
    }

    /// Number of frames drawn so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Destroy a node through the graph, releasing the camera state it held
    pub fn destroy_node(&mut self, key: SceneNodeKey) -> Result<usize> {
        let destroyed = self.graph.destroy_node(key)?;
        if self.active_camera.is_some_and(|camera| !self.graph.contains(camera)) {
            pl_debug!("plscene::SceneContext", "Active camera destroyed");
            self.active_camera = None;
        }
        self.cull_queries.retain(|camera, _| self.graph.contains(*camera));
        Ok(destroyed)
    }

    // ===== ACTIVE CAMERA =====

    /// Select the active camera.
    ///
    /// With a renderer, the camera's projection and view matrices are pushed
    /// to it right away.
    pub fn set_camera(&mut self, camera: Option<SceneNodeKey>, renderer: Option<&mut dyn Renderer>) -> Result<()> {
        if let Some(key) = camera {
            if self.graph.camera(key).is_none() {
                pl_bail!("plscene::SceneContext", InvalidSceneNode, "Scene node is not a camera");
            }
        }
        self.active_camera = camera;
        if let (Some(key), Some(renderer)) = (camera, renderer) {
            self.apply_camera(key, renderer);
        }
        Ok(())
    }

    /// Active camera, if it still exists
    pub fn camera(&self) -> Option<SceneNodeKey> {
        self.active_camera.filter(|&key| self.graph.camera(key).is_some())
    }

    /// Push a camera's projection and view matrices into `renderer`
    pub fn apply_camera(&mut self, camera: SceneNodeKey, renderer: &mut dyn Renderer) -> bool {
        let viewport = renderer.viewport();
        let Some((cam, transform)) = self.graph.camera_with_transform(camera) else {
            return false;
        };
        let projection = cam.projection_matrix(&viewport);
        let view = cam.view_matrix(transform);
        apply_camera_matrices(renderer, Some(&projection), Some(&view));
        true
    }

    /// Scene renderer of a camera: its own file, else the configured default.
    ///
    /// The handle is cached on the camera until its filename changes.
    pub fn scene_renderer_for(&mut self, camera: SceneNodeKey) -> Option<SceneRendererHandle> {
        let cam = self.graph.camera(camera)?;
        if let Some(handle) = cam.scene_renderer_handle() {
            return Some(handle.clone());
        }

        let filename = match cam.scene_renderer_filename() {
            "" => self.config.default_scene_renderer.clone()?,
            name => name.to_string(),
        };
        let handle = match self.scene_renderers.load(&filename) {
            Ok(handle) => handle,
            Err(e) => {
                pl_warn!("plscene::SceneContext", "Cannot use scene renderer '{}': {}", filename, e);
                return None;
            }
        };
        if let Some((cam, _)) = self.graph.camera_with_transform(camera) {
            cam.set_scene_renderer_handle(Some(handle.clone()));
        }
        Some(handle)
    }

    // ===== FRAME =====

    /// Draw one frame of the active camera below `root`.
    ///
    /// Without an active camera or a usable scene renderer the frame is a
    /// no-op. Pass failures are logged and listed in the report.
    pub fn draw(&mut self, renderer: &mut dyn Renderer, root: SceneNodeKey) -> Result<FrameReport> {
        let report = match self.camera() {
            Some(camera) => self.draw_camera(renderer, camera, root)?,
            None => {
                pl_debug!("plscene::SceneContext", "No active camera, skipping frame {}", self.frame);
                FrameReport::default()
            }
        };
        self.scene_renderers.collect_unused();
        self.frame += 1;
        Ok(report)
    }

    fn draw_camera(&mut self, renderer: &mut dyn Renderer, camera: SceneNodeKey, root: SceneNodeKey) -> Result<FrameReport> {
        let Some(handle) = self.scene_renderer_for(camera) else {
            return Ok(FrameReport::default());
        };
        let mut scene_renderer = handle
            .lock()
            .map_err(|_| pl_err!("plscene::SceneContext", BackendError, "Scene renderer lock is poisoned"))?;

        let cull = &self.config.cull;
        let query = self
            .cull_queries
            .entry(camera)
            .or_insert_with(|| CullQuery::new(cull.clone()));
        let mut ctx = PassContext::new(&mut self.graph, renderer, camera, root, query);
        Ok(scene_renderer.draw(&mut ctx))
    }

    /// Tree built for `camera` during the last frame it was drawn
    pub fn visibility(&self, camera: SceneNodeKey) -> Option<&VisTree> {
        self.cull_queries.get(&camera).map(|q| q.tree())
    }

    pub fn cull_statistics(&self, camera: SceneNodeKey) -> Option<&CullStatistics> {
        self.cull_queries.get(&camera).map(|q| q.statistics())
    }
}

#[cfg(test)]
#[path = "scene_context_tests.rs"]
mod tests;
