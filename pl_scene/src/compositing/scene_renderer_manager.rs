/// Scene renderer resource manager.
///
/// Caches scene renderers by filename. Handles are shared (`Arc`), and an
/// entry nobody else holds is evicted lazily: it must stay unused for
/// `unload_delay_frames` calls of `collect_unused()` before it is dropped,
/// so a renderer released for a single frame is not reloaded right away.

use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use crate::config::SceneRendererManagerConfig;
use crate::error::Result;
use crate::{pl_bail, pl_info};
use super::loader::{RonSceneRendererLoader, SceneRendererLoader};
use super::pass_registry::PassRegistry;
use super::scene_renderer::SceneRenderer;

/// Shared scene renderer handle
pub type SceneRendererHandle = Arc<Mutex<SceneRenderer>>;

struct Entry {
    handle: SceneRendererHandle,
    unused_frames: u32,
}

pub struct SceneRendererManager {
    config: SceneRendererManagerConfig,
    loader: Box<dyn SceneRendererLoader>,
    registry: PassRegistry,
    entries: FxHashMap<String, Entry>,
}

impl std::fmt::Debug for SceneRendererManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRendererManager")
            .field("config", &self.config)
            .field("entries", &self.names())
            .finish()
    }
}

impl SceneRendererManager {
    /// Manager reading RON files relative to the working directory
    pub fn new(config: SceneRendererManagerConfig) -> Self {
        Self::with_loader(config, Box::new(RonSceneRendererLoader::default()))
    }

    pub fn with_loader(config: SceneRendererManagerConfig, loader: Box<dyn SceneRendererLoader>) -> Self {
        Self {
            config,
            loader,
            registry: PassRegistry::with_builtins(),
            entries: FxHashMap::default(),
        }
    }

    pub fn config(&self) -> &SceneRendererManagerConfig {
        &self.config
    }

    pub fn set_loader(&mut self, loader: Box<dyn SceneRendererLoader>) {
        self.loader = loader;
    }

    pub fn registry(&self) -> &PassRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PassRegistry {
        &mut self.registry
    }

    // ===== RESOURCES =====

    /// Cached scene renderer for `filename`, loading it on first use
    pub fn load(&mut self, filename: &str) -> Result<SceneRendererHandle> {
        if let Some(entry) = self.entries.get_mut(filename) {
            entry.unused_frames = 0;
            return Ok(Arc::clone(&entry.handle));
        }

        let desc = self.loader.load(filename)?;
        let scene_renderer = SceneRenderer::from_desc(&desc, &self.registry);
        pl_info!("plscene::SceneRendererManager", "Loaded scene renderer '{}' ({} passes)",
            filename, scene_renderer.pass_count());

        let handle = Arc::new(Mutex::new(scene_renderer));
        self.entries.insert(filename.to_string(), Entry {
            handle: Arc::clone(&handle),
            unused_frames: 0,
        });
        Ok(handle)
    }

    /// Register a scene renderer built in code under `name`
    pub fn insert(&mut self, name: &str, scene_renderer: SceneRenderer) -> Result<SceneRendererHandle> {
        if self.entries.contains_key(name) {
            pl_bail!("plscene::SceneRendererManager", InvalidResource,
                "Scene renderer '{}' already exists", name);
        }
        let handle = Arc::new(Mutex::new(scene_renderer));
        self.entries.insert(name.to_string(), Entry {
            handle: Arc::clone(&handle),
            unused_frames: 0,
        });
        Ok(handle)
    }

    /// Cached scene renderer without loading
    pub fn get(&self, name: &str) -> Option<SceneRendererHandle> {
        self.entries.get(name).map(|e| Arc::clone(&e.handle))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Drop the manager's reference. Outstanding handles stay valid.
    pub fn remove(&mut self, name: &str) -> Option<SceneRendererHandle> {
        self.entries.remove(name).map(|e| e.handle)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Age entries only the manager holds and evict the expired ones.
    ///
    /// Returns the number of evicted scene renderers.
    pub fn collect_unused(&mut self) -> usize {
        if !self.config.unload_unused {
            return 0;
        }
        let delay = self.config.unload_delay_frames;
        let before = self.entries.len();
        self.entries.retain(|name, entry| {
            if Arc::strong_count(&entry.handle) > 1 {
                entry.unused_frames = 0;
                return true;
            }
            entry.unused_frames += 1;
            if entry.unused_frames > delay {
                pl_info!("plscene::SceneRendererManager", "Unloaded unused scene renderer '{}'", name);
                return false;
            }
            true
        });
        before - self.entries.len()
    }
}

#[cfg(test)]
#[path = "scene_renderer_manager_tests.rs"]
mod tests;
