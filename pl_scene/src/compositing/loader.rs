/// Scene renderer definition loaders.
///
/// A loader turns a scene renderer filename into a parsed
/// `SceneRendererDesc`. The RON loader reads files below a base directory;
/// the memory loader serves definitions registered at runtime (tests,
/// embedded defaults).

use std::path::{Path, PathBuf};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use super::scene_renderer::SceneRendererDesc;

/// Load-by-filename interface for scene renderer definitions
pub trait SceneRendererLoader: Send + Sync {
    fn load(&self, filename: &str) -> Result<SceneRendererDesc>;
}

/// Parse a RON definition. An empty name is replaced by `filename`.
pub fn parse_scene_renderer(filename: &str, text: &str) -> Result<SceneRendererDesc> {
    let mut desc: SceneRendererDesc = ron::from_str(text)
        .map_err(|e| Error::ParseError(format!("'{}': {}", filename, e)))?;
    if desc.name.is_empty() {
        desc.name = filename.to_string();
    }
    Ok(desc)
}

// ===== RON FILES =====

/// Reads `<base_path>/<filename>` as RON
#[derive(Debug, Clone, Default)]
pub struct RonSceneRendererLoader {
    base_path: PathBuf,
}

impl RonSceneRendererLoader {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl SceneRendererLoader for RonSceneRendererLoader {
    fn load(&self, filename: &str) -> Result<SceneRendererDesc> {
        let path = self.base_path.join(filename);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| Error::ResourceNotFound(format!("'{}': {}", path.display(), e)))?;
        parse_scene_renderer(filename, &text)
    }
}

// ===== IN MEMORY =====

/// Serves definitions from a name → RON text table
#[derive(Debug, Clone, Default)]
pub struct MemorySceneRendererLoader {
    sources: FxHashMap<String, String>,
}

impl MemorySceneRendererLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, filename: &str, text: &str) -> Self {
        self.insert(filename, text);
        self
    }

    pub fn insert(&mut self, filename: &str, text: &str) {
        self.sources.insert(filename.to_string(), text.to_string());
    }

    pub fn remove(&mut self, filename: &str) -> bool {
        self.sources.remove(filename).is_some()
    }
}

impl SceneRendererLoader for MemorySceneRendererLoader {
    fn load(&self, filename: &str) -> Result<SceneRendererDesc> {
        let text = self
            .sources
            .get(filename)
            .ok_or_else(|| Error::ResourceNotFound(format!("'{}' is not registered", filename)))?;
        parse_scene_renderer(filename, text)
    }
}
