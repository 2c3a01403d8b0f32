/// Scene renderer: an ordered, named list of passes.
///
/// Scene renderers are usually built from a `SceneRendererDesc` loaded from
/// a definition file, with each pass created through a `PassRegistry`.

use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::{pl_error, pl_warn};
use super::pass_registry::PassRegistry;
use super::scene_renderer_pass::{PassContext, SceneRendererPass};

// ===== DEFINITION =====

fn default_enabled() -> bool {
    true
}

/// One pass entry of a scene renderer definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassDesc {
    /// Registry class (`Begin`, `DrawSolid`, ...)
    pub class: String,
    /// Instance name, defaults to the class name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Distance ordering for draw passes
    #[serde(default)]
    pub sort: bool,
    /// Clear color for `Begin`
    #[serde(default)]
    pub clear_color: Option<[f32; 4]>,
}

impl PassDesc {
    pub fn new(class: &str) -> Self {
        Self {
            class: class.to_string(),
            name: None,
            enabled: true,
            sort: false,
            clear_color: None,
        }
    }

    /// Instance name, falling back to the class
    pub fn instance_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.class)
    }
}

/// Parsed scene renderer definition
///
/// ```ron
/// (
///     name: "Forward",
///     passes: [
///         (class: "Begin", clear_color: Some((0.0, 0.0, 0.0, 1.0))),
///         (class: "DrawSolid", sort: true),
///         (class: "DrawTransparent"),
///         (class: "DrawDebug", enabled: false),
///     ],
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneRendererDesc {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub passes: Vec<PassDesc>,
}

// ===== FRAME REPORT =====

/// Outcome of one `SceneRenderer::draw`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Enabled passes that ran to completion
    pub executed: usize,
    /// Names of the passes that returned an error
    pub failed: Vec<String>,
}

impl FrameReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

// ===== SCENE RENDERER =====

pub struct SceneRenderer {
    name: String,
    passes: Vec<Box<dyn SceneRendererPass>>,
}

impl std::fmt::Debug for SceneRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let passes: Vec<&str> = self.passes.iter().map(|p| p.name()).collect();
        f.debug_struct("SceneRenderer")
            .field("name", &self.name)
            .field("passes", &passes)
            .finish()
    }
}

impl SceneRenderer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passes: Vec::new(),
        }
    }

    /// Build a scene renderer from its definition.
    ///
    /// Passes whose class is unknown to `registry` are logged and skipped.
    pub fn from_desc(desc: &SceneRendererDesc, registry: &PassRegistry) -> Self {
        let mut scene_renderer = Self::new(&desc.name);
        for pass_desc in &desc.passes {
            match registry.create(pass_desc) {
                Ok(mut pass) => {
                    pass.set_enabled(pass_desc.enabled);
                    scene_renderer.passes.push(pass);
                }
                Err(_) if !registry.contains(&pass_desc.class) => {
                    pl_warn!("plscene::SceneRenderer",
                        "'{}': skipping pass '{}' of unknown class '{}'",
                        desc.name, pass_desc.instance_name(), pass_desc.class);
                }
                Err(e) => {
                    pl_warn!("plscene::SceneRenderer",
                        "'{}': skipping pass '{}': {}",
                        desc.name, pass_desc.instance_name(), e);
                }
            }
        }
        scene_renderer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ===== PASSES =====

    pub fn add_pass(&mut self, pass: Box<dyn SceneRendererPass>) {
        self.passes.push(pass);
    }

    /// Insert a pass at `index` (clamped to the pass count)
    pub fn insert_pass(&mut self, index: usize, pass: Box<dyn SceneRendererPass>) {
        let index = index.min(self.passes.len());
        self.passes.insert(index, pass);
    }

    /// Remove the first pass named `name`
    pub fn remove_pass(&mut self, name: &str) -> Option<Box<dyn SceneRendererPass>> {
        let index = self.passes.iter().position(|p| p.name() == name)?;
        Some(self.passes.remove(index))
    }

    pub fn pass(&self, name: &str) -> Option<&dyn SceneRendererPass> {
        self.passes.iter().find(|p| p.name() == name).map(|p| p.as_ref())
    }

    pub fn pass_mut(&mut self, name: &str) -> Option<&mut (dyn SceneRendererPass + 'static)> {
        self.passes.iter_mut().find(|p| p.name() == name).map(|p| p.as_mut())
    }

    pub fn pass_at(&self, index: usize) -> Option<&dyn SceneRendererPass> {
        self.passes.get(index).map(|p| p.as_ref())
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Returns `false` when no pass has that name
    pub fn set_pass_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.pass_mut(name) {
            Some(pass) => {
                pass.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    // ===== DRAW =====

    /// Run every enabled pass in order.
    ///
    /// A failing pass is logged and skipped; the following passes still run.
    pub fn draw(&mut self, ctx: &mut PassContext<'_>) -> FrameReport {
        let mut report = FrameReport::default();
        for pass in self.passes.iter_mut().filter(|p| p.is_enabled()) {
            match pass.draw(ctx) {
                Ok(()) => report.executed += 1,
                Err(e) => {
                    pl_error!("plscene::SceneRenderer", "'{}': pass '{}' failed: {}",
                        self.name, pass.name(), e);
                    report.failed.push(pass.name().to_string());
                }
            }
        }
        report
    }

    /// Run a single pass by name, ignoring its enabled state
    pub fn draw_pass(&mut self, name: &str, ctx: &mut PassContext<'_>) -> Option<Result<()>> {
        let pass = self.passes.iter_mut().find(|p| p.name() == name)?;
        Some(pass.draw(ctx))
    }
}

#[cfg(test)]
#[path = "scene_renderer_tests.rs"]
mod tests;
