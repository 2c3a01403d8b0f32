/// Pass class registry used to instantiate scene renderer definitions.

use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::scene::DrawPhase;
use super::passes::{BeginPass, DrawPhasePass};
use super::scene_renderer::PassDesc;
use super::scene_renderer_pass::SceneRendererPass;

/// Pass factory function type
type PassFactory = Box<dyn Fn(&PassDesc) -> Result<Box<dyn SceneRendererPass>> + Send + Sync>;

/// Maps pass class names to factories
pub struct PassRegistry {
    factories: FxHashMap<String, PassFactory>,
}

impl std::fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassRegistry")
            .field("classes", &self.class_names())
            .finish()
    }
}

impl Default for PassRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl PassRegistry {
    /// Registry without any class
    pub fn empty() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// Registry with `Begin` and one class per draw phase
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(BeginPass::CLASS, |desc| {
            let mut pass = BeginPass::new(desc.instance_name());
            if let Some(color) = desc.clear_color {
                pass = pass.with_clear_color(color);
            }
            Ok(Box::new(pass))
        });
        for phase in DrawPhase::ALL {
            registry.register(phase.name(), move |desc| {
                let pass = DrawPhasePass::new(desc.instance_name(), phase).with_sorting(desc.sort);
                Ok(Box::new(pass))
            });
        }
        registry
    }

    /// Register (or replace) a pass class
    pub fn register<F>(&mut self, class: &str, factory: F)
    where
        F: Fn(&PassDesc) -> Result<Box<dyn SceneRendererPass>> + Send + Sync + 'static,
    {
        self.factories.insert(class.to_string(), Box::new(factory));
    }

    pub fn unregister(&mut self, class: &str) -> bool {
        self.factories.remove(class).is_some()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// Registered class names, sorted
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate the pass described by `desc`
    pub fn create(&self, desc: &PassDesc) -> Result<Box<dyn SceneRendererPass>> {
        let factory = self
            .factories
            .get(&desc.class)
            .ok_or_else(|| Error::ResourceNotFound(format!("Pass class '{}' not registered", desc.class)))?;
        factory(desc)
    }
}
