//! Configuration structs for the scene pipeline
//!
//! Every struct has a `Default` matching the engine's built-in behaviour and
//! can be loaded from RON. Missing fields fall back to their defaults.
//!
//! ```ron
//! (
//!     cull: (sort_by_distance: true),
//!     scene_renderer_manager: (unload_delay_frames: 10),
//!     default_scene_renderer: Some("Forward.sr"),
//! )
//! ```

use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::pl_bail;

/// Visibility traversal settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullConfig {
    /// Order siblings front to back before they are added to the tree
    pub sort_by_distance: bool,
    /// Honour per-node maximum draw distances
    pub use_max_draw_distance: bool,
    /// Camera-to-portal distance under which the current frustum is reused
    /// instead of being narrowed to the portal polygon
    pub portal_reuse_frustum_radius: f32,
    /// Maximum number of portals crossed along one traversal path
    pub max_portal_depth: u32,
}

impl Default for CullConfig {
    fn default() -> Self {
        Self {
            sort_by_distance: false,
            use_max_draw_distance: true,
            portal_reuse_frustum_radius: 0.5,
            max_portal_depth: 16,
        }
    }
}

/// Scene renderer resource cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneRendererManagerConfig {
    /// Drop scene renderers nobody holds anymore
    pub unload_unused: bool,
    /// Number of `collect_unused()` calls an unused entry survives
    pub unload_delay_frames: u32,
}

impl Default for SceneRendererManagerConfig {
    fn default() -> Self {
        Self {
            unload_unused: true,
            unload_delay_frames: 3,
        }
    }
}

/// Top-level configuration of a `SceneContext`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneContextConfig {
    pub cull: CullConfig,
    pub scene_renderer_manager: SceneRendererManagerConfig,
    /// Scene renderer used for cameras without their own
    pub default_scene_renderer: Option<String>,
}

impl SceneContextConfig {
    /// Parse a configuration from RON text and validate it
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = match ron::from_str(text) {
            Ok(config) => config,
            Err(e) => pl_bail!("plscene::Config", ParseError, "Invalid configuration: {}", e),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => pl_bail!("plscene::Config", ResourceNotFound,
                "Cannot read '{}': {}", path.display(), e),
        };
        Self::from_ron_str(&text)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let radius = self.cull.portal_reuse_frustum_radius;
        if radius.is_nan() || radius < 0.0 {
            pl_bail!("plscene::Config", InvalidConfiguration,
                "portal_reuse_frustum_radius must be >= 0 (got {})", radius);
        }
        if self.cull.max_portal_depth == 0 {
            pl_bail!("plscene::Config", InvalidConfiguration, "max_portal_depth must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
