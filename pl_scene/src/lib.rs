/*!
# PixelLight Scene

Camera, visibility and scene renderer pipeline of the PixelLight engine.

A `SceneContext` owns a scene graph and the active camera. Each frame the
configured scene renderer runs its passes; the first pass that needs
visibility asks `CullQuery` (SQCull) to build a camera-relative visibility
tree, and the draw passes dispatch the per-node draw phases through an
abstract `Renderer` backend.

## Architecture

- **SceneGraph**: node table with stable keys (containers, cells, portals, cameras)
- **Camera**: lazily derived projection, view, frustum and frustum vertices
- **CullQuery**: frustum, distance and portal culling into a `VisTree`
- **SceneRenderer**: ordered list of `SceneRendererPass` objects, loaded by name
- **Renderer**: backend trait the passes submit state and draw calls to

Backends implement `Renderer`; concrete draw techniques plug in as passes.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod math;
pub mod renderer;
pub mod camera;
pub mod scene;
pub mod visibility;
pub mod compositing;
mod scene_context;

// Main plscene namespace module
pub mod plscene {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine facade
    pub use crate::engine::Engine;

    // Frame driver
    pub use crate::scene_context::SceneContext;

    // Renderer backend trait
    pub use crate::renderer::Renderer;

    // Logging sub-module (types only; the pl_* macros live at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    pub mod config {
        pub use crate::config::*;
    }

    pub mod math {
        pub use crate::math::*;
    }

    // Backend trait, render states and draw submission types
    pub mod render {
        pub use crate::renderer::*;
    }

    pub mod camera {
        pub use crate::camera::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }

    pub mod visibility {
        pub use crate::visibility::*;
    }

    pub mod compositing {
        pub use crate::compositing::*;
    }
}

// Re-export math library at crate root
pub use glam;
