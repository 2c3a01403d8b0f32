//! Scene module
//!
//! Provides the scene graph (node table with stable keys), scene node kinds
//! and flags, the draw capability contract and scene node modifiers.

mod transform;
mod scene_node;
mod scene_graph;
mod drawable;
mod modifier;

pub use transform::Transform;
pub use scene_node::{
    SceneNode, SceneNodeKey, ModifierKey, SceneNodeKind, CellPortal, AntiPortal,
    SceneNodeFlags, DrawFunctionFlags, SceneNodeDebugFlags, DrawPhase,
};
pub use scene_graph::SceneGraph;
pub use drawable::{Drawable, PrimitiveDrawable, PrimitiveRange};
pub use modifier::{SceneNodeModifier, BillboardModifier};
