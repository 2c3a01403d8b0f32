//! Visibility module
//!
//! Per-frame visibility tree (`VisTree`, `VisNode`) and the cull traversal
//! (`CullQuery`) that builds it from the scene graph and a camera.

mod vis_node;
mod vis_tree;
mod cull_query;
pub(crate) mod distance_sort;

pub use vis_node::{VisNode, VisNodeId, VisKind, VisProjection};
pub use vis_tree::{VisTree, VisNodeRef, VisTreeIter};
pub use cull_query::{CullQuery, CullView, CullStatistics};

#[cfg(test)]
#[path = "vis_tree_tests.rs"]
mod vis_tree_tests;
