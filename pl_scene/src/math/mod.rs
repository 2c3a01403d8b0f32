//! Geometry shared by the camera, the scene graph and the visibility traversal.

mod aabb;
mod plane_set;
mod polygon;

pub use aabb::AABB;
pub use plane_set::{
    PlaneSet, FrustumTest, PlaneSide, plane_distance, classify_point,
    PLANE_LEFT, PLANE_RIGHT, PLANE_BOTTOM, PLANE_TOP, PLANE_NEAR, PLANE_FAR,
};
pub use polygon::Polygon;
