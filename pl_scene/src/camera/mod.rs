//! Camera module: the camera scene node component.
//!
//! The camera derives its projection, view and frustum lazily from its
//! attributes, its owning node's transform and the viewport it renders to.
//! Which camera is active is decided by a `SceneContext`.

mod camera;

pub use camera::{
    Camera, CameraFlags, CameraDebugFlags, CameraRecalculations,
    infinite_perspective_gl, view_forward_offset,
};
