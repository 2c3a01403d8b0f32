/// Local transform of a scene node (position, rotation, scale)

use glam::{Mat4, Quat, Vec3};

/// Position / rotation / scale relative to the owning container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::default() }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation, ..Self::default() }
    }

    /// Local-to-container matrix (T * R * S)
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Local-to-container matrix ignoring scale (T * R)
    pub fn matrix_no_scale(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }
}
