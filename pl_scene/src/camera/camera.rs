/// Camera: scene node component deriving projection, view and frustum.
///
/// All derived data is computed lazily. Setters only mark what they
/// invalidate, and only when the value actually changes; getters recompute
/// what is marked. A camera looks along its node's local +Z axis: the view
/// rotation carries a fixed 180° turn around Y, because view space looks
/// down -Z.
///
/// With `auto_update` disabled the projection, view and frustum are never
/// recomputed. An external system then owns them through
/// `set_projection_matrix`, `set_view_matrix` and `set_frustum`. Frustum
/// vertices are always derived, whatever `auto_update` says.

use glam::{Mat4, Quat, Vec3, Vec4};
use bitflags::bitflags;
use crate::compositing::SceneRendererHandle;
use crate::math::{AABB, PlaneSet};
use crate::renderer::Viewport;
use crate::scene::Transform;

bitflags! {
    /// Camera behaviour flags
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CameraFlags: u32 {
        /// Mirror the view vertically (render-to-texture targets)
        const FLIP_Y        = 1 << 0;
        /// Swap the face culling winding while this camera renders
        const INV_CULL_MODE = 1 << 1;
        /// Infinite far plane
        const NO_Z_FAR      = 1 << 2;
    }
}

bitflags! {
    /// Camera debug drawing flags
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CameraDebugFlags: u32 {
        /// Do not draw the frustum box
        const NO_FRUSTUM       = 1 << 0;
        /// Mark the eight frustum vertices
        const FRUSTUM_VERTICES = 1 << 1;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Dirty: u8 {
        const PROJECTION       = 1 << 0;
        const VIEW             = 1 << 1;
        const FRUSTUM          = 1 << 2;
        const FRUSTUM_VERTICES = 1 << 3;
    }
}

/// Fixed 180° rotation around Y separating the node's +Z forward from
/// view space's -Z forward
pub fn view_forward_offset() -> Quat {
    Quat::from_rotation_y(std::f32::consts::PI)
}

/// Number of times each derived quantity has been recomputed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraRecalculations {
    pub projection: u32,
    pub view: u32,
    pub frustum: u32,
    pub frustum_vertices: u32,
}

/// Perspective camera component
#[derive(Debug, Clone)]
pub struct Camera {
    /// Vertical field of view, degrees
    fov: f32,
    /// Pixel aspect factor (1.0 = square pixels)
    aspect: f32,
    z_near: f32,
    z_far: f32,
    flags: CameraFlags,
    debug_flags: CameraDebugFlags,
    auto_update: bool,
    view_rotation_offset: Quat,
    scene_renderer_filename: String,
    scene_renderer: Option<SceneRendererHandle>,

    dirty: Dirty,
    /// Viewport size the projection was last derived for
    viewport_size: (f32, f32),
    projection: Mat4,
    view: Mat4,
    frustum: PlaneSet,
    frustum_vertices: [Vec3; 8],
    recalculations: CameraRecalculations,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    pub const DEFAULT_FOV: f32 = 45.0;
    pub const DEFAULT_ASPECT: f32 = 1.0;
    pub const DEFAULT_Z_NEAR: f32 = 0.01;
    pub const DEFAULT_Z_FAR: f32 = 1000.0;

    pub fn new() -> Self {
        Self {
            fov: Self::DEFAULT_FOV,
            aspect: Self::DEFAULT_ASPECT,
            z_near: Self::DEFAULT_Z_NEAR,
            z_far: Self::DEFAULT_Z_FAR,
            flags: CameraFlags::empty(),
            debug_flags: CameraDebugFlags::empty(),
            auto_update: true,
            view_rotation_offset: Quat::IDENTITY,
            scene_renderer_filename: String::new(),
            scene_renderer: None,
            dirty: Dirty::all(),
            viewport_size: (0.0, 0.0),
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            frustum: PlaneSet::default(),
            frustum_vertices: [Vec3::ZERO; 8],
            recalculations: CameraRecalculations::default(),
        }
    }

    fn invalidate_projection(&mut self) {
        self.dirty |= Dirty::PROJECTION | Dirty::FRUSTUM | Dirty::FRUSTUM_VERTICES;
    }

    // ===== ATTRIBUTES =====

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn set_fov(&mut self, fov: f32) {
        if self.fov != fov {
            self.fov = fov;
            self.invalidate_projection();
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if self.aspect != aspect {
            self.aspect = aspect;
            self.invalidate_projection();
        }
    }

    pub fn z_near(&self) -> f32 {
        self.z_near
    }

    pub fn set_z_near(&mut self, z_near: f32) {
        if self.z_near != z_near {
            self.z_near = z_near;
            self.invalidate_projection();
        }
    }

    pub fn z_far(&self) -> f32 {
        self.z_far
    }

    pub fn set_z_far(&mut self, z_far: f32) {
        if self.z_far != z_far {
            self.z_far = z_far;
            self.invalidate_projection();
        }
    }

    pub fn flags(&self) -> CameraFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: CameraFlags) {
        if self.flags == flags {
            return;
        }
        if (self.flags ^ flags).contains(CameraFlags::FLIP_Y) {
            self.dirty |= Dirty::VIEW;
        }
        self.flags = flags;
        self.invalidate_projection();
    }

    pub fn debug_flags(&self) -> CameraDebugFlags {
        self.debug_flags
    }

    pub fn set_debug_flags(&mut self, flags: CameraDebugFlags) {
        self.debug_flags = flags;
    }

    pub fn auto_update(&self) -> bool {
        self.auto_update
    }

    pub fn set_auto_update(&mut self, auto_update: bool) {
        self.auto_update = auto_update;
    }

    pub fn view_rotation_offset(&self) -> Quat {
        self.view_rotation_offset
    }

    pub fn set_view_rotation_offset(&mut self, offset: Quat) {
        if self.view_rotation_offset != offset {
            self.view_rotation_offset = offset;
            self.on_transform_changed();
        }
    }

    pub fn scene_renderer_filename(&self) -> &str {
        &self.scene_renderer_filename
    }

    /// Select the scene renderer by file name; a new name drops the cached handle
    pub fn set_scene_renderer_filename(&mut self, filename: &str) {
        if self.scene_renderer_filename != filename {
            self.scene_renderer_filename = filename.to_string();
            self.scene_renderer = None;
        }
    }

    pub(crate) fn scene_renderer_handle(&self) -> Option<&SceneRendererHandle> {
        self.scene_renderer.as_ref()
    }

    pub(crate) fn set_scene_renderer_handle(&mut self, handle: Option<SceneRendererHandle>) {
        self.scene_renderer = handle;
    }

    pub fn recalculations(&self) -> CameraRecalculations {
        self.recalculations
    }

    // ===== EVENTS =====

    /// Owning node moved or turned
    pub fn on_transform_changed(&mut self) {
        self.dirty |= Dirty::VIEW | Dirty::FRUSTUM | Dirty::FRUSTUM_VERTICES;
    }

    // ===== DERIVED DATA =====

    /// Final aspect ratio for a viewport
    pub fn aspect_ratio(&self, viewport: &Viewport) -> f32 {
        viewport.aspect_ratio() / self.aspect
    }

    /// Node rotation combined with the forward offset and the view rotation offset
    pub fn view_rotation(&self, transform: &Transform) -> Quat {
        transform.rotation * view_forward_offset() * self.view_rotation_offset
    }

    /// Camera space to container space (eye at the node position, no scale)
    pub fn camera_to_container(&self, transform: &Transform) -> Mat4 {
        Mat4::from_rotation_translation(self.view_rotation(transform), transform.position)
    }

    fn viewport_changed(&self, viewport: &Viewport) -> bool {
        self.viewport_size != (viewport.width, viewport.height)
    }

    fn build_projection(&self, viewport: &Viewport) -> Mat4 {
        let fov_y = self.fov.to_radians();
        let ratio = self.aspect_ratio(viewport);
        if self.flags.contains(CameraFlags::NO_Z_FAR) {
            infinite_perspective_gl(fov_y, ratio, self.z_near)
        } else {
            Mat4::perspective_rh_gl(fov_y, ratio, self.z_near, self.z_far)
        }
    }

    /// Projection matrix for `viewport`, recomputed when marked or when the
    /// viewport size differs from the last derivation
    pub fn projection_matrix(&mut self, viewport: &Viewport) -> Mat4 {
        if self.auto_update && (self.dirty.contains(Dirty::PROJECTION) || self.viewport_changed(viewport)) {
            if self.viewport_changed(viewport) {
                self.dirty |= Dirty::FRUSTUM | Dirty::FRUSTUM_VERTICES;
                self.viewport_size = (viewport.width, viewport.height);
            }
            self.projection = self.build_projection(viewport);
            self.dirty.remove(Dirty::PROJECTION);
            self.recalculations.projection += 1;
        }
        self.projection
    }

    /// View matrix for the owning node's transform
    pub fn view_matrix(&mut self, transform: &Transform) -> Mat4 {
        if self.auto_update && self.dirty.contains(Dirty::VIEW) {
            let mut view = self.camera_to_container(transform).inverse();
            if self.flags.contains(CameraFlags::FLIP_Y) {
                view = Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0)) * view;
            }
            self.view = view;
            self.dirty.remove(Dirty::VIEW);
            self.recalculations.view += 1;
        }
        self.view
    }

    /// Frustum planes in container space
    pub fn frustum(&mut self, transform: &Transform, viewport: &Viewport) -> &PlaneSet {
        if self.auto_update {
            let projection = self.projection_matrix(viewport);
            let view = self.view_matrix(transform);
            if self.dirty.contains(Dirty::FRUSTUM) {
                let infinite = self.flags.contains(CameraFlags::NO_Z_FAR);
                self.frustum = PlaneSet::from_view_projection(&(projection * view), infinite);
                self.dirty.remove(Dirty::FRUSTUM);
                self.recalculations.frustum += 1;
            }
        }
        &self.frustum
    }

    /// The eight frustum corners in container space (`AABB::corners` order:
    /// near plane first)
    ///
    /// Without a far plane the far corners lie at infinity and are clamped to
    /// `z_far` instead.
    pub fn frustum_vertices(&mut self, transform: &Transform, viewport: &Viewport) -> &[Vec3; 8] {
        let size_changed = self.auto_update && self.viewport_changed(viewport);
        if self.dirty.contains(Dirty::FRUSTUM_VERTICES) || size_changed {
            let mut projection = self.projection_matrix(viewport);
            if self.flags.contains(CameraFlags::NO_Z_FAR) {
                projection = Mat4::perspective_rh_gl(
                    self.fov.to_radians(), self.aspect_ratio(viewport), self.z_near, self.z_far);
            }
            let to_container = self.camera_to_container(transform) * projection.inverse();
            let ndc = AABB::new(Vec3::splat(-1.0), Vec3::ONE).corners();
            for (vertex, corner) in self.frustum_vertices.iter_mut().zip(ndc) {
                *vertex = to_container.project_point3(corner);
            }
            self.dirty.remove(Dirty::FRUSTUM_VERTICES);
            self.recalculations.frustum_vertices += 1;
        }
        &self.frustum_vertices
    }

    /// Frustum vertices as last derived, without refreshing them
    pub fn cached_frustum_vertices(&self) -> &[Vec3; 8] {
        &self.frustum_vertices
    }

    /// Corners of the view plane at `distance` in front of the eye:
    /// upper-left, upper-right, lower-left, lower-right.
    ///
    /// In camera space unless `container_space` is set.
    pub fn viewport_corners(&self, transform: &Transform, viewport: &Viewport, distance: f32, container_space: bool) -> [Vec3; 4] {
        let half_height = distance * (self.fov.to_radians() * 0.5).tan();
        let half_width = half_height * self.aspect_ratio(viewport);
        let corners = [
            Vec3::new(-half_width, half_height, -distance),
            Vec3::new(half_width, half_height, -distance),
            Vec3::new(-half_width, -half_height, -distance),
            Vec3::new(half_width, -half_height, -distance),
        ];
        if container_space {
            let m = self.camera_to_container(transform);
            corners.map(|c| m.transform_point3(c))
        } else {
            corners
        }
    }

    /// Box enclosing the frustum in the node's local space (for the scene
    /// graph's bounding-box update)
    pub fn local_bounding_box(&mut self, transform: &Transform) -> Option<AABB> {
        let viewport = Viewport::new(self.viewport_size.0, self.viewport_size.1);
        let to_local = transform.matrix_no_scale().inverse();
        let vertices = *self.frustum_vertices(transform, &viewport);
        if vertices.iter().any(|v| !v.is_finite()) {
            return None;
        }
        AABB::from_points(vertices.iter().map(|&v| to_local.transform_point3(v)))
    }

    // ===== EXTERNAL OWNERSHIP =====

    /// Store a projection computed elsewhere (meaningful with `auto_update` off)
    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.projection = projection;
        self.dirty.remove(Dirty::PROJECTION);
        self.dirty |= Dirty::FRUSTUM_VERTICES;
    }

    /// Store a view matrix computed elsewhere (meaningful with `auto_update` off)
    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.view = view;
        self.dirty.remove(Dirty::VIEW);
    }

    /// Store frustum planes computed elsewhere (meaningful with `auto_update` off)
    pub fn set_frustum(&mut self, frustum: PlaneSet) {
        self.frustum = frustum;
        self.dirty.remove(Dirty::FRUSTUM);
    }
}

/// Right-handed OpenGL-style perspective with the far plane at infinity
pub fn infinite_perspective_gl(fov_y_radians: f32, aspect_ratio: f32, z_near: f32) -> Mat4 {
    let f = 1.0 / (0.5 * fov_y_radians).tan();
    Mat4::from_cols(
        Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
        Vec4::new(0.0, f, 0.0, 0.0),
        Vec4::new(0.0, 0.0, -1.0, -1.0),
        Vec4::new(0.0, 0.0, -2.0 * z_near, 0.0),
    )
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
