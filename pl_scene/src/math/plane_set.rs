/// Plane sets: camera frustums and portal-narrowed view volumes.
///
/// Each plane is a Vec4 (A, B, C, D) where:
/// - (A, B, C) is the inward-pointing unit normal
/// - D is the signed distance
/// - A point P is inside if dot(plane, P_homogeneous) >= 0 for all planes
///
/// A camera frustum has six planes (five without a far plane). A view
/// volume narrowed through a cell portal has one plane per portal edge plus
/// the portal plane as its near plane.

use glam::{Mat4, Vec3, Vec4};
use super::aabb::AABB;

/// Result of a 3-way plane-set/AABB classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumTest {
    /// AABB is entirely outside the volume
    Outside,
    /// AABB is entirely inside the volume
    Inside,
    /// AABB partially overlaps the volume
    Partial,
}

/// Position of a point relative to a plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    /// On the side the normal points to
    InFront,
    Behind,
    /// Within the classification epsilon
    Coinciding,
}

/// Frustum plane indices (valid for sets built from a view-projection matrix)
pub const PLANE_LEFT: usize = 0;
pub const PLANE_RIGHT: usize = 1;
pub const PLANE_BOTTOM: usize = 2;
pub const PLANE_TOP: usize = 3;
pub const PLANE_NEAR: usize = 4;
pub const PLANE_FAR: usize = 5;

const SIDE_EPSILON: f32 = 1e-5;

/// Signed distance of `point` to `plane` (positive in front)
#[inline]
pub fn plane_distance(plane: Vec4, point: Vec3) -> f32 {
    plane.truncate().dot(point) + plane.w
}

/// Which side of `plane` the point lies on
pub fn classify_point(plane: Vec4, point: Vec3) -> PlaneSide {
    let d = plane_distance(plane, point);
    if d > SIDE_EPSILON {
        PlaneSide::InFront
    } else if d < -SIDE_EPSILON {
        PlaneSide::Behind
    } else {
        PlaneSide::Coinciding
    }
}

fn normalized(plane: Vec4) -> Vec4 {
    let normal_len = plane.truncate().length();
    if normal_len > 0.0 { plane / normal_len } else { plane }
}

/// Convex volume bounded by inward-facing planes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaneSet {
    planes: Vec<Vec4>,
    near: Option<usize>,
    far: Option<usize>,
}

impl PlaneSet {
    /// Build a set from raw planes (normalized on the way in)
    pub fn from_planes<I: IntoIterator<Item = Vec4>>(planes: I) -> Self {
        Self {
            planes: planes.into_iter().map(normalized).collect(),
            near: None,
            far: None,
        }
    }

    /// Extract frustum planes from a view-projection matrix.
    ///
    /// Gribb & Hartmann on an OpenGL-style clip space (z in [-1, 1]).
    /// With `infinite_far` the far plane is omitted.
    pub fn from_view_projection(vp: &Mat4, infinite_far: bool) -> Self {
        let row0 = vp.row(0);
        let row1 = vp.row(1);
        let row2 = vp.row(2);
        let row3 = vp.row(3);

        let mut planes = vec![
            row3 + row0, // left
            row3 - row0, // right
            row3 + row1, // bottom
            row3 - row1, // top
            row3 + row2, // near
        ];
        let far = if infinite_far {
            None
        } else {
            planes.push(row3 - row2);
            Some(PLANE_FAR)
        };

        Self {
            planes: planes.into_iter().map(normalized).collect(),
            near: Some(PLANE_NEAR),
            far,
        }
    }

    /// View volume from `eye` through a convex polygon.
    ///
    /// One plane per polygon edge passes through the eye; each is oriented
    /// so the polygon lies on its inside. `near` (typically the polygon's
    /// own plane) and `far` are appended when given. Edges whose plane
    /// cannot be formed (eye on the edge line) are skipped.
    pub fn from_view_polygon(vertices: &[Vec3], eye: Vec3, near: Option<Vec4>, far: Option<Vec4>) -> Self {
        let mut set = PlaneSet::default();
        if vertices.len() < 3 {
            return set;
        }

        let centroid = vertices.iter().copied().sum::<Vec3>() / vertices.len() as f32;
        for (i, &a) in vertices.iter().enumerate() {
            let b = vertices[(i + 1) % vertices.len()];
            let normal = (a - eye).cross(b - eye);
            if normal.length_squared() <= f32::EPSILON {
                continue;
            }
            let normal = normal.normalize();
            let mut plane = normal.extend(-normal.dot(eye));
            if plane_distance(plane, centroid) < 0.0 {
                plane = -plane;
            }
            set.planes.push(plane);
        }

        if let Some(near_plane) = near {
            set.near = Some(set.planes.len());
            set.planes.push(normalized(near_plane));
        }
        if let Some(far_plane) = far {
            set.far = Some(set.planes.len());
            set.planes.push(normalized(far_plane));
        }
        set
    }

    pub fn planes(&self) -> &[Vec4] {
        &self.planes
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn near_plane(&self) -> Option<Vec4> {
        self.near.map(|i| self.planes[i])
    }

    pub fn far_plane(&self) -> Option<Vec4> {
        self.far.map(|i| self.planes[i])
    }

    /// Re-express the planes in another space.
    ///
    /// `matrix` maps points from the current space to the target space;
    /// planes are carried by its inverse transpose.
    pub fn transformed(&self, matrix: &Mat4) -> PlaneSet {
        let carry = matrix.inverse().transpose();
        PlaneSet {
            planes: self.planes.iter().map(|&p| normalized(carry * p)).collect(),
            near: self.near,
            far: self.far,
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|&p| plane_distance(p, point) >= 0.0)
    }

    /// Test if an AABB intersects this volume.
    ///
    /// Positive-vertex test: for each plane, the corner most in the
    /// direction of the normal decides. Conservative (may report
    /// intersection for boxes just outside a corner), never misses.
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        self.planes.iter().all(|&plane| {
            let normal = plane.truncate();
            let p_vertex = Vec3::select(normal.cmpge(Vec3::ZERO), aabb.max, aabb.min);
            normal.dot(p_vertex) + plane.w >= 0.0
        })
    }

    /// Classify an AABB against the volume (3-way test).
    pub fn classify_aabb(&self, aabb: &AABB) -> FrustumTest {
        let mut all_inside = true;

        for &plane in &self.planes {
            let normal = plane.truncate();
            let positive = normal.cmpge(Vec3::ZERO);

            let p_vertex = Vec3::select(positive, aabb.max, aabb.min);
            if normal.dot(p_vertex) + plane.w < 0.0 {
                return FrustumTest::Outside;
            }

            let n_vertex = Vec3::select(positive, aabb.min, aabb.max);
            if normal.dot(n_vertex) + plane.w < 0.0 {
                all_inside = false;
            }
        }

        if all_inside { FrustumTest::Inside } else { FrustumTest::Partial }
    }
}

#[cfg(test)]
#[path = "plane_set_tests.rs"]
mod tests;
