/// Convex polygons and Sutherland–Hodgman clipping.

use glam::{Mat4, Vec3, Vec4};
use super::aabb::AABB;
use super::plane_set::{PlaneSet, plane_distance};

/// Planar convex polygon, vertices in winding order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon {
    vertices: Vec<Vec3>,
}

impl Polygon {
    pub fn new(vertices: Vec<Vec3>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// At least three vertices
    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 3
    }

    /// Plane of the polygon, normal following the right-hand rule.
    ///
    /// Newell's method, so slightly non-planar input still gives a usable
    /// plane. `None` for fewer than three vertices or zero area.
    pub fn plane(&self) -> Option<Vec4> {
        if !self.is_valid() {
            return None;
        }
        let mut normal = Vec3::ZERO;
        for (i, &a) in self.vertices.iter().enumerate() {
            let b = self.vertices[(i + 1) % self.vertices.len()];
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        let normal = normal.try_normalize()?;
        Some(normal.extend(-normal.dot(self.centroid())))
    }

    pub fn centroid(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return Vec3::ZERO;
        }
        self.vertices.iter().copied().sum::<Vec3>() / self.vertices.len() as f32
    }

    pub fn bounding_box(&self) -> Option<AABB> {
        AABB::from_points(self.vertices.iter().copied())
    }

    pub fn transformed(&self, matrix: &Mat4) -> Polygon {
        Polygon {
            vertices: self.vertices.iter().map(|&v| matrix.transform_point3(v)).collect(),
        }
    }

    /// Keep the part of the polygon in front of (or on) `plane`
    pub fn clipped_by_plane(&self, plane: Vec4) -> Polygon {
        let count = self.vertices.len();
        let mut out = Vec::with_capacity(count + 1);

        for i in 0..count {
            let current = self.vertices[i];
            let next = self.vertices[(i + 1) % count];
            let d_current = plane_distance(plane, current);
            let d_next = plane_distance(plane, next);

            if d_current >= 0.0 {
                out.push(current);
            }
            if (d_current >= 0.0) != (d_next >= 0.0) {
                let t = d_current / (d_current - d_next);
                out.push(current + (next - current) * t);
            }
        }

        Polygon { vertices: out }
    }

    /// Clip against every plane of the set, stopping once nothing is left
    pub fn clipped_by(&self, planes: &PlaneSet) -> Polygon {
        let mut polygon = self.clone();
        for &plane in planes.planes() {
            if polygon.is_empty() {
                break;
            }
            polygon = polygon.clipped_by_plane(plane);
        }
        polygon
    }
}

#[cfg(test)]
#[path = "polygon_tests.rs"]
mod tests;
