//! Bounding volumes and frustum culling
//!
//! Axis-aligned boxes and spheres for geometry bounds, planes, and a six-plane
//! frustum extracted from a `projection * view` matrix (Gribb-Hartmann).

use crate::foundation::math::{Mat4, Mat4Ext, Point3, Vec3, Vec4};

/// Radius marking a sphere that encloses nothing
pub const EMPTY_SPHERE_RADIUS: f32 = -1.0;

/// Planes whose normal is shorter than this are left unnormalized
pub const PLANE_NORMAL_EPSILON: f32 = 1e-12;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new box from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box that contains nothing; expanding it by a point yields that point
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// True when no point has been added
    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    /// Grow to include `point`
    pub fn expand_by_point(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Box enclosing packed xyz triples
    pub fn from_positions(positions: &[f32]) -> Self {
        let mut aabb = Self::empty();
        for chunk in positions.chunks_exact(3) {
            aabb.expand_by_point(&Vec3::new(chunk[0], chunk[1], chunk[2]));
        }
        aabb
    }

    /// Get the center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the box
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this box contains a point
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Centre
    pub center: Vec3,
    /// Radius, negative when empty
    pub radius: f32,
}

impl Default for Sphere {
    fn default() -> Self {
        Self::empty()
    }
}

impl Sphere {
    /// Create a sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere enclosing nothing
    pub fn empty() -> Self {
        Self {
            center: Vec3::zeros(),
            radius: EMPTY_SPHERE_RADIUS,
        }
    }

    /// True for the empty sphere
    pub fn is_empty(&self) -> bool {
        self.radius < 0.0
    }

    /// Sphere centred on the box of `positions` reaching the farthest point
    pub fn from_positions(positions: &[f32]) -> Self {
        let aabb = Aabb::from_positions(positions);
        if aabb.is_empty() {
            return Self::empty();
        }

        let center = aabb.center();
        let max_distance_sq = positions
            .chunks_exact(3)
            .map(|p| (Vec3::new(p[0], p[1], p[2]) - center).norm_squared())
            .fold(0.0_f32, f32::max);

        Self {
            center,
            radius: max_distance_sq.sqrt(),
        }
    }

    /// Transform by an affine matrix; the radius grows by the largest axis scale
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            center: matrix.transform_point(&Point3::from(self.center)).coords,
            radius: self.radius * matrix.max_scale_on_axis(),
        }
    }
}

/// Plane `normal . p + constant = 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized after `normalize`)
    pub normal: Vec3,
    /// Signed offset from the origin along the normal
    pub constant: f32,
}

impl Plane {
    /// Create a plane from normal and constant
    pub fn new(normal: Vec3, constant: f32) -> Self {
        Self { normal, constant }
    }

    /// Plane through `point` facing `normal`
    pub fn from_normal_and_point(normal: Vec3, point: &Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            constant: -normal.dot(point),
            normal,
        }
    }

    fn from_row(row: Vec4) -> Self {
        Self {
            normal: Vec3::new(row.x, row.y, row.z),
            constant: row.w,
        }
        .normalized()
    }

    /// Scale so that the normal has unit length
    pub fn normalized(self) -> Self {
        let length = self.normal.norm();
        if length < PLANE_NORMAL_EPSILON {
            return self;
        }
        let inverse = 1.0 / length;
        Self {
            normal: self.normal * inverse,
            constant: self.constant * inverse,
        }
    }

    /// Signed distance from the plane to a point
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.constant
    }

    /// Plane transformed by an affine matrix
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let point = self.normal * -self.constant;
        let world_point = matrix.transform_point(&Point3::from(point)).coords;
        let normal = (matrix.normal_matrix() * self.normal).normalize();
        Self::from_normal_and_point(normal, &world_point)
    }
}

/// Six inward-facing planes: left, right, bottom, top, far, near
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Planes in the order above
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a `projection * view` matrix.
    ///
    /// Each plane is a sum or difference of the fourth row with one of the
    /// first three (Gribb-Hartmann), for clip depth in `[-1, 1]`.
    pub fn from_matrix(view_projection: &Mat4) -> Self {
        let row = |i: usize| -> Vec4 { view_projection.row(i).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Plane::from_row(r3 + r0),
                Plane::from_row(r3 - r0),
                Plane::from_row(r3 + r1),
                Plane::from_row(r3 - r1),
                Plane::from_row(r3 - r2),
                Plane::from_row(r3 + r2),
            ],
        }
    }

    /// Sphere is at least partially inside
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        let negative_radius = -sphere.radius;
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(&sphere.center) >= negative_radius)
    }

    /// Box is at least partially inside
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            // Corner farthest along the plane normal
            let corner = Vec3::new(
                if plane.normal.x > 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y > 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z > 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.distance_to_point(&corner) >= 0.0
        })
    }

    /// Point lies inside all planes
    pub fn contains_point(&self, point: &Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::utils::deg_to_rad;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn camera_frustum() -> Frustum {
        let projection = Mat4::perspective(deg_to_rad(60.0), 1.0, 0.1, 100.0);
        Frustum::from_matrix(&projection)
    }

    #[test]
    fn test_sphere_inside_far_plane_is_visible() {
        let frustum = camera_frustum();
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -50.0), 1.0);
        assert!(frustum.intersects_sphere(&sphere));
    }

    #[test]
    fn test_sphere_beyond_far_plane_is_culled() {
        let frustum = camera_frustum();
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -200.0), 1.0);
        assert!(!frustum.intersects_sphere(&sphere));
    }

    #[test]
    fn test_sphere_behind_camera_is_culled() {
        let frustum = camera_frustum();
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 5.0), 1.0)));
    }

    #[test]
    fn test_sphere_straddling_side_plane_is_visible() {
        let frustum = camera_frustum();
        // At z = -10 the half-width is 10 * tan(30deg) ~= 5.77
        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(6.5, 0.0, -10.0), 1.0)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(8.0, 0.0, -10.0), 1.0)));
    }

    #[test]
    fn test_extracted_planes_are_normalized() {
        for plane in camera_frustum().planes {
            assert_relative_eq!(plane.normal.norm(), 1.0, epsilon = EPSILON);
        }
    }

    #[test]
    fn test_aabb_culling() {
        let frustum = camera_frustum();
        let visible = Aabb::from_positions(&[-1.0, -1.0, -11.0, 1.0, 1.0, -9.0]);
        let hidden = Aabb::from_positions(&[-1.0, -1.0, 9.0, 1.0, 1.0, 11.0]);
        assert!(frustum.intersects_aabb(&visible));
        assert!(!frustum.intersects_aabb(&hidden));
    }

    #[test]
    fn test_bounding_sphere_from_positions() {
        let positions = [-1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0];
        let sphere = Sphere::from_positions(&positions);
        assert_relative_eq!(sphere.center, Vec3::new(0.0, 1.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(sphere.radius, 2.0_f32.sqrt(), epsilon = EPSILON);
    }

    #[test]
    fn test_empty_positions_give_empty_sphere() {
        assert!(Sphere::from_positions(&[]).is_empty());
        assert!(Aabb::from_positions(&[]).is_empty());
    }

    #[test]
    fn test_sphere_transform_scales_radius() {
        let matrix = Mat4::new_translation(&Vec3::new(0.0, 0.0, -5.0))
            * Mat4::new_nonuniform_scaling(&Vec3::new(1.0, 3.0, 1.0));
        let sphere = Sphere::new(Vec3::new(0.0, 1.0, 0.0), 1.0).transformed(&matrix);
        assert_relative_eq!(sphere.center, Vec3::new(0.0, 3.0, -5.0), epsilon = EPSILON);
        assert_relative_eq!(sphere.radius, 3.0, epsilon = EPSILON);
    }

    #[test]
    fn test_plane_distance_and_transform() {
        let plane = Plane::from_normal_and_point(Vec3::y(), &Vec3::new(0.0, 2.0, 0.0));
        assert_relative_eq!(plane.distance_to_point(&Vec3::new(3.0, 5.0, 1.0)), 3.0, epsilon = EPSILON);

        let moved = plane.transformed(&Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0)));
        assert_relative_eq!(moved.distance_to_point(&Vec3::new(0.0, 3.0, 0.0)), 0.0, epsilon = EPSILON);
    }
}
