//! View frustum planes and box tests.
//!
//! Planes point inwards: a point is inside the frustum when its signed distance to every
//! plane is non-negative.

use cgmath::{InnerSpace, Matrix4, Point3, Vector3, Vector4};

/// A plane `normal . p + distance = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing into the frustum
    pub normal: Vector3<f32>,
    /// Offset from the origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Creates a plane from the coefficients `(a, b, c, d)` of `ax + by + cz + d = 0`.
    ///
    /// The coefficients are scaled so the normal has unit length.
    pub fn from_coefficients(v: Vector4<f32>) -> Self {
        let normal = v.truncate();
        let len = normal.magnitude();
        if len > 0.0 {
            Plane {
                normal: normal / len,
                distance: v.w / len,
            }
        } else {
            Plane { normal, distance: v.w }
        }
    }

    /// Signed distance from `p` to the plane, positive on the inner side.
    pub fn distance_to_point(&self, p: Point3<f32>) -> f32 {
        self.normal.x * p.x + self.normal.y * p.y + self.normal.z * p.z + self.distance
    }
}

/// Index of the far plane in [`Frustum::planes`].
pub const FAR_PLANE: usize = 5;

/// Six inward-facing planes bounding what a view can see.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near and far planes.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the planes of a view-projection matrix with a `0..1` clip-space depth.
    pub fn from_view_projection(m: Matrix4<f32>) -> Self {
        let row = |i: usize| Vector4::new(m.x[i], m.y[i], m.z[i], m.w[i]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        Frustum {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// A frustum whose volume is exactly the box `[min, max]`.
    pub fn from_aabb(min: Point3<f32>, max: Point3<f32>) -> Self {
        let plane = |normal: Vector3<f32>, distance: f32| Plane { normal, distance };
        Frustum {
            planes: [
                plane(Vector3::unit_x(), -min.x),
                plane(-Vector3::unit_x(), max.x),
                plane(Vector3::unit_y(), -min.y),
                plane(-Vector3::unit_y(), max.y),
                plane(Vector3::unit_z(), -min.z),
                plane(-Vector3::unit_z(), max.z),
            ],
        }
    }

    /// Whether `p` lies inside or on the frustum.
    pub fn contains_point(&self, p: Point3<f32>) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(p) >= 0.0)
    }

    /// Whether the box `[min, max]` may intersect the frustum.
    ///
    /// Tests the box corner furthest along each plane normal. Boxes that are visible always
    /// pass. A few boxes just outside a frustum corner pass as well. A box that only
    /// touches the far plane is outside.
    pub fn intersects_aabb(&self, min: Point3<f32>, max: Point3<f32>) -> bool {
        self.planes.iter().enumerate().all(|(i, plane)| {
            let n = plane.normal;
            let positive = Point3::new(
                if n.x >= 0.0 { max.x } else { min.x },
                if n.y >= 0.0 { max.y } else { min.y },
                if n.z >= 0.0 { max.z } else { min.z },
            );
            let distance = plane.distance_to_point(positive);
            if i == FAR_PLANE {
                distance > 0.0
            } else {
                distance >= 0.0
            }
        })
    }
}
