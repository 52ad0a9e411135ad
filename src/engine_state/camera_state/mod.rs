//! # Camera State Management
//!
//! This module answers the two questions the chunk streamer asks about a view:
//! - Which region of the world can it see (the frustum)
//! - Where is it (for choosing detail levels)
//!
//! ## Core Components
//! - `Camera`: Represents the camera's position and orientation in 3D space
//! - `Projection`: Manages the camera's projection matrix
//! - `Frustum`: The six planes extracted from the view-projection matrix
//! - `ViewSource`: What the streamer needs from any view

use cgmath::{Matrix4, Point3};

pub mod camera;
pub mod frustum;

pub use camera::{Camera, Projection};
pub use frustum::{Frustum, Plane};

/// A view the chunk streamer can follow.
pub trait ViewSource {
    /// Planes bounding the visible region, in voxel space.
    fn frustum(&self) -> Frustum;

    /// Eye position in voxel space.
    fn position(&self) -> Point3<f32>;
}

/// A perspective camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// The current camera position and orientation
    pub camera: Camera,
    /// Perspective settings
    pub projection: Projection,
}

impl CameraState {
    /// Creates a camera state.
    pub fn new(camera: Camera, projection: Projection) -> Self {
        CameraState { camera, projection }
    }

    /// Combined view and projection matrix.
    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection.calc_matrix() * self.camera.calc_matrix()
    }
}

impl ViewSource for CameraState {
    fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(self.view_projection())
    }

    fn position(&self) -> Point3<f32> {
        self.camera.position
    }
}

/// A view with an explicit frustum, such as a whole-world box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedView {
    /// Visible region
    pub frustum: Frustum,
    /// Eye position
    pub position: Point3<f32>,
}

impl FixedView {
    /// A view that sees the box `[min, max]` from `position`.
    pub fn of_box(min: Point3<f32>, max: Point3<f32>, position: Point3<f32>) -> Self {
        FixedView {
            frustum: Frustum::from_aabb(min, max),
            position,
        }
    }
}

impl ViewSource for FixedView {
    fn frustum(&self) -> Frustum {
        self.frustum
    }

    fn position(&self) -> Point3<f32> {
        self.position
    }
}
