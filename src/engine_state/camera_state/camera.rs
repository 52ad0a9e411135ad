//! The streaming camera.
//!
//! A yaw/pitch camera and a perspective projection whose clip space uses a `0..1` depth
//! range, so `Frustum::from_view_projection` reads the near plane straight from the
//! third matrix row.

use std::f32::consts::FRAC_PI_2;

use cgmath::{perspective, InnerSpace, Matrix4, Point3, Rad, Vector3};

/// Remaps OpenGL clip depth `-1..1` onto `0..1`.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Largest pitch magnitude, just short of looking straight up or down.
const MAX_PITCH: f32 = FRAC_PI_2 - 0.0001;

/// A free-look camera in voxel space.
///
/// Yaw turns about +Y and starts out looking along +X. Pitch tilts towards +Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Eye position in voxel units
    pub position: Point3<f32>,
    /// Heading
    pub yaw: Rad<f32>,
    /// Elevation, kept within `MAX_PITCH`
    pub pitch: Rad<f32>,
}

impl Camera {
    /// Places a camera. `pitch` is clamped.
    pub fn new<V, Y, P>(position: V, yaw: Y, pitch: P) -> Self
    where
        V: Into<Point3<f32>>,
        Y: Into<Rad<f32>>,
        P: Into<Rad<f32>>,
    {
        let mut camera = Camera {
            position: position.into(),
            yaw: yaw.into(),
            pitch: Rad(0.0),
        };
        camera.rotate(Rad(0.0), pitch.into());
        camera
    }

    /// Unit vector the camera looks along.
    pub fn forward(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        Vector3::new(cos_yaw * cos_pitch, sin_pitch, sin_yaw * cos_pitch).normalize()
    }

    /// Adds to yaw and pitch.
    pub fn rotate<Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(&mut self, yaw: Y, pitch: P) {
        self.yaw += yaw.into();
        let pitch = self.pitch.0 + pitch.into().0;
        self.pitch = Rad(pitch.clamp(-MAX_PITCH, MAX_PITCH));
    }

    /// World to view transform.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.forward(), Vector3::unit_y())
    }
}

/// Perspective settings of a view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    /// Creates a projection for a `width` x `height` viewport with vertical field of view
    /// `fovy` and clip distances `znear..zfar`.
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        let mut projection = Projection {
            aspect: 1.0,
            fovy: fovy.into(),
            znear,
            zfar,
        };
        projection.resize(width, height);
        projection
    }

    /// Follows a viewport size change.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    /// Far clipping plane distance. Nothing beyond it is streamed.
    pub fn zfar(&self) -> f32 {
        self.zfar
    }

    /// View to clip transform with `0..1` depth.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}
