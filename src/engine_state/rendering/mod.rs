//! Rendering side of the chunk streamer.
//!
//! The streamer does not talk to a graphics API directly. It hands finished meshes to a
//! [`GpuBackend`], draws them through it and disposes them when chunks are evicted. This
//! module holds that seam, the per-frame [`RenderStats`], the mesher and the cull tree.

use std::collections::HashMap;
use std::ops::{Add, AddAssign};

use cgmath::Matrix4;

pub mod culling;
pub mod meshing;
pub mod vertex;

pub use culling::{Aabb, CullNode, SpatialCullTree};
pub use vertex::{VoxelColor, VoxelVertex};

/// The graphics API as seen by the streamer.
///
/// Every method is called on the thread that owns the coordinator.
pub trait GpuBackend {
    /// A GPU-resident mesh.
    type Handle;

    /// Uploads a mesh. `colors` runs parallel to `vertices`. Without `indices` the
    /// vertices form a plain triangle list.
    fn upload_mesh(
        &mut self,
        vertices: &[VoxelVertex],
        colors: &[VoxelColor],
        indices: Option<&[u32]>,
    ) -> Self::Handle;

    /// Draws a mesh with a model transform.
    fn draw(&mut self, handle: &Self::Handle, transform: Matrix4<f32>);

    /// Frees a mesh.
    fn dispose(&mut self, handle: Self::Handle);
}

/// Counters for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Meshes drawn
    pub draw_count: u64,
    /// Non-empty voxels in the drawn chunks
    pub voxel_count: u64,
    /// Sampled cells with at least one visible face
    pub rendered_voxel_count: u64,
    /// Triangles drawn
    pub triangle_count: u64,
}

impl Add for RenderStats {
    type Output = RenderStats;

    fn add(self, rhs: RenderStats) -> RenderStats {
        RenderStats {
            draw_count: self.draw_count + rhs.draw_count,
            voxel_count: self.voxel_count + rhs.voxel_count,
            rendered_voxel_count: self.rendered_voxel_count + rhs.rendered_voxel_count,
            triangle_count: self.triangle_count + rhs.triangle_count,
        }
    }
}

impl AddAssign for RenderStats {
    fn add_assign(&mut self, rhs: RenderStats) {
        *self = *self + rhs;
    }
}

/// Sizes of one mesh held by a [`RecordingBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedMesh {
    /// Vertices uploaded
    pub vertex_count: usize,
    /// Indices uploaded
    pub index_count: usize,
}

/// A backend that keeps no GPU state and only counts what it is asked to do.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_handle: u64,
    live: HashMap<u64, RecordedMesh>,
    /// Meshes uploaded so far
    pub uploads: u64,
    /// Draw calls so far
    pub draws: u64,
    /// Meshes disposed so far
    pub disposals: u64,
    /// Bytes of vertex, colour and index data uploaded so far
    pub bytes_uploaded: u64,
}

impl RecordingBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Meshes uploaded and not yet disposed.
    pub fn live_meshes(&self) -> usize {
        self.live.len()
    }

    /// The mesh behind a handle, if it is still live.
    pub fn mesh(&self, handle: u64) -> Option<RecordedMesh> {
        self.live.get(&handle).copied()
    }
}

impl GpuBackend for RecordingBackend {
    type Handle = u64;

    fn upload_mesh(&mut self, vertices: &[VoxelVertex], colors: &[VoxelColor], indices: Option<&[u32]>) -> u64 {
        let indices = indices.unwrap_or_default();
        let bytes = bytemuck::cast_slice::<VoxelVertex, u8>(vertices).len()
            + bytemuck::cast_slice::<VoxelColor, u8>(colors).len()
            + bytemuck::cast_slice::<u32, u8>(indices).len();

        self.next_handle += 1;
        self.uploads += 1;
        self.bytes_uploaded += bytes as u64;
        self.live.insert(
            self.next_handle,
            RecordedMesh {
                vertex_count: vertices.len(),
                index_count: indices.len(),
            },
        );
        self.next_handle
    }

    fn draw(&mut self, handle: &u64, _transform: Matrix4<f32>) {
        if self.live.contains_key(handle) {
            self.draws += 1;
        } else {
            log::warn!("Draw of disposed mesh {handle}");
        }
    }

    fn dispose(&mut self, handle: u64) {
        if self.live.remove(&handle).is_some() {
            self.disposals += 1;
        }
    }
}
