//! Reusable CPU-side buffers for one chunk mesh.

use crate::engine_state::rendering::vertex::{VoxelColor, VoxelVertex};

use super::face::Face;

/// Growable vertex, colour and index buffers.
///
/// Builders are recycled through the [`MeshBuilderPool`](super::mesh_builder_pool::MeshBuilderPool),
/// so `start_new_mesh` keeps the allocations and only resets the lengths.
#[derive(Debug, Default)]
pub struct MeshBuilder {
    vertices: Vec<VoxelVertex>,
    colors: Vec<VoxelColor>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    /// Creates a builder with room for `vertex_capacity` vertices.
    pub fn with_capacity(vertex_capacity: usize) -> Self {
        MeshBuilder {
            vertices: Vec::with_capacity(vertex_capacity),
            colors: Vec::with_capacity(vertex_capacity),
            indices: Vec::with_capacity(vertex_capacity / 4 * 6),
        }
    }

    /// Clears the buffers for a new mesh.
    pub fn start_new_mesh(&mut self) {
        self.vertices.clear();
        self.colors.clear();
        self.indices.clear();
    }

    /// Appends a vertex.
    ///
    /// # Returns
    /// The index of the new vertex.
    pub fn add_vertex(&mut self, vertex: VoxelVertex, color: VoxelColor) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(vertex);
        self.colors.push(color);
        index
    }

    /// Appends an index.
    pub fn add_index(&mut self, index: u32) {
        self.indices.push(index);
    }

    /// Appends a face as four vertices of one colour and two triangles.
    pub fn add_face(&mut self, face: &Face, color: VoxelColor) {
        let base = self.vertices.len() as u32;
        for corner in face.corners() {
            self.add_vertex(VoxelVertex::new(corner), color);
        }
        for index in Face::indices(base) {
            self.add_index(index);
        }
    }

    /// Vertex positions added since the last `start_new_mesh`.
    pub fn vertices(&self) -> &[VoxelVertex] {
        &self.vertices
    }

    /// Vertex colours, parallel to `vertices`.
    pub fn colors(&self) -> &[VoxelColor] {
        &self.colors
    }

    /// Triangle indices into `vertices`.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of complete triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
