//! Vertex data structures for chunk meshes.
//!
//! Positions and colours travel in separate streams so a backend can upload them to
//! separate buffers. Both are plain-old-data and can be handed to a GPU API with
//! `bytemuck::cast_slice`.

use cgmath::Point3;

use crate::engine_state::voxels::block::{voxel_channels, Voxel};

/// A chunk-local vertex position.
///
/// # Memory Layout
/// - Position: 3x u8 (3 bytes)
///
/// Coordinates range over `0..=CHUNK_VOXEL_SIZE`, the chunk's translation supplies the rest.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VoxelVertex {
    /// X coordinate in chunk space
    pub x: u8,
    /// Y coordinate in chunk space
    pub y: u8,
    /// Z coordinate in chunk space
    pub z: u8,
}

impl VoxelVertex {
    /// Creates a vertex from a chunk-local position.
    pub fn new(pos: Point3<u8>) -> Self {
        VoxelVertex {
            x: pos.x,
            y: pos.y,
            z: pos.z,
        }
    }

    /// The position as a point.
    pub fn position(&self) -> Point3<u8> {
        Point3::new(self.x, self.y, self.z)
    }
}

/// A per-vertex RGBA colour.
///
/// # Memory Layout
/// - Colour: 4x u8 (4 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VoxelColor {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel
    pub a: u8,
}

impl VoxelColor {
    /// Unpacks a voxel colour.
    pub fn from_voxel(voxel: Voxel) -> Self {
        let [r, g, b, a] = voxel_channels(voxel);
        VoxelColor { r, g, b, a }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::voxel_rgba;

    #[test]
    fn streams_are_tightly_packed() {
        assert_eq!(std::mem::size_of::<VoxelVertex>(), 3);
        assert_eq!(std::mem::size_of::<VoxelColor>(), 4);

        let colors = [VoxelColor::from_voxel(voxel_rgba(1, 2, 3, 4)); 2];
        assert_eq!(bytemuck::cast_slice::<VoxelColor, u8>(&colors), &[1, 2, 3, 4, 1, 2, 3, 4]);
    }
}
