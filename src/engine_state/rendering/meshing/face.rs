use cgmath::Point3;

use crate::engine_state::voxels::block::block_side::BlockSide;

/// One square face of a sampled voxel cell.
///
/// A face is defined by four corner points (lower-left, lower-right, upper-left,
/// upper-right) in chunk-local voxel coordinates. The corners are ordered so that the
/// triangles from [`Face::indices`] wind counter-clockwise when seen from outside the cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Lower-left corner of the face in chunk coordinates
    pub ll: Point3<u8>,
    /// Lower-right corner of the face in chunk coordinates
    pub lr: Point3<u8>,
    /// Upper-left corner of the face in chunk coordinates
    pub ul: Point3<u8>,
    /// Upper-right corner of the face in chunk coordinates
    pub ur: Point3<u8>,
    /// Which side of the cell this face represents
    pub block_side: BlockSide,
}

impl Face {
    /// Creates a face of a cell.
    ///
    /// # Arguments
    /// * `i`, `j`, `k` - Chunk-local minimum corner of the cell
    /// * `size` - Edge length of the cell in voxels
    /// * `block_side` - Which side of the cell this face represents
    pub fn new(i: u8, j: u8, k: u8, size: u8, block_side: BlockSide) -> Self {
        let (x0, y0, z0) = (i, j, k);
        let (x1, y1, z1) = (i + size, j + size, k + size);
        let p = Point3::new;
        let (ll, lr, ul, ur) = match block_side {
            BlockSide::FRONT => (p(x0, y0, z1), p(x1, y0, z1), p(x0, y1, z1), p(x1, y1, z1)),
            BlockSide::BACK => (p(x1, y0, z0), p(x0, y0, z0), p(x1, y1, z0), p(x0, y1, z0)),
            BlockSide::BOTTOM => (p(x0, y0, z0), p(x1, y0, z0), p(x0, y0, z1), p(x1, y0, z1)),
            BlockSide::TOP => (p(x0, y1, z1), p(x1, y1, z1), p(x0, y1, z0), p(x1, y1, z0)),
            BlockSide::LEFT => (p(x0, y0, z0), p(x0, y0, z1), p(x0, y1, z0), p(x0, y1, z1)),
            BlockSide::RIGHT => (p(x1, y0, z1), p(x1, y0, z0), p(x1, y1, z1), p(x1, y1, z0)),
        };
        Face {
            ll,
            lr,
            ul,
            ur,
            block_side,
        }
    }

    /// Corners in vertex order.
    pub fn corners(&self) -> [Point3<u8>; 4] {
        [self.ll, self.lr, self.ul, self.ur]
    }

    /// Indices of the face's two triangles, given the index of its first vertex.
    ///
    /// # Returns
    /// `[ll, lr, ur, ll, ur, ul]` offset by `base`.
    pub fn indices(base: u32) -> [u32; 6] {
        [base, base + 1, base + 3, base, base + 3, base + 2]
    }
}
