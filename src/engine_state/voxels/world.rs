//! # World Module
//!
//! The [`WorldGrid`] is a dense 3D array of block indices plus the block table they refer
//! to. It is created once per loaded world and shared immutably (`Arc<WorldGrid>`) by the
//! meshing workers, the lighting provider and the coordinator.
//!
//! ## Architecture
//!
//! - Blocks are stored as `u16` indices with X varying fastest, then Y, then Z.
//! - Voxel reads resolve the block first, then the voxel inside the block.
//! - Two bit tables drive line-of-sight queries:
//!   - `empty_for_lighting[block_index * BLOCK_VOXEL_COUNT + voxel]` is set when that voxel
//!     never blocks light (empty block, empty voxel or transparent block).
//!   - `light_passthrough[block_index]` is set when light crosses the whole block.
//!
//!   Both tables are per block *type*, so editing the grid never invalidates them.
//!
//! ## Performance Considerations
//!
//! `get` and `get_voxel` are checked and return `OutOfRange`. The hot paths in meshing and
//! line-of-sight use crate-private unchecked accessors after their own bounds checks.

use bitvec::prelude::*;
use cgmath::{Point3, Vector3};

use crate::core::{Result, StreamError};
use crate::engine_state::voxels::block::block_table::{BlockIndex, BlockTable, EMPTY_BLOCK};
use crate::engine_state::voxels::block::{
    voxel_offset, Voxel, BLOCK_VOXEL_COUNT, BLOCK_VOXEL_SHIFT, BLOCK_VOXEL_SIZE, EMPTY_VOXEL,
};
use crate::engine_state::voxels::chunk::CHUNK_BLOCK_SIZE;

const BLOCK_VOXEL_MASK: i32 = BLOCK_VOXEL_SIZE as i32 - 1;

/// A fixed-size grid of blocks.
pub struct WorldGrid {
    /// Size of the grid in blocks
    size: Vector3<usize>,
    /// Block indices, `size.x * size.y * size.z` entries
    blocks: Vec<BlockIndex>,
    /// Block definitions referenced by `blocks`
    table: BlockTable,
    /// One bit per voxel of every block type
    empty_for_lighting: BitVec,
    /// One bit per block type
    light_passthrough: BitVec,
}

impl WorldGrid {
    /// Creates an empty grid.
    ///
    /// # Arguments
    /// * `size` - Grid extents in blocks
    /// * `table` - Block types the grid may reference
    pub fn new(size: Vector3<usize>, table: BlockTable) -> Self {
        let type_count = table.block_count();
        let mut empty_for_lighting = bitvec![0; type_count * BLOCK_VOXEL_COUNT];
        let mut light_passthrough = bitvec![0; type_count];

        for (index, block) in table.iter() {
            let components = block.components();
            light_passthrough.set(index as usize, index == EMPTY_BLOCK || components.light_passthrough);

            let offset = index as usize * BLOCK_VOXEL_COUNT;
            for (i, &voxel) in block.voxels().iter().enumerate() {
                let empty = index == EMPTY_BLOCK || voxel == EMPTY_VOXEL || components.transparent;
                empty_for_lighting.set(offset + i, empty);
            }
        }

        log::info!(
            "Created world grid of {}x{}x{} blocks with {} block types",
            size.x,
            size.y,
            size.z,
            type_count
        );

        WorldGrid {
            size,
            blocks: vec![EMPTY_BLOCK; size.x * size.y * size.z],
            table,
            empty_for_lighting,
            light_passthrough,
        }
    }

    /// Extents in blocks.
    pub fn block_size(&self) -> Vector3<usize> {
        self.size
    }

    /// Extents in voxels.
    pub fn voxel_size(&self) -> Vector3<usize> {
        self.size * BLOCK_VOXEL_SIZE
    }

    /// Number of chunks along each axis. Partial chunks at the far edges count.
    pub fn chunk_counts(&self) -> Vector3<usize> {
        Vector3::new(
            self.size.x.div_ceil(CHUNK_BLOCK_SIZE),
            self.size.y.div_ceil(CHUNK_BLOCK_SIZE),
            self.size.z.div_ceil(CHUNK_BLOCK_SIZE),
        )
    }

    /// The block types this grid references.
    pub fn block_table(&self) -> &BlockTable {
        &self.table
    }

    /// Places a block.
    pub fn set(&mut self, bx: i32, by: i32, bz: i32, index: BlockIndex) -> Result<()> {
        if self.table.get(index).is_none() {
            return Err(StreamError::UnknownBlock(format!("#{index}")));
        }
        let offset = self.checked_block_offset(bx, by, bz)?;
        self.blocks[offset] = index;
        Ok(())
    }

    /// Places a block at every position inside `[min, max)`, clipped to the grid.
    pub fn fill(&mut self, min: Point3<usize>, max: Point3<usize>, index: BlockIndex) -> Result<()> {
        if self.table.get(index).is_none() {
            return Err(StreamError::UnknownBlock(format!("#{index}")));
        }
        for bz in min.z..max.z.min(self.size.z) {
            for by in min.y..max.y.min(self.size.y) {
                for bx in min.x..max.x.min(self.size.x) {
                    let offset = self.block_offset(bx, by, bz);
                    self.blocks[offset] = index;
                }
            }
        }
        Ok(())
    }

    /// Reads the block index at a block coordinate.
    pub fn get(&self, bx: i32, by: i32, bz: i32) -> Result<BlockIndex> {
        let offset = self.checked_block_offset(bx, by, bz)?;
        Ok(self.blocks[offset])
    }

    /// Reads the voxel at an absolute voxel coordinate.
    pub fn get_voxel(&self, vx: i32, vy: i32, vz: i32) -> Result<Voxel> {
        if !self.contains_voxel(vx, vy, vz) {
            let size = self.voxel_size();
            return Err(StreamError::out_of_range(
                vx as i64,
                vy as i64,
                vz as i64,
                [size.x, size.y, size.z],
            ));
        }
        Ok(self.voxel_unchecked(vx as usize, vy as usize, vz as usize))
    }

    /// Whether a voxel coordinate lies inside the grid.
    #[inline]
    pub fn contains_voxel(&self, vx: i32, vy: i32, vz: i32) -> bool {
        let size = self.voxel_size();
        vx >= 0
            && vy >= 0
            && vz >= 0
            && (vx as usize) < size.x
            && (vy as usize) < size.y
            && (vz as usize) < size.z
    }

    /// Voxel read without a bounds check beyond the slice index.
    #[inline]
    pub(crate) fn voxel_unchecked(&self, vx: usize, vy: usize, vz: usize) -> Voxel {
        let shift = BLOCK_VOXEL_SHIFT;
        let index = self.blocks[self.block_offset(vx >> shift, vy >> shift, vz >> shift)];
        let mask = BLOCK_VOXEL_SIZE - 1;
        match self.table.get(index) {
            Some(block) => block.get(vx & mask, vy & mask, vz & mask),
            None => EMPTY_VOXEL,
        }
    }

    /// Block index read without a bounds check beyond the slice index.
    #[inline]
    pub(crate) fn block_unchecked(&self, bx: usize, by: usize, bz: usize) -> BlockIndex {
        self.blocks[self.block_offset(bx, by, bz)]
    }

    /// Whether nothing between two voxels blocks light.
    ///
    /// Walks the voxels crossed by the segment with an Amanatides-Woo style traversal.
    /// The start voxel is not tested and reaching the end voxel counts as clear.
    /// Both endpoints must lie inside the grid.
    pub fn line_of_sight_clear(&self, x0: i32, y0: i32, z0: i32, x1: i32, y1: i32, z1: i32) -> bool {
        debug_assert!(self.contains_voxel(x0, y0, z0) && self.contains_voxel(x1, y1, z1));
        let end = Point3::new(x1, y1, z1);
        walk_line(Point3::new(x0, y0, z0), end, |p| p == end || !self.occludes(p.x, p.y, p.z))
    }

    /// Integer-only variant of [`WorldGrid::line_of_sight_clear`] based on 3D Bresenham.
    ///
    /// Visits one voxel per step of the dominant axis, so it may skip voxels the exact
    /// traversal would touch. Same endpoint rules.
    pub fn line_of_sight_clear_fast(&self, x0: i32, y0: i32, z0: i32, x1: i32, y1: i32, z1: i32) -> bool {
        debug_assert!(self.contains_voxel(x0, y0, z0) && self.contains_voxel(x1, y1, z1));
        let (mut x, mut y, mut z) = (x0, y0, z0);
        if (x, y, z) == (x1, y1, z1) {
            return true;
        }

        let (dx, dy, dz) = (x1 - x, y1 - y, z1 - z);
        let (ax, ay, az) = (dx.abs() << 1, dy.abs() << 1, dz.abs() << 1);
        let (sx, sy, sz) = (dx.signum(), dy.signum(), dz.signum());

        if ax >= ay.max(az) {
            let mut yd = ay - (ax >> 1);
            let mut zd = az - (ax >> 1);
            loop {
                if yd >= 0 {
                    y += sy;
                    yd -= ax;
                }
                if zd >= 0 {
                    z += sz;
                    zd -= ax;
                }
                x += sx;
                yd += ay;
                zd += az;
                if x == x1 {
                    return true;
                }
                if self.occludes(x, y, z) {
                    return false;
                }
            }
        } else if ay >= ax.max(az) {
            let mut xd = ax - (ay >> 1);
            let mut zd = az - (ay >> 1);
            loop {
                if xd >= 0 {
                    x += sx;
                    xd -= ay;
                }
                if zd >= 0 {
                    z += sz;
                    zd -= ay;
                }
                y += sy;
                xd += ax;
                zd += az;
                if y == y1 {
                    return true;
                }
                if self.occludes(x, y, z) {
                    return false;
                }
            }
        } else {
            let mut xd = ax - (az >> 1);
            let mut yd = ay - (az >> 1);
            loop {
                if xd >= 0 {
                    x += sx;
                    xd -= az;
                }
                if yd >= 0 {
                    y += sy;
                    yd -= az;
                }
                z += sz;
                xd += ax;
                yd += ay;
                if z == z1 {
                    return true;
                }
                if self.occludes(x, y, z) {
                    return false;
                }
            }
        }
    }

    /// Whether the voxel at an in-range coordinate blocks light.
    #[inline]
    fn occludes(&self, x: i32, y: i32, z: i32) -> bool {
        let shift = BLOCK_VOXEL_SHIFT as i32;
        let index = self.block_unchecked((x >> shift) as usize, (y >> shift) as usize, (z >> shift) as usize);
        if self.light_passthrough[index as usize] {
            return false;
        }
        let voxel = voxel_offset(
            (x & BLOCK_VOXEL_MASK) as usize,
            (y & BLOCK_VOXEL_MASK) as usize,
            (z & BLOCK_VOXEL_MASK) as usize,
        );
        !self.empty_for_lighting[index as usize * BLOCK_VOXEL_COUNT + voxel]
    }

    #[inline]
    fn block_offset(&self, bx: usize, by: usize, bz: usize) -> usize {
        bx + self.size.x * (by + self.size.y * bz)
    }

    fn checked_block_offset(&self, bx: i32, by: i32, bz: i32) -> Result<usize> {
        let in_range = bx >= 0
            && by >= 0
            && bz >= 0
            && (bx as usize) < self.size.x
            && (by as usize) < self.size.y
            && (bz as usize) < self.size.z;
        if !in_range {
            return Err(StreamError::out_of_range(
                bx as i64,
                by as i64,
                bz as i64,
                [self.size.x, self.size.y, self.size.z],
            ));
        }
        Ok(self.block_offset(bx as usize, by as usize, bz as usize))
    }
}

/// Visits every voxel after `from` that the segment to `to` crosses, ending with `to`.
///
/// Consecutive voxels share a face and none is visited twice.
///
/// # Returns
/// `false` as soon as `visit` does, `true` once `to` was visited.
fn walk_line(from: Point3<i32>, to: Point3<i32>, mut visit: impl FnMut(Point3<i32>) -> bool) -> bool {
    let mut p = from;
    if p == to {
        return true;
    }

    let step_x = if p.x > to.x { -1 } else { 1 };
    let step_y = if p.y > to.y { -1 } else { 1 };
    let step_z = if p.z > to.z { -1 } else { 1 };

    // A zero delta divides to +inf, so that axis is never chosen.
    let t_step_x = step_x as f32 / (to.x - p.x) as f32;
    let t_step_y = step_y as f32 / (to.y - p.y) as f32;
    let t_step_z = step_z as f32 / (to.z - p.z) as f32;
    let (mut t_max_x, mut t_max_y, mut t_max_z) = (t_step_x, t_step_y, t_step_z);

    // Each step moves one axis one voxel closer, which bounds the walk.
    let steps = (to.x - p.x).abs() + (to.y - p.y).abs() + (to.z - p.z).abs();
    for _ in 0..steps {
        if t_max_x < t_max_y {
            if t_max_x < t_max_z {
                p.x += step_x;
                t_max_x += t_step_x;
            } else {
                p.z += step_z;
                t_max_z += t_step_z;
            }
        } else if t_max_y < t_max_z {
            p.y += step_y;
            t_max_y += t_step_y;
        } else {
            p.z += step_z;
            t_max_z += t_step_z;
        }

        if !visit(p) {
            return false;
        }
        if p == to {
            return true;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::{voxel_rgba, BlockComponents, VoxelBlock};

    const STONE: Voxel = voxel_rgba(100, 100, 100, 255);

    fn table_with(blocks: Vec<VoxelBlock>) -> BlockTable {
        let mut table = BlockTable::new();
        for block in blocks {
            table.add(block).unwrap();
        }
        table
    }

    fn stone_world(size: usize) -> WorldGrid {
        let table = table_with(vec![VoxelBlock::filled("stone", STONE)]);
        WorldGrid::new(Vector3::new(size, size, size), table)
    }

    #[test]
    fn sizes_and_chunk_counts() {
        let table = BlockTable::new();
        let world = WorldGrid::new(Vector3::new(9, 4, 1), table);
        assert_eq!(world.voxel_size(), Vector3::new(144, 64, 16));
        assert_eq!(world.chunk_counts(), Vector3::new(3, 1, 1));
    }

    #[test]
    fn checked_accessors_fail_fast() {
        let mut world = stone_world(2);
        assert!(matches!(world.get(2, 0, 0), Err(StreamError::OutOfRange { .. })));
        assert!(matches!(world.get(0, -1, 0), Err(StreamError::OutOfRange { .. })));
        assert!(matches!(world.get_voxel(0, 0, 32), Err(StreamError::OutOfRange { .. })));
        assert!(matches!(world.set(0, 0, 0, 9), Err(StreamError::UnknownBlock(_))));
        assert!(world.set(1, 1, 1, 1).is_ok());
        assert_eq!(world.get(1, 1, 1).unwrap(), 1);
    }

    #[test]
    fn voxel_reads_resolve_block_then_voxel() {
        let marker = voxel_rgba(1, 2, 3, 4);
        let block = VoxelBlock::from_fn("marked", |x, y, z| if (x, y, z) == (3, 4, 5) { marker } else { 0 });
        let mut world = WorldGrid::new(Vector3::new(2, 2, 2), table_with(vec![block]));
        world.set(1, 0, 1, 1).unwrap();

        assert_eq!(world.get_voxel(16 + 3, 4, 16 + 5).unwrap(), marker);
        assert_eq!(world.get_voxel(3, 4, 5).unwrap(), EMPTY_VOXEL);
        assert_eq!(world.get_voxel(16 + 3, 5, 16 + 5).unwrap(), EMPTY_VOXEL);
    }

    #[test]
    fn fill_clips_to_grid() {
        let mut world = stone_world(3);
        world.fill(Point3::new(1, 1, 1), Point3::new(10, 10, 10), 1).unwrap();
        assert_eq!(world.get(0, 0, 0).unwrap(), EMPTY_BLOCK);
        assert_eq!(world.get(2, 2, 2).unwrap(), 1);
    }

    #[test]
    fn line_of_sight_in_empty_world_is_clear() {
        let world = stone_world(4);
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..200 {
            let a = (rng.i32(0..64), rng.i32(0..64), rng.i32(0..64));
            let b = (rng.i32(0..64), rng.i32(0..64), rng.i32(0..64));
            assert!(world.line_of_sight_clear(a.0, a.1, a.2, b.0, b.1, b.2));
            assert!(world.line_of_sight_clear_fast(a.0, a.1, a.2, b.0, b.1, b.2));
        }
    }

    #[test]
    fn line_of_sight_blocked_by_solid_block() {
        let mut world = stone_world(3);
        world.set(1, 0, 0, 1).unwrap();

        assert!(!world.line_of_sight_clear(2, 8, 8, 40, 8, 8));
        assert!(!world.line_of_sight_clear_fast(2, 8, 8, 40, 8, 8));
        // Passing beside the block.
        assert!(world.line_of_sight_clear(2, 20, 8, 40, 20, 8));
    }

    #[test]
    fn endpoints_are_not_tested() {
        let mut world = stone_world(3);
        world.fill(Point3::new(0, 0, 0), Point3::new(3, 3, 3), 1).unwrap();

        // Adjacent voxels inside solid stone: the only voxel stepped into is the end.
        assert!(world.line_of_sight_clear(5, 5, 5, 6, 5, 5));
        assert!(world.line_of_sight_clear(5, 5, 5, 5, 5, 5));
        assert!(!world.line_of_sight_clear(5, 5, 5, 7, 5, 5));
    }

    #[test]
    fn transparent_and_passthrough_blocks_let_light_through() {
        let glass = VoxelBlock::filled("glass", STONE).with_components(BlockComponents {
            transparent: true,
            ..Default::default()
        });
        let grate = VoxelBlock::filled("grate", STONE).with_components(BlockComponents {
            light_passthrough: true,
            ..Default::default()
        });
        let mut world = WorldGrid::new(Vector3::new(4, 1, 1), table_with(vec![glass, grate]));
        world.set(1, 0, 0, 1).unwrap();
        world.set(2, 0, 0, 2).unwrap();

        assert!(world.line_of_sight_clear(0, 8, 8, 63, 8, 8));
        assert!(world.line_of_sight_clear_fast(0, 8, 8, 63, 8, 8));
    }

    #[test]
    fn diagonal_walk_is_symmetric_for_clear_paths() {
        let mut world = stone_world(4);
        world.set(3, 3, 3, 1).unwrap();
        assert!(world.line_of_sight_clear(0, 0, 0, 40, 30, 20));
        assert!(world.line_of_sight_clear(40, 30, 20, 0, 0, 0));
        assert!(!world.line_of_sight_clear(0, 0, 0, 63, 63, 63));
    }

    fn walked(from: (i32, i32, i32), to: (i32, i32, i32)) -> Vec<(i32, i32, i32)> {
        let mut visited = Vec::new();
        let reached = walk_line(Point3::new(from.0, from.1, from.2), Point3::new(to.0, to.1, to.2), |p| {
            visited.push((p.x, p.y, p.z));
            true
        });
        assert!(reached);
        visited
    }

    #[test]
    fn walk_visits_each_crossed_voxel_once() {
        assert_eq!(
            walked((0, 0, 0), (4, 2, 0)),
            vec![(1, 0, 0), (1, 1, 0), (2, 1, 0), (3, 1, 0), (3, 2, 0), (4, 2, 0)]
        );
        assert_eq!(
            walked((0, 0, 0), (2, 2, 2)),
            vec![(0, 0, 1), (0, 1, 1), (1, 1, 1), (1, 1, 2), (1, 2, 2), (2, 2, 2)]
        );
        assert_eq!(walked((3, 1, 0), (0, 1, 0)), vec![(2, 1, 0), (1, 1, 0), (0, 1, 0)]);
        assert!(walked((5, 5, 5), (5, 5, 5)).is_empty());
    }

    #[test]
    fn single_voxel_blocks_only_lines_through_it() {
        let speck = VoxelBlock::from_fn("speck", |x, y, z| if (x, y, z) == (2, 1, 0) { STONE } else { EMPTY_VOXEL });
        let mut world = WorldGrid::new(Vector3::new(1, 1, 1), table_with(vec![speck]));
        world.set(0, 0, 0, 1).unwrap();

        assert!(!world.line_of_sight_clear(0, 0, 0, 4, 2, 0));
        assert!(!world.line_of_sight_clear(4, 2, 0, 0, 0, 0));
        assert!(world.line_of_sight_clear(0, 0, 0, 4, 0, 0));
        assert!(world.line_of_sight_clear(0, 2, 0, 4, 2, 0));
        // the occluder itself as an endpoint does not block
        assert!(world.line_of_sight_clear(0, 1, 0, 2, 1, 0));
    }
}
