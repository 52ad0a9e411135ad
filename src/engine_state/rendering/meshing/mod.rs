//! Mesh generation for chunks.
//!
//! Turns the voxels of one chunk into coloured quads at a chosen detail level.
//!
//! # Architecture
//! - `ChunkMesher`: walks a chunk's blocks and emits visible faces
//! - `MeshBuilder`: reusable vertex, colour and index buffers
//! - `MeshBuilderPool`: the fixed set of builders shared by the meshing workers
//! - `Face`: corner layout and triangle indices of one voxel face
//!
//! # Detail Levels
//! At level `L` the mesher samples cells of `1 << L` voxels per axis. A cell's colour is
//! the mean RGB of its non-empty voxels with their maximum alpha. Neighbour tests look at
//! the voxel one stride away. Faces on the outer boundary of the world are never emitted.
//!
//! # Performance Considerations
//! - Neighbours inside the same block are read straight from the block, only cells on a
//!   block boundary go through the world grid
//! - Blocks are visited back to front, see `ChunkBlockIterator`
//! - Builders are recycled, so steady-state meshing does not allocate

use crate::core::{Result, StreamError};
use crate::engine_state::lighting::{LightColor, LightProvider};
use crate::engine_state::rendering::vertex::VoxelColor;
use crate::engine_state::voxels::block::block_side::{BlockSide, VisibleSides};
use crate::engine_state::voxels::block::block_table::EMPTY_BLOCK;
use crate::engine_state::voxels::block::{
    voxel_channels, voxel_rgba, Voxel, VoxelBlock, BLOCK_VOXEL_SHIFT, BLOCK_VOXEL_SIZE, EMPTY_VOXEL,
};
use crate::engine_state::voxels::chunk::chunk_iteration::ChunkBlockIterator;
use crate::engine_state::voxels::chunk::Chunk;
use crate::engine_state::voxels::world::WorldGrid;
use cgmath::Point3;

pub mod face;
pub mod mesh_builder;
pub mod mesh_builder_pool;

pub use face::Face;
pub use mesh_builder::MeshBuilder;
pub use mesh_builder_pool::{BuilderLease, MeshBuilderPool, PoolStats};

/// Counters describing one chunk mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshCounts {
    /// Non-empty voxels in the chunk's non-empty blocks
    pub voxel_count: u32,
    /// Sampled cells that produced at least one face
    pub rendered_voxel_count: u32,
    /// Triangles written to the builder
    pub triangle_count: u32,
}

/// Builds chunk meshes from a world grid.
pub struct ChunkMesher<'a> {
    world: &'a WorldGrid,
    lighting: &'a dyn LightProvider,
}

impl<'a> ChunkMesher<'a> {
    /// Creates a mesher over a world and a light source.
    pub fn new(world: &'a WorldGrid, lighting: &'a dyn LightProvider) -> Self {
        ChunkMesher { world, lighting }
    }

    /// Meshes a chunk into `builder`, replacing its previous contents.
    pub fn mesh_chunk(&self, chunk: &Chunk, level: u8, builder: &mut MeshBuilder) -> Result<MeshCounts> {
        Ok(self.mesh_chunk_until(chunk, level, builder, || false)?.unwrap_or_default())
    }

    /// Meshes a chunk, checking `cancelled` before every Z slice of blocks.
    ///
    /// # Returns
    /// `None` if the build was cancelled. The builder then holds a partial mesh.
    pub fn mesh_chunk_until(
        &self,
        chunk: &Chunk,
        level: u8,
        builder: &mut MeshBuilder,
        cancelled: impl Fn() -> bool,
    ) -> Result<Option<MeshCounts>> {
        let stride = 1usize << level.min(BLOCK_VOXEL_SHIFT as u8);
        let (min, max) = chunk.block_range(self.world.block_size());
        let origin = chunk.voxel_origin();
        let local_origin = Point3::new(origin.x as usize, origin.y as usize, origin.z as usize);

        builder.start_new_mesh();
        let mut counts = MeshCounts::default();
        let mut slice = None;

        for block_pos in ChunkBlockIterator::new(min, max) {
            if slice != Some(block_pos.z) {
                if cancelled() {
                    return Ok(None);
                }
                slice = Some(block_pos.z);
            }

            let index = self.world.get(block_pos.x as i32, block_pos.y as i32, block_pos.z as i32)?;
            if index == EMPTY_BLOCK {
                continue;
            }
            let block = self
                .world
                .block_table()
                .get(index)
                .ok_or_else(|| StreamError::UnknownBlock(format!("#{index}")))?;

            counts.voxel_count += block.total_voxels();
            let block_origin = block_pos * BLOCK_VOXEL_SIZE;
            self.mesh_block(block, block_origin, local_origin, stride, builder, &mut counts);
        }

        Ok(Some(counts))
    }

    fn mesh_block(
        &self,
        block: &VoxelBlock,
        block_origin: Point3<usize>,
        chunk_origin: Point3<usize>,
        stride: usize,
        builder: &mut MeshBuilder,
        counts: &mut MeshCounts,
    ) {
        let lit = !block.components().unlit;

        for bvz in (0..BLOCK_VOXEL_SIZE).step_by(stride) {
            for bvx in (0..BLOCK_VOXEL_SIZE).step_by(stride) {
                for bvy in (0..BLOCK_VOXEL_SIZE).step_by(stride) {
                    let voxel = if stride == 1 {
                        block.get(bvx, bvy, bvz)
                    } else {
                        lod_color(block, bvx, bvy, bvz, stride)
                    };
                    if voxel == EMPTY_VOXEL {
                        continue;
                    }

                    let cell = Point3::new(bvx, bvy, bvz);
                    let world_pos = Point3::new(block_origin.x + bvx, block_origin.y + bvy, block_origin.z + bvz);
                    let sides = self.visible_sides(block, cell, world_pos, stride);
                    if sides.is_empty() {
                        continue;
                    }
                    counts.rendered_voxel_count += 1;

                    let local = Point3::new(
                        (world_pos.x - chunk_origin.x) as u8,
                        (world_pos.y - chunk_origin.y) as u8,
                        (world_pos.z - chunk_origin.z) as u8,
                    );
                    for side in sides.iter() {
                        let light = if lit {
                            self.lighting
                                .illumination_at(world_pos.x, world_pos.y, world_pos.z, stride, side)
                        } else {
                            LightColor::WHITE
                        };
                        let color = VoxelColor::from_voxel(light.apply(voxel));
                        builder.add_face(&Face::new(local.x, local.y, local.z, stride as u8, side), color);
                        counts.triangle_count += 2;
                    }
                }
            }
        }
    }

    /// Faces of a cell whose neighbour one stride away is empty.
    fn visible_sides(&self, block: &VoxelBlock, cell: Point3<usize>, world_pos: Point3<usize>, stride: usize) -> VisibleSides {
        let mut sides = VisibleSides::default();
        let limit = BLOCK_VOXEL_SIZE as i32;

        for side in BlockSide::all() {
            let step = side.normal() * stride as i32;
            let (nx, ny, nz) = (cell.x as i32 + step.x, cell.y as i32 + step.y, cell.z as i32 + step.z);

            let open = if (0..limit).contains(&nx) && (0..limit).contains(&ny) && (0..limit).contains(&nz) {
                block.get(nx as usize, ny as usize, nz as usize) == EMPTY_VOXEL
            } else {
                let (wx, wy, wz) = (
                    world_pos.x as i32 + step.x,
                    world_pos.y as i32 + step.y,
                    world_pos.z as i32 + step.z,
                );
                self.world.contains_voxel(wx, wy, wz)
                    && self.world.voxel_unchecked(wx as usize, wy as usize, wz as usize) == EMPTY_VOXEL
            };

            if open {
                sides.insert(side);
            }
        }
        sides
    }
}

/// Colour of a `stride`-sized cell: mean RGB and maximum alpha of its non-empty voxels.
///
/// # Returns
/// `EMPTY_VOXEL` when every voxel of the cell is empty.
pub fn lod_color(block: &VoxelBlock, x: usize, y: usize, z: usize, stride: usize) -> Voxel {
    let (mut r, mut g, mut b, mut a, mut count) = (0u32, 0u32, 0u32, 0u8, 0u32);
    for cz in z..z + stride {
        for cy in y..y + stride {
            for cx in x..x + stride {
                let voxel = block.get(cx, cy, cz);
                if voxel == EMPTY_VOXEL {
                    continue;
                }
                let [vr, vg, vb, va] = voxel_channels(voxel);
                r += vr as u32;
                g += vg as u32;
                b += vb as u32;
                a = a.max(va);
                count += 1;
            }
        }
    }

    if count == 0 {
        return EMPTY_VOXEL;
    }
    voxel_rgba((r / count) as u8, (g / count) as u8, (b / count) as u8, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::lighting::FullBright;
    use crate::engine_state::voxels::block::block_table::BlockTable;
    use crate::engine_state::voxels::block::BlockComponents;
    use cgmath::Vector3;

    const STONE: Voxel = voxel_rgba(100, 100, 100, 255);

    /// Stone everywhere except local voxel (0, 0, 0).
    fn notched_block() -> VoxelBlock {
        VoxelBlock::from_fn("notched", |x, y, z| if (x, y, z) == (0, 0, 0) { EMPTY_VOXEL } else { STONE })
    }

    fn world_with(size: usize, block: VoxelBlock, at: &[(i32, i32, i32)]) -> WorldGrid {
        let mut table = BlockTable::new();
        let index = table.add(block).unwrap();
        let mut world = WorldGrid::new(Vector3::new(size, size, size), table);
        for &(x, y, z) in at {
            world.set(x, y, z, index).unwrap();
        }
        world
    }

    fn mesh(world: &WorldGrid, chunk: (i32, i32, i32), level: u8) -> (MeshCounts, MeshBuilder) {
        let mesher = ChunkMesher::new(world, &FullBright);
        let mut builder = MeshBuilder::default();
        let chunk = Chunk::new(Point3::new(chunk.0, chunk.1, chunk.2));
        let counts = mesher.mesh_chunk(&chunk, level, &mut builder).unwrap();
        (counts, builder)
    }

    #[test]
    fn notched_block_counts() {
        let world = world_with(8, notched_block(), &[(1, 1, 1)]);
        let (counts, builder) = mesh(&world, (0, 0, 0), 0);

        assert_eq!(counts.voxel_count, 4095);
        assert_eq!(counts.rendered_voxel_count, 16 * 16 * 16 - 14 * 14 * 14 - 1);
        assert_eq!(counts.triangle_count, 6 * 16 * 16 * 2);
        assert_eq!(builder.vertices().len(), 6 * 16 * 16 * 4);
        assert_eq!(builder.indices().len(), 6 * 16 * 16 * 6);
        assert_eq!(builder.colors().len(), builder.vertices().len());
    }

    #[test]
    fn isolated_voxel_has_six_faces() {
        let speck = VoxelBlock::from_fn("speck", |x, y, z| if (x, y, z) == (5, 6, 7) { STONE } else { EMPTY_VOXEL });
        let world = world_with(4, speck, &[(2, 2, 2)]);
        let (counts, builder) = mesh(&world, (0, 0, 0), 0);

        assert_eq!(counts.voxel_count, 1);
        assert_eq!(counts.rendered_voxel_count, 1);
        assert_eq!(counts.triangle_count, 12);
        assert_eq!(builder.triangle_count(), 12);
    }

    #[test]
    fn enclosed_voxels_count_but_do_not_render() {
        let mut table = BlockTable::new();
        let stone = table.add(VoxelBlock::filled("stone", STONE)).unwrap();
        let mut world = WorldGrid::new(Vector3::new(3, 3, 3), table);
        world.fill(Point3::new(0, 0, 0), Point3::new(3, 3, 3), stone).unwrap();
        let (counts, builder) = mesh(&world, (0, 0, 0), 0);

        assert_eq!(counts.voxel_count, 27 * 4096);
        assert_eq!(counts.rendered_voxel_count, 0);
        assert_eq!(counts.triangle_count, 0);
        assert!(builder.indices().is_empty());
    }

    #[test]
    fn meshing_twice_gives_the_same_counts() {
        let world = world_with(8, notched_block(), &[(1, 1, 1), (2, 1, 1), (1, 3, 2)]);
        for level in 0..=4 {
            let (first, _) = mesh(&world, (0, 0, 0), level);
            let (second, _) = mesh(&world, (0, 0, 0), level);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn faces_on_the_world_boundary_are_skipped() {
        let world = world_with(1, notched_block(), &[(0, 0, 0)]);
        let (counts, _) = mesh(&world, (0, 0, 0), 0);

        // Only the three voxels around the notch face something inside the world.
        assert_eq!(counts.voxel_count, 4095);
        assert_eq!(counts.rendered_voxel_count, 3);
        assert_eq!(counts.triangle_count, 6);
    }

    #[test]
    fn neighbouring_blocks_hide_shared_faces() {
        let stone = VoxelBlock::filled("stone", STONE);
        let alone = world_with(4, stone.clone(), &[(1, 1, 1)]);
        let pair = world_with(4, stone, &[(1, 1, 1), (2, 1, 1)]);

        let (single, _) = mesh(&alone, (0, 0, 0), 0);
        let (double, _) = mesh(&pair, (0, 0, 0), 0);
        assert_eq!(single.triangle_count, 6 * 256 * 2);
        assert_eq!(double.triangle_count, 2 * single.triangle_count - 2 * 256 * 2);
    }

    #[test]
    fn coarser_levels_emit_fewer_larger_faces() {
        let world = world_with(4, VoxelBlock::filled("stone", STONE), &[(1, 1, 1)]);
        let (fine, _) = mesh(&world, (0, 0, 0), 0);
        let (coarse, builder) = mesh(&world, (0, 0, 0), 1);

        assert_eq!(coarse.voxel_count, fine.voxel_count);
        assert_eq!(coarse.rendered_voxel_count, 8 * 8 * 8 - 6 * 6 * 6);
        assert_eq!(coarse.triangle_count, 6 * 8 * 8 * 2);

        let max = builder.vertices().iter().map(|v| v.x.max(v.y).max(v.z)).max().unwrap();
        assert_eq!(max, 32);
    }

    #[test]
    fn vertices_are_chunk_local() {
        let world = world_with(8, VoxelBlock::filled("stone", STONE), &[(7, 7, 7)]);
        let (counts, builder) = mesh(&world, (1, 1, 1), 0);

        assert!(counts.triangle_count > 0);
        let min = builder.vertices().iter().map(|v| v.x.min(v.y).min(v.z)).min().unwrap();
        let max = builder.vertices().iter().map(|v| v.x.max(v.y).max(v.z)).max().unwrap();
        assert_eq!((min, max), (48, 64));
    }

    #[test]
    fn empty_chunks_produce_nothing() {
        let world = world_with(8, VoxelBlock::filled("stone", STONE), &[(7, 7, 7)]);
        let (counts, builder) = mesh(&world, (0, 0, 0), 0);
        assert_eq!(counts, MeshCounts::default());
        assert!(builder.vertices().is_empty());
    }

    #[test]
    fn lod_color_averages_rgb_and_keeps_max_alpha() {
        let block = VoxelBlock::from_fn("mixed", |x, y, z| match (x, y, z) {
            (0, 0, 0) => voxel_rgba(100, 0, 40, 128),
            (1, 0, 0) => voxel_rgba(200, 50, 0, 255),
            _ => EMPTY_VOXEL,
        });
        assert_eq!(lod_color(&block, 0, 0, 0, 2), voxel_rgba(150, 25, 20, 255));
        assert_eq!(lod_color(&block, 2, 0, 0, 2), EMPTY_VOXEL);
    }

    #[test]
    fn unlit_blocks_ignore_lighting() {
        struct Dark;
        impl LightProvider for Dark {
            fn illumination_at(&self, _: usize, _: usize, _: usize, _: usize, _: BlockSide) -> LightColor {
                LightColor::BLACK
            }
        }

        let glowing = VoxelBlock::filled("glow", STONE).with_components(BlockComponents {
            unlit: true,
            ..Default::default()
        });
        let mut table = BlockTable::new();
        let glow = table.add(glowing).unwrap();
        let rock = table.add(VoxelBlock::filled("rock", STONE)).unwrap();
        let mut world = WorldGrid::new(Vector3::new(4, 1, 1), table);
        world.set(0, 0, 0, glow).unwrap();
        world.set(2, 0, 0, rock).unwrap();

        let mut builder = MeshBuilder::default();
        let chunk = Chunk::new(Point3::new(0, 0, 0));
        ChunkMesher::new(&world, &Dark).mesh_chunk(&chunk, 0, &mut builder).unwrap();

        let colors = builder.colors();
        assert!(colors.iter().any(|c| *c == VoxelColor::from_voxel(STONE)));
        assert!(colors.iter().any(|c| *c == VoxelColor { r: 0, g: 0, b: 0, a: 255 }));
    }

    #[test]
    fn cancellation_stops_between_slices() {
        let world = world_with(4, VoxelBlock::filled("stone", STONE), &[(0, 0, 0)]);
        let mesher = ChunkMesher::new(&world, &FullBright);
        let mut builder = MeshBuilder::default();
        let chunk = Chunk::new(Point3::new(0, 0, 0));
        assert_eq!(mesher.mesh_chunk_until(&chunk, 0, &mut builder, || true).unwrap(), None);
    }
}
