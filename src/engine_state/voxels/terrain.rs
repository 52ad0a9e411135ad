//! # Terrain Generation
//!
//! Procedural worlds for demos and benchmarks.
//!
//! The surface height of every block column comes from 2D Perlin noise. Columns are
//! stone with a grass cap, glass pillars are scattered on the surface and lamps float
//! above them so the static lighting has something to do.

use cgmath::{Point3, Vector3};
use noise::{NoiseFn, Perlin};

use crate::core::Result;
use crate::engine_state::voxels::block::block_table::{BlockIndex, BlockTable};
use crate::engine_state::voxels::block::{
    voxel_rgba, BlockComponents, LightComponent, VoxelBlock, BLOCK_VOXEL_SIZE,
};
use crate::engine_state::voxels::world::WorldGrid;

/// Scaling factor applied to block coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;

/// Seeded generator of heightmap worlds.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    seed: u64,
    /// Fraction of surface columns that get a glass pillar
    pub pillar_density: f64,
    /// Fraction of surface columns that get a lamp
    pub lamp_density: f64,
}

/// Indices of the generated block types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainBlocks {
    /// Solid rock
    pub stone: BlockIndex,
    /// Rock with a green top
    pub grass: BlockIndex,
    /// See-through, lets light pass
    pub glass: BlockIndex,
    /// Emits light
    pub lamp: BlockIndex,
}

impl TerrainGenerator {
    /// Creates a generator. The same seed always produces the same world.
    pub fn new(seed: u64) -> Self {
        TerrainGenerator {
            seed,
            pillar_density: 0.02,
            lamp_density: 0.01,
        }
    }

    /// Adds the terrain block types to a table.
    pub fn register_blocks(&self, table: &mut BlockTable) -> Result<TerrainBlocks> {
        let mut rng = fastrand::Rng::with_seed(self.seed);
        let mut speckle = |base: u8| {
            let jitter = rng.u8(0..16);
            voxel_rgba(base + jitter, base + jitter, base + jitter, 255)
        };
        let stone = VoxelBlock::from_fn("stone", |_, _, _| speckle(100));
        let grass = VoxelBlock::from_fn("grass", |_, y, _| {
            if y >= BLOCK_VOXEL_SIZE - 3 {
                voxel_rgba(60, 160, 50, 255)
            } else {
                voxel_rgba(120, 85, 50, 255)
            }
        });
        let glass = VoxelBlock::filled("glass", voxel_rgba(180, 210, 230, 90)).with_components(BlockComponents {
            transparent: true,
            light_passthrough: true,
            ..Default::default()
        });
        let lamp = VoxelBlock::filled("lamp", voxel_rgba(255, 240, 200, 255)).with_components(
            BlockComponents::light_source(LightComponent {
                location: [8, 8, 8],
                color: [1.0, 0.9, 0.7],
                max_block_distance: 8,
            }),
        );

        Ok(TerrainBlocks {
            stone: table.add(stone)?,
            grass: table.add(grass)?,
            glass: table.add(glass)?,
            lamp: table.add(lamp)?,
        })
    }

    /// Surface height of a block column, in blocks, within `1..height`.
    pub fn column_height(&self, perlin: &Perlin, bx: usize, bz: usize, height: usize) -> usize {
        let sample = perlin.get([bx as f64 * PERLIN_SCALE_FACTOR, bz as f64 * PERLIN_SCALE_FACTOR]);
        let normalized = ((sample + 1.0) / 2.0).clamp(0.0, 1.0);
        let top = (height as f64 * 0.6 * normalized) as usize;
        top.clamp(1, height.max(1))
    }

    /// Generates a world of `size` blocks.
    pub fn generate(&self, size: Vector3<usize>) -> Result<WorldGrid> {
        let mut table = BlockTable::new();
        let blocks = self.register_blocks(&mut table)?;
        let mut world = WorldGrid::new(size, table);
        if size.x == 0 || size.y == 0 || size.z == 0 {
            return Ok(world);
        }

        let perlin = Perlin::new(self.seed as u32);
        let mut rng = fastrand::Rng::with_seed(self.seed ^ 0x9E37_79B9_7F4A_7C15);
        let mut lamps = 0;
        for bz in 0..size.z {
            for bx in 0..size.x {
                let top = self.column_height(&perlin, bx, bz, size.y);
                world.fill(Point3::new(bx, 0, bz), Point3::new(bx + 1, top - 1, bz + 1), blocks.stone)?;
                world.fill(Point3::new(bx, top - 1, bz), Point3::new(bx + 1, top, bz + 1), blocks.grass)?;

                if rng.f64() < self.pillar_density {
                    world.fill(Point3::new(bx, top, bz), Point3::new(bx + 1, top + 3, bz + 1), blocks.glass)?;
                }
                if top + 4 < size.y && rng.f64() < self.lamp_density {
                    world.set(bx as i32, (top + 4) as i32, bz as i32, blocks.lamp)?;
                    lamps += 1;
                }
            }
        }

        log::info!("Generated terrain of {:?} blocks with {} lamps", size, lamps);
        Ok(world)
    }
}
