//! # Lighting Module
//!
//! Per-face illumination queries used while meshing. The mesher multiplies each voxel's
//! colour by the value a [`LightProvider`] returns for the face being emitted.
//!
//! ## Key Components
//!
//! - `LightColor`: linear RGB multiplier, may exceed 1.0 before clamping
//! - `LightProvider`: the query trait, shared by every meshing worker
//! - `FullBright`: constant white, for unlit worlds and tests
//! - `StaticLightProvider`: point lights baked per block, with shadows from line-of-sight
//!
//! ## Performance Considerations
//!
//! `StaticLightProvider` does the expensive work once at construction. It keeps at most
//! `lights_per_block` lights for every block, ranked by their strength at the block
//! centre. A query only walks that short list.

use std::ops::{Add, AddAssign, Mul};
use std::sync::Arc;

use cgmath::{InnerSpace, Point3, Vector3};

use crate::engine_state::voxels::block::block_side::BlockSide;
use crate::engine_state::voxels::block::{voxel_channels, voxel_rgba, Voxel, BLOCK_VOXEL_SHIFT, BLOCK_VOXEL_SIZE};
use crate::engine_state::voxels::world::WorldGrid;

pub mod lighting_model;

pub use lighting_model::LightingModel;

/// Share of a light that still reaches a surface it cannot see.
pub const SHADOW_LIGHT_FACTOR: f32 = 0.3;

/// A linear RGB light multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightColor {
    /// Red multiplier
    pub r: f32,
    /// Green multiplier
    pub g: f32,
    /// Blue multiplier
    pub b: f32,
}

impl LightColor {
    /// Leaves colours unchanged.
    pub const WHITE: LightColor = LightColor::new(1.0, 1.0, 1.0);
    /// No light.
    pub const BLACK: LightColor = LightColor::new(0.0, 0.0, 0.0);

    /// Creates a light colour.
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        LightColor { r, g, b }
    }

    /// Scales a voxel's colour channels, clamping to 255. Alpha is unchanged.
    pub fn apply(self, voxel: Voxel) -> Voxel {
        let [r, g, b, a] = voxel_channels(voxel);
        let scale = |channel: u8, factor: f32| (channel as f32 * factor).clamp(0.0, 255.0) as u8;
        voxel_rgba(scale(r, self.r), scale(g, self.g), scale(b, self.b), a)
    }
}

impl From<[f32; 3]> for LightColor {
    fn from(c: [f32; 3]) -> Self {
        LightColor::new(c[0], c[1], c[2])
    }
}

impl Add for LightColor {
    type Output = LightColor;

    fn add(self, other: LightColor) -> LightColor {
        LightColor::new(self.r + other.r, self.g + other.g, self.b + other.b)
    }
}

impl AddAssign for LightColor {
    fn add_assign(&mut self, other: LightColor) {
        *self = *self + other;
    }
}

impl Mul<f32> for LightColor {
    type Output = LightColor;

    fn mul(self, factor: f32) -> LightColor {
        LightColor::new(self.r * factor, self.g * factor, self.b * factor)
    }
}

/// Answers "how much light reaches this face" during meshing.
///
/// Called from several worker threads at once.
pub trait LightProvider: Send + Sync {
    /// Light reaching one face of a sampled cell.
    ///
    /// # Arguments
    /// * `vx`, `vy`, `vz` - Absolute voxel coordinate of the cell's minimum corner
    /// * `stride` - Edge length of the cell in voxels (`1 << detail level`)
    /// * `normal` - The face being lit
    fn illumination_at(&self, vx: usize, vy: usize, vz: usize, stride: usize, normal: BlockSide) -> LightColor;
}

/// Constant white light.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullBright;

impl LightProvider for FullBright {
    fn illumination_at(&self, _vx: usize, _vy: usize, _vz: usize, _stride: usize, _normal: BlockSide) -> LightColor {
        LightColor::WHITE
    }
}

/// A point light placed in the world.
#[derive(Debug, Clone)]
struct PlacedLight {
    /// Absolute voxel position
    location: Point3<i32>,
    color: LightColor,
    /// `LightingModel::cache_calculation` for this light
    cached: f32,
}

/// Point lights taken from the light components of the world's blocks.
pub struct StaticLightProvider {
    world: Arc<WorldGrid>,
    model: LightingModel,
    ambient: LightColor,
    lights: Vec<PlacedLight>,
    /// Light indices per block, strongest first
    lights_in_blocks: Vec<Vec<u32>>,
}

impl StaticLightProvider {
    /// Scans the world for light-emitting blocks and ranks them per block.
    ///
    /// # Arguments
    /// * `world` - The world the lights live in, also used for shadow tests
    /// * `model` - Attenuation curve
    /// * `lights_per_block` - How many lights each block keeps
    /// * `ambient` - Light added everywhere
    pub fn new(world: Arc<WorldGrid>, model: LightingModel, lights_per_block: usize, ambient: LightColor) -> Self {
        let size = world.block_size();
        let mut lights = Vec::new();
        let mut reaches = Vec::new();

        for bz in 0..size.z {
            for by in 0..size.y {
                for bx in 0..size.x {
                    let index = world.block_unchecked(bx, by, bz);
                    let Some(light) = world.block_table().get(index).and_then(|b| b.components().light) else {
                        continue;
                    };
                    let origin = Point3::new(bx, by, bz) * BLOCK_VOXEL_SIZE;
                    let location = Point3::new(
                        (origin.x + light.location[0] as usize) as i32,
                        (origin.y + light.location[1] as usize) as i32,
                        (origin.z + light.location[2] as usize) as i32,
                    );
                    if !world.contains_voxel(location.x, location.y, location.z) {
                        log::warn!("Skipping light of block ({bx}, {by}, {bz}) placed outside the world at {location:?}");
                        continue;
                    }
                    lights.push(PlacedLight {
                        location,
                        color: light.color.into(),
                        cached: model.cache_calculation(light.max_block_distance),
                    });
                    reaches.push(light.max_block_distance as usize);
                }
            }
        }

        let block_count = size.x * size.y * size.z;
        let mut ranked: Vec<Vec<(f32, u32)>> = vec![Vec::new(); block_count];
        if lights_per_block > 0 {
            let half = BLOCK_VOXEL_SIZE as f32 / 2.0;
            for (light_index, (light, &reach)) in lights.iter().zip(&reaches).enumerate() {
                let home = light.location.map(|c| c as usize >> BLOCK_VOXEL_SHIFT);
                for bz in home.z.saturating_sub(reach)..(home.z + reach + 1).min(size.z) {
                    for by in home.y.saturating_sub(reach)..(home.y + reach + 1).min(size.y) {
                        for bx in home.x.saturating_sub(reach)..(home.x + reach + 1).min(size.x) {
                            let center = Point3::new(bx, by, bz).map(|c| (c * BLOCK_VOXEL_SIZE) as f32 + half);
                            let pct = model.percentage(dist_squared(light.location, center), light.cached);
                            if pct <= 0.0 {
                                continue;
                            }
                            let slot = &mut ranked[bx + size.x * (by + size.y * bz)];
                            let position = slot.partition_point(|&(p, _)| p >= pct);
                            if position < lights_per_block {
                                slot.insert(position, (pct, light_index as u32));
                                slot.truncate(lights_per_block);
                            }
                        }
                    }
                }
            }
        }

        log::info!(
            "Placed {} static lights using the {:?} lighting model",
            lights.len(),
            model
        );

        StaticLightProvider {
            world,
            model,
            ambient,
            lights,
            lights_in_blocks: ranked
                .into_iter()
                .map(|slot| slot.into_iter().map(|(_, index)| index).collect())
                .collect(),
        }
    }

    /// Number of lights found in the world.
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Number of lights kept for a block.
    pub fn lights_for_block(&self, bx: usize, by: usize, bz: usize) -> usize {
        let size = self.world.block_size();
        self.lights_in_blocks
            .get(bx + size.x * (by + size.y * bz))
            .map_or(0, Vec::len)
    }
}

impl LightProvider for StaticLightProvider {
    fn illumination_at(&self, vx: usize, vy: usize, vz: usize, stride: usize, normal: BlockSide) -> LightColor {
        let size = self.world.block_size();
        let (bx, by, bz) = (vx >> BLOCK_VOXEL_SHIFT, vy >> BLOCK_VOXEL_SHIFT, vz >> BLOCK_VOXEL_SHIFT);
        let Some(in_block) = self.lights_in_blocks.get(bx + size.x * (by + size.y * bz)) else {
            return self.ambient;
        };

        let n = normal.normal();
        let half = stride as f32 / 2.0;
        let center = Point3::new(vx as f32 + half, vy as f32 + half, vz as f32 + half);

        // Shadow rays end in the cell just outside the face.
        let step = n * stride as i32;
        let mut sample = Point3::new(vx as i32 + step.x, vy as i32 + step.y, vz as i32 + step.z);
        if !self.world.contains_voxel(sample.x, sample.y, sample.z) {
            sample = Point3::new(vx as i32, vy as i32, vz as i32);
        }

        let mut color = self.ambient;
        for &light_index in in_block {
            let light = &self.lights[light_index as usize];
            let pct = self.model.percentage(dist_squared(light.location, center), light.cached);

            let to_light = light.location.map(|c| c as f32) - center;
            let length = to_light.magnitude();
            let facing = if length > f32::EPSILON {
                (Vector3::new(n.x as f32, n.y as f32, n.z as f32).dot(to_light) / length).clamp(0.0, 1.0)
            } else {
                1.0
            };
            if facing <= 0.0 {
                continue;
            }

            let visible = self.world.line_of_sight_clear(
                light.location.x,
                light.location.y,
                light.location.z,
                sample.x,
                sample.y,
                sample.z,
            );
            let shadow = if visible { 1.0 } else { SHADOW_LIGHT_FACTOR };
            color += light.color * (pct * facing * shadow);
        }
        color
    }
}

fn dist_squared(light: Point3<i32>, point: Point3<f32>) -> f32 {
    let dx = light.x as f32 - point.x;
    let dy = light.y as f32 - point.y;
    let dz = light.z as f32 - point.z;
    dx * dx + dy * dy + dz * dz
}
