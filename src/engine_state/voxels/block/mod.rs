//! # Block Module
//!
//! A block is a fixed-size cube of coloured voxels, `BLOCK_VOXEL_SIZE` voxels per axis.
//! Blocks are authored once, registered in a [`BlockTable`](block_table::BlockTable) and
//! referenced from the world grid by a compact `u16` index.
//!
//! ## Voxel Encoding
//!
//! A voxel is a packed `u32` colour laid out as `r << 24 | g << 16 | b << 8 | a`.
//! The value `0` means "no voxel".

pub mod block_side;
pub mod block_table;

/// log2 of the number of voxels along one block axis.
pub const BLOCK_VOXEL_SHIFT: u32 = 4;

/// Voxels per block axis. Must stay a power of two.
pub const BLOCK_VOXEL_SIZE: usize = 1 << BLOCK_VOXEL_SHIFT;

/// Voxels in one block.
pub const BLOCK_VOXEL_COUNT: usize = BLOCK_VOXEL_SIZE * BLOCK_VOXEL_SIZE * BLOCK_VOXEL_SIZE;

/// A packed RGBA colour. `0` is the empty voxel.
pub type Voxel = u32;

/// The empty voxel.
pub const EMPTY_VOXEL: Voxel = 0;

/// Packs four colour channels into a voxel.
#[inline]
pub const fn voxel_rgba(r: u8, g: u8, b: u8, a: u8) -> Voxel {
    (r as u32) << 24 | (g as u32) << 16 | (b as u32) << 8 | a as u32
}

/// Unpacks a voxel into `[r, g, b, a]`.
#[inline]
pub const fn voxel_channels(voxel: Voxel) -> [u8; 4] {
    [
        (voxel >> 24) as u8,
        (voxel >> 16) as u8,
        (voxel >> 8) as u8,
        voxel as u8,
    ]
}

/// Offset of a voxel inside a block's voxel array.
///
/// X varies fastest, then Y, then Z.
#[inline]
pub(crate) const fn voxel_offset(x: usize, y: usize, z: usize) -> usize {
    x + BLOCK_VOXEL_SIZE * (y + BLOCK_VOXEL_SIZE * z)
}

/// A point light carried by a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightComponent {
    /// Position of the light inside the block, in voxels.
    pub location: [u8; 3],
    /// Linear RGB colour of the light.
    pub color: [f32; 3],
    /// How many blocks away the light still reaches.
    pub max_block_distance: u16,
}

/// Optional behaviours attached to a block type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockComponents {
    /// Voxels ignore lighting and are drawn at full colour.
    pub unlit: bool,
    /// Voxels never occlude light.
    pub transparent: bool,
    /// Light travels through the whole block.
    pub light_passthrough: bool,
    /// The block spawns particles. Carried for content tools, not used by meshing.
    pub particle_emitter: bool,
    /// Present when the block emits light.
    pub light: Option<LightComponent>,
}

impl BlockComponents {
    /// Components for a light-emitting block. Light sources are drawn unlit.
    pub fn light_source(light: LightComponent) -> Self {
        BlockComponents {
            unlit: true,
            light: Some(light),
            ..Default::default()
        }
    }
}

/// A named cube of voxels.
#[derive(Debug, Clone)]
pub struct VoxelBlock {
    name: String,
    voxels: Box<[Voxel]>,
    components: BlockComponents,
    total_voxels: u32,
}

impl VoxelBlock {
    /// Creates a block with no voxels.
    pub fn empty(name: impl Into<String>) -> Self {
        VoxelBlock {
            name: name.into(),
            voxels: vec![EMPTY_VOXEL; BLOCK_VOXEL_COUNT].into_boxed_slice(),
            components: BlockComponents::default(),
            total_voxels: 0,
        }
    }

    /// Creates a block where every voxel has the same colour.
    pub fn filled(name: impl Into<String>, color: Voxel) -> Self {
        Self::from_fn(name, |_, _, _| color)
    }

    /// Creates a block by evaluating `f(x, y, z)` for every voxel.
    pub fn from_fn(name: impl Into<String>, mut f: impl FnMut(usize, usize, usize) -> Voxel) -> Self {
        let mut block = Self::empty(name);
        for z in 0..BLOCK_VOXEL_SIZE {
            for y in 0..BLOCK_VOXEL_SIZE {
                for x in 0..BLOCK_VOXEL_SIZE {
                    block.set(x, y, z, f(x, y, z));
                }
            }
        }
        block
    }

    /// Replaces the block's components.
    pub fn with_components(mut self, components: BlockComponents) -> Self {
        self.components = components;
        self
    }

    /// The block's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The block's components.
    pub fn components(&self) -> &BlockComponents {
        &self.components
    }

    /// Reads a voxel. Coordinates must be below `BLOCK_VOXEL_SIZE`.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> Voxel {
        debug_assert!(x < BLOCK_VOXEL_SIZE && y < BLOCK_VOXEL_SIZE && z < BLOCK_VOXEL_SIZE);
        self.voxels[voxel_offset(x, y, z)]
    }

    /// Writes a voxel and keeps the non-empty count current.
    pub fn set(&mut self, x: usize, y: usize, z: usize, voxel: Voxel) {
        let slot = &mut self.voxels[voxel_offset(x, y, z)];
        match (*slot == EMPTY_VOXEL, voxel == EMPTY_VOXEL) {
            (true, false) => self.total_voxels += 1,
            (false, true) => self.total_voxels -= 1,
            _ => {}
        }
        *slot = voxel;
    }

    /// Number of non-empty voxels.
    #[inline]
    pub fn total_voxels(&self) -> u32 {
        self.total_voxels
    }

    /// Raw voxel storage in `voxel_offset` order.
    pub(crate) fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }
}
