//! # Block Table
//!
//! Registry mapping compact block indices to block definitions. Index `0` is always
//! the built-in empty block, so a zeroed world grid is an empty world.

use std::collections::HashMap;

use crate::core::{Result, StreamError};

use super::{VoxelBlock, BLOCK_VOXEL_SIZE};

/// Index of a block type inside a [`BlockTable`].
pub type BlockIndex = u16;

/// Index of the built-in empty block.
pub const EMPTY_BLOCK: BlockIndex = 0;

/// Name of the built-in empty block.
pub const EMPTY_BLOCK_NAME: &str = "empty";

/// Ordered collection of block types.
#[derive(Debug, Clone)]
pub struct BlockTable {
    blocks: Vec<VoxelBlock>,
    name_to_index: HashMap<String, BlockIndex>,
}

impl BlockTable {
    /// Creates a table holding only the empty block.
    pub fn new() -> Self {
        let mut name_to_index = HashMap::new();
        name_to_index.insert(EMPTY_BLOCK_NAME.to_string(), EMPTY_BLOCK);
        BlockTable {
            blocks: vec![VoxelBlock::empty(EMPTY_BLOCK_NAME)],
            name_to_index,
        }
    }

    /// Registers a block type.
    ///
    /// # Returns
    /// The new index, or the existing index when a block with the same name is
    /// already registered (the table keeps the first definition).
    ///
    /// # Errors
    /// [`StreamError::InvalidLight`] when the block's light is not inside its voxels.
    pub fn add(&mut self, block: VoxelBlock) -> Result<BlockIndex> {
        if let Some(&index) = self.name_to_index.get(block.name()) {
            return Ok(index);
        }
        if let Some(light) = block.components().light {
            if light.location.iter().any(|&c| c as usize >= BLOCK_VOXEL_SIZE) {
                return Err(StreamError::InvalidLight {
                    block: block.name().to_string(),
                    location: light.location,
                });
            }
        }
        let index = BlockIndex::try_from(self.blocks.len()).map_err(|_| StreamError::BlockTableFull)?;
        self.name_to_index.insert(block.name().to_string(), index);
        self.blocks.push(block);
        Ok(index)
    }

    /// Finds the index of a block by name.
    pub fn lookup(&self, name: &str) -> Result<BlockIndex> {
        self.name_to_index
            .get(name)
            .copied()
            .ok_or_else(|| StreamError::UnknownBlock(name.to_string()))
    }

    /// Gets a block definition by index.
    #[inline]
    pub fn get(&self, index: BlockIndex) -> Option<&VoxelBlock> {
        self.blocks.get(index as usize)
    }

    /// Number of block types, including the empty block.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Iterates `(index, block)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockIndex, &VoxelBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(index, block)| (index as BlockIndex, block))
    }
}

impl Default for BlockTable {
    fn default() -> Self {
        Self::new()
    }
}
