//! # Error Types
//!
//! Every fallible operation in the streaming engine returns [`Result`], whose error
//! type is [`StreamError`].
//!
//! The variants follow the engine's error taxonomy:
//! - **Capacity** (`QueueFull`): recoverable, the caller backs off and retries later.
//! - **Bounds** (`OutOfRange`): a programming error. Checked accessors report it instead
//!   of clamping, and the worker loop logs it and drops the work item.
//! - **Setup** (`UnknownBlock`, `BlockTableFull`, `InvalidLight`, `InvalidConfig`,
//!   `Config`, `Io`, `WorkerSpawn`): surfaced while building a world or starting the engine.
//!
//! Builder contention and stale work items are not errors. See
//! `task_management::task::TaskOutcome`.

use thiserror::Error;

/// Errors produced by the voxel streaming engine.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The load queue has no free node left.
    #[error("load queue is full (capacity {capacity})")]
    QueueFull {
        /// Number of preallocated queue nodes
        capacity: usize,
    },

    /// A block or voxel coordinate fell outside the grid extents.
    #[error("coordinate ({x}, {y}, {z}) is outside the grid extents {size:?}")]
    OutOfRange {
        /// X coordinate that was requested
        x: i64,
        /// Y coordinate that was requested
        y: i64,
        /// Z coordinate that was requested
        z: i64,
        /// Extents of the grid that was indexed
        size: [usize; 3],
    },

    /// A block name or index is not present in the block table.
    #[error("unknown block: {0}")]
    UnknownBlock(String),

    /// The block table cannot hold more than `u16::MAX` block types.
    #[error("block table is full")]
    BlockTableFull,

    /// A block's light sits outside the block's voxels.
    #[error("light of block {block} at {location:?} lies outside the block")]
    InvalidLight {
        /// Name of the block
        block: String,
        /// Requested voxel position inside the block
        location: [u8; 3],
    },

    /// Streaming settings failed validation.
    #[error("invalid streaming configuration: {0}")]
    InvalidConfig(String),

    /// Streaming settings could not be parsed.
    #[error("failed to parse streaming configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Streaming settings could not be read from disk.
    #[error("failed to read streaming configuration: {0}")]
    Io(#[from] std::io::Error),

    /// A meshing worker thread could not be started.
    #[error("failed to spawn meshing worker: {0}")]
    WorkerSpawn(std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StreamError>;

impl StreamError {
    /// Builds an [`StreamError::OutOfRange`] from signed coordinates and grid extents.
    pub fn out_of_range(x: i64, y: i64, z: i64, size: [usize; 3]) -> Self {
        StreamError::OutOfRange { x, y, z, size }
    }

    /// Returns `true` for errors the caller is expected to recover from by retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StreamError::QueueFull { .. })
    }
}
