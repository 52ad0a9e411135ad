#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Stream
//!
//! Chunk streaming and meshing for large static voxel worlds.
//!
//! A fixed-size world grid of voxel blocks is split into chunks. Every frame the
//! coordinator culls the chunks against the camera frustum, queues newly visible ones for
//! meshing at a coarse detail level, refines them as the camera comes closer and hands
//! finished meshes to a GPU backend.
//!
//! ## Key Modules
//!
//! * `core` - Error types shared by every subsystem
//! * `engine_state` - World data, lighting, meshing, culling and the streaming coordinator
//!
//! ## Architecture
//!
//! The engine follows a modular architecture with clear separation between:
//! * Voxel data (immutable while streaming)
//! * Background meshing threads
//! * The render thread, which owns every GPU resource
//!
//! ## Performance Considerations
//!
//! * Chunk meshes use chunk-local byte positions, a translation places them at draw time
//! * Coarser detail levels sample one cell every `1 << level` voxels
//! * The render thread never waits for a mesh to finish

pub mod core;
pub mod engine_state;

pub use crate::core::{Result, StreamError};
pub use engine_state::camera_state::{Camera, CameraState, FixedView, Frustum, Projection, ViewSource};
pub use engine_state::config::{DetailDistance, DetailLevelBands, StreamingConfig};
pub use engine_state::coordinator::ChunkStreamCoordinator;
pub use engine_state::lighting::{FullBright, LightColor, LightProvider, LightingModel, StaticLightProvider};
pub use engine_state::rendering::{GpuBackend, RecordingBackend, RenderStats};
pub use engine_state::voxels::block::block_table::BlockTable;
pub use engine_state::voxels::block::{BlockComponents, LightComponent, VoxelBlock};
pub use engine_state::voxels::world::WorldGrid;

/// Sets up `env_logger` on stdout, filtered by `RUST_LOG`.
///
/// Calling it more than once is harmless.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    let initialized = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init()
        .is_ok();
    if initialized {
        log::info!("Logger initialized");
    }
}
