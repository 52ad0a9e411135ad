//! # Engine State Module
//!
//! The subsystems of the chunk streaming engine.
//!
//! ## Key Components
//!
//! * `coordinator` - Per-frame streaming decisions, uploads and draws
//! * `config` - Tunables and detail level bands
//! * `camera_state` - Camera, projection and frustum
//! * `lighting` - Per-face illumination for the mesher
//! * `rendering` - GPU backend seam, meshing and culling
//! * `task_management` - Load queue and background meshing threads
//! * `voxels` - Blocks, the world grid and chunks
//!
//! ## Architecture
//!
//! The world grid is built once and shared read-only. The coordinator owns everything
//! that touches the GPU and runs on the render thread. Meshing workers share the queue,
//! the mesh builder pool and the pending uploads with it through a `StreamContext`.
//!
//! ## Performance Considerations
//!
//! * Newly visible chunks are meshed at the coarsest level first for fast pop-in
//! * Mesh builders are pooled, bounding memory held by finished but unuploaded meshes
//! * Chunk-based loading and unloading based on the view frustum

pub mod camera_state;
pub mod config;
pub mod coordinator;
pub mod lighting;
pub mod rendering;
pub mod task_management;
pub mod voxels;

pub use coordinator::ChunkStreamCoordinator;
