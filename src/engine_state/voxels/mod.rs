//! # Voxel Data
//!
//! Everything that describes *what* is in the world, independent of how it is drawn.
//!
//! ## Architecture
//!
//! * **Block**: voxel cubes, their optional components and the block table
//! * **World**: the fixed-size grid of block indices and line-of-sight queries over it
//! * **Chunk**: fixed windows onto the grid that are meshed and uploaded as one unit
//! * **Terrain**: seeded procedural worlds
//!
//! ## Thread Safety
//!
//! The world grid is immutable once built and shared through `Arc`. Chunk streaming state
//! lives behind a per-chunk lock.

pub mod block;
pub mod chunk;
pub mod terrain;
pub mod world;
