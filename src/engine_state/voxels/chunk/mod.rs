//! # Chunk Module
//!
//! A chunk is a `CHUNK_BLOCK_SIZE`³ window onto the world grid and the unit of meshing,
//! culling and GPU upload. Chunks own no voxel data. They only track the streaming state
//! of their mesh.
//!
//! ## Synchronisation
//!
//! Each chunk has its own lock around [`ChunkState`]. Meshing workers take it briefly to
//! check for eviction and to claim a build generation. The main thread takes it while it
//! swaps in a freshly uploaded mesh, so readers never see a chunk between two meshes.
//!
//! ## Build Generations
//!
//! Every build claims a generation number when it starts. A result is only installed if
//! its generation is newer than the installed mesh, so a rebuild that started later can
//! never be replaced by one that merely finished later.

use cgmath::{Matrix4, Point3, Vector3};
use parking_lot::{Mutex, MutexGuard};

use crate::engine_state::rendering::meshing::MeshCounts;
use crate::engine_state::voxels::block::BLOCK_VOXEL_SIZE;

pub mod chunk_iteration;

/// Blocks per chunk axis.
pub const CHUNK_BLOCK_SIZE: usize = 4;

/// Voxels per chunk axis. Chunk-local vertex positions fit in a `u8`.
pub const CHUNK_VOXEL_SIZE: usize = CHUNK_BLOCK_SIZE * BLOCK_VOXEL_SIZE;

/// Integer coordinate of a chunk, in chunks.
pub type ChunkId = Point3<i32>;

/// Mutable streaming state of a chunk, guarded by the chunk lock.
#[derive(Debug, Clone, Default)]
pub struct ChunkState {
    /// Detail level of the installed mesh. `None` while unloaded.
    pub loaded_level: Option<u8>,
    /// Detail level most recently requested from the load queue.
    pub target_level: Option<u8>,
    /// Set when the chunk left the visible set. In-flight work for it is stale.
    pub deleted: bool,
    /// Whether the backend holds a mesh for this chunk.
    pub has_mesh: bool,
    /// Counters of the installed mesh.
    pub counts: MeshCounts,
    /// Generation claimed by the most recently started build.
    pub build_generation: u64,
    /// Generation of the installed mesh.
    pub mesh_generation: u64,
}

/// A fixed-size region of the world that is meshed as one unit.
#[derive(Debug)]
pub struct Chunk {
    /// The position of this chunk in chunk coordinates.
    position: ChunkId,
    state: Mutex<ChunkState>,
}

impl Chunk {
    /// Creates an unloaded chunk.
    pub fn new(position: ChunkId) -> Self {
        Chunk {
            position,
            state: Mutex::new(ChunkState::default()),
        }
    }

    /// The chunk coordinate.
    pub fn position(&self) -> ChunkId {
        self.position
    }

    /// Locks the streaming state.
    pub fn lock(&self) -> MutexGuard<'_, ChunkState> {
        self.state.lock()
    }

    /// Whether the chunk has been evicted.
    pub fn is_deleted(&self) -> bool {
        self.state.lock().deleted
    }

    /// Marks the chunk live and records the level it was queued at.
    pub fn prepare_for_load(&self, level: u8) {
        let mut state = self.state.lock();
        state.deleted = false;
        state.target_level = Some(level);
    }

    /// Claims a build generation.
    ///
    /// # Returns
    /// `None` if the chunk was evicted, otherwise the generation of the new build.
    pub fn begin_build(&self) -> Option<u64> {
        let mut state = self.state.lock();
        if state.deleted {
            return None;
        }
        state.build_generation += 1;
        Some(state.build_generation)
    }

    /// Records a build that produced no triangles.
    ///
    /// An installed mesh stays in place. A chunk without a mesh remembers the level so it
    /// is not queued again for the same result.
    pub fn finish_empty_build(&self, level: u8) {
        let mut state = self.state.lock();
        if !state.deleted && !state.has_mesh {
            state.loaded_level = Some(level);
        }
    }

    /// Evicts the chunk.
    ///
    /// # Returns
    /// Whether a mesh was installed, in which case the caller disposes it.
    pub fn mark_deleted(&self) -> bool {
        let mut state = self.state.lock();
        let had_mesh = state.has_mesh;
        state.deleted = true;
        state.loaded_level = None;
        state.target_level = None;
        state.has_mesh = false;
        state.counts = MeshCounts::default();
        had_mesh
    }

    /// Current detail level, `None` while unloaded.
    pub fn loaded_level(&self) -> Option<u8> {
        self.state.lock().loaded_level
    }

    /// Block coordinates covered by the chunk as a half-open range clipped to the world.
    pub fn block_range(&self, world_blocks: Vector3<usize>) -> (Point3<usize>, Point3<usize>) {
        let start = |c: i32| c.max(0) as usize * CHUNK_BLOCK_SIZE;
        let min = Point3::new(
            start(self.position.x).min(world_blocks.x),
            start(self.position.y).min(world_blocks.y),
            start(self.position.z).min(world_blocks.z),
        );
        let max = Point3::new(
            (min.x + CHUNK_BLOCK_SIZE).min(world_blocks.x),
            (min.y + CHUNK_BLOCK_SIZE).min(world_blocks.y),
            (min.z + CHUNK_BLOCK_SIZE).min(world_blocks.z),
        );
        (min, max)
    }

    /// Absolute voxel coordinate of the chunk's minimum corner.
    pub fn voxel_origin(&self) -> Point3<i32> {
        self.position * CHUNK_VOXEL_SIZE as i32
    }

    /// Centre of the chunk in voxel space.
    pub fn center(&self) -> Point3<f32> {
        let origin = self.voxel_origin();
        let half = CHUNK_VOXEL_SIZE as f32 / 2.0;
        Point3::new(
            origin.x as f32 + half,
            origin.y as f32 + half,
            origin.z as f32 + half,
        )
    }

    /// Model matrix placing chunk-local vertices in the world.
    pub fn translation(&self) -> Matrix4<f32> {
        let origin = self.voxel_origin();
        Matrix4::from_translation(Vector3::new(origin.x as f32, origin.y as f32, origin.z as f32))
    }
}
