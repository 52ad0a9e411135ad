//! Finished meshes waiting for the main thread to upload them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine_state::rendering::meshing::{BuilderLease, MeshCounts};
use crate::engine_state::voxels::chunk::{Chunk, ChunkId};

/// A built mesh, still held in its leased builder.
#[derive(Debug)]
pub struct PendingMesh {
    /// Chunk the mesh belongs to
    pub chunk: Arc<Chunk>,
    /// Detail level the mesh was built at
    pub level: u8,
    /// Build generation claimed when meshing started
    pub generation: u64,
    /// Counters of the mesh
    pub counts: MeshCounts,
    /// Builder holding the vertex data
    pub lease: BuilderLease,
}

/// At most one pending mesh per chunk, guarded by one lock.
#[derive(Debug, Default)]
pub struct PendingUploads {
    meshes: Mutex<HashMap<ChunkId, PendingMesh>>,
}

impl PendingUploads {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a finished mesh.
    ///
    /// If the chunk already has a pending mesh, the one with the newer build generation is
    /// kept.
    ///
    /// # Returns
    /// The mesh that lost, if any. Dropping it returns its builder to the pool.
    pub fn submit(&self, mesh: PendingMesh) -> Option<PendingMesh> {
        let mut meshes = self.meshes.lock();
        let id = mesh.chunk.position();
        let existing_is_newer = meshes
            .get(&id)
            .is_some_and(|existing| existing.generation > mesh.generation);
        if existing_is_newer {
            return Some(mesh);
        }
        meshes.insert(id, mesh)
    }

    /// Takes every pending mesh.
    pub fn drain(&self) -> Vec<PendingMesh> {
        self.meshes.lock().drain().map(|(_, mesh)| mesh).collect()
    }

    /// Drops the pending mesh of a chunk, releasing its builder.
    pub fn discard(&self, chunk: &ChunkId) -> bool {
        self.meshes.lock().remove(chunk).is_some()
    }

    /// Number of chunks with a pending mesh.
    pub fn len(&self) -> usize {
        self.meshes.lock().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.meshes.lock().is_empty()
    }

    /// Drops every pending mesh.
    pub fn clear(&self) {
        self.meshes.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::meshing::MeshBuilderPool;

    fn pending(chunk: &Arc<Chunk>, generation: u64, pool: &MeshBuilderPool) -> PendingMesh {
        PendingMesh {
            chunk: Arc::clone(chunk),
            level: 0,
            generation,
            counts: MeshCounts::default(),
            lease: pool.acquire().unwrap(),
        }
    }

    #[test]
    fn newer_generation_supersedes_and_frees_builder() {
        let pool = MeshBuilderPool::new(2);
        let chunk = Arc::new(Chunk::new(ChunkId::new(0, 0, 0)));
        let uploads = PendingUploads::new();

        assert!(uploads.submit(pending(&chunk, 1, &pool)).is_none());
        let loser = uploads.submit(pending(&chunk, 2, &pool)).unwrap();
        assert_eq!(loser.generation, 1);
        assert_eq!(pool.available(), 0);
        drop(loser);
        assert_eq!(pool.available(), 1);

        let drained = uploads.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].generation, 2);
        assert!(uploads.is_empty());
    }

    #[test]
    fn older_generation_is_rejected() {
        let pool = MeshBuilderPool::new(2);
        let chunk = Arc::new(Chunk::new(ChunkId::new(1, 0, 0)));
        let uploads = PendingUploads::new();

        uploads.submit(pending(&chunk, 5, &pool));
        let rejected = uploads.submit(pending(&chunk, 4, &pool)).unwrap();
        assert_eq!(rejected.generation, 4);
        assert_eq!(uploads.len(), 1);
    }

    #[test]
    fn discard_releases_builder() {
        let pool = MeshBuilderPool::new(1);
        let chunk = Arc::new(Chunk::new(ChunkId::new(0, 1, 0)));
        let uploads = PendingUploads::new();

        uploads.submit(pending(&chunk, 1, &pool));
        assert!(uploads.discard(&chunk.position()));
        assert!(!uploads.discard(&chunk.position()));
        assert_eq!(pool.available(), 1);
    }
}
