//! Fixed pool of mesh builders shared by the meshing workers.
//!
//! The pool bounds how many chunk meshes can exist on the CPU side at once: a builder is
//! leased when a worker starts a chunk and returns to the pool only after the main thread
//! has uploaded its contents. When every builder is leased, workers back off.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::mesh_builder::MeshBuilder;

/// Vertices preallocated per builder.
const INITIAL_VERTEX_CAPACITY: usize = 4096;

/// A fixed set of reusable [`MeshBuilder`]s.
pub struct MeshBuilderPool {
    builders: Vec<Arc<Mutex<MeshBuilder>>>,
    /// Lock flag per builder
    locked: Arc<Mutex<Vec<bool>>>,
}

impl MeshBuilderPool {
    /// Creates a pool of `size` builders.
    pub fn new(size: usize) -> Self {
        MeshBuilderPool {
            builders: (0..size)
                .map(|_| Arc::new(Mutex::new(MeshBuilder::with_capacity(INITIAL_VERTEX_CAPACITY))))
                .collect(),
            locked: Arc::new(Mutex::new(vec![false; size])),
        }
    }

    /// Locks the first free builder.
    ///
    /// # Returns
    /// A lease that owns the builder until it is released or dropped, or `None` when every
    /// builder is in use. Contention is not an error.
    pub fn acquire(&self) -> Option<BuilderLease> {
        let mut locked = self.locked.lock();
        let slot = locked.iter().position(|in_use| !in_use)?;
        locked[slot] = true;
        Some(BuilderLease {
            slot,
            builder: Arc::clone(&self.builders[slot]),
            locked: Arc::clone(&self.locked),
        })
    }

    /// Returns a builder to the pool without clearing it.
    pub fn release(&self, lease: BuilderLease) {
        drop(lease);
    }

    /// Number of builders not currently leased.
    pub fn available(&self) -> usize {
        self.locked.lock().iter().filter(|in_use| !**in_use).count()
    }

    /// Total number of builders.
    pub fn len(&self) -> usize {
        self.builders.len()
    }

    /// Whether the pool has no builders at all.
    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Current utilisation.
    pub fn stats(&self) -> PoolStats {
        let available = self.available();
        PoolStats {
            total_capacity: self.len(),
            available,
            in_use: self.len() - available,
        }
    }
}

/// Statistics about pool utilisation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Builders in the pool
    pub total_capacity: usize,
    /// Builders free to lease
    pub available: usize,
    /// Builders currently leased
    pub in_use: usize,
}

/// Exclusive use of one pooled builder.
///
/// The builder is unlocked exactly once, when the lease is released or dropped.
#[derive(Debug)]
pub struct BuilderLease {
    slot: usize,
    builder: Arc<Mutex<MeshBuilder>>,
    locked: Arc<Mutex<Vec<bool>>>,
}

impl BuilderLease {
    /// Index of the leased builder inside its pool.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Access to the builder's buffers. Only the lease holder ever locks it.
    pub fn builder(&self) -> MutexGuard<'_, MeshBuilder> {
        self.builder.lock()
    }
}

impl Drop for BuilderLease {
    fn drop(&mut self) {
        self.locked.lock()[self.slot] = false;
    }
}
