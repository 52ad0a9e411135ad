//! # Meshing Task
//!
//! One iteration of a meshing worker, usable from a background thread or inline on the
//! main thread.
//!
//! ## Iteration
//! 1. Return immediately if the load queue is empty
//! 2. Lease a mesh builder, giving up the iteration if none is free
//! 3. Dequeue the next chunk and claim a build generation for it
//! 4. Mesh the chunk, abandoning the build if the chunk is evicted meanwhile
//! 5. Hand a non-empty mesh to the pending uploads
//!
//! The builder is always leased before anything is dequeued, so contention never loses a
//! queued chunk.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use web_time::Instant;

use crate::core::Result;
use crate::engine_state::rendering::meshing::ChunkMesher;

use super::pending_uploads::PendingMesh;
use super::StreamContext;

/// What one iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The load queue was empty
    Idle,
    /// Every mesh builder was leased
    Contended,
    /// The dequeued chunk was evicted before its mesh was finished
    Stale,
    /// The chunk meshed to zero triangles
    Empty,
    /// A mesh is waiting for upload
    Submitted {
        /// Whether an older pending mesh of the same chunk was dropped
        superseded: bool,
    },
    /// The iteration failed and its chunk was dropped
    Failed,
}

/// Runs meshing iterations against a shared [`StreamContext`].
pub struct MeshingTask {
    ctx: Arc<StreamContext>,
    contended_streak: u32,
}

impl MeshingTask {
    /// Creates a task over the shared streaming state.
    pub fn new(ctx: Arc<StreamContext>) -> Self {
        MeshingTask {
            ctx,
            contended_streak: 0,
        }
    }

    /// Runs one iteration, turning errors and panics into [`TaskOutcome::Failed`].
    pub fn process(&mut self) -> TaskOutcome {
        match catch_unwind(AssertUnwindSafe(|| self.run_once())) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                log::error!("Chunk meshing failed: {err}");
                TaskOutcome::Failed
            }
            Err(_) => {
                log::error!("Chunk meshing panicked, dropping the chunk");
                TaskOutcome::Failed
            }
        }
    }

    /// Runs one iteration.
    pub fn run_once(&mut self) -> Result<TaskOutcome> {
        let ctx = &self.ctx;
        if ctx.queue.is_empty() {
            return Ok(TaskOutcome::Idle);
        }

        let Some(lease) = ctx.pool.acquire() else {
            self.contended_streak += 1;
            if self.contended_streak >= ctx.bottleneck_warning_iterations {
                log::warn!(
                    "Mesh creation bottlenecked, no free mesh builder for {} iterations",
                    self.contended_streak
                );
                self.contended_streak = 0;
            }
            return Ok(TaskOutcome::Contended);
        };
        self.contended_streak = 0;

        let Some((id, level)) = ctx.queue.dequeue() else {
            return Ok(TaskOutcome::Idle);
        };
        let Some(chunk) = ctx.chunks.get(&id) else {
            return Ok(TaskOutcome::Stale);
        };
        let Some(generation) = chunk.begin_build() else {
            return Ok(TaskOutcome::Stale);
        };

        let started = Instant::now();
        let mesher = ChunkMesher::new(&ctx.world, ctx.lighting.as_ref());
        let counts = {
            let mut builder = lease.builder();
            mesher.mesh_chunk_until(chunk, level, &mut builder, || chunk.is_deleted())?
        };
        let Some(counts) = counts else {
            return Ok(TaskOutcome::Stale);
        };

        if counts.triangle_count == 0 {
            chunk.finish_empty_build(level);
            return Ok(TaskOutcome::Empty);
        }
        if chunk.is_deleted() {
            return Ok(TaskOutcome::Stale);
        }

        log::trace!(
            "Meshed chunk {:?} at level {} in {:?}: {} triangles",
            id,
            level,
            started.elapsed(),
            counts.triangle_count
        );
        let superseded = ctx
            .pending
            .submit(PendingMesh {
                chunk: Arc::clone(chunk),
                level,
                generation,
                counts,
                lease,
            })
            .is_some();
        Ok(TaskOutcome::Submitted { superseded })
    }
}
