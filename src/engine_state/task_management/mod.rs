//! # Task Management System
//!
//! Background meshing for the chunk streamer.
//!
//! ## Architecture Overview
//! - `SharedLoadQueue`: chunks waiting to be meshed, coarsest detail first
//! - `MeshingTask`: one worker iteration, from dequeue to pending upload
//! - `PendingUploads`: finished meshes waiting for the main thread
//! - `MeshingWorkerPool`: the threads running `MeshingTask`s
//! - `StreamContext`: the state all of the above share
//!
//! ## Synchronisation
//! The queue, the builder pool and the pending uploads each have their own lock, held
//! only around the mutation itself and never across meshing. Chunk state is guarded per
//! chunk. The main thread never waits for a worker except at shutdown.
//!
//! ## Shutdown
//! `MeshingWorkerPool::shutdown` raises a flag, wakes idle workers and joins every thread.
//! The shared state outlives the threads because they hold it through an `Arc`.

pub mod load_queue;
pub mod pending_uploads;
pub mod task;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cgmath::Point3;
use log::info;

use crate::core::{Result, StreamError};
use crate::engine_state::config::StreamingConfig;
use crate::engine_state::lighting::LightProvider;
use crate::engine_state::rendering::meshing::MeshBuilderPool;
use crate::engine_state::voxels::chunk::{Chunk, ChunkId};
use crate::engine_state::voxels::world::WorldGrid;

pub use load_queue::{LoadQueue, SharedLoadQueue};
pub use pending_uploads::{PendingMesh, PendingUploads};
pub use task::{MeshingTask, TaskOutcome};

/// State shared by the coordinator and every meshing worker.
pub struct StreamContext {
    /// Voxel data, read-only while streaming
    pub world: Arc<WorldGrid>,
    /// Illumination for lit faces
    pub lighting: Arc<dyn LightProvider>,
    /// Chunks waiting to be meshed
    pub queue: SharedLoadQueue,
    /// Mesh builders shared by all workers
    pub pool: MeshBuilderPool,
    /// Finished meshes not yet uploaded
    pub pending: PendingUploads,
    chunks: HashMap<ChunkId, Arc<Chunk>>,
    bottleneck_warning_iterations: u32,
}

impl StreamContext {
    /// Creates the shared state and one chunk per chunk position of the world.
    pub fn new(world: Arc<WorldGrid>, lighting: Arc<dyn LightProvider>, config: &StreamingConfig) -> Self {
        let counts = world.chunk_counts();
        let mut chunks = HashMap::with_capacity(counts.x * counts.y * counts.z);
        for z in 0..counts.z as i32 {
            for y in 0..counts.y as i32 {
                for x in 0..counts.x as i32 {
                    let id = Point3::new(x, y, z);
                    chunks.insert(id, Arc::new(Chunk::new(id)));
                }
            }
        }

        StreamContext {
            world,
            lighting,
            queue: SharedLoadQueue::new(config.load_queue_capacity),
            pool: MeshBuilderPool::new(config.mesh_builder_count()),
            pending: PendingUploads::new(),
            chunks,
            bottleneck_warning_iterations: config.bottleneck_warning_iterations,
        }
    }

    /// The chunk at `id`, if it lies inside the world.
    pub fn chunk(&self, id: &ChunkId) -> Option<&Arc<Chunk>> {
        self.chunks.get(id)
    }

    /// Every chunk of the world.
    pub fn chunks(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.chunks.values()
    }
}

/// A fixed set of threads meshing chunks from the shared load queue.
///
/// # Implementation Notes
/// - Threads are named `chunk-mesh-{n}`
/// - A failed or panicking iteration is logged and the worker carries on
/// - Dropping the pool shuts it down
pub struct MeshingWorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    ctx: Arc<StreamContext>,
}

impl MeshingWorkerPool {
    /// Starts `config.worker_threads` meshing threads.
    ///
    /// # Errors
    /// [`StreamError::WorkerSpawn`] if a thread could not be created. Threads started
    /// before the failure are stopped again.
    pub fn start(ctx: Arc<StreamContext>, config: &StreamingConfig) -> Result<Self> {
        let mut pool = MeshingWorkerPool {
            workers: Vec::with_capacity(config.worker_threads),
            shutdown: Arc::new(AtomicBool::new(false)),
            ctx,
        };
        let idle_sleep = Duration::from_millis(config.idle_sleep_ms);
        let contention_sleep = Duration::from_millis(config.contention_sleep_ms);

        for n in 0..config.worker_threads {
            let mut task = MeshingTask::new(Arc::clone(&pool.ctx));
            let shutdown = Arc::clone(&pool.shutdown);
            let ctx = Arc::clone(&pool.ctx);
            let worker = thread::Builder::new()
                .name(format!("chunk-mesh-{n}"))
                .spawn(move || {
                    while !shutdown.load(Ordering::Acquire) {
                        match task.process() {
                            TaskOutcome::Idle => {
                                ctx.queue.wait_for_work(idle_sleep);
                            }
                            TaskOutcome::Contended => thread::sleep(contention_sleep),
                            _ => {}
                        }
                    }
                })
                .map_err(StreamError::WorkerSpawn)?;
            pool.workers.push(worker);
        }

        info!("Started {} chunk meshing threads", pool.workers.len());
        Ok(pool)
    }

    /// Number of running threads.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool runs no threads.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Stops and joins every thread. Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shutdown.store(true, Ordering::Release);
        self.ctx.queue.notify_all();
        let count = self.workers.len();
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("chunk-mesh").to_owned();
            if worker.join().is_err() {
                log::error!("Meshing thread {name} exited with a panic");
            }
        }
        info!("Stopped {count} chunk meshing threads");
    }
}

impl Drop for MeshingWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
