//! # Chunk Stream Coordinator
//!
//! Decides every frame which chunks are meshed, at which detail level, and uploads and
//! draws the results. It runs on the render thread and never waits for meshing.
//!
//! ## Frame Steps
//! 1. Cull the chunk tree against the view frustum
//! 2. Evict chunks that left the view, dropping their meshes and queued work
//! 3. Queue newly visible chunks at the coarsest level, in shuffled order
//! 4. Requeue meshed chunks whose preferred level changed with camera distance
//! 5. Upload finished meshes
//! 6. Draw every visible chunk that has a mesh

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cgmath::MetricSpace;
use log::{debug, info, warn};

use crate::core::{Result, StreamError};
use crate::engine_state::camera_state::ViewSource;
use crate::engine_state::config::{DetailLevelBands, StreamingConfig};
use crate::engine_state::lighting::LightProvider;
use crate::engine_state::rendering::{GpuBackend, RenderStats, SpatialCullTree};
use crate::engine_state::task_management::{MeshingTask, MeshingWorkerPool, StreamContext, TaskOutcome};
use crate::engine_state::voxels::chunk::ChunkId;
use crate::engine_state::voxels::world::WorldGrid;

/// Streams chunk meshes of a world into a [`GpuBackend`] as a view moves around.
///
/// With `worker_threads == 0` no threads are started and queued chunks are meshed on the
/// calling thread during [`ChunkStreamCoordinator::stream_frame`].
pub struct ChunkStreamCoordinator<B: GpuBackend> {
    ctx: Arc<StreamContext>,
    cull_tree: SpatialCullTree,
    loaded: HashSet<ChunkId>,
    meshes: HashMap<ChunkId, B::Handle>,
    bands: DetailLevelBands,
    workers: MeshingWorkerPool,
    inline_task: MeshingTask,
    backend: B,
    rng: fastrand::Rng,
    is_shut_down: bool,
}

impl<B: GpuBackend> ChunkStreamCoordinator<B> {
    /// Creates a coordinator and starts its meshing threads.
    ///
    /// # Errors
    /// [`StreamError::InvalidConfig`] for unusable settings and
    /// [`StreamError::WorkerSpawn`] if a thread could not be started.
    pub fn new(
        world: Arc<WorldGrid>,
        lighting: Arc<dyn LightProvider>,
        backend: B,
        config: &StreamingConfig,
    ) -> Result<Self> {
        config.validate()?;
        let cull_tree = SpatialCullTree::new(world.chunk_counts());
        let ctx = Arc::new(StreamContext::new(world, lighting, config));
        let workers = MeshingWorkerPool::start(Arc::clone(&ctx), config)?;

        info!(
            "Chunk streaming over {} chunks with {} builders, {} meshing threads",
            cull_tree.leaf_count(),
            ctx.pool.len(),
            workers.len()
        );
        Ok(ChunkStreamCoordinator {
            inline_task: MeshingTask::new(Arc::clone(&ctx)),
            ctx,
            cull_tree,
            loaded: HashSet::new(),
            meshes: HashMap::new(),
            bands: config.detail_bands(),
            workers,
            backend,
            rng: fastrand::Rng::with_seed(config.rng_seed),
            is_shut_down: false,
        })
    }

    /// Runs one frame of streaming and draws what is ready.
    pub fn stream_frame(&mut self, view: &impl ViewSource) -> RenderStats {
        if self.is_shut_down {
            return RenderStats::default();
        }
        let visible: HashSet<ChunkId> = self.cull_tree.collect_visible(&view.frustum()).into_iter().collect();

        let evicted: Vec<ChunkId> = self.loaded.difference(&visible).copied().collect();
        for id in &evicted {
            self.unload(id);
        }

        let enqueued = self.load_new_chunks(&visible);
        let releveled = self.requeue_changed_levels(view);
        if self.workers.is_empty() {
            self.mesh_queued_inline();
        }
        let uploaded = self.finalize_uploads();

        debug!(
            "Frame: {} visible, {} evicted, {} queued, {} requeued, {} uploaded",
            visible.len(),
            evicted.len(),
            enqueued,
            releveled,
            uploaded
        );
        self.draw_loaded()
    }

    /// Uploads every finished mesh, replacing the chunk's previous one.
    ///
    /// Meshes of evicted chunks, meshes older than the installed one and meshes built for
    /// a level the chunk no longer wants are dropped.
    ///
    /// # Returns
    /// The number of meshes uploaded.
    pub fn finalize_uploads(&mut self) -> usize {
        let mut uploaded = 0;
        for pending in self.ctx.pending.drain() {
            let id = pending.chunk.position();
            let mut state = pending.chunk.lock();
            if state.deleted
                || !self.loaded.contains(&id)
                || pending.generation <= state.mesh_generation
                || state.target_level != Some(pending.level)
            {
                continue;
            }

            let handle = {
                let builder = pending.lease.builder();
                self.backend
                    .upload_mesh(builder.vertices(), builder.colors(), Some(builder.indices()))
            };
            if let Some(previous) = self.meshes.insert(id, handle) {
                self.backend.dispose(previous);
            }
            state.has_mesh = true;
            state.loaded_level = Some(pending.level);
            state.counts = pending.counts;
            state.mesh_generation = pending.generation;
            uploaded += 1;
        }
        uploaded
    }

    /// Meshes every queued chunk on the calling thread.
    ///
    /// # Returns
    /// The number of chunks taken off the queue.
    pub fn mesh_queued_inline(&mut self) -> usize {
        let mut processed = 0;
        loop {
            match self.inline_task.process() {
                TaskOutcome::Idle => break,
                TaskOutcome::Contended => {
                    self.finalize_uploads();
                    if self.ctx.pool.available() == 0 {
                        break;
                    }
                }
                _ => processed += 1,
            }
        }
        processed
    }

    /// Queues every loaded chunk again at its preferred level, forcing a rebuild.
    ///
    /// # Returns
    /// The number of chunks queued.
    pub fn reload_all_chunks(&mut self, view: &impl ViewSource) -> usize {
        let eye = view.position();
        let mut queued = 0;
        let mut ids: Vec<ChunkId> = self.loaded.iter().copied().collect();
        sort_chunk_ids(&mut ids);
        for id in ids {
            let Some(chunk) = self.ctx.chunk(&id) else {
                continue;
            };
            let level = self.bands.level_for_distance(eye.distance(chunk.center()));
            let previous = chunk.lock().target_level.replace(level);
            match self.ctx.queue.enqueue(id, level) {
                Ok(()) => queued += 1,
                Err(err) => {
                    chunk.lock().target_level = previous;
                    warn!("Reload of chunk {id:?} deferred: {err}");
                }
            }
        }
        info!("Reloading {queued} chunks");
        queued
    }

    /// Stops the meshing threads and frees every mesh. Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if self.is_shut_down {
            return;
        }
        self.workers.shutdown();
        self.ctx.queue.clear();
        self.ctx.pending.clear();
        for (_, handle) in self.meshes.drain() {
            self.backend.dispose(handle);
        }
        for id in self.loaded.drain() {
            if let Some(chunk) = self.ctx.chunk(&id) {
                chunk.mark_deleted();
            }
        }
        self.is_shut_down = true;
        info!("Chunk streaming shut down");
    }

    /// Chunks currently in view.
    pub fn loaded_chunk_count(&self) -> usize {
        self.loaded.len()
    }

    /// Chunks waiting to be meshed.
    pub fn queued_chunk_count(&self) -> usize {
        self.ctx.queue.len()
    }

    /// Detail level of a chunk's installed mesh.
    pub fn chunk_level(&self, id: &ChunkId) -> Option<u8> {
        self.ctx.chunk(id).and_then(|chunk| chunk.loaded_level())
    }

    /// The shared streaming state.
    pub fn context(&self) -> &Arc<StreamContext> {
        &self.ctx
    }

    /// The backend meshes are uploaded to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn unload(&mut self, id: &ChunkId) {
        self.loaded.remove(id);
        self.ctx.queue.remove(id);
        self.ctx.pending.discard(id);
        if let Some(chunk) = self.ctx.chunk(id) {
            chunk.mark_deleted();
        }
        if let Some(handle) = self.meshes.remove(id) {
            self.backend.dispose(handle);
        }
    }

    fn load_new_chunks(&mut self, visible: &HashSet<ChunkId>) -> usize {
        let mut fresh: Vec<ChunkId> = visible.difference(&self.loaded).copied().collect();
        sort_chunk_ids(&mut fresh);
        self.rng.shuffle(&mut fresh);

        let level = self.bands.worst_level();
        let mut enqueued = 0;
        let mut deferred = 0;
        for id in fresh {
            let Some(chunk) = self.ctx.chunk(&id) else {
                continue;
            };
            chunk.prepare_for_load(level);
            match self.ctx.queue.enqueue(id, level) {
                Ok(()) => {
                    self.loaded.insert(id);
                    enqueued += 1;
                }
                Err(StreamError::QueueFull { .. }) => {
                    chunk.mark_deleted();
                    deferred += 1;
                }
                Err(err) => {
                    chunk.mark_deleted();
                    warn!("Could not queue chunk {id:?}: {err}");
                }
            }
        }
        if deferred > 0 {
            warn!("Load queue full, {deferred} chunks deferred to the next frame");
        }
        enqueued
    }

    fn requeue_changed_levels(&mut self, view: &impl ViewSource) -> usize {
        let eye = view.position();
        let mut requeued = 0;
        for id in &self.loaded {
            let Some(chunk) = self.ctx.chunk(id) else {
                continue;
            };
            let preferred = self.bands.level_for_distance(eye.distance(chunk.center()));
            let (previous, installed) = {
                let mut state = chunk.lock();
                if !state.has_mesh || state.target_level == Some(preferred) {
                    continue;
                }
                (state.target_level.replace(preferred), state.loaded_level == Some(preferred))
            };
            if installed {
                // the installed mesh is wanted again, drop the queued rebuild
                self.ctx.queue.remove(id);
                continue;
            }
            match self.ctx.queue.enqueue(*id, preferred) {
                Ok(()) => requeued += 1,
                Err(_) => chunk.lock().target_level = previous,
            }
        }
        requeued
    }

    fn draw_loaded(&mut self) -> RenderStats {
        let mut stats = RenderStats::default();
        for (id, handle) in &self.meshes {
            let Some(chunk) = self.ctx.chunk(id) else {
                continue;
            };
            let counts = chunk.lock().counts;
            self.backend.draw(handle, chunk.translation());
            stats += RenderStats {
                draw_count: 1,
                voxel_count: counts.voxel_count as u64,
                rendered_voxel_count: counts.rendered_voxel_count as u64,
                triangle_count: counts.triangle_count as u64,
            };
        }
        stats
    }
}

impl<B: GpuBackend> Drop for ChunkStreamCoordinator<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sort_chunk_ids(ids: &mut [ChunkId]) {
    ids.sort_unstable_by_key(|c| (c.x, c.y, c.z));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::camera_state::FixedView;
    use crate::engine_state::lighting::FullBright;
    use crate::engine_state::rendering::RecordingBackend;
    use crate::engine_state::rendering::meshing::MeshCounts;
    use crate::engine_state::task_management::PendingMesh;
    use crate::engine_state::voxels::block::block_table::BlockTable;
    use crate::engine_state::voxels::block::{voxel_rgba, Voxel, VoxelBlock, EMPTY_VOXEL};
    use crate::engine_state::voxels::chunk::CHUNK_VOXEL_SIZE;
    use cgmath::{Point3, Vector3};
    use std::time::Duration;
    use web_time::Instant;

    const STONE: Voxel = voxel_rgba(100, 100, 100, 255);

    fn notched_world() -> Arc<WorldGrid> {
        let mut table = BlockTable::new();
        let notched = table
            .add(VoxelBlock::from_fn("notched", |x, y, z| {
                if (x, y, z) == (0, 0, 0) {
                    EMPTY_VOXEL
                } else {
                    STONE
                }
            }))
            .unwrap();
        let mut world = WorldGrid::new(Vector3::new(8, 8, 8), table);
        world.set(1, 1, 1, notched).unwrap();
        Arc::new(world)
    }

    fn inline_config(distances: Vec<f32>) -> StreamingConfig {
        StreamingConfig {
            worker_threads: 0,
            detail_level_distances: distances,
            ..StreamingConfig::default()
        }
    }

    fn whole_world(position: Point3<f32>) -> FixedView {
        let size = 2.0 * CHUNK_VOXEL_SIZE as f32;
        FixedView::of_box(Point3::new(0.0, 0.0, 0.0), Point3::new(size, size, size), position)
    }

    fn nothing_visible() -> FixedView {
        FixedView::of_box(
            Point3::new(-500.0, -500.0, -500.0),
            Point3::new(-400.0, -400.0, -400.0),
            Point3::new(-450.0, -450.0, -450.0),
        )
    }

    fn coordinator(config: &StreamingConfig) -> ChunkStreamCoordinator<RecordingBackend> {
        ChunkStreamCoordinator::new(notched_world(), Arc::new(FullBright), RecordingBackend::new(), config).unwrap()
    }

    #[test]
    fn notched_block_scenario() {
        let mut streamer = coordinator(&inline_config(vec![1000.0]));
        let stats = streamer.stream_frame(&whole_world(Point3::new(32.0, 32.0, 32.0)));

        assert_eq!(streamer.loaded_chunk_count(), 8);
        assert_eq!(streamer.queued_chunk_count(), 0);
        assert_eq!(
            stats,
            RenderStats {
                draw_count: 1,
                voxel_count: 4095,
                rendered_voxel_count: 1351,
                triangle_count: 3072,
            }
        );
        assert_eq!(streamer.chunk_level(&Point3::new(0, 0, 0)), Some(0));
        // empty chunks remember their level without a mesh
        assert_eq!(streamer.chunk_level(&Point3::new(1, 1, 1)), Some(0));
        assert_eq!(streamer.backend().uploads, 1);

        let again = streamer.stream_frame(&whole_world(Point3::new(32.0, 32.0, 32.0)));
        assert_eq!(again, stats);
        assert_eq!(streamer.backend().uploads, 1);
    }

    #[test]
    fn leaving_the_view_frees_meshes() {
        let mut streamer = coordinator(&inline_config(vec![1000.0]));
        streamer.stream_frame(&whole_world(Point3::new(32.0, 32.0, 32.0)));
        assert_eq!(streamer.backend().live_meshes(), 1);

        let stats = streamer.stream_frame(&nothing_visible());
        assert_eq!(stats, RenderStats::default());
        assert_eq!(streamer.loaded_chunk_count(), 0);
        assert_eq!(streamer.backend().live_meshes(), 0);
        assert_eq!(streamer.backend().disposals, 1);
        assert_eq!(streamer.chunk_level(&Point3::new(0, 0, 0)), None);

        streamer.stream_frame(&whole_world(Point3::new(32.0, 32.0, 32.0)));
        assert_eq!(streamer.backend().live_meshes(), 1);
    }

    #[test]
    fn coarse_first_then_refined_when_close() {
        let mut streamer = coordinator(&inline_config(vec![100.0, 100.0, 100.0]));
        let id = Point3::new(0, 0, 0);

        let far = streamer.stream_frame(&whole_world(Point3::new(5000.0, 32.0, 32.0)));
        assert_eq!(streamer.chunk_level(&id), Some(2));
        assert!(far.triangle_count < 3072);

        let near = streamer.stream_frame(&whole_world(Point3::new(32.0, 32.0, 40.0)));
        assert_eq!(streamer.chunk_level(&id), Some(0));
        assert_eq!(near.triangle_count, 3072);
        assert_eq!(streamer.backend().uploads, 2);
        assert_eq!(streamer.backend().disposals, 1);

        streamer.stream_frame(&whole_world(Point3::new(32.0, 32.0, 40.0)));
        assert_eq!(streamer.backend().uploads, 2);
    }

    #[test]
    fn returning_to_the_installed_level_cancels_the_queued_rebuild() {
        let mut streamer = coordinator(&inline_config(vec![100.0, 100.0, 100.0]));
        let id = Point3::new(0, 0, 0);
        let far = whole_world(Point3::new(5000.0, 32.0, 32.0));
        let near = whole_world(Point3::new(32.0, 32.0, 40.0));

        streamer.stream_frame(&far);
        assert_eq!(streamer.chunk_level(&id), Some(2));
        assert_eq!(streamer.backend().uploads, 1);

        let leases: Vec<_> = std::iter::from_fn(|| streamer.context().pool.acquire()).collect();
        assert!(!leases.is_empty());
        streamer.stream_frame(&near);
        assert!(streamer.context().queue.contains(&id, 0));

        streamer.stream_frame(&far);
        assert_eq!(streamer.queued_chunk_count(), 0);
        drop(leases);

        for _ in 0..3 {
            streamer.stream_frame(&far);
        }
        assert_eq!(streamer.chunk_level(&id), Some(2));
        assert_eq!(streamer.backend().uploads, 1);
    }

    #[test]
    fn meshes_for_an_abandoned_level_are_not_uploaded() {
        let mut streamer = coordinator(&inline_config(vec![100.0, 100.0, 100.0]));
        let id = Point3::new(0, 0, 0);
        streamer.stream_frame(&whole_world(Point3::new(5000.0, 32.0, 32.0)));
        assert_eq!(streamer.chunk_level(&id), Some(2));

        let ctx = Arc::clone(streamer.context());
        let chunk = Arc::clone(ctx.chunk(&id).unwrap());
        let generation = chunk.begin_build().unwrap();
        let lease = ctx.pool.acquire().unwrap();
        ctx.pending.submit(PendingMesh {
            chunk,
            level: 0,
            generation,
            counts: MeshCounts::default(),
            lease,
        });

        assert_eq!(streamer.finalize_uploads(), 0);
        assert_eq!(streamer.chunk_level(&id), Some(2));
        assert_eq!(streamer.backend().uploads, 1);
        assert_eq!(ctx.pool.available(), ctx.pool.len());
    }

    #[test]
    fn full_queue_defers_chunks_to_later_frames() {
        let config = StreamingConfig {
            load_queue_capacity: 1,
            ..inline_config(vec![1000.0])
        };
        let mut streamer = coordinator(&config);
        let view = whole_world(Point3::new(32.0, 32.0, 32.0));

        streamer.stream_frame(&view);
        assert_eq!(streamer.loaded_chunk_count(), 1);
        for _ in 0..7 {
            streamer.stream_frame(&view);
        }
        assert_eq!(streamer.loaded_chunk_count(), 8);
        assert_eq!(streamer.stream_frame(&view).triangle_count, 3072);
    }

    #[test]
    fn reload_rebuilds_loaded_chunks() {
        let mut streamer = coordinator(&inline_config(vec![1000.0]));
        let view = whole_world(Point3::new(32.0, 32.0, 32.0));
        streamer.stream_frame(&view);

        assert_eq!(streamer.reload_all_chunks(&view), 8);
        streamer.stream_frame(&view);
        assert_eq!(streamer.backend().uploads, 2);
        assert_eq!(streamer.backend().live_meshes(), 1);
    }

    #[test]
    fn background_workers_stream_and_shut_down() {
        let config = StreamingConfig {
            worker_threads: 2,
            idle_sleep_ms: 1,
            detail_level_distances: vec![1000.0],
            ..StreamingConfig::default()
        };
        let mut streamer = coordinator(&config);
        let view = whole_world(Point3::new(32.0, 32.0, 32.0));

        let start = Instant::now();
        let mut stats = streamer.stream_frame(&view);
        while stats.draw_count == 0 && start.elapsed() < Duration::from_secs(10) {
            std::thread::sleep(Duration::from_millis(2));
            stats = streamer.stream_frame(&view);
        }
        assert_eq!(stats.triangle_count, 3072);

        streamer.shutdown();
        streamer.shutdown();
        assert_eq!(streamer.backend().live_meshes(), 0);
        assert_eq!(streamer.stream_frame(&view), RenderStats::default());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = inline_config(Vec::new());
        let result =
            ChunkStreamCoordinator::new(notched_world(), Arc::new(FullBright), RecordingBackend::new(), &config);
        assert!(matches!(result, Err(StreamError::InvalidConfig(_))));
    }
}
