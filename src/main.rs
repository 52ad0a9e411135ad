//! # Voxel Stream Demo
//!
//! Streams a procedural world past a slowly turning camera and logs what each frame drew.
//! Nothing is rendered, the recording backend only counts uploads and draws.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [config.json]
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cgmath::{Deg, Vector3};
use log::{error, info};

use voxel_stream::engine_state::voxels::terrain::TerrainGenerator;
use voxel_stream::{
    init_logging, Camera, CameraState, ChunkStreamCoordinator, Projection, RecordingBackend, Result,
    StaticLightProvider, StreamingConfig,
};

/// Frames streamed before the demo exits.
const FRAME_COUNT: usize = 60;

/// World size in blocks.
const WORLD_BLOCKS: [usize; 3] = [96, 16, 96];

fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => StreamingConfig::from_json_file(path)?,
        None => StreamingConfig::default(),
    };

    let world = Arc::new(TerrainGenerator::new(config.rng_seed).generate(Vector3::from(WORLD_BLOCKS))?);
    let lighting = Arc::new(StaticLightProvider::new(
        Arc::clone(&world),
        config.lighting_model,
        config.lights_per_block,
        config.ambient(),
    ));

    let center = world.voxel_size().map(|v| v as f32 / 2.0);
    let mut view = CameraState::new(
        Camera::new((center.x, center.y + 64.0, center.z), Deg(0.0), Deg(-20.0)),
        Projection::new(1280, 720, Deg(70.0), 0.5, 2500.0),
    );
    let mut streamer = ChunkStreamCoordinator::new(world, lighting, RecordingBackend::new(), &config)?;

    for frame in 0..FRAME_COUNT {
        let stats = streamer.stream_frame(&view);
        info!(
            "Frame {frame}: {} draws, {} voxels, {} rendered, {} triangles, {} queued",
            stats.draw_count,
            stats.voxel_count,
            stats.rendered_voxel_count,
            stats.triangle_count,
            streamer.queued_chunk_count()
        );
        view.camera.rotate(Deg(6.0), Deg(0.0));
        thread::sleep(Duration::from_millis(16));
    }

    streamer.shutdown();
    let backend = streamer.backend();
    info!(
        "Uploaded {} meshes ({} bytes), issued {} draws, disposed {} meshes",
        backend.uploads, backend.bytes_uploaded, backend.draws, backend.disposals
    );
    Ok(())
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        error!("Demo failed: {err}");
        std::process::exit(1);
    }
}
