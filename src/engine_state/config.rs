//! # Streaming Configuration
//!
//! Tunables for chunk streaming, meshing workers and static lighting. Settings are plain
//! serde structs so they can be read from JSON. Missing fields take their defaults.
//!
//! ## Detail Levels
//!
//! Detail level `L` samples one cell every `1 << L` voxels along each axis. Level 0 is full
//! detail. [`DetailLevelBands`] maps a camera distance to a level by walking consecutive
//! distance bands.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Result, StreamError};
use crate::engine_state::lighting::{LightColor, LightingModel};
use crate::engine_state::voxels::block::BLOCK_VOXEL_SHIFT;

/// Settings for a [`ChunkStreamCoordinator`](crate::engine_state::coordinator::ChunkStreamCoordinator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Width of each detail band, finest level first.
    pub detail_level_distances: Vec<f32>,
    /// Background meshing threads. `0` meshes only on demand on the calling thread.
    pub worker_threads: usize,
    /// Mesh builders allocated per worker thread.
    pub mesh_builders_per_worker: usize,
    /// Preallocated load queue entries.
    pub load_queue_capacity: usize,
    /// How long an idle worker waits for new work, in milliseconds.
    pub idle_sleep_ms: u64,
    /// How long a worker backs off when every builder is busy, in milliseconds.
    pub contention_sleep_ms: u64,
    /// Consecutive contended iterations before a bottleneck warning.
    pub bottleneck_warning_iterations: u32,
    /// Seed of the coordinator's random number generator.
    pub rng_seed: u64,
    /// Attenuation model for static lights.
    pub lighting_model: LightingModel,
    /// Lights kept per block by the static light provider.
    pub lights_per_block: usize,
    /// Ambient light added to every lit face.
    pub ambient_light: [f32; 3],
}

impl Default for StreamingConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism().map_or(2, |n| n.get());
        StreamingConfig {
            detail_level_distances: vec![350.0, 500.0, 750.0, 1000.0],
            worker_threads: parallelism.saturating_sub(1).max(1),
            mesh_builders_per_worker: 3,
            load_queue_capacity: 5000,
            idle_sleep_ms: 5,
            contention_sleep_ms: 1,
            bottleneck_warning_iterations: 200,
            rng_seed: 0x5EED,
            lighting_model: LightingModel::Realistic,
            lights_per_block: 10,
            ambient_light: [0.1, 0.1, 0.1],
        }
    }
}

impl StreamingConfig {
    /// Parses and validates settings from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: StreamingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded streaming configuration from {}", path.display());
        Ok(config)
    }

    /// Checks that the settings describe a usable engine.
    pub fn validate(&self) -> Result<()> {
        if self.detail_level_distances.is_empty() {
            return Err(StreamError::InvalidConfig("detail_level_distances is empty".into()));
        }
        if let Some(bad) = self
            .detail_level_distances
            .iter()
            .find(|d| !d.is_finite() || **d <= 0.0)
        {
            return Err(StreamError::InvalidConfig(format!(
                "detail level distance {bad} must be positive and finite"
            )));
        }
        if self.mesh_builders_per_worker == 0 {
            return Err(StreamError::InvalidConfig("mesh_builders_per_worker must be at least 1".into()));
        }
        if self.load_queue_capacity == 0 {
            return Err(StreamError::InvalidConfig("load_queue_capacity must be at least 1".into()));
        }
        if self.bottleneck_warning_iterations == 0 {
            return Err(StreamError::InvalidConfig(
                "bottleneck_warning_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Number of mesh builders in the shared pool.
    pub fn mesh_builder_count(&self) -> usize {
        self.worker_threads.max(1) * self.mesh_builders_per_worker
    }

    /// Detail bands built from `detail_level_distances`.
    pub fn detail_bands(&self) -> DetailLevelBands {
        DetailLevelBands::new(self.detail_level_distances.clone())
    }

    /// Ambient light as a colour.
    pub fn ambient(&self) -> LightColor {
        self.ambient_light.into()
    }
}

/// User-facing presets for how far detail extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailDistance {
    /// 300 voxels per band
    Closest,
    /// 500 voxels per band
    Close,
    /// 650 voxels per band
    Mid,
    /// 850 voxels per band
    Far,
    /// 1000 voxels per band
    Furthest,
}

impl DetailDistance {
    /// Width of every band for this preset.
    pub fn band_width(self) -> f32 {
        match self {
            DetailDistance::Closest => 300.0,
            DetailDistance::Close => 500.0,
            DetailDistance::Mid => 650.0,
            DetailDistance::Far => 850.0,
            DetailDistance::Furthest => 1000.0,
        }
    }

    /// Uniform bands for `levels` detail levels.
    pub fn bands(self, levels: usize) -> Vec<f32> {
        vec![self.band_width(); levels.max(1)]
    }
}

/// Maps camera distance to a detail level.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailLevelBands {
    distances: Vec<f32>,
}

impl DetailLevelBands {
    /// Creates bands from their widths, finest level first.
    pub fn new(distances: Vec<f32>) -> Self {
        DetailLevelBands { distances }
    }

    /// Coarsest level these bands produce.
    ///
    /// Clamped so a sampled cell never exceeds one block.
    pub fn worst_level(&self) -> u8 {
        let levels = self.distances.len().saturating_sub(1);
        levels.min(BLOCK_VOXEL_SHIFT as usize) as u8
    }

    /// Detail level preferred at a distance.
    ///
    /// Each band's width is subtracted in turn until the remaining distance fits a band.
    /// Distances beyond every band clamp to [`DetailLevelBands::worst_level`].
    pub fn level_for_distance(&self, distance: f32) -> u8 {
        let worst = self.worst_level();
        let mut remaining = distance.max(0.0);
        for (level, &band) in self.distances.iter().enumerate() {
            if remaining <= band {
                return (level as u8).min(worst);
            }
            remaining -= band;
        }
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = StreamingConfig::default();
        config.validate().unwrap();
        assert!(config.worker_threads >= 1);
        assert_eq!(config.mesh_builder_count(), config.worker_threads * 3);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = StreamingConfig::from_json_str(
            r#"{ "worker_threads": 2, "lighting_model": "BrightRealistic", "detail_level_distances": [100, 200] }"#,
        )
        .unwrap();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.lighting_model, LightingModel::BrightRealistic);
        assert_eq!(config.detail_level_distances, vec![100.0, 200.0]);
        assert_eq!(config.load_queue_capacity, 5000);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(matches!(
            StreamingConfig::from_json_str(r#"{ "detail_level_distances": [] }"#),
            Err(StreamError::InvalidConfig(_))
        ));
        assert!(matches!(
            StreamingConfig::from_json_str(r#"{ "detail_level_distances": [100, -5] }"#),
            Err(StreamError::InvalidConfig(_))
        ));
        assert!(matches!(
            StreamingConfig::from_json_str(r#"{ "mesh_builders_per_worker": 0 }"#),
            Err(StreamError::InvalidConfig(_))
        ));
        assert!(matches!(
            StreamingConfig::from_json_str("{ not json"),
            Err(StreamError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = StreamingConfig::from_json_file("/definitely/not/here/streaming.json");
        assert!(matches!(result, Err(StreamError::Io(_))));
    }

    #[test]
    fn level_for_distance_walks_bands() {
        let bands = DetailLevelBands::new(vec![350.0, 500.0, 750.0, 1000.0]);
        assert_eq!(bands.worst_level(), 3);
        assert_eq!(bands.level_for_distance(0.0), 0);
        assert_eq!(bands.level_for_distance(300.0), 0);
        assert_eq!(bands.level_for_distance(350.0), 0);
        assert_eq!(bands.level_for_distance(400.0), 1);
        assert_eq!(bands.level_for_distance(1000.0), 2);
        assert_eq!(bands.level_for_distance(2000.0), 3);
        assert_eq!(bands.level_for_distance(1.0e9), 3);
    }

    #[test]
    fn worst_level_never_exceeds_block_size() {
        let bands = DetailLevelBands::new(DetailDistance::Closest.bands(9));
        assert_eq!(bands.worst_level(), BLOCK_VOXEL_SHIFT as u8);
        assert_eq!(bands.level_for_distance(300.0 * 7.5), BLOCK_VOXEL_SHIFT as u8);
    }

    #[test]
    fn presets_have_increasing_reach() {
        let presets = [
            DetailDistance::Closest,
            DetailDistance::Close,
            DetailDistance::Mid,
            DetailDistance::Far,
            DetailDistance::Furthest,
        ];
        assert!(presets.windows(2).all(|w| w[0].band_width() < w[1].band_width()));
        assert_eq!(DetailDistance::Mid.bands(3), vec![650.0; 3]);
    }
}
