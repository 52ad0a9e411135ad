//! Attenuation curves for static point lights.

use serde::{Deserialize, Serialize};

use crate::engine_state::voxels::block::BLOCK_VOXEL_SIZE;

/// Fraction of a light left at the edge of its reach in the realistic models.
pub const MIN_REALISTIC_LIGHT_PERCENT: f32 = 0.004;

/// How light intensity falls off with distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightingModel {
    /// Inverse-square falloff reaching `MIN_REALISTIC_LIGHT_PERCENT` at the light's reach.
    #[default]
    Realistic,
    /// Inverse fourth-power falloff, brighter near the light and darker far away.
    BrightRealistic,
    /// Quadratic falloff reaching exactly zero at the light's reach.
    Fantasy1,
    /// Quintic falloff reaching exactly zero at the light's reach.
    Fantasy2,
}

impl LightingModel {
    /// Per-light constant that makes [`LightingModel::percentage`] cheap.
    ///
    /// # Arguments
    /// * `max_block_distance` - Reach of the light in blocks
    pub fn cache_calculation(self, max_block_distance: u16) -> f32 {
        let dist = (max_block_distance.max(1) as usize * BLOCK_VOXEL_SIZE) as f32;
        match self {
            LightingModel::Realistic => 1.0 / (dist * dist * MIN_REALISTIC_LIGHT_PERCENT),
            LightingModel::BrightRealistic => 1.0 / (dist * dist * dist * dist * MIN_REALISTIC_LIGHT_PERCENT),
            LightingModel::Fantasy1 | LightingModel::Fantasy2 => 1.0 / (dist * dist),
        }
    }

    /// Fraction of the light's colour that reaches a point.
    ///
    /// # Arguments
    /// * `dist_squared` - Squared distance in voxels
    /// * `cached` - Value from [`LightingModel::cache_calculation`]
    #[inline]
    pub fn percentage(self, dist_squared: f32, cached: f32) -> f32 {
        match self {
            LightingModel::Realistic => 1.0 / (1.0 + dist_squared * cached),
            LightingModel::BrightRealistic => 1.0 / (1.0 + dist_squared * dist_squared * cached),
            LightingModel::Fantasy1 => {
                let att = (1.0 - dist_squared * cached).max(0.0);
                att * att
            }
            LightingModel::Fantasy2 => {
                let att = (1.0 - dist_squared * cached).max(0.0);
                att * att * att * att * att
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [LightingModel; 4] = [
        LightingModel::Realistic,
        LightingModel::BrightRealistic,
        LightingModel::Fantasy1,
        LightingModel::Fantasy2,
    ];

    #[test]
    fn full_strength_at_the_light() {
        for model in ALL {
            let cached = model.cache_calculation(8);
            assert!((model.percentage(0.0, cached) - 1.0).abs() < 1e-6, "{model:?}");
        }
    }

    #[test]
    fn falloff_is_monotonic() {
        for model in ALL {
            let cached = model.cache_calculation(8);
            let mut previous = f32::MAX;
            for d in (0..200).step_by(10) {
                let pct = model.percentage((d * d) as f32, cached);
                assert!(pct <= previous, "{model:?} rose at {d}");
                previous = pct;
            }
        }
    }

    #[test]
    fn realistic_reaches_minimum_at_reach() {
        let model = LightingModel::Realistic;
        let reach = (4 * BLOCK_VOXEL_SIZE) as f32;
        let pct = model.percentage(reach * reach, model.cache_calculation(4));
        assert!((pct - 1.0 / (1.0 + 1.0 / MIN_REALISTIC_LIGHT_PERCENT)).abs() < 1e-6);
    }

    #[test]
    fn fantasy_models_cut_off_at_reach() {
        let reach = (4 * BLOCK_VOXEL_SIZE) as f32;
        for model in [LightingModel::Fantasy1, LightingModel::Fantasy2] {
            let cached = model.cache_calculation(4);
            assert_eq!(model.percentage(reach * reach, cached), 0.0);
            assert_eq!(model.percentage(4.0 * reach * reach, cached), 0.0);
        }
    }

    #[test]
    fn deserializes_from_variant_name() {
        let model: LightingModel = serde_json::from_str("\"Fantasy2\"").unwrap();
        assert_eq!(model, LightingModel::Fantasy2);
    }
}
