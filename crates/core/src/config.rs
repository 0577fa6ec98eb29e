//! Engine-level tunables with documented clamping
//!
//! Configuration violations are never fatal: each out-of-range value is
//! clamped to the nearest valid value and a warning is emitted, so a bad
//! config degrades the simulation instead of aborting it.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Cloud field engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Side length of one fractal generation tile in pixels. Must be a power
    /// of two (the midpoint-displacement recursion works on 2^k+1 sub-grids).
    pub tile_size: usize,

    /// Ground distance covered by one pattern pixel (m).
    pub ground_resolution_m: f64,

    /// Maximum attenuation a fully opaque cloud applies to direct irradiance,
    /// in [0, 1].
    pub cloud_opacity: f64,

    /// Multiplier applied to measured wind speed before advection. Cloud
    /// layers move faster than surface wind.
    pub cloud_speed_factor: f64,

    /// Number of stochastic shading layers used to grade the binary mask
    /// into continuous opacity.
    pub cloud_num_layers: u32,

    /// Shading depth divisor. Must be at least `cloud_num_layers`, otherwise
    /// the deepest layer threshold would go negative.
    pub cloud_alpha: f64,

    /// Clear-sky aerosol transmissivity factor, in [0, 1].
    pub cloud_aerosol_transmissivity: f64,

    /// Random seed for reproducible fields.
    pub seed: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            tile_size: 512,
            ground_resolution_m: 30.0,
            cloud_opacity: 1.0,
            cloud_speed_factor: 1.0,
            cloud_num_layers: 8,
            cloud_alpha: 40.0,
            cloud_aerosol_transmissivity: 0.95,
            seed: 0,
        }
    }
}

impl CloudConfig {
    /// Clamp every field to its valid range, warning about each violation.
    ///
    /// Always succeeds; the returned config is safe to build an engine from.
    pub fn validated(mut self) -> Self {
        if !self.tile_size.is_power_of_two() || self.tile_size < 4 {
            let fixed = self.tile_size.max(4).next_power_of_two();
            warn!(
                tile_size = self.tile_size,
                fixed, "tile_size must be a power of two >= 4; rounding up"
            );
            self.tile_size = fixed;
        }
        if !self.ground_resolution_m.is_finite() || self.ground_resolution_m <= 0.0 {
            warn!(
                ground_resolution_m = self.ground_resolution_m,
                "ground resolution must be positive; resetting to 30 m/pixel"
            );
            self.ground_resolution_m = 30.0;
        }
        if !(0.0..=1.0).contains(&self.cloud_opacity) {
            let fixed = self.cloud_opacity.clamp(0.0, 1.0);
            warn!(
                cloud_opacity = self.cloud_opacity,
                fixed, "cloud_opacity out of [0, 1]; clamping"
            );
            self.cloud_opacity = fixed;
        }
        if self.cloud_speed_factor < 0.0 {
            warn!(
                cloud_speed_factor = self.cloud_speed_factor,
                "negative cloud_speed_factor; resetting to 1.0"
            );
            self.cloud_speed_factor = 1.0;
        }
        if self.cloud_num_layers == 0 {
            warn!("cloud_num_layers must be at least 1; raising");
            self.cloud_num_layers = 1;
        }
        if self.cloud_alpha < f64::from(self.cloud_num_layers) {
            warn!(
                cloud_alpha = self.cloud_alpha,
                cloud_num_layers = self.cloud_num_layers,
                "cloud_alpha below cloud_num_layers; raising to match"
            );
            self.cloud_alpha = f64::from(self.cloud_num_layers);
        }
        if !(0.0..=1.0).contains(&self.cloud_aerosol_transmissivity) {
            warn!(
                cloud_aerosol_transmissivity = self.cloud_aerosol_transmissivity,
                "aerosol transmissivity out of [0, 1]; resetting to 0.9"
            );
            self.cloud_aerosol_transmissivity = 0.9;
        }
        self
    }

    /// Number of cells along one side of a tile sub-grid (`tile_size + 1`).
    pub fn tile_cells(&self) -> usize {
        self.tile_size + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_already_valid() {
        let config = CloudConfig::default();
        assert_eq!(config.clone().validated(), config);
    }

    #[test]
    fn test_opacity_clamped() {
        let config = CloudConfig {
            cloud_opacity: 1.7,
            ..CloudConfig::default()
        }
        .validated();
        assert_eq!(config.cloud_opacity, 1.0);

        let config = CloudConfig {
            cloud_opacity: -0.2,
            ..CloudConfig::default()
        }
        .validated();
        assert_eq!(config.cloud_opacity, 0.0);
    }

    #[test]
    fn test_negative_speed_factor_reset() {
        let config = CloudConfig {
            cloud_speed_factor: -2.0,
            ..CloudConfig::default()
        }
        .validated();
        assert_eq!(config.cloud_speed_factor, 1.0);
    }

    #[test]
    fn test_alpha_raised_to_layer_count() {
        let config = CloudConfig {
            cloud_num_layers: 16,
            cloud_alpha: 5.0,
            ..CloudConfig::default()
        }
        .validated();
        assert_eq!(config.cloud_alpha, 16.0);
    }

    #[test]
    fn test_aerosol_transmissivity_reset() {
        let config = CloudConfig {
            cloud_aerosol_transmissivity: 1.3,
            ..CloudConfig::default()
        }
        .validated();
        assert_eq!(config.cloud_aerosol_transmissivity, 0.9);
    }

    #[test]
    fn test_tile_size_rounded_to_power_of_two() {
        let config = CloudConfig {
            tile_size: 500,
            ..CloudConfig::default()
        }
        .validated();
        assert_eq!(config.tile_size, 512);

        let config = CloudConfig {
            tile_size: 0,
            ..CloudConfig::default()
        }
        .validated();
        assert_eq!(config.tile_size, 4);
    }
}
