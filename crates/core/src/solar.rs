//! Solar attenuation: queried opacity to shaded irradiance
//!
//! Combines the cloud opacity at a point with clear-sky atmospheric
//! transmissivity, extraterrestrial direct-normal irradiance and the solar
//! zenith angle. Diffuse horizontal irradiance is computed by the
//! solar-geometry collaborator and passed through.

use serde::{Deserialize, Serialize};

/// Nominal turbidity wind factor `u` in the transmissivity formula.
pub const TURBIDITY_WIND_FACTOR: f64 = 1.0;

/// Zenith angle past which the sun is treated as fully set (degrees).
pub const SUNSET_ZENITH_DEG: f64 = 90.0;

/// Irradiance components at one point of interest (W/m²).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Irradiance {
    /// Direct-normal irradiance after cloud and atmospheric attenuation.
    pub direct: f64,
    /// Diffuse horizontal irradiance (from the non-cloud-model path).
    pub diffuse: f64,
    /// Global horizontal irradiance.
    pub global: f64,
}

/// Relative optical air mass for a zenith angle (radians).
pub fn air_mass(zenith_rad: f64) -> f64 {
    let cos_z = zenith_rad.cos();
    0.02857 * (1224.0 * cos_z * cos_z + 1.0).sqrt()
}

/// Clear-sky atmospheric transmissivity from station pressure (mbar), solar
/// zenith angle (radians) and the aerosol transmissivity factor.
///
/// Computed once per tick; the cloud opacity then scales it per point.
pub fn atmospheric_transmissivity(
    pressure_mbar: f64,
    zenith_rad: f64,
    aerosol_transmissivity: f64,
) -> f64 {
    let m = air_mass(zenith_rad);
    let clear = 1.041 - 0.15 * ((0.00949 * pressure_mbar + 0.051) / m).sqrt()
        - 0.077 * (TURBIDITY_WIND_FACTOR / m).powf(0.3);
    clear.max(0.0) * aerosol_transmissivity
}

/// Attenuate extraterrestrial irradiance through the cloud at one point.
///
/// `opacity` is the queried fuzzy (or binary) value in [0, 1];
/// `cloud_opacity` is the configured maximum attenuation scale; `etrn` is
/// the extraterrestrial direct-normal irradiance (W/m²).
pub fn shaded_irradiance(
    opacity: f64,
    cloud_opacity: f64,
    transmissivity: f64,
    etrn: f64,
    zenith_rad: f64,
    diffuse_horizontal: f64,
) -> Irradiance {
    // Fraction of sky the cloud leaves unobstructed
    let unobstructed = 1.0 - opacity * cloud_opacity;
    let direct = if zenith_rad.to_degrees() > SUNSET_ZENITH_DEG {
        0.0
    } else {
        unobstructed * transmissivity * etrn
    };
    let global = (direct * zenith_rad.cos().max(0.0) + diffuse_horizontal).max(0.0);
    Irradiance {
        direct,
        diffuse: diffuse_horizontal,
        global,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_air_mass_overhead() {
        // Sun at zenith: M = 0.02857 * sqrt(1225) = 0.99995
        assert_relative_eq!(air_mass(0.0), 0.02857 * 1225.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_air_mass_shrinks_toward_horizon() {
        assert!(air_mass(0.0) > air_mass(60.0_f64.to_radians()));
        assert!(air_mass(60.0_f64.to_radians()) > air_mass(89.0_f64.to_radians()));
    }

    #[test]
    fn test_transmissivity_scales_with_aerosol_factor() {
        let clear = atmospheric_transmissivity(1013.0, 0.3, 1.0);
        let hazy = atmospheric_transmissivity(1013.0, 0.3, 0.9);
        assert!(clear > 0.0);
        assert_relative_eq!(hazy, clear * 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_transmissivity_never_negative() {
        // Near the horizon the air mass collapses and the formula would go
        // negative without the floor
        let t = atmospheric_transmissivity(1013.0, 89.9_f64.to_radians(), 0.95);
        assert!(t >= 0.0);
    }

    #[test]
    fn test_clear_sky_passes_full_direct() {
        let t = atmospheric_transmissivity(1013.0, 0.2, 0.95);
        let irr = shaded_irradiance(0.0, 1.0, t, 1360.0, 0.2, 100.0);

        assert_relative_eq!(irr.direct, t * 1360.0, epsilon = 1e-9);
        assert_eq!(irr.diffuse, 100.0);
        assert_relative_eq!(
            irr.global,
            irr.direct * 0.2_f64.cos() + 100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_opaque_cloud_blocks_direct() {
        let t = atmospheric_transmissivity(1013.0, 0.2, 0.95);
        let irr = shaded_irradiance(1.0, 1.0, t, 1360.0, 0.2, 80.0);

        assert_eq!(irr.direct, 0.0);
        assert_eq!(irr.global, 80.0);
    }

    #[test]
    fn test_no_direct_after_sunset() {
        let zenith = 95.0_f64.to_radians();
        let t = atmospheric_transmissivity(1013.0, zenith, 0.95);
        let irr = shaded_irradiance(0.0, 1.0, t, 1360.0, zenith, 10.0);

        assert_eq!(irr.direct, 0.0);
        assert_eq!(irr.global, 10.0);
    }

    #[test]
    fn test_partial_opacity_scales_linearly() {
        let t = atmospheric_transmissivity(1013.0, 0.2, 0.95);
        let full = shaded_irradiance(0.0, 1.0, t, 1360.0, 0.2, 0.0);
        let half = shaded_irradiance(0.5, 1.0, t, 1360.0, 0.2, 0.0);

        assert_relative_eq!(half.direct, full.direct * 0.5, epsilon = 1e-9);
    }
}
