//! The cloud field engine: one owned object per simulation run
//!
//! `CloudSim` owns the pattern domain, the wind state, the derived
//! normalized/binary/fuzzy grids and the site registry. Each tick runs the
//! full update sequence (advection, classification, fuzzy shading)
//! synchronously before any opacity or irradiance query for that tick is
//! served; the engine is single-threaded and cooperative, with no background
//! work.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::{self, coverage_target, CutResult, COVERAGE_TOLERANCE};
use crate::config::CloudConfig;
use crate::error::CloudSimError;
use crate::field::advection::{advect, AdvectStats, WindState};
use crate::field::pattern::{CloudField, Pattern};
use crate::fuzzy::fuzzy_opacity;
use crate::geo::GeoBounds;
use crate::sites::{Site, SiteId};
use crate::solar::{atmospheric_transmissivity, shaded_irradiance, Irradiance};

/// Zenith angle (degrees) below which the classifier and fuzzy shading are
/// recomputed. Past this the sun is too far under the horizon for any useful
/// irradiance, but the pattern geometry keeps advecting so the field is
/// consistent when the sun rises again.
pub const RECOMPUTE_ZENITH_DEG: f64 = 110.0;

/// Measured weather parameters feeding one simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherSample {
    /// Wind speed (m/s). The engine applies the configured cloud speed
    /// factor before advection.
    pub wind_speed: f64,
    /// Wind direction (compass degrees).
    pub wind_direction_deg: f64,
    /// Opaque sky cover fraction in [0, 1]; drives the coverage target.
    pub opaque_sky_cover: f64,
    /// Solar zenith angle (radians).
    pub solar_zenith_rad: f64,
    /// Extraterrestrial direct-normal irradiance (W/m²).
    pub etrn: f64,
    /// Station pressure (mbar).
    pub pressure_mbar: f64,
    /// Diffuse horizontal irradiance from the non-cloud path (W/m²).
    pub diffuse_horizontal: f64,
}

/// What one engine tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickStats {
    pub advection: AdvectStats,
    /// Whether the classifier and fuzzy generator ran this tick.
    pub reclassified: bool,
    /// Classifier outcome when it ran.
    pub classifier: Option<CutResult>,
}

/// Cumulative engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudStats {
    pub ticks: u64,
    pub ticks_shifted: u64,
    pub tiles_rebuilt: u64,
    pub reclassifications: u64,
    pub classifier_failures: u64,
}

/// The procedural cloud-shading field engine.
#[derive(Debug)]
pub struct CloudSim {
    config: CloudConfig,
    field: CloudField,
    wind: WindState,
    rng: StdRng,
    sites: FxHashMap<SiteId, Site>,
    next_site_id: u32,
    normalized: Option<Pattern>,
    binary: Option<Pattern>,
    fuzzy: Option<Pattern>,
    cut: Option<CutResult>,
    last_target: Option<f64>,
    /// Set when advection moves the field, cleared when the classifier runs.
    /// Carries shifts across night ticks the zenith gate skips, so the first
    /// daytime tick reclassifies even if calm.
    field_dirty: bool,
    /// Clear-sky transmissivity precomputed once per tick.
    transmissivity: f64,
    last_weather: Option<WeatherSample>,
    stats: CloudStats,
}

impl CloudSim {
    /// Build the engine from a config and the initial set of points of
    /// interest. The pattern domain is sized once from this set and never
    /// resized; sites added later are queryable but do not grow it.
    pub fn new<I>(config: CloudConfig, sites: I) -> Result<Self, CloudSimError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let config = config.validated();

        let mut registry = FxHashMap::default();
        let mut next_site_id = 0_u32;
        let mut points = Vec::new();
        for (latitude, longitude) in sites {
            let id = SiteId(next_site_id);
            next_site_id += 1;
            registry.insert(
                id,
                Site {
                    id,
                    latitude,
                    longitude,
                },
            );
            points.push((latitude, longitude));
        }
        let bounds =
            GeoBounds::from_points(points.iter().copied()).ok_or(CloudSimError::NoSites)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut field = CloudField::from_bounds(bounds, &config);
        field.build_initial(&mut rng);

        info!(
            sites = registry.len(),
            size = field.size(),
            tiles_per_side = field.tiles_per_side(),
            tile_size = field.tile_size(),
            "cloud field initialized"
        );

        Ok(CloudSim {
            config,
            field,
            wind: WindState::new(),
            rng,
            sites: registry,
            next_site_id,
            normalized: None,
            binary: None,
            fuzzy: None,
            cut: None,
            last_target: None,
            field_dirty: false,
            transmissivity: 0.0,
            last_weather: None,
            stats: CloudStats::default(),
        })
    }

    /// Register a point of interest after construction. The domain keeps the
    /// size chosen at initialization, so a site outside the original
    /// bounding box will be rejected by every query.
    pub fn add_site(&mut self, latitude: f64, longitude: f64) -> SiteId {
        let id = SiteId(self.next_site_id);
        self.next_site_id += 1;
        self.sites.insert(
            id,
            Site {
                id,
                latitude,
                longitude,
            },
        );
        id
    }

    /// Advance the engine one tick.
    ///
    /// Runs advection, then reclassifies coverage and regrades opacity when
    /// the sun is above or near the horizon. Completes before any query for
    /// this tick.
    pub fn step(&mut self, elapsed_s: f64, weather: &WeatherSample) -> TickStats {
        let speed = weather.wind_speed * self.config.cloud_speed_factor;
        let advection = advect(
            &mut self.field,
            &mut self.wind,
            speed,
            weather.wind_direction_deg,
            elapsed_s,
            &mut self.rng,
        );

        let mut tick = TickStats {
            advection,
            ..TickStats::default()
        };
        if advection.shifted() {
            self.field_dirty = true;
        }

        if weather.solar_zenith_rad.to_degrees() < RECOMPUTE_ZENITH_DEG {
            let target = coverage_target(weather.opaque_sky_cover);
            let stale =
                self.field_dirty || self.cut.is_none() || self.last_target != Some(target);
            if stale {
                let normalized = classify::normalize(&self.field);
                let (binary, cut) = classify::classify(
                    &normalized,
                    &self.field.on_screen_window(),
                    target,
                    COVERAGE_TOLERANCE,
                );
                let fuzzy = fuzzy_opacity(
                    &normalized,
                    &binary,
                    cut.cut,
                    self.config.cloud_num_layers,
                    self.config.cloud_alpha,
                    &mut self.rng,
                );
                if !cut.converged {
                    self.stats.classifier_failures += 1;
                }
                self.normalized = Some(normalized);
                self.binary = Some(binary);
                self.fuzzy = Some(fuzzy);
                self.cut = Some(cut);
                self.last_target = Some(target);
                self.field_dirty = false;
                self.stats.reclassifications += 1;
                tick.reclassified = true;
                tick.classifier = Some(cut);
            }
        } else {
            debug!(
                zenith_deg = weather.solar_zenith_rad.to_degrees(),
                "sun below recompute gate; keeping previous cloud mask"
            );
        }

        self.transmissivity = atmospheric_transmissivity(
            weather.pressure_mbar,
            weather.solar_zenith_rad,
            self.config.cloud_aerosol_transmissivity,
        );
        self.last_weather = Some(*weather);

        self.stats.ticks += 1;
        if advection.shifted() {
            self.stats.ticks_shifted += 1;
        }
        self.stats.tiles_rebuilt += advection.tiles_rebuilt as u64;
        tick
    }

    /// Fuzzy opacity in [0, 1] at a geographic point.
    ///
    /// Unpopulated cells (and ticks before the first classification) read as
    /// 0: no data is assumed clear. Points outside the bounding box the
    /// domain was sized from are rejected.
    pub fn opacity_at(&self, latitude: f64, longitude: f64) -> Result<f64, CloudSimError> {
        let (row, col) = self.locate(latitude, longitude)?;
        Ok(self
            .fuzzy
            .as_ref()
            .and_then(|pattern| pattern.get(row, col))
            .unwrap_or(0.0))
    }

    /// Binary opacity at a geographic point: 1 under a cloud cell, 0 under a
    /// clear (or unpopulated) cell.
    pub fn binary_opacity_at(&self, latitude: f64, longitude: f64) -> Result<f64, CloudSimError> {
        let (row, col) = self.locate(latitude, longitude)?;
        Ok(self
            .binary
            .as_ref()
            .and_then(|pattern| pattern.get(row, col))
            .map_or(0.0, |mask| 1.0 - mask))
    }

    /// Shaded irradiance at a registered site, using the opacity and
    /// transmissivity of the last completed tick.
    pub fn irradiance_at(&self, site: SiteId) -> Result<Irradiance, CloudSimError> {
        let site = *self
            .sites
            .get(&site)
            .ok_or(CloudSimError::UnknownSite(site.0))?;
        let Some(weather) = self.last_weather else {
            return Ok(Irradiance::default());
        };
        let opacity = self.opacity_at(site.latitude, site.longitude)?;
        Ok(shaded_irradiance(
            opacity,
            self.config.cloud_opacity,
            self.transmissivity,
            weather.etrn,
            weather.solar_zenith_rad,
            weather.diffuse_horizontal,
        ))
    }

    fn locate(&self, latitude: f64, longitude: f64) -> Result<(usize, usize), CloudSimError> {
        if !self.field.site_bounds().contains(latitude, longitude) {
            return Err(CloudSimError::OutOfDomain {
                latitude,
                longitude,
            });
        }
        Ok(self.field.grid_position(latitude, longitude))
    }

    /// Engine configuration after validation clamping.
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// The raw pattern domain.
    pub fn field(&self) -> &CloudField {
        &self.field
    }

    /// Current wind state.
    pub fn wind(&self) -> &WindState {
        &self.wind
    }

    /// Registered sites, in no particular order.
    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.sites.values()
    }

    /// Last classifier outcome, if the classifier has run.
    pub fn cut_result(&self) -> Option<CutResult> {
        self.cut
    }

    /// Binary cloud mask of the last classification.
    pub fn binary_pattern(&self) -> Option<&Pattern> {
        self.binary.as_ref()
    }

    /// Fuzzy opacity grid of the last shading pass.
    pub fn fuzzy_pattern(&self) -> Option<&Pattern> {
        self.fuzzy.as_ref()
    }

    /// Cumulative counters.
    pub fn stats(&self) -> CloudStats {
        self.stats
    }
}
