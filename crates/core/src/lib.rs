//! Cloud Shading Core Library
//!
//! A procedural cloud-shading field engine for solar irradiance simulation.
//! Generates a fractal cloud elevation field by midpoint displacement over an
//! infinite-scrolling tiled buffer, advects it with the measured wind,
//! classifies it against opaque sky cover with a bisection search, grades the
//! binary mask into fuzzy multi-layer opacity, and attenuates
//! extraterrestrial irradiance at registered points of interest.
//!
//! The engine is deterministic: the same seed, site set and weather sequence
//! reproduce the same opacity series.

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod fuzzy;
pub mod geo;
pub mod sites;
pub mod solar;

// Re-export the engine surface
pub use classify::{coverage_target, CutResult, COVERAGE_TOLERANCE};
pub use config::CloudConfig;
pub use engine::{CloudSim, CloudStats, TickStats, WeatherSample, RECOMPUTE_ZENITH_DEG};
pub use error::CloudSimError;
pub use field::{AdvectStats, CloudField, Pattern, WindState};
pub use geo::GeoBounds;
pub use sites::{Site, SiteId};
pub use solar::{atmospheric_transmissivity, Irradiance};
