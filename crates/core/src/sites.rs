//! Points of interest shaded by the cloud field
//!
//! Sites expose a fixed (latitude, longitude) pair. The pattern domain is
//! sized once from the set present at engine construction; sites registered
//! afterwards can still be queried but do not grow the domain (static initial
//! registration is a documented constraint of the engine).

use serde::{Deserialize, Serialize};

/// Opaque handle for a registered point of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteId(pub(crate) u32);

/// A point of interest (e.g. one solar collector).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    /// Latitude in degrees, north positive.
    pub latitude: f64,
    /// Longitude in degrees, east positive.
    pub longitude: f64,
}
