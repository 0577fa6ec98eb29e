//! Hard-failure error type for engine construction and spatial queries
//!
//! Recoverable conditions (configuration clamping, classifier non-convergence,
//! boundary inconsistency after an edge rebuild) are not errors: they are
//! handled locally and reported through `tracing::warn!`. Only contract
//! violations surface here.

use thiserror::Error;

/// Errors that abort engine construction or an individual query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CloudSimError {
    /// The engine was constructed without any point of interest, so the
    /// pattern domain cannot be sized.
    #[error("no points of interest registered; cannot size the cloud field domain")]
    NoSites,

    /// A spatial query fell outside the bounding box the domain was sized
    /// from at initialization. The legacy behavior of unchecked array access
    /// is deliberately not reproduced.
    #[error("query point ({latitude}, {longitude}) lies outside the domain bounding box")]
    OutOfDomain {
        /// Latitude of the rejected query (degrees).
        latitude: f64,
        /// Longitude of the rejected query (degrees).
        longitude: f64,
    },

    /// An irradiance query referenced a site id that was never registered.
    #[error("unknown site id {0}")]
    UnknownSite(u32),
}
