//! Geographic bounding boxes and great-circle extent math
//!
//! The pattern domain is sized once from the bounding box of all points of
//! interest. Extents use a flat great-circle approximation: one degree of
//! latitude is 111.32 km everywhere, and one degree of longitude shrinks by
//! the cosine of the latitude (meridian convergence, evaluated at the
//! southern edge of the box).

use serde::{Deserialize, Serialize};

/// Kilometers per degree of latitude (and of longitude at the equator).
pub const KM_PER_DEGREE: f64 = 111.32;

/// Axis-aligned geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    /// Bounding box of a set of (latitude, longitude) points.
    ///
    /// Returns `None` for an empty set.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (lat0, lon0) = iter.next()?;
        let mut bounds = GeoBounds {
            min_lat: lat0,
            max_lat: lat0,
            min_lon: lon0,
            max_lon: lon0,
        };
        for (lat, lon) in iter {
            bounds.include(lat, lon);
        }
        Some(bounds)
    }

    /// Grow the box to include one more point.
    pub fn include(&mut self, lat: f64, lon: f64) {
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }

    /// Whether a point lies inside the box (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Center of the box (degrees).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// North-south and east-west extent in meters.
    ///
    /// The east-west extent is scaled by `cos(min_lat)` to account for
    /// meridian convergence.
    pub fn extent_m(&self) -> (f64, f64) {
        let ns_m = (self.max_lat - self.min_lat) * KM_PER_DEGREE * 1000.0;
        let ew_m = (self.max_lon - self.min_lon)
            * KM_PER_DEGREE
            * self.min_lat.to_radians().cos()
            * 1000.0;
        (ns_m, ew_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_points() {
        let bounds =
            GeoBounds::from_points([(35.0, -120.0), (35.5, -119.0), (34.8, -119.5)]).unwrap();

        assert_eq!(bounds.min_lat, 34.8);
        assert_eq!(bounds.max_lat, 35.5);
        assert_eq!(bounds.min_lon, -120.0);
        assert_eq!(bounds.max_lon, -119.0);
    }

    #[test]
    fn test_empty_points() {
        assert!(GeoBounds::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_contains() {
        let bounds = GeoBounds::from_points([(35.0, -120.0), (36.0, -119.0)]).unwrap();

        assert!(bounds.contains(35.5, -119.5));
        assert!(bounds.contains(35.0, -120.0)); // edge inclusive
        assert!(!bounds.contains(36.1, -119.5));
        assert!(!bounds.contains(35.5, -118.9));
    }

    #[test]
    fn test_extent_at_equator() {
        let bounds = GeoBounds {
            min_lat: 0.0,
            max_lat: 1.0,
            min_lon: 0.0,
            max_lon: 1.0,
        };
        let (ns_m, ew_m) = bounds.extent_m();

        assert_relative_eq!(ns_m, 111_320.0, epsilon = 1e-6);
        // cos(0) = 1, so east-west matches north-south at the equator
        assert_relative_eq!(ew_m, 111_320.0, epsilon = 1e-6);
    }

    #[test]
    fn test_meridian_convergence() {
        let bounds = GeoBounds {
            min_lat: 60.0,
            max_lat: 61.0,
            min_lon: 10.0,
            max_lon: 11.0,
        };
        let (ns_m, ew_m) = bounds.extent_m();

        // At 60° north a degree of longitude is half a degree of latitude
        assert_relative_eq!(ew_m, ns_m * 60.0_f64.to_radians().cos(), epsilon = 1e-6);
    }
}
