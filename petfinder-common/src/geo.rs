//! Geographic helpers
//!
//! Two distances are used deliberately: great-circle (haversine) distance
//! in kilometres for radius searches, and plain Euclidean distance in
//! degree space for match scoring.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A (latitude, longitude) pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub long: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }

    /// Both coordinates are needed for a point
    pub fn from_parts(lat: Option<f64>, long: Option<f64>) -> Option<Self> {
        Some(Self::new(lat?, long?))
    }
}

/// Great-circle distance in kilometres
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.long.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.long.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * h.sqrt().min(1.0).asin() * EARTH_RADIUS_KM
}

/// Straight-line distance between the raw coordinate pairs
pub fn euclidean(a: GeoPoint, b: GeoPoint) -> f64 {
    (a.lat - b.lat).hypot(a.long - b.long)
}

pub fn is_within_radius(center: GeoPoint, point: GeoPoint, radius_km: f64) -> bool {
    haversine_km(center, point) <= radius_km
}

/// Items whose location lies within `radius_km` of `center`.
///
/// Items without a location never qualify.
pub fn within_radius<'a, T, F>(center: GeoPoint, items: &'a [T], radius_km: f64, locate: F) -> Vec<&'a T>
where
    F: Fn(&T) -> Option<GeoPoint>,
{
    items
        .iter()
        .filter(|item| locate(*item).is_some_and(|point| is_within_radius(center, point, radius_km)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_london_paris() {
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let d = haversine_km(london, paris);
        assert!((d - 343.5).abs() < 2.0, "got {}", d);
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = GeoPoint::new(10.0, 20.0);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn test_euclidean() {
        let d = euclidean(GeoPoint::new(0.0, 0.0), GeoPoint::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_within_radius_skips_unlocated() {
        let center = GeoPoint::new(51.5, -0.12);
        let items = vec![
            Some(GeoPoint::new(51.51, -0.13)),
            None,
            Some(GeoPoint::new(48.85, 2.35)),
        ];
        let near = within_radius(center, &items, 30.0, |p| *p);
        assert_eq!(near.len(), 1);
        assert_eq!(*near[0], items[0]);
    }
}
