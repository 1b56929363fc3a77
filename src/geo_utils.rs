//! Geographic utilities: great-circle distance, path length and bounds.

use geo::{BoundingRect, Coord, LineString};

use crate::{Bounds, GpsPoint};

/// Mean Earth radius used for all distance calculations, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two points (haversine formula).
///
/// # Example
/// ```
/// use trackview::{GpsPoint, haversine_distance};
/// let d = haversine_distance(&GpsPoint::new(0.0, 0.0), &GpsPoint::new(0.0, 1.0));
/// assert!((d - 111_195.0).abs() < 50.0);
/// ```
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = (p2.latitude - p1.latitude).to_radians();
    let dlon = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1 for antipodal points
    let a = a.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Total distance along a path in meters.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Bounding box of a set of points, or `None` when empty.
pub fn compute_bounds(points: &[GpsPoint]) -> Option<Bounds> {
    let line: LineString<f64> = points
        .iter()
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    line.bounding_rect().map(|rect| Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}
