//! Map projections of an enriched track.
//!
//! Coordinates are emitted as `[longitude, latitude]`, the order map
//! renderers expect for GeoJSON and marker positions.

use serde::Serialize;
use serde_json::{json, Value};

use crate::geo_utils::{compute_bounds, polyline_length};
use crate::{Bounds, EnrichedTrackPoint, GpsPoint};

/// Hover index meaning "no point is hovered".
pub const NO_INDEX: i64 = -1;

/// Everything a map renderer needs to draw one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub path: Vec<[f64; 2]>,
    pub start: Option<[f64; 2]>,
    pub end: Option<[f64; 2]>,
    pub bounds: Option<Bounds>,
    pub distance_meters: f64,
}

impl MapView {
    pub fn from_points(points: &[EnrichedTrackPoint]) -> Self {
        Self {
            path: path(points),
            start: start_marker(points),
            end: end_marker(points),
            bounds: bounds(points),
            distance_meters: polyline_length(&positions(points)),
        }
    }

    /// Position of the follower marker for a hovered index.
    pub fn follower(&self, index: i64) -> Option<[f64; 2]> {
        lookup(&self.path, index)
    }
}

fn positions(points: &[EnrichedTrackPoint]) -> Vec<GpsPoint> {
    points.iter().map(EnrichedTrackPoint::position).collect()
}

fn lookup<T: Copy>(items: &[T], index: i64) -> Option<T> {
    usize::try_from(index).ok().and_then(|i| items.get(i).copied())
}

/// Route polyline as `[lon, lat]` pairs.
pub fn path(points: &[EnrichedTrackPoint]) -> Vec<[f64; 2]> {
    points.iter().map(|p| p.position().lng_lat()).collect()
}

pub fn start_marker(points: &[EnrichedTrackPoint]) -> Option<[f64; 2]> {
    points.first().map(|p| p.position().lng_lat())
}

pub fn end_marker(points: &[EnrichedTrackPoint]) -> Option<[f64; 2]> {
    points.last().map(|p| p.position().lng_lat())
}

/// Follower marker position for a hovered chart index.
///
/// Negative (including [`NO_INDEX`]) or out-of-range indices mean no marker.
pub fn follower_position(points: &[EnrichedTrackPoint], index: i64) -> Option<[f64; 2]> {
    let i = usize::try_from(index).ok()?;
    points.get(i).map(|p| p.position().lng_lat())
}

/// Bounds to fit the viewport to.
pub fn bounds(points: &[EnrichedTrackPoint]) -> Option<Bounds> {
    compute_bounds(&positions(points))
}

/// Route as a GeoJSON `Feature` with a `LineString` geometry.
pub fn route_geojson(points: &[EnrichedTrackPoint]) -> Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": path(points),
        },
        "properties": {},
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn point(lat: f64, lon: f64) -> EnrichedTrackPoint {
        EnrichedTrackPoint {
            latitude: lat,
            longitude: lon,
            elevation_meters: 0.0,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap(),
            heart_rate_bpm: 0.0,
            cadence_rpm: 0.0,
            temperature_celsius: 0.0,
            power_watts: 0.0,
            speed_kph: 0.0,
        }
    }

    fn sample() -> Vec<EnrichedTrackPoint> {
        vec![
            point(-38.150, 144.360),
            point(-38.152, 144.365),
            point(-38.149, 144.370),
        ]
    }

    #[test]
    fn test_path_is_lon_lat() {
        let p = path(&sample());
        assert_eq!(p.len(), 3);
        assert_eq!(p[0], [144.360, -38.150]);
    }

    #[test]
    fn test_markers() {
        let pts = sample();
        assert_eq!(start_marker(&pts), Some([144.360, -38.150]));
        assert_eq!(end_marker(&pts), Some([144.370, -38.149]));
        assert_eq!(start_marker(&[]), None);
        assert_eq!(end_marker(&[]), None);
    }

    #[test]
    fn test_follower_position() {
        let pts = sample();
        assert_eq!(follower_position(&pts, 1), Some([144.365, -38.152]));
        assert_eq!(follower_position(&pts, NO_INDEX), None);
        assert_eq!(follower_position(&pts, -7), None);
        assert_eq!(follower_position(&pts, 3), None);
        assert_eq!(follower_position(&[], 0), None);
    }

    #[test]
    fn test_map_view() {
        let view = MapView::from_points(&sample());
        let b = view.bounds.unwrap();
        assert_eq!(b.min_lat, -38.152);
        assert_eq!(b.max_lng, 144.370);
        assert!(view.distance_meters > 0.0);
        assert_eq!(view.follower(2), view.end);
        assert_eq!(view.follower(NO_INDEX), None);

        let empty = MapView::from_points(&[]);
        assert!(empty.path.is_empty());
        assert!(empty.bounds.is_none());
        assert_eq!(empty.distance_meters, 0.0);
    }

    #[test]
    fn test_route_geojson() {
        let geojson = route_geojson(&sample());
        assert_eq!(geojson["type"], "Feature");
        assert_eq!(geojson["geometry"]["type"], "LineString");
        assert_eq!(geojson["geometry"]["coordinates"][0][0], 144.360);
        assert_eq!(geojson["geometry"]["coordinates"].as_array().unwrap().len(), 3);
    }
}
