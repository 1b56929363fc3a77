//! Speed derivation over raw trackpoints.
//!
//! Each point's speed is the haversine distance from the previous point
//! divided by the elapsed time, in km/h. The first point, and any point whose
//! timestamp does not advance past its predecessor, gets a speed of 0.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::geo_utils::haversine_distance;
use crate::{EnrichedTrackPoint, TrackPoint};

const MPS_TO_KPH: f64 = 3.6;

/// Speed in km/h between two consecutive points.
pub fn segment_speed_kph(prev: &TrackPoint, curr: &TrackPoint) -> f64 {
    let elapsed_ms = (curr.timestamp - prev.timestamp).num_milliseconds();
    if elapsed_ms <= 0 {
        return 0.0;
    }
    let elapsed_s = elapsed_ms as f64 / 1000.0;
    let distance_m = haversine_distance(&prev.position(), &curr.position());
    (distance_m / elapsed_s) * MPS_TO_KPH
}

/// Speeds for every point, same length and order as the input.
pub fn derive_speeds(points: &[TrackPoint]) -> Vec<f64> {
    let mut speeds = Vec::with_capacity(points.len());
    if points.is_empty() {
        return speeds;
    }
    speeds.push(0.0);
    speeds.extend(points.windows(2).map(|w| segment_speed_kph(&w[0], &w[1])));
    speeds
}

/// Attach derived speed to every point.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use trackview::{enrich, TrackPoint};
///
/// let t0 = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();
/// let points = vec![
///     TrackPoint::new(0.0, 0.0, 5.0, t0),
///     TrackPoint::new(0.0, 0.0, 5.0, t0 + chrono::Duration::seconds(30)),
/// ];
/// let enriched = enrich(&points);
/// assert_eq!(enriched.len(), 2);
/// assert_eq!(enriched[1].speed_kph, 0.0);
/// ```
pub fn enrich(points: &[TrackPoint]) -> Vec<EnrichedTrackPoint> {
    points
        .iter()
        .zip(derive_speeds(points))
        .map(|(point, speed)| EnrichedTrackPoint::from_raw(point, speed))
        .collect()
}

/// Parallel version of [`enrich`] for very long tracks.
#[cfg(feature = "parallel")]
pub fn enrich_parallel(points: &[TrackPoint]) -> Vec<EnrichedTrackPoint> {
    (0..points.len())
        .into_par_iter()
        .map(|i| {
            let speed = if i == 0 {
                0.0
            } else {
                segment_speed_kph(&points[i - 1], &points[i])
            };
            EnrichedTrackPoint::from_raw(&points[i], speed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::EARTH_RADIUS_M;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    /// Latitude delta (degrees) that spans `meters` along a meridian.
    fn lat_for_meters(meters: f64) -> f64 {
        (meters / EARTH_RADIUS_M).to_degrees()
    }

    #[test]
    fn test_empty_input() {
        assert!(derive_speeds(&[]).is_empty());
        assert!(enrich(&[]).is_empty());
    }

    #[test]
    fn test_first_point_speed_zero() {
        let points = vec![TrackPoint::new(-38.0, 144.0, 0.0, t(0))];
        let enriched = enrich(&points);
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].speed_kph, 0.0);
    }

    #[test]
    fn test_same_coordinates_speed_zero() {
        let points = vec![
            TrackPoint::new(-38.0, 144.0, 0.0, t(0)),
            TrackPoint::new(-38.0, 144.0, 0.0, t(7)),
        ];
        assert_eq!(derive_speeds(&points), vec![0.0, 0.0]);
    }

    #[test]
    fn test_1000m_in_100s_is_36kph() {
        let points = vec![
            TrackPoint::new(0.0, 0.0, 0.0, t(0)),
            TrackPoint::new(lat_for_meters(1000.0), 0.0, 0.0, t(100)),
        ];
        let speeds = derive_speeds(&points);
        assert!((speeds[1] - 36.0).abs() < 1e-6, "got {}", speeds[1]);
    }

    #[test]
    fn test_non_positive_elapsed_time_speed_zero() {
        let step = lat_for_meters(100.0);
        let points = vec![
            TrackPoint::new(0.0, 0.0, 0.0, t(10)),
            // duplicate timestamp
            TrackPoint::new(step, 0.0, 0.0, t(10)),
            // out of order
            TrackPoint::new(2.0 * step, 0.0, 0.0, t(5)),
            TrackPoint::new(3.0 * step, 0.0, 0.0, t(15)),
        ];
        let speeds = derive_speeds(&points);
        assert_eq!(speeds.len(), 4);
        assert_eq!(speeds[1], 0.0);
        assert_eq!(speeds[2], 0.0);
        // 100 m over 10 s
        assert!((speeds[3] - 36.0).abs() < 1e-6);
        assert!(speeds.iter().all(|s| s.is_finite() && *s >= 0.0));
    }

    #[test]
    fn test_sub_second_sampling() {
        let t0 = t(0);
        let points = vec![
            TrackPoint::new(0.0, 0.0, 0.0, t0),
            TrackPoint::new(lat_for_meters(5.0), 0.0, 0.0, t0 + Duration::milliseconds(500)),
        ];
        let speeds = derive_speeds(&points);
        // 5 m in 0.5 s = 10 m/s
        assert!((speeds[1] - 36.0).abs() < 1e-6);
    }

    #[test]
    fn test_enrich_preserves_order_and_fields() {
        let mut p = TrackPoint::new(-38.0, 144.0, 3.0, t(0));
        p.heart_rate_bpm = Some(140.0);
        let points = vec![p, TrackPoint::new(-38.001, 144.0, 4.0, t(10))];

        let enriched = enrich(&points);
        assert_eq!(enriched[0].heart_rate_bpm, 140.0);
        assert_eq!(enriched[1].heart_rate_bpm, 0.0);
        assert_eq!(enriched[1].elevation_meters, 4.0);
        assert_eq!(enriched[0].timestamp, t(0));
        assert!(enriched[1].speed_kph > 0.0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let points: Vec<TrackPoint> = (0..500)
            .map(|i| TrackPoint::new(i as f64 * 0.0001, 0.0, 0.0, t(i)))
            .collect();
        assert_eq!(enrich(&points), enrich_parallel(&points));
    }
}
