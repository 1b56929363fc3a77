//! GPX text to enriched trackpoint sequence.
//!
//! [`parse`] is strict: every `trkpt` must yield a valid point or the whole
//! document is rejected with the full list of issues. [`parse_lenient`] keeps
//! the usable points and hands the issues back alongside them.

use log::{debug, warn};
use serde::Serialize;

use crate::error::{PointIssue, Result, TrackError};
use crate::gpx::read_track;
use crate::speed::enrich;
use crate::EnrichedTrackPoint;

/// Enriched points plus any field problems found while reading them.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedActivity {
    /// `trk > name` of the track that was read
    pub name: Option<String>,
    pub points: Vec<EnrichedTrackPoint>,
    pub issues: Vec<PointIssue>,
    /// Points not emitted because a required field was missing or malformed
    pub dropped_points: usize,
}

impl ParsedActivity {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Parse a GPX document into enriched trackpoints.
///
/// The result has exactly one element per `trkpt` of the first segment of the
/// first track, in document order. Any missing or malformed field, required or
/// optional, fails with [`TrackError::InvalidPoints`].
pub fn parse(gpx_text: &str) -> Result<Vec<EnrichedTrackPoint>> {
    let track = read_track(gpx_text)?;
    if !track.issues.is_empty() {
        return Err(TrackError::InvalidPoints {
            issues: track.issues,
        });
    }
    Ok(enrich(&track.points))
}

/// Parse a GPX document, keeping every point whose required fields are valid.
///
/// Malformed optional fields read as absent (0 once enriched). Points with a
/// missing or malformed required field are dropped, so the output can be
/// shorter than the `trkpt` count; only [`parse`] guarantees one point per
/// `trkpt`. Speeds are derived over the kept points only, so a dropped point
/// does not leave a zero-speed gap.
pub fn parse_lenient(gpx_text: &str) -> Result<ParsedActivity> {
    let track = read_track(gpx_text)?;
    let dropped_points = track.trkpt_count - track.points.len();

    if !track.issues.is_empty() {
        warn!(
            "[Derivation] {} issue(s) in GPX, {} of {} point(s) dropped",
            track.issues.len(),
            dropped_points,
            track.trkpt_count
        );
    }

    #[cfg(feature = "parallel")]
    let points = crate::speed::enrich_parallel(&track.points);
    #[cfg(not(feature = "parallel"))]
    let points = enrich(&track.points);

    debug!("[Derivation] Enriched {} point(s)", points.len());

    Ok(ParsedActivity {
        name: track.name,
        points,
        issues: track.issues,
        dropped_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IssueKind, PointField};
    use crate::geo_utils::EARTH_RADIUS_M;

    /// Three points 50 m apart along a meridian, 10 s apart.
    fn fifty_meter_steps() -> String {
        let step = (50.0 / EARTH_RADIUS_M).to_degrees();
        let pts: String = (0..3)
            .map(|i| {
                format!(
                    r#"<trkpt lat="{}" lon="144.0"><ele>10</ele><time>2024-03-02T08:00:{:02}Z</time></trkpt>"#,
                    -38.0 + step * i as f64,
                    i * 10
                )
            })
            .collect();
        format!("<gpx><trk><trkseg>{}</trkseg></trk></gpx>", pts)
    }

    #[test]
    fn test_end_to_end_speeds() {
        let points = parse(&fifty_meter_steps()).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].speed_kph, 0.0);
        assert!((points[1].speed_kph - 18.0).abs() < 1e-6, "got {}", points[1].speed_kph);
        assert!((points[2].speed_kph - 18.0).abs() < 1e-6, "got {}", points[2].speed_kph);
    }

    #[test]
    fn test_missing_optional_fields_default_to_zero() {
        let points = parse(&fifty_meter_steps()).unwrap();
        for p in &points {
            assert_eq!(p.power_watts, 0.0);
            assert_eq!(p.heart_rate_bpm, 0.0);
            assert_eq!(p.temperature_celsius, 0.0);
            assert_eq!(p.cadence_rpm, 0.0);
        }
    }

    #[test]
    fn test_strict_rejects_invalid_points() {
        let gpx = r#"<gpx><trk><trkseg>
            <trkpt lat="1" lon="1"><ele>1</ele><time>2024-01-01T00:00:00Z</time></trkpt>
            <trkpt lat="1" lon="1"><ele>high</ele><time>2024-01-01T00:00:01Z</time></trkpt>
          </trkseg></trk></gpx>"#;

        match parse(gpx) {
            Err(TrackError::InvalidPoints { issues }) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].index, 1);
                assert_eq!(issues[0].field, PointField::Elevation);
                assert_eq!(issues[0].kind, IssueKind::Malformed("high".to_string()));
            }
            other => panic!("expected InvalidPoints, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_parse_reads_first_of_repeated_fields() {
        let gpx = r#"<gpx><trk><trkseg>
            <trkpt lat="1" lon="1"><ele>1</ele><ele>2</ele><time>2024-01-01T00:00:00Z</time>
              <extensions><power>150</power><power>160</power></extensions></trkpt>
          </trkseg></trk></gpx>"#;

        let points = parse(gpx).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].elevation_meters, 1.0);
        assert_eq!(points[0].power_watts, 150.0);
    }

    #[test]
    fn test_lenient_keeps_valid_points() {
        let gpx = r#"<gpx><trk><name>Crit</name><trkseg>
            <trkpt lat="1" lon="1"><ele>1</ele><time>2024-01-01T00:00:00Z</time></trkpt>
            <trkpt lat="1" lon="1"><ele>high</ele><time>2024-01-01T00:00:01Z</time></trkpt>
            <trkpt lat="1" lon="1"><ele>2</ele><time>2024-01-01T00:00:02Z</time>
              <extensions><power>x</power></extensions></trkpt>
          </trkseg></trk></gpx>"#;

        let parsed = parse_lenient(gpx).unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Crit"));
        assert_eq!(parsed.points.len(), 2);
        assert_eq!(parsed.dropped_points, 1);
        assert_eq!(parsed.issues.len(), 2);
        assert!(!parsed.is_clean());
        assert_eq!(parsed.points[1].power_watts, 0.0);
        assert_eq!(parsed.points[0].speed_kph, 0.0);
    }

    #[test]
    fn test_structural_errors_propagate() {
        assert!(matches!(
            parse("<gpx></gpx>"),
            Err(TrackError::MissingElement { .. })
        ));
        assert!(matches!(
            parse_lenient("<gpx><trk>"),
            Err(TrackError::MissingElement { .. }) | Err(TrackError::Xml { .. })
        ));
    }

    #[test]
    fn test_empty_segment() {
        let points = parse("<gpx><trk><trkseg/></trk></gpx>").unwrap();
        assert!(points.is_empty());
    }
}
