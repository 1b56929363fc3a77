//! # Trackview
//!
//! GPX activity derivation for browser map and chart viewers.
//!
//! This library provides:
//! - GPX 1.1 parsing into trackpoints with heart rate, cadence, temperature and power
//! - Per-point speed derived from haversine distance and elapsed time
//! - Map projections (route path, start/end markers, hover-linked follower marker)
//! - Chart projections over a closed set of metrics
//! - A "latest track" store that discards superseded loads
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel speed derivation with rayon
//! - **`http`** - Enable fetching GPX files by URL
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trackview::{derivation, metrics::{chart_series, MetricSelection}};
//!
//! let gpx = r#"<gpx><trk><trkseg>
//!   <trkpt lat="-38.15" lon="144.36"><ele>10</ele><time>2024-03-02T08:00:00Z</time></trkpt>
//!   <trkpt lat="-38.1505" lon="144.36"><ele>11</ele><time>2024-03-02T08:00:10Z</time></trkpt>
//! </trkseg></trk></gpx>"#;
//!
//! let points = derivation::parse(gpx).unwrap();
//! assert_eq!(points.len(), 2);
//! assert_eq!(points[0].speed_kph, 0.0);
//!
//! let series = chart_series(&points, &MetricSelection::default());
//! assert_eq!(series.len(), 4);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{IssueKind, OptionExt, PointField, PointIssue, Result, TrackError};

// Geographic utilities (distance, path length, bounds)
pub mod geo_utils;
pub use geo_utils::haversine_distance;

// GPX document reader (field extraction)
pub mod gpx;
pub use gpx::{read_track, RawTrack};

// Speed derivation over raw trackpoints
pub mod speed;
pub use speed::{derive_speeds, enrich};
#[cfg(feature = "parallel")]
pub use speed::enrich_parallel;

// Full GPX text -> enriched sequence operation
pub mod derivation;
pub use derivation::{parse, parse_lenient, ParsedActivity};

// Chart metric definitions and series projection
pub mod metrics;
pub use metrics::{Axis, ChartSeries, Metric, MetricSelection};

// Map path, markers and follower lookup
pub mod map_view;
pub use map_view::MapView;

// Viewer configuration
pub mod config;
pub use config::ViewerConfig;

// Latest-track store (singleton with the current snapshot)
pub mod store;
pub use store::{with_store, LoadOutcome, LoadTicket, TrackSnapshot, TrackStore, STORE};

// Fetch -> parse -> enrich pipeline
pub mod loader;
pub use loader::{load_track, TrackLoader, TrackSource};

/// Initialize logging for Android
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("trackview"),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    // No-op on non-Android platforms; hosts install their own `log` backend
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use trackview::GpsPoint;
/// let point = GpsPoint::new(-38.1499, 144.3617); // Geelong
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        Self::valid_latitude(self.latitude) && Self::valid_longitude(self.longitude)
    }

    /// Finite and within ±90°.
    pub fn valid_latitude(value: f64) -> bool {
        value.is_finite() && (-90.0..=90.0).contains(&value)
    }

    /// Finite and within ±180°.
    pub fn valid_longitude(value: f64) -> bool {
        value.is_finite() && (-180.0..=180.0).contains(&value)
    }

    /// `[longitude, latitude]` order used by map renderers.
    pub fn lng_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Bounding box for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

/// One recorded sample from a GPX `trkpt`.
///
/// Sensor fields are `None` when the file does not carry them. Use the
/// accessor methods to read them with the `0` default the charts expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_meters: f64,
    pub timestamp: DateTime<Utc>,
    pub heart_rate_bpm: Option<f64>,
    pub cadence_rpm: Option<f64>,
    pub temperature_celsius: Option<f64>,
    pub power_watts: Option<f64>,
}

impl TrackPoint {
    /// Create a trackpoint with only the required fields.
    pub fn new(latitude: f64, longitude: f64, elevation_meters: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            elevation_meters,
            timestamp,
            heart_rate_bpm: None,
            cadence_rpm: None,
            temperature_celsius: None,
            power_watts: None,
        }
    }

    pub fn position(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    pub fn heart_rate(&self) -> f64 {
        self.heart_rate_bpm.unwrap_or(0.0)
    }

    pub fn cadence(&self) -> f64 {
        self.cadence_rpm.unwrap_or(0.0)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature_celsius.unwrap_or(0.0)
    }

    pub fn power(&self) -> f64 {
        self.power_watts.unwrap_or(0.0)
    }
}

/// A trackpoint with derived speed, flattened for chart consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_meters: f64,
    pub timestamp: DateTime<Utc>,
    pub heart_rate_bpm: f64,
    pub cadence_rpm: f64,
    pub temperature_celsius: f64,
    pub power_watts: f64,
    /// Speed from the previous point; 0 for the first point
    pub speed_kph: f64,
}

impl EnrichedTrackPoint {
    /// Flatten a raw point, defaulting absent sensor fields to 0.
    pub fn from_raw(point: &TrackPoint, speed_kph: f64) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            elevation_meters: point.elevation_meters,
            timestamp: point.timestamp,
            heart_rate_bpm: point.heart_rate(),
            cadence_rpm: point.cadence(),
            temperature_celsius: point.temperature(),
            power_watts: point.power(),
            speed_kph,
        }
    }

    pub fn position(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}
