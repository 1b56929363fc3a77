//! Chart metric definitions and series projection.
//!
//! The metric set is closed: each [`Metric`] variant carries its display
//! label, line color and y-axis. Selecting metrics only changes which series
//! are projected; the enriched points are never touched.
//!
//! ## Example
//! ```rust
//! use trackview::metrics::{Metric, MetricSelection};
//!
//! let mut selection = MetricSelection::default();
//! selection.toggle(Metric::Power);
//! assert!(!selection.is_selected(Metric::Power));
//! assert_eq!(Metric::Speed.label(), "Speed (kph)");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TrackError;
use crate::EnrichedTrackPoint;

/// Which y-axis a metric is plotted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Left,
    Right,
}

/// A plottable time-series metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    HeartRate,
    Power,
    Elevation,
    Speed,
    Cadence,
    Temperature,
}

impl Metric {
    /// All metrics in display order.
    pub const ALL: [Metric; 6] = [
        Metric::HeartRate,
        Metric::Power,
        Metric::Elevation,
        Metric::Speed,
        Metric::Cadence,
        Metric::Temperature,
    ];

    /// Metrics shown when nothing has been configured.
    pub const DEFAULT: [Metric; 4] = [
        Metric::HeartRate,
        Metric::Power,
        Metric::Elevation,
        Metric::Speed,
    ];

    /// Stable key used in JSON rows and configuration.
    pub const fn key(self) -> &'static str {
        match self {
            Metric::HeartRate => "heartRate",
            Metric::Power => "power",
            Metric::Elevation => "elevation",
            Metric::Speed => "speed",
            Metric::Cadence => "cadence",
            Metric::Temperature => "temperature",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Metric::HeartRate => "HR (bpm)",
            Metric::Power => "Power (w)",
            Metric::Elevation => "Elevation (m)",
            Metric::Speed => "Speed (kph)",
            Metric::Cadence => "Cadence (rpm)",
            Metric::Temperature => "Temp (°C)",
        }
    }

    /// CSS hex color of the series line.
    pub const fn color(self) -> &'static str {
        match self {
            Metric::HeartRate => "#ff0000",
            Metric::Power => "#0000ff",
            Metric::Elevation => "#00cc00",
            Metric::Speed => "#ffa500",
            Metric::Cadence => "#800080",
            Metric::Temperature => "#00cccc",
        }
    }

    pub const fn axis(self) -> Axis {
        match self {
            Metric::HeartRate | Metric::Power | Metric::Cadence => Axis::Left,
            Metric::Elevation | Metric::Speed | Metric::Temperature => Axis::Right,
        }
    }

    /// Value of this metric at one point.
    pub fn value(self, point: &EnrichedTrackPoint) -> f64 {
        match self {
            Metric::HeartRate => point.heart_rate_bpm,
            Metric::Power => point.power_watts,
            Metric::Elevation => point.elevation_meters,
            Metric::Speed => point.speed_kph,
            Metric::Cadence => point.cadence_rpm,
            Metric::Temperature => point.temperature_celsius,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.key() == s)
            .ok_or_else(|| TrackError::Config {
                message: format!("unknown metric '{}'", s),
            })
    }
}

/// Ordered set of metrics currently shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSelection {
    selected: Vec<Metric>,
}

impl Default for MetricSelection {
    fn default() -> Self {
        Self::from_metrics(Metric::DEFAULT)
    }
}

impl MetricSelection {
    /// Selection with nothing shown.
    pub fn empty() -> Self {
        Self {
            selected: Vec::new(),
        }
    }

    /// Selection from a list, dropping duplicates but keeping first-seen order.
    pub fn from_metrics(metrics: impl IntoIterator<Item = Metric>) -> Self {
        let mut selection = Self::empty();
        for metric in metrics {
            selection.select(metric);
        }
        selection
    }

    pub fn is_selected(&self, metric: Metric) -> bool {
        self.selected.contains(&metric)
    }

    /// Add a metric at the end if not already shown.
    pub fn select(&mut self, metric: Metric) {
        if !self.is_selected(metric) {
            self.selected.push(metric);
        }
    }

    pub fn deselect(&mut self, metric: Metric) {
        self.selected.retain(|&m| m != metric);
    }

    /// Flip a metric; returns whether it is now shown.
    pub fn toggle(&mut self, metric: Metric) -> bool {
        if self.is_selected(metric) {
            self.deselect(metric);
            false
        } else {
            self.select(metric);
            true
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Metric> + '_ {
        self.selected.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// One line of a chart: display config plus values aligned with the points.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub key: &'static str,
    pub label: &'static str,
    pub color: &'static str,
    pub axis: Axis,
    pub values: Vec<f64>,
}

/// Values of one metric for every point.
pub fn series(points: &[EnrichedTrackPoint], metric: Metric) -> Vec<f64> {
    points.iter().map(|p| metric.value(p)).collect()
}

/// One series per selected metric, in selection order.
pub fn chart_series(points: &[EnrichedTrackPoint], selection: &MetricSelection) -> Vec<ChartSeries> {
    selection
        .iter()
        .map(|metric| ChartSeries {
            key: metric.key(),
            label: metric.label(),
            color: metric.color(),
            axis: metric.axis(),
            values: series(points, metric),
        })
        .collect()
}

/// Row-oriented chart data: `{ "time": ..., "<key>": value, ... }` per point.
pub fn chart_rows(points: &[EnrichedTrackPoint], selection: &MetricSelection) -> Vec<Value> {
    points
        .iter()
        .map(|point| {
            let mut row = Map::new();
            row.insert("time".to_string(), Value::from(point.timestamp.to_rfc3339()));
            for metric in selection.iter() {
                row.insert(metric.key().to_string(), Value::from(metric.value(point)));
            }
            Value::Object(row)
        })
        .collect()
}
