//! # Track Store
//!
//! Holds the latest completed track and the view state that goes with it
//! (hovered index, selected metrics).
//!
//! ## Load generations
//!
//! Every load starts with [`TrackStore::begin_load`], which hands out a
//! [`LoadTicket`] and supersedes all earlier tickets. A result is installed
//! only if its ticket is still current, so the freshest *request* wins no
//! matter which fetch finishes last. Readers only ever see whole snapshots.

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::json;

use crate::config::ViewerConfig;
use crate::derivation::ParsedActivity;
use crate::error::{PointIssue, TrackError};
use crate::map_view::{MapView, NO_INDEX};
use crate::metrics::{chart_rows, chart_series, ChartSeries, Metric, MetricSelection};
use crate::EnrichedTrackPoint;

// ============================================================================
// Core Types
// ============================================================================

/// An immutable, fully derived track.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSnapshot {
    /// File path or URL the track was loaded from
    pub source: String,
    pub name: Option<String>,
    pub points: Vec<EnrichedTrackPoint>,
    pub issues: Vec<PointIssue>,
    pub map: MapView,
}

impl TrackSnapshot {
    pub fn new(source: impl Into<String>, activity: ParsedActivity) -> Self {
        let map = MapView::from_points(&activity.points);
        Self {
            source: source.into(),
            name: activity.name,
            points: activity.points,
            issues: activity.issues,
            map,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Proof that a load was started; only the newest ticket can install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What happened to a completed load.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// The snapshot is now the latest track
    Installed,
    /// A newer load was requested; the result was discarded
    Superseded,
    /// The load failed; the previous track is kept
    Failed(TrackError),
}

// ============================================================================
// Track Store
// ============================================================================

pub struct TrackStore {
    latest: Option<Arc<TrackSnapshot>>,
    generation: u64,
    pending: Option<String>,
    hover_index: i64,
    selection: MetricSelection,
}

impl TrackStore {
    pub fn new() -> Self {
        Self {
            latest: None,
            generation: 0,
            pending: None,
            hover_index: NO_INDEX,
            selection: MetricSelection::default(),
        }
    }

    pub fn with_config(config: &ViewerConfig) -> Self {
        Self {
            selection: config.metric_selection(),
            ..Self::new()
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Start a load for `source`, superseding any load in flight.
    pub fn begin_load(&mut self, source: &str) -> LoadTicket {
        self.generation += 1;
        if let Some(previous) = self.pending.replace(source.to_string()) {
            debug!(
                "[TrackStore] Load of '{}' superseded by '{}'",
                previous, source
            );
        }
        info!(
            "[TrackStore] Loading '{}' (generation {})",
            source, self.generation
        );
        LoadTicket {
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Source of the load in flight, if any.
    pub fn pending_source(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Finish a load. Installs the snapshot only when `ticket` is current.
    pub fn complete(
        &mut self,
        ticket: LoadTicket,
        result: Result<TrackSnapshot, TrackError>,
    ) -> LoadOutcome {
        if !self.is_current(ticket) {
            debug!(
                "[TrackStore] Discarding result of generation {} (current {})",
                ticket.generation, self.generation
            );
            return LoadOutcome::Superseded;
        }
        self.pending = None;

        match result {
            Ok(snapshot) => {
                info!(
                    "[TrackStore] Installed '{}' with {} points ({} issues)",
                    snapshot.source,
                    snapshot.len(),
                    snapshot.issues.len()
                );
                self.latest = Some(Arc::new(snapshot));
                self.hover_index = NO_INDEX;
                LoadOutcome::Installed
            }
            Err(e) => {
                warn!("[TrackStore] Load failed, keeping previous track: {}", e);
                LoadOutcome::Failed(e)
            }
        }
    }

    /// Latest installed track.
    pub fn latest(&self) -> Option<Arc<TrackSnapshot>> {
        self.latest.clone()
    }

    /// Drop the current track and cancel any pending load.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.latest = None;
        self.hover_index = NO_INDEX;
    }

    // ========================================================================
    // Hover Link
    // ========================================================================

    /// Record the chart's hovered index (`-1` when the pointer leaves).
    pub fn set_hover_index(&mut self, index: i64) {
        self.hover_index = index;
    }

    pub fn hover_index(&self) -> i64 {
        self.hover_index
    }

    /// Follower marker position for the hovered index.
    pub fn follower_position(&self) -> Option<[f64; 2]> {
        self.latest.as_ref()?.map.follower(self.hover_index)
    }

    // ========================================================================
    // Metric Selection
    // ========================================================================

    pub fn selection(&self) -> &MetricSelection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: MetricSelection) {
        self.selection = selection;
    }

    /// Flip a metric; returns whether it is now shown.
    pub fn toggle_metric(&mut self, metric: Metric) -> bool {
        self.selection.toggle(metric)
    }

    pub fn chart_series(&self) -> Vec<ChartSeries> {
        match &self.latest {
            Some(snapshot) => chart_series(&snapshot.points, &self.selection),
            None => Vec::new(),
        }
    }

    // ========================================================================
    // JSON Export
    // ========================================================================

    /// Chart data as JSON: selected series plus row-oriented data.
    pub fn get_chart_json(&self) -> String {
        let rows = match &self.latest {
            Some(snapshot) => chart_rows(&snapshot.points, &self.selection),
            None => Vec::new(),
        };
        let chart = json!({
            "series": self.chart_series(),
            "rows": rows,
            "hoverIndex": self.hover_index,
        });
        serde_json::to_string(&chart).unwrap_or_else(|_| "{}".to_string())
    }

    /// Map data as JSON, `null` when no track is loaded.
    pub fn get_map_json(&self) -> String {
        let map = self.latest.as_ref().map(|snapshot| {
            json!({
                "view": snapshot.map,
                "follower": snapshot.map.follower(self.hover_index),
            })
        });
        serde_json::to_string(&map).unwrap_or_else(|_| "null".to_string())
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            point_count: self.latest.as_ref().map_or(0, |s| s.len() as u32),
            issue_count: self.latest.as_ref().map_or(0, |s| s.issues.len() as u32),
            generation: self.generation,
            loading: self.pending.is_some(),
        }
    }
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Store statistics for monitoring.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub point_count: u32,
    pub issue_count: u32,
    pub generation: u64,
    pub loading: bool,
}

// ============================================================================
// Global Singleton
// ============================================================================

/// Global store instance shared by the map and chart bindings.
pub static STORE: Lazy<Arc<Mutex<TrackStore>>> =
    Lazy::new(|| Arc::new(Mutex::new(TrackStore::new())));

/// Get a lock on the global store.
pub fn with_store<F, R>(f: F) -> R
where
    F: FnOnce(&mut TrackStore) -> R,
{
    let mut store = STORE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut store)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::parse_lenient;

    fn sample_gpx(lat: f64) -> String {
        format!(
            r#"<gpx><trk><name>Sample</name><trkseg>
              <trkpt lat="{lat}" lon="144.36"><ele>10</ele><time>2024-03-02T08:00:00Z</time>
                <extensions><power>180</power></extensions></trkpt>
              <trkpt lat="{lat}" lon="144.3605"><ele>11</ele><time>2024-03-02T08:00:05Z</time></trkpt>
            </trkseg></trk></gpx>"#
        )
    }

    fn snapshot(source: &str, lat: f64) -> TrackSnapshot {
        TrackSnapshot::new(source, parse_lenient(&sample_gpx(lat)).unwrap())
    }

    #[test]
    fn test_store_install() {
        let mut store = TrackStore::new();
        assert!(store.latest().is_none());

        let ticket = store.begin_load("a.gpx");
        assert_eq!(store.pending_source(), Some("a.gpx"));
        assert!(matches!(
            store.complete(ticket, Ok(snapshot("a.gpx", -38.15))),
            LoadOutcome::Installed
        ));

        let latest = store.latest().unwrap();
        assert_eq!(latest.source, "a.gpx");
        assert_eq!(latest.name.as_deref(), Some("Sample"));
        assert_eq!(latest.len(), 2);
        assert!(store.pending_source().is_none());
    }

    #[test]
    fn test_superseded_result_is_discarded() {
        let mut store = TrackStore::new();
        let first = store.begin_load("slow.gpx");
        let second = store.begin_load("fast.gpx");

        // The newer request finishes first
        assert!(matches!(
            store.complete(second, Ok(snapshot("fast.gpx", -38.0))),
            LoadOutcome::Installed
        ));
        // The stale one arrives later and must not overwrite it
        assert!(matches!(
            store.complete(first, Ok(snapshot("slow.gpx", -37.0))),
            LoadOutcome::Superseded
        ));

        assert_eq!(store.latest().unwrap().source, "fast.gpx");
    }

    #[test]
    fn test_failed_load_keeps_previous() {
        let mut store = TrackStore::new();
        let t1 = store.begin_load("a.gpx");
        store.complete(t1, Ok(snapshot("a.gpx", -38.15)));

        let t2 = store.begin_load("missing.gpx");
        let outcome = store.complete(
            t2,
            Err(TrackError::Io {
                path: "missing.gpx".to_string(),
                message: "not found".to_string(),
            }),
        );
        assert!(matches!(outcome, LoadOutcome::Failed(TrackError::Io { .. })));
        assert_eq!(store.latest().unwrap().source, "a.gpx");
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let mut store = TrackStore::new();
        let t1 = store.begin_load("a.gpx");
        store.complete(t1, Ok(snapshot("a.gpx", -38.15)));
        let held = store.latest().unwrap();

        let t2 = store.begin_load("b.gpx");
        store.complete(t2, Ok(snapshot("b.gpx", -37.0)));

        assert_eq!(held.source, "a.gpx");
        assert_eq!(store.latest().unwrap().source, "b.gpx");
    }

    #[test]
    fn test_hover_follower() {
        let mut store = TrackStore::new();
        assert_eq!(store.follower_position(), None);

        let t = store.begin_load("a.gpx");
        store.complete(t, Ok(snapshot("a.gpx", -38.15)));
        assert_eq!(store.hover_index(), NO_INDEX);
        assert_eq!(store.follower_position(), None);

        store.set_hover_index(1);
        assert_eq!(store.follower_position(), Some([144.3605, -38.15]));

        store.set_hover_index(99);
        assert_eq!(store.follower_position(), None);

        store.set_hover_index(-1);
        assert_eq!(store.follower_position(), None);
    }

    #[test]
    fn test_toggle_metric_keeps_points() {
        let mut store = TrackStore::new();
        let t = store.begin_load("a.gpx");
        store.complete(t, Ok(snapshot("a.gpx", -38.15)));
        let before = store.latest().unwrap().points.clone();

        assert_eq!(store.chart_series().len(), 4);
        assert!(!store.toggle_metric(Metric::HeartRate));
        assert_eq!(store.chart_series().len(), 3);
        assert_eq!(store.latest().unwrap().points, before);
    }

    #[test]
    fn test_json_export() {
        let mut store = TrackStore::new();
        assert_eq!(store.get_map_json(), "null");

        let t = store.begin_load("a.gpx");
        store.complete(t, Ok(snapshot("a.gpx", -38.15)));
        store.set_hover_index(0);

        let chart: serde_json::Value = serde_json::from_str(&store.get_chart_json()).unwrap();
        assert_eq!(chart["series"].as_array().unwrap().len(), 4);
        assert_eq!(chart["rows"][0]["power"], 180.0);
        assert_eq!(chart["hoverIndex"], 0);

        let map: serde_json::Value = serde_json::from_str(&store.get_map_json()).unwrap();
        assert_eq!(map["view"]["path"].as_array().unwrap().len(), 2);
        assert_eq!(map["follower"][0], 144.36);
    }

    #[test]
    fn test_clear_cancels_pending() {
        let mut store = TrackStore::new();
        let t = store.begin_load("a.gpx");
        store.clear();
        assert!(matches!(
            store.complete(t, Ok(snapshot("a.gpx", -38.15))),
            LoadOutcome::Superseded
        ));
        assert!(store.latest().is_none());
        assert_eq!(store.stats().point_count, 0);
    }

    #[test]
    fn test_with_config_selection() {
        let config = ViewerConfig {
            default_metrics: vec![Metric::Speed],
            ..ViewerConfig::default()
        };
        let store = TrackStore::with_config(&config);
        assert_eq!(store.selection().len(), 1);
    }
}
