//! GPX document reader.
//!
//! Streams a GPX 1.1 document with `quick-xml` and extracts the trackpoints of
//! the first `trkseg` of the first `trk`. Every field problem is collected as a
//! [`PointIssue`] instead of turning into NaN:
//!
//! - `lat`/`lon` attributes, `ele` and `time` are required; a point missing any
//!   of them is not emitted.
//! - `extensions/power` and `extensions/*:TrackPointExtension/{hr,atemp,cad}`
//!   are optional; a malformed value is reported and treated as absent.
//!
//! Namespace prefixes are ignored, so `gpxtpx:hr`, `ns3:hr` and `hr` are read alike.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{IssueKind, OptionExt, PointField, PointIssue, Result, TrackError};
use crate::{GpsPoint, TrackPoint};

/// Trackpoints read from a GPX document, before speed derivation.
#[derive(Debug, Clone, Default)]
pub struct RawTrack {
    /// `trk > name` of the first track, if present
    pub name: Option<String>,
    /// Points whose required fields all parsed, in document order
    pub points: Vec<TrackPoint>,
    /// Field problems, in document order
    pub issues: Vec<PointIssue>,
    /// Number of `trkpt` elements in the segment that was read
    pub trkpt_count: usize,
    /// Tracks after the first one, not read
    pub skipped_tracks: usize,
    /// Segments after the first one in the first track, not read
    pub skipped_segments: usize,
}

impl RawTrack {
    /// True when every `trkpt` produced a point without any issue.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.points.len() == self.trkpt_count
    }
}

/// Read the first track segment of a GPX document.
///
/// Fails only on malformed XML or when the `gpx > trk > trkseg` structure is
/// absent. Per-point problems are returned in [`RawTrack::issues`].
pub fn read_track(text: &str) -> Result<RawTrack> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut state = ReaderState::default();

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|e| TrackError::Xml {
            message: e.to_string(),
            position,
        })?;

        match event {
            Event::Start(e) => state.open(&e, position)?,
            Event::Empty(e) => {
                state.open(&e, position)?;
                state.close();
            }
            Event::End(_) => state.close(),
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| TrackError::Xml {
                    message: e.to_string(),
                    position,
                })?;
                state.text(&text);
            }
            Event::CData(t) => {
                let raw = t.into_inner();
                state.text(&String::from_utf8_lossy(&raw));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    state.finish()
}

/// Tracks where the reader is in the document tree.
#[derive(Default)]
struct ReaderState {
    stack: Vec<String>,
    saw_gpx: bool,
    tracks_seen: usize,
    segments_seen: usize,
    name: Option<String>,
    current: Option<PointBuilder>,
    trkpt_count: usize,
    points: Vec<TrackPoint>,
    issues: Vec<PointIssue>,
}

impl ReaderState {
    fn at(&self, path: &[&str]) -> bool {
        self.stack.len() == path.len() && self.stack.iter().zip(path).all(|(a, b)| a == b)
    }

    fn in_first_track(&self) -> bool {
        self.tracks_seen == 1 && self.at(&["gpx", "trk"])
    }

    fn in_target_segment(&self) -> bool {
        self.tracks_seen == 1 && self.segments_seen == 1 && self.at(&["gpx", "trk", "trkseg"])
    }

    fn open(&mut self, e: &BytesStart<'_>, position: u64) -> Result<()> {
        let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

        match local.as_str() {
            "gpx" if self.stack.is_empty() => self.saw_gpx = true,
            "trk" if self.at(&["gpx"]) => self.tracks_seen += 1,
            "trkseg" if self.in_first_track() => self.segments_seen += 1,
            "trkpt" if self.in_target_segment() => {
                self.current = Some(PointBuilder::from_element(self.trkpt_count, e, position)?);
                self.trkpt_count += 1;
            }
            _ => {}
        }

        self.stack.push(local);

        // First occurrence of a field wins. Marking it present makes
        // `<ele></ele>` read as malformed, not missing.
        if let Some(field) = self.current_field() {
            if let Some(builder) = self.current.as_mut() {
                let slot = builder.slot(field);
                if slot.is_none() {
                    *slot = Some(String::new());
                    builder.filling = Some(field);
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        let Some(local) = self.stack.pop() else {
            return;
        };
        if let Some(builder) = self.current.as_mut() {
            builder.filling = None;
        }
        if local == "trkpt" && self.stack.len() == 3 {
            if let Some(builder) = self.current.take() {
                let (point, issues) = builder.build();
                self.issues.extend(issues);
                if let Some(point) = point {
                    self.points.push(point);
                }
            }
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(field) = self.current_field() {
            if let Some(builder) = self.current.as_mut() {
                if builder.filling == Some(field) {
                    builder
                        .slot(field)
                        .get_or_insert_with(String::new)
                        .push_str(text);
                }
            }
        } else if self.tracks_seen == 1 && self.at(&["gpx", "trk", "name"]) {
            self.name.get_or_insert_with(String::new).push_str(text);
        }
    }

    /// Field for the element currently open inside a `trkpt`.
    fn current_field(&self) -> Option<PointField> {
        if self.current.is_none() || self.stack.len() <= 4 {
            return None;
        }
        field_for_path(&self.stack[4..])
    }

    fn finish(self) -> Result<RawTrack> {
        self.saw_gpx.then_some(()).ok_or_missing("gpx")?;
        let skipped_tracks = self.tracks_seen.checked_sub(1).ok_or_missing("trk")?;
        let skipped_segments = self.segments_seen.checked_sub(1).ok_or_missing("trkseg")?;
        if skipped_tracks > 0 || skipped_segments > 0 {
            debug!(
                "[GpxReader] Read first segment only, skipped {} track(s) and {} segment(s)",
                skipped_tracks, skipped_segments
            );
        }

        Ok(RawTrack {
            name: self.name,
            points: self.points,
            issues: self.issues,
            trkpt_count: self.trkpt_count,
            skipped_tracks,
            skipped_segments,
        })
    }
}

/// Map an element path below `trkpt` to the field it carries.
fn field_for_path(path: &[String]) -> Option<PointField> {
    match path {
        [leaf] if leaf == "time" => Some(PointField::Time),
        [leaf] if leaf == "ele" => Some(PointField::Elevation),
        [first, .., parent, leaf] if first == "extensions" => {
            if leaf == "power" {
                return Some(PointField::Power);
            }
            if parent != "TrackPointExtension" {
                return None;
            }
            match leaf.as_str() {
                "hr" => Some(PointField::HeartRate),
                "atemp" => Some(PointField::Temperature),
                "cad" => Some(PointField::Cadence),
                _ => None,
            }
        }
        [first, leaf] if first == "extensions" && leaf == "power" => Some(PointField::Power),
        _ => None,
    }
}

/// Raw text collected for one `trkpt`.
#[derive(Debug, Default)]
struct PointBuilder {
    index: usize,
    /// Field whose element is open and still collecting text
    filling: Option<PointField>,
    lat: Option<String>,
    lon: Option<String>,
    ele: Option<String>,
    time: Option<String>,
    hr: Option<String>,
    cad: Option<String>,
    atemp: Option<String>,
    power: Option<String>,
}

impl PointBuilder {
    fn from_element(index: usize, e: &BytesStart<'_>, position: u64) -> Result<Self> {
        let mut builder = Self {
            index,
            ..Self::default()
        };
        for attr in e.attributes() {
            let attr = attr.map_err(|err| TrackError::Xml {
                message: err.to_string(),
                position,
            })?;
            let value = attr.unescape_value().map_err(|err| TrackError::Xml {
                message: err.to_string(),
                position,
            })?;
            match attr.key.local_name().as_ref() {
                b"lat" => builder.lat = Some(value.into_owned()),
                b"lon" => builder.lon = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(builder)
    }

    fn slot(&mut self, field: PointField) -> &mut Option<String> {
        match field {
            PointField::Latitude => &mut self.lat,
            PointField::Longitude => &mut self.lon,
            PointField::Elevation => &mut self.ele,
            PointField::Time => &mut self.time,
            PointField::HeartRate => &mut self.hr,
            PointField::Cadence => &mut self.cad,
            PointField::Temperature => &mut self.atemp,
            PointField::Power => &mut self.power,
        }
    }

    fn build(mut self) -> (Option<TrackPoint>, Vec<PointIssue>) {
        let mut issues = Vec::new();
        let index = self.index;
        let mut issue = |field: PointField, kind: IssueKind| {
            issues.push(PointIssue { index, field, kind });
        };

        let latitude = required(self.lat.take(), PointField::Latitude, &mut issue, |t| {
            parse_number(t).filter(|&v| GpsPoint::valid_latitude(v))
        });
        let longitude = required(self.lon.take(), PointField::Longitude, &mut issue, |t| {
            parse_number(t).filter(|&v| GpsPoint::valid_longitude(v))
        });
        let elevation = required(self.ele.take(), PointField::Elevation, &mut issue, parse_number);
        let timestamp = required(self.time.take(), PointField::Time, &mut issue, parse_timestamp);

        let heart_rate = optional(self.hr.take(), PointField::HeartRate, &mut issue);
        let cadence = optional(self.cad.take(), PointField::Cadence, &mut issue);
        let temperature = optional(self.atemp.take(), PointField::Temperature, &mut issue);
        let power = optional(self.power.take(), PointField::Power, &mut issue);

        let point = match (latitude, longitude, elevation, timestamp) {
            (Some(latitude), Some(longitude), Some(elevation_meters), Some(timestamp)) => {
                Some(TrackPoint {
                    latitude,
                    longitude,
                    elevation_meters,
                    timestamp,
                    heart_rate_bpm: heart_rate,
                    cadence_rpm: cadence,
                    temperature_celsius: temperature,
                    power_watts: power,
                })
            }
            _ => None,
        };

        (point, issues)
    }
}

fn required<T>(
    text: Option<String>,
    field: PointField,
    issue: &mut impl FnMut(PointField, IssueKind),
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    match text {
        None => {
            issue(field, IssueKind::Missing);
            None
        }
        Some(text) => {
            let value = parse(&text);
            if value.is_none() {
                issue(field, IssueKind::Malformed(text));
            }
            value
        }
    }
}

fn optional(
    text: Option<String>,
    field: PointField,
    issue: &mut impl FnMut(PointField, IssueKind),
) -> Option<f64> {
    // `<gpxtpx:hr/>` carries no reading
    let text = text.filter(|t| !t.trim().is_empty())?;
    let value = parse_number(&text);
    if value.is_none() {
        issue(field, IssueKind::Malformed(text));
    }
    value
}

/// Parse decimal text, rejecting `NaN` and infinities.
fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an ISO-8601 timestamp. Times without an offset are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
