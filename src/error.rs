//! Unified error handling for the trackview library.
//!
//! Every fallible operation (parsing, loading, configuration) returns
//! [`TrackError`] so callers get a typed reason instead of NaN-filled points.

use std::fmt;

/// Required or optional trackpoint field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PointField {
    Latitude,
    Longitude,
    Elevation,
    Time,
    HeartRate,
    Cadence,
    Temperature,
    Power,
}

impl PointField {
    /// Required fields make the whole point unusable when they fail.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            PointField::Latitude | PointField::Longitude | PointField::Elevation | PointField::Time
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            PointField::Latitude => "lat",
            PointField::Longitude => "lon",
            PointField::Elevation => "ele",
            PointField::Time => "time",
            PointField::HeartRate => "hr",
            PointField::Cadence => "cad",
            PointField::Temperature => "atemp",
            PointField::Power => "power",
        }
    }
}

/// What went wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "text")]
pub enum IssueKind {
    /// The element or attribute is absent
    Missing,
    /// The text could not be parsed as a number or timestamp
    Malformed(String),
}

/// A validation problem on a single trackpoint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointIssue {
    /// Zero-based position of the `trkpt` in its segment
    pub index: usize,
    pub field: PointField,
    pub kind: IssueKind,
}

impl fmt::Display for PointIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::Missing => write!(f, "trkpt {}: missing {}", self.index, self.field.name()),
            IssueKind::Malformed(text) => write!(
                f,
                "trkpt {}: malformed {} '{}'",
                self.index,
                self.field.name(),
                text
            ),
        }
    }
}

/// Unified error type for trackview operations.
#[derive(Debug, Clone)]
pub enum TrackError {
    /// The document is not well-formed XML
    Xml { message: String, position: u64 },
    /// The document lacks the gpx > trk > trkseg structure
    MissingElement { element: String },
    /// One or more trackpoints failed field validation
    InvalidPoints { issues: Vec<PointIssue> },
    /// Reading a local GPX file failed
    Io { path: String, message: String },
    /// HTTP fetch error
    Http {
        message: String,
        status_code: Option<u16>,
    },
    /// Configuration error
    Config { message: String },
    /// Generic internal error
    Internal { message: String },
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::Xml { message, position } => {
                write!(f, "Malformed GPX at byte {}: {}", position, message)
            }
            TrackError::MissingElement { element } => {
                write!(f, "GPX document has no <{}> element", element)
            }
            TrackError::InvalidPoints { issues } => {
                write!(f, "{} invalid trackpoint field(s)", issues.len())?;
                if let Some(first) = issues.first() {
                    write!(f, ", first: {}", first)?;
                }
                Ok(())
            }
            TrackError::Io { path, message } => {
                write!(f, "Failed to read '{}': {}", path, message)
            }
            TrackError::Http {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "HTTP error ({}): {}", code, message)
                } else {
                    write!(f, "HTTP error: {}", message)
                }
            }
            TrackError::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
            TrackError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for TrackError {}

impl From<serde_json::Error> for TrackError {
    fn from(err: serde_json::Error) -> Self {
        TrackError::Config {
            message: err.to_string(),
        }
    }
}

/// Result type alias for trackview operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Extension trait for converting Option to TrackError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a missing element error.
    fn ok_or_missing(self, element: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing(self, element: &str) -> Result<T> {
        self.ok_or_else(|| TrackError::MissingElement {
            element: element.to_string(),
        })
    }
}
