//! Viewer configuration.
//!
//! Loaded from JSON (all fields optional) and overlaid with environment
//! variables. The map access token is only passed through to the map renderer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::metrics::{Metric, MetricSelection};

/// Environment variable holding the map provider access token.
pub const MAP_TOKEN_ENV: &str = "TRACKVIEW_MAP_TOKEN";

/// Environment variable overriding the fetch timeout in seconds.
pub const FETCH_TIMEOUT_ENV: &str = "TRACKVIEW_FETCH_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerConfig {
    /// Metrics shown when a track is first loaded
    pub default_metrics: Vec<Metric>,
    /// Timeout for fetching a GPX file by URL
    pub fetch_timeout_secs: u64,
    /// Map provider credential, forwarded to the renderer
    pub map_access_token: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            default_metrics: Metric::DEFAULT.to_vec(),
            fetch_timeout_secs: 30,
            map_access_token: None,
        }
    }
}

impl ViewerConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable source.
    pub fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(token) = var(MAP_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.map_access_token = Some(token);
        }
        if let Some(secs) = var(FETCH_TIMEOUT_ENV) {
            self.fetch_timeout_secs = secs.trim().parse().map_err(|_| TrackError::Config {
                message: format!("{} must be a whole number of seconds, got '{}'", FETCH_TIMEOUT_ENV, secs),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_secs == 0 {
            return Err(TrackError::Config {
                message: "fetchTimeoutSecs must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Initial chart selection.
    pub fn metric_selection(&self) -> MetricSelection {
        MetricSelection::from_metrics(self.default_metrics.iter().copied())
    }
}
