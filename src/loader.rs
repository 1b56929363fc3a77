//! Fetch -> parse -> enrich pipeline.
//!
//! [`TrackLoader`] runs one load per requested source on the tokio runtime.
//! A new request aborts the task in flight and bumps the store generation, so
//! a late result from an older request is never shown.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{info, warn};
use tokio::task::JoinHandle;

use crate::config::ViewerConfig;
use crate::derivation::parse_lenient;
use crate::error::{Result, TrackError};
use crate::store::{LoadOutcome, LoadTicket, TrackSnapshot, TrackStore, STORE};

/// Where a GPX document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    Path(PathBuf),
    Url(String),
}

impl TrackSource {
    /// `http(s)://` locations are URLs; everything else is a file path.
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            TrackSource::Url(location.to_string())
        } else if let Some(path) = location.strip_prefix("file://") {
            TrackSource::Path(PathBuf::from(path))
        } else {
            TrackSource::Path(PathBuf::from(location))
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSource::Path(path) => write!(f, "{}", path.display()),
            TrackSource::Url(url) => f.write_str(url),
        }
    }
}

impl From<&str> for TrackSource {
    fn from(location: &str) -> Self {
        TrackSource::parse(location)
    }
}

/// Read the GPX text from a file or URL.
pub async fn load_text(source: &TrackSource, timeout: Duration) -> Result<String> {
    match source {
        TrackSource::Path(path) => {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| TrackError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
        }
        TrackSource::Url(url) => fetch_url(url, timeout).await,
    }
}

#[cfg(feature = "http")]
async fn fetch_url(url: &str, timeout: Duration) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TrackError::Http {
            message: format!("Failed to create HTTP client: {}", e),
            status_code: None,
        })?;

    let response = client.get(url).send().await.map_err(|e| TrackError::Http {
        message: format!("Request error: {}", e),
        status_code: e.status().map(|s| s.as_u16()),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(TrackError::Http {
            message: format!("GET {} returned {}", url, status),
            status_code: Some(status.as_u16()),
        });
    }

    response.text().await.map_err(|e| TrackError::Http {
        message: format!("Failed to read body: {}", e),
        status_code: Some(status.as_u16()),
    })
}

#[cfg(not(feature = "http"))]
async fn fetch_url(url: &str, _timeout: Duration) -> Result<String> {
    Err(TrackError::Config {
        message: format!("cannot fetch '{}': built without the `http` feature", url),
    })
}

/// Load and derive one track.
pub async fn load_track(source: &TrackSource, config: &ViewerConfig) -> Result<TrackSnapshot> {
    let start = Instant::now();
    let text = load_text(source, config.fetch_timeout()).await?;
    let activity = parse_lenient(&text)?;

    info!(
        "[TrackLoader] Loaded {} points from {} in {:.1}ms",
        activity.points.len(),
        source,
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(TrackSnapshot::new(source.to_string(), activity))
}

fn lock(store: &Mutex<TrackStore>) -> MutexGuard<'_, TrackStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs loads into a shared [`TrackStore`], one in flight at a time.
pub struct TrackLoader {
    store: Arc<Mutex<TrackStore>>,
    config: Arc<ViewerConfig>,
    in_flight: Option<JoinHandle<LoadOutcome>>,
}

impl TrackLoader {
    /// Loader with its own store.
    pub fn new(config: ViewerConfig) -> Self {
        let store = Arc::new(Mutex::new(TrackStore::with_config(&config)));
        Self::with_store(store, config)
    }

    /// Loader writing into the global [`STORE`].
    pub fn global(config: ViewerConfig) -> Self {
        Self::with_store(Arc::clone(&STORE), config)
    }

    pub fn with_store(store: Arc<Mutex<TrackStore>>, config: ViewerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            in_flight: None,
        }
    }

    pub fn store(&self) -> Arc<Mutex<TrackStore>> {
        Arc::clone(&self.store)
    }

    /// Start loading `source`, aborting any load in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&mut self, source: impl Into<TrackSource>) -> LoadTicket {
        let source = source.into();

        if let Some(previous) = self.in_flight.take() {
            previous.abort();
        }

        let ticket = lock(&self.store).begin_load(&source.to_string());
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);

        self.in_flight = Some(tokio::spawn(async move {
            let result = load_track(&source, &config).await;
            lock(&store).complete(ticket, result)
        }));

        ticket
    }

    /// Wait for the load in flight; `None` if nothing was requested.
    pub async fn finish(&mut self) -> Option<LoadOutcome> {
        let handle = self.in_flight.take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) if e.is_cancelled() => Some(LoadOutcome::Superseded),
            Err(e) => {
                warn!("[TrackLoader] Load task failed: {}", e);
                Some(LoadOutcome::Failed(TrackError::Internal {
                    message: format!("Task error: {}", e),
                }))
            }
        }
    }

    /// Request `source` and wait for it.
    pub async fn load(&mut self, source: impl Into<TrackSource>) -> LoadOutcome {
        self.request(source);
        self.finish().await.unwrap_or(LoadOutcome::Superseded)
    }
}

impl Drop for TrackLoader {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}
