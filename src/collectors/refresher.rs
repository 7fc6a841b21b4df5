use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::tle_fetcher::{fetch_source, CelestrakSource, FetchError};
use crate::core::catalog::{CatalogHandle, RefreshSummary};
use crate::core::tle::{parse_batch, parse_tle_file, TleFileError};
use crate::utils::db::{self, DbError};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Tle(#[from] TleFileError),
    #[error("no element data available for {0}")]
    NoData(String),
}

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub sources: Vec<CelestrakSource>,
    pub interval: std::time::Duration,
    pub cache_max_age: Duration,
    /// Network fetches are skipped when false; only the cache is used.
    pub network: bool,
}

struct Inner {
    catalog: Arc<CatalogHandle>,
    settings: RefreshSettings,
    client: Option<reqwest::Client>,
    cache: Option<StdMutex<Connection>>,
}

#[derive(Debug)]
struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Keeps the catalog current from CelesTrak and the local cache.
pub struct Refresher {
    inner: Arc<Inner>,
    worker: Option<WorkerHandle>,
}

impl Refresher {
    pub fn new(
        catalog: Arc<CatalogHandle>,
        settings: RefreshSettings,
        client: Option<reqwest::Client>,
        cache: Option<Connection>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner { catalog, settings, client, cache: cache.map(StdMutex::new) }),
            worker: None,
        }
    }

    /// Opens (or creates) the cache at `path`; a failure leaves the refresher cache-less.
    pub fn open_cache(path: &Path) -> Option<Connection> {
        match db::open_or_init(path) {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Element cache unavailable");
                None
            }
        }
    }

    pub async fn refresh_source(
        &self,
        source: &CelestrakSource,
    ) -> Result<RefreshSummary, RefreshError> {
        self.inner.refresh_source(source).await
    }

    /// Refreshes every configured source; failures are logged and skipped.
    pub async fn refresh_all(&self) -> usize {
        self.inner.refresh_all().await
    }

    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(inner.settings.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = &mut stop_rx => return,
                }
                // A refresh in flight is abandoned on stop; the catalog only
                // ever sees whole batches.
                tokio::select! {
                    _ = inner.refresh_all() => {}
                    _ = &mut stop_rx => return,
                }
            }
        });
        self.worker = Some(WorkerHandle { stop_tx, join });
        info!(interval_s = self.inner.settings.interval.as_secs(), "Refresher started");
    }

    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if let Err(e) = worker.join.await {
                warn!(error = %e, "Refresher task ended abnormally");
            }
            info!("Refresher stopped");
        }
    }
}

impl Inner {
    async fn refresh_all(&self) -> usize {
        let mut refreshed = 0;
        for source in &self.settings.sources {
            match self.refresh_source(source).await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!(source = %source, error = %e, "Refresh failed"),
            }
        }
        refreshed
    }

    async fn refresh_source(
        &self,
        source: &CelestrakSource,
    ) -> Result<RefreshSummary, RefreshError> {
        let key = source.cache_key();
        let cached = self.load_cached(&key);
        let now = Utc::now();

        if let Some((text, fetched_at)) = &cached {
            if now - *fetched_at < self.settings.cache_max_age {
                debug!(source = %source, fetched_at = %fetched_at, "Using cached element sets");
                return Ok(self.apply(source, text));
            }
        }

        let client = match (&self.client, self.settings.network) {
            (Some(client), true) => client,
            _ => return self.fall_back(source, cached, None),
        };
        match fetch_source(client, source).await {
            Ok(text) => {
                let summary = self.apply(source, &text);
                self.store_cached(&key, &text, now);
                Ok(summary)
            }
            Err(e) => self.fall_back(source, cached, Some(e)),
        }
    }

    fn fall_back(
        &self,
        source: &CelestrakSource,
        cached: Option<(String, DateTime<Utc>)>,
        error: Option<FetchError>,
    ) -> Result<RefreshSummary, RefreshError> {
        match (cached, error) {
            (Some((text, fetched_at)), error) => {
                match &error {
                    Some(e) => warn!(
                        source = %source,
                        error = %e,
                        fetched_at = %fetched_at,
                        "Fetch failed; using stale cache"
                    ),
                    None => info!(
                        source = %source,
                        fetched_at = %fetched_at,
                        "Network disabled; using stale cache"
                    ),
                }
                Ok(self.apply(source, &text))
            }
            (None, Some(e)) => Err(e.into()),
            (None, None) => Err(RefreshError::NoData(source.to_string())),
        }
    }

    fn apply(&self, source: &CelestrakSource, text: &str) -> RefreshSummary {
        let batch = parse_batch(text);
        if batch.records.is_empty() {
            warn!(source = %source, errors = batch.errors.len(), "Source produced no element sets");
        }
        self.catalog.refresh(batch, &[])
    }

    fn load_cached(&self, key: &str) -> Option<(String, DateTime<Utc>)> {
        let conn = self.cache.as_ref()?.lock().unwrap_or_else(PoisonError::into_inner);
        match db::load_source_text(&conn, key) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(source = key, error = %e, "Failed to read element cache");
                None
            }
        }
    }

    fn store_cached(&self, key: &str, text: &str, fetched_at: DateTime<Utc>) {
        let Some(cache) = &self.cache else {
            return;
        };
        let conn = cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = db::store_source_text(&conn, key, text, fetched_at) {
            warn!(source = key, error = %e, "Failed to write element cache");
        }
    }
}

/// Loads local TLE files into the catalog; unreadable files are logged and skipped.
pub fn load_files(catalog: &CatalogHandle, paths: &[PathBuf]) -> usize {
    let mut loaded = 0;
    for path in paths {
        match parse_tle_file(path) {
            Ok(batch) => {
                let summary = catalog.refresh(batch, &[]);
                info!(
                    path = %path.display(),
                    added = summary.added,
                    replaced = summary.replaced,
                    "Loaded local TLE file"
                );
                loaded += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to load TLE file"),
        }
    }
    loaded
}
