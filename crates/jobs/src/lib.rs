//! Background scheduled-refresh task (spec.md §5 "Scheduled refresh" / §9).
//!
//! Modeled as an independent task owning its own timer and cancellation
//! token rather than a callback on `Storage`, per spec.md §9: startable,
//! stoppable, and `stop` drains the in-flight refresh rather than aborting
//! it mid-write.

use filterdns_infrastructure::hash_storage::HashStorage;
use filterdns_infrastructure::refreshable_source::RefreshableSource;
use filterdns_infrastructure::result_cache::ResultCache;
use filterdns_infrastructure::storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Periodically calls [`Storage::refresh`] at a fixed interval.
///
/// Grounded on the teacher's `BlocklistSyncJob` (`crates/jobs/src/blocklist_sync.rs`):
/// same `tokio::time::interval` + `CancellationToken` + `tokio::select!` shutdown
/// shape, generalized from "reload one block index" to "refresh the whole
/// filtering `Storage`".
pub struct RefreshSchedulerJob {
    storage: Arc<Storage>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl RefreshSchedulerJob {
    pub fn new(storage: Arc<Storage>, interval: Duration) -> Self {
        Self {
            storage,
            interval,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawns the periodic refresh loop. The first tick fires after one
    /// full `interval`, not immediately — `refresh_initial` is the caller's
    /// responsibility before this job ever starts.
    pub async fn start(self: Arc<Self>) {
        info!(interval_secs = self.interval.as_secs(), "starting refresh scheduler job");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!("refresh scheduler job: shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        info!("refresh scheduler job: refreshing filter storage");
                        match self.storage.refresh(false).await {
                            Ok(()) => info!("refresh scheduler job: refresh completed"),
                            Err(e) => error!(error = %e, "refresh scheduler job: refresh failed"),
                        }
                    }
                }
            }
        });
    }

    /// Stops the job, allowing any in-flight refresh to drain to completion
    /// (spec.md §9: "stop drains the current refresh to completion or
    /// cancels it via the token").
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

/// Periodically refreshes a single [`HashStorage`] from its
/// [`RefreshableSource`] (spec.md §5: "Hash Storages have their own refresh
/// workers with identical semantics"). `Storage::refresh` already refreshes
/// the hash storages it owns directly; this job exists for hash storages
/// run on an independent cadence from the rest of the filtering core
/// (e.g. a safe-browsing list updated more often than rule lists).
pub struct HashStorageRefreshJob {
    source: RefreshableSource,
    storage: Arc<HashStorage>,
    result_cache: Option<Arc<ResultCache>>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl HashStorageRefreshJob {
    pub fn new(source: RefreshableSource, storage: Arc<HashStorage>, interval: Duration) -> Self {
        Self {
            source,
            storage,
            result_cache: None,
            interval,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_result_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.result_cache = Some(cache);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn start(self: Arc<Self>) {
        info!(interval_secs = self.interval.as_secs(), "starting hash storage refresh job");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!("hash storage refresh job: shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.source.refresh(false).await {
                            Ok(text) => {
                                let count = self.storage.reset(&text);
                                if let Some(cache) = &self.result_cache {
                                    cache.clear();
                                }
                                info!(count, "hash storage refresh job: reset complete");
                            }
                            Err(e) => error!(error = %e, "hash storage refresh job: fetch failed"),
                        }
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}
