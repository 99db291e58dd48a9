//! Worker lifecycle: install, activate, fetch interception.

use std::time::SystemTime;

use cachekit_net::{CacheFetcher, FetchError, FetcherConfig, StoreReason};
use cachekit_store::{BucketStore, CacheEntry};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::CacheConfig;
use crate::registration::RegistrationHost;
use crate::SwError;

/// Worker lifecycle phase. Entered in order, once per worker instance;
/// `Active` is terminal until the process is replaced by a new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Precaching the manifest.
    Installing,
    /// Installed, waiting for activation.
    Waiting,
    /// Deleting stale buckets and claiming clients.
    Activating,
    /// Controlling fetches.
    Active,
}

/// Outcome of the install phase's precache fan-out.
///
/// Install is best-effort: every manifest URL is attempted, failures are
/// collected rather than aborting the batch, and the phase transitions
/// either way. Callers decide what a partial precache means to them.
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Manifest paths cached successfully.
    pub cached: Vec<String>,
    /// Manifest paths that failed, with their errors.
    pub failed: Vec<(String, FetchError)>,
}

impl InstallReport {
    /// Whether every manifest URL was cached.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A response produced by the fetch-intercept path.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The served response.
    pub entry: CacheEntry,
    /// Whether it came from the cache (as opposed to a live refetch).
    pub from_cache: bool,
}

/// Drives the worker's lifecycle against a bucket store and the network.
///
/// The hosting runtime calls [`on_install`](Self::on_install),
/// [`on_activate`](Self::on_activate), and [`on_fetch`](Self::on_fetch)
/// for its corresponding events; the controller calls back through
/// [`RegistrationHost`] where it needs the runtime to act.
pub struct LifecycleController {
    config: CacheConfig,
    store: BucketStore,
    fetcher: CacheFetcher,
    phase: RwLock<WorkerPhase>,
}

impl LifecycleController {
    /// Create a controller for one worker version.
    pub fn new(config: CacheConfig, store: BucketStore) -> Result<Self, SwError> {
        let fetcher = CacheFetcher::new(FetcherConfig {
            ttl: config.ttl,
            ..Default::default()
        })?;

        Ok(Self {
            config,
            store,
            fetcher,
            phase: RwLock::new(WorkerPhase::Installing),
        })
    }

    /// The worker's configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The bucket store this worker caches into.
    pub fn store(&self) -> &BucketStore {
        &self.store
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> WorkerPhase {
        *self.phase.read().await
    }

    async fn set_phase(&self, phase: WorkerPhase) {
        *self.phase.write().await = phase;
    }

    /// Install: precache every manifest URL concurrently, then signal the
    /// host to skip waiting.
    ///
    /// The phase completes only once every fetch has settled. Partial
    /// failure still transitions and still signals skip-waiting; the
    /// failures come back in the report and are logged per URL. Dev builds
    /// transition straight through without caching anything.
    pub async fn on_install(&self, host: &dyn RegistrationHost) -> InstallReport {
        if self.config.dev_mode {
            debug!("install skipped in dev build");
            self.set_phase(WorkerPhase::Waiting).await;
            return InstallReport::default();
        }

        let bucket = self.store.open(&self.config.precache_bucket).await;

        let fetches = self.config.precache_manifest.iter().map(|path| {
            let bucket = bucket.clone();
            let path = path.clone();
            async move {
                let result = match self.config.manifest_url(&path) {
                    Ok(url) => {
                        self.fetcher
                            .store(&bucket, StoreReason::Precache, url.as_str())
                            .await
                    }
                    Err(e) => Err(FetchError::InvalidUrl(e.to_string())),
                };
                (path, result)
            }
        });

        let mut report = InstallReport::default();
        for (path, result) in futures::future::join_all(fetches).await {
            match result {
                Ok(_) => report.cached.push(path),
                Err(e) => {
                    warn!(url = %path, error = %e, "precache failed");
                    report.failed.push((path, e));
                }
            }
        }

        self.set_phase(WorkerPhase::Waiting).await;
        host.skip_waiting();

        info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "INSTALLED"
        );
        report
    }

    /// Activate: delete every bucket outside the current version set, then
    /// claim already-open clients so this version governs their fetches
    /// immediately.
    ///
    /// Errors are caught here at the phase boundary; activation never
    /// crashes the worker. Dev builds transition straight through.
    pub async fn on_activate(&self, host: &dyn RegistrationHost) {
        if self.config.dev_mode {
            debug!("activation skipped in dev build");
            self.set_phase(WorkerPhase::Active).await;
            return;
        }

        self.set_phase(WorkerPhase::Activating).await;

        let current = self.config.current_buckets();
        let deleted = self.store.delete_stale_buckets(&current).await;

        if let Err(e) = host.claim() {
            error!(error = %e, "claim failed");
        }

        self.set_phase(WorkerPhase::Active).await;
        info!(stale_deleted = deleted, "ACTIVATED");
    }

    /// Fetch interception.
    ///
    /// `Ok(None)` means the request is not ours (cross-origin, not in the
    /// precache manifest, or a dev build) and the host should hit the
    /// network as if no worker existed. For intercepted requests, a cached entry
    /// whose expiration is absent or still ahead is served as-is; anything
    /// else is refetched through the cache, replacing the entry. A network
    /// failure on that path is the requester's failure; there is no
    /// offline fallback page.
    pub async fn on_fetch(&self, url: &Url) -> Result<Option<FetchResponse>, SwError> {
        if self.config.dev_mode || !self.config.intercepts(url) {
            return Ok(None);
        }

        let bucket = self.store.open(&self.config.precache_bucket).await;

        if let Some(entry) = bucket.get(url.as_str()).await {
            if !entry.is_expired_at(SystemTime::now()) {
                debug!(url = %url, "serving from cache");
                return Ok(Some(FetchResponse {
                    entry,
                    from_cache: true,
                }));
            }
            debug!(url = %url, "cached entry expired, using network");
        } else {
            debug!(url = %url, "no match in cache, using network");
        }

        let entry = self
            .fetcher
            .store(&bucket, StoreReason::Update, url.as_str())
            .await?;

        Ok(Some(FetchResponse {
            entry,
            from_cache: false,
        }))
    }
}
