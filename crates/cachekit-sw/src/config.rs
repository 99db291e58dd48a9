//! Worker configuration.
//!
//! Everything version-specific lives here: bucket names, the precache
//! manifest, and the caching duration. Components receive the config at
//! construction; there are no process-wide constants to mutate.

use std::time::Duration;

use url::Url;

/// Configuration for one version of the offline worker.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Versioned precache bucket name. Bump the version suffix whenever a
    /// precached resource changes; the next install then repopulates from
    /// scratch and activation deletes the old bucket.
    pub precache_bucket: String,

    /// Unversioned runtime bucket name.
    pub runtime_bucket: String,

    /// Fixed lifetime stamped onto every cached response.
    pub ttl: Duration,

    /// Origin whose requests may be intercepted. Cross-origin requests
    /// always pass through untouched.
    pub origin: Url,

    /// Local resources to precache on install. Only these paths are ever
    /// served from the cache.
    pub precache_manifest: Vec<String>,

    /// Development builds skip install, activation, and interception.
    pub dev_mode: bool,
}

impl CacheConfig {
    /// Config with the default manifest and a one-week TTL.
    pub fn new(origin: Url) -> Self {
        Self {
            precache_bucket: "precache-v1".to_string(),
            runtime_bucket: "runtime".to_string(),
            ttl: Duration::from_secs(7 * 24 * 3600),
            origin,
            precache_manifest: [
                "/manifest.json",
                "/images/icons/hello-icon-144.png",
                "/favicon.png",
                "/",
                "/main.css",
                "/main.mjs",
                "/scripts/vendor.mjs",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            dev_mode: false,
        }
    }

    /// Bucket names current for this version. Anything else found in the
    /// store is garbage by activation time.
    pub fn current_buckets(&self) -> [&str; 2] {
        [&self.precache_bucket, &self.runtime_bucket]
    }

    /// Whether a request URL is subject to interception: same origin, and
    /// its path (with query, when present) appears in the precache
    /// manifest verbatim.
    pub fn intercepts(&self, url: &Url) -> bool {
        if url.origin() != self.origin.origin() {
            return false;
        }
        let path_and_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        self.precache_manifest.iter().any(|p| *p == path_and_query)
    }

    /// Absolute URL for a manifest path.
    pub fn manifest_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.origin.join(path)
    }
}
