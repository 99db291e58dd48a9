//! # CacheKit Net
//!
//! Network fetch with cache stamping for the CacheKit offline cache engine.
//!
//! [`CacheFetcher::store`] is the single write path into a bucket: fetch a
//! URL, stamp the response with its expiration, store the stamped copy,
//! hand the live response back to the caller. Expiration checks and serve
//! decisions live elsewhere; this crate only fetches and writes.

use std::fmt;
use std::time::{Duration, SystemTime};

use http::{HeaderValue, StatusCode};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

use cachekit_store::{expiry, BucketHandle, CacheEntry, EXPIRES_HEADER};

/// Errors that can occur while fetching into the cache.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected status: {0}")]
    Status(StatusCode),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Why a response is being written to the cache.
///
/// Purely observational; tags the trace line, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreReason {
    /// Eager population during install.
    Precache,
    /// Replacement of a missing or stale entry on the request path.
    Update,
}

impl fmt::Display for StoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreReason::Precache => f.write_str("Pre-caching"),
            StoreReason::Update => f.write_str("Updating"),
        }
    }
}

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// User agent string.
    pub user_agent: String,
    /// Fixed lifetime stamped onto every cached response. The response's
    /// own caching headers are not consulted.
    pub ttl: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "CacheKit/1.0".to_string(),
            // One week.
            ttl: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

/// Fetches URLs from the network and writes stamped copies into buckets.
#[derive(Debug, Clone)]
pub struct CacheFetcher {
    client: Client,
    ttl: Duration,
}

impl CacheFetcher {
    /// Create a new fetcher.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            ttl: config.ttl,
        })
    }

    /// The fixed TTL stamped onto cached responses.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch `url`, store a stamped copy in `bucket`, return the live
    /// response.
    ///
    /// The stored entry carries `expires_at = now + ttl` under the reserved
    /// header; the returned copy does not, and its body is independent of
    /// the cached one. Network failure and non-success statuses propagate
    /// to the caller; there is no retry at this layer. The bucket write is
    /// a full replacement of any prior entry for the URL.
    pub async fn store(
        &self,
        bucket: &BucketHandle,
        reason: StoreReason,
        url: &str,
    ) -> Result<CacheEntry, FetchError> {
        let url = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let status_text = status.canonical_reason().unwrap_or("").to_string();
        let headers = response.headers().clone();

        // One network read feeds both copies: `Bytes` is immutable and
        // cheaply shared, so consuming the returned response cannot disturb
        // the cached one.
        let body = response.bytes().await?;

        let expires_at = expiry::compute_expiry(SystemTime::now(), self.ttl);
        let stamp = expiry::encode(expires_at);
        let stamp_value = HeaderValue::from_str(&stamp)
            .map_err(|e| FetchError::RequestFailed(format!("invalid expiration stamp: {e}")))?;

        let live = CacheEntry {
            status,
            status_text: status_text.clone(),
            headers: headers.clone(),
            body: body.clone(),
        };

        let mut stamped_headers = headers;
        stamped_headers.insert(EXPIRES_HEADER, stamp_value);

        bucket
            .put(
                url.as_str(),
                CacheEntry {
                    status,
                    status_text,
                    headers: stamped_headers,
                    body,
                },
            )
            .await;

        debug!(reason = %reason, url = %url, expires = %stamp, "response cached");

        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachekit_store::BucketStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_with_ttl(ttl: Duration) -> CacheFetcher {
        CacheFetcher::new(FetcherConfig {
            ttl,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_store_writes_stamped_copy_and_returns_live() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("hello"),
            )
            .mount(&server)
            .await;

        let store = BucketStore::new();
        let bucket = store.open("precache-v1").await;
        let fetcher = fetcher_with_ttl(Duration::from_secs(10));

        let url = format!("{}/a", server.uri());
        let before = SystemTime::now();
        let live = fetcher
            .store(&bucket, StoreReason::Precache, &url)
            .await
            .unwrap();
        let after = SystemTime::now();

        // Live copy: original response, no expiration stamp.
        assert_eq!(live.status, StatusCode::OK);
        assert_eq!(&live.body[..], b"hello");
        assert!(live.headers.get(EXPIRES_HEADER).is_none());
        assert!(live.expires_at().is_none());

        // Cached copy: same response plus the stamp.
        let cached = bucket.get(&url).await.unwrap();
        assert_eq!(&cached.body[..], b"hello");
        assert_eq!(
            cached.headers.get("content-type").unwrap(),
            "text/plain"
        );
        let expires_at = cached.expires_at().unwrap();

        // Stamp is now + ttl, within HTTP-date whole-second truncation.
        let low = before + Duration::from_secs(10) - Duration::from_secs(2);
        let high = after + Duration::from_secs(10) + Duration::from_secs(2);
        assert!(expires_at >= low && expires_at <= high);
    }

    #[tokio::test]
    async fn test_store_overwrites_prior_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string("first"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string("second"))
            .mount(&server)
            .await;

        let store = BucketStore::new();
        let bucket = store.open("runtime").await;
        let fetcher = fetcher_with_ttl(Duration::from_secs(10));
        let url = format!("{}/a", server.uri());

        fetcher
            .store(&bucket, StoreReason::Precache, &url)
            .await
            .unwrap();
        fetcher
            .store(&bucket, StoreReason::Update, &url)
            .await
            .unwrap();

        assert_eq!(bucket.len().await, 1);
        let cached = bucket.get(&url).await.unwrap();
        assert_eq!(&cached.body[..], b"second");
    }

    #[tokio::test]
    async fn test_store_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = BucketStore::new();
        let bucket = store.open("runtime").await;
        let fetcher = fetcher_with_ttl(Duration::from_secs(10));
        let url = format!("{}/missing", server.uri());

        let result = fetcher.store(&bucket, StoreReason::Update, &url).await;
        match result {
            Err(FetchError::Status(status)) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR)
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert!(bucket.get(&url).await.is_none());
    }

    #[tokio::test]
    async fn test_store_propagates_connection_failure() {
        let store = BucketStore::new();
        let bucket = store.open("runtime").await;
        let fetcher = fetcher_with_ttl(Duration::from_secs(10));

        // Nothing listens on port 1.
        let result = fetcher
            .store(&bucket, StoreReason::Update, "http://127.0.0.1:1/a")
            .await;
        assert!(matches!(result, Err(FetchError::HttpError(_))));
        assert!(bucket.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_rejects_bad_url() {
        let store = BucketStore::new();
        let bucket = store.open("runtime").await;
        let fetcher = fetcher_with_ttl(Duration::from_secs(10));

        let result = fetcher
            .store(&bucket, StoreReason::Update, "not a url")
            .await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(StoreReason::Precache.to_string(), "Pre-caching");
        assert_eq!(StoreReason::Update.to_string(), "Updating");
    }
}
