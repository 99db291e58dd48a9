//! Expiration stamps for cached responses.
//!
//! An entry's expiration travels inside the entry itself, as an extra
//! response header holding an RFC 1123 HTTP-date. The codec here is pure:
//! callers supply `now`, nothing reads the wall clock.

use std::time::{Duration, SystemTime};

use http::HeaderMap;

/// Reserved header carrying an entry's expiration timestamp.
///
/// Additive metadata only: never sent on the wire, only read back when
/// deciding whether a cached entry may still be served.
pub const EXPIRES_HEADER: &str = "sw-cache-expires";

/// Compute the expiration timestamp for an entry cached at `now`.
pub fn compute_expiry(now: SystemTime, ttl: Duration) -> SystemTime {
    now + ttl
}

/// Encode a timestamp as an RFC 1123 HTTP-date string (whole seconds).
pub fn encode(timestamp: SystemTime) -> String {
    httpdate::fmt_http_date(timestamp)
}

/// Decode an HTTP-date string back into a timestamp.
///
/// An unparsable value means "no expiration" (the entry never expires),
/// not an error.
pub fn decode(value: &str) -> Option<SystemTime> {
    httpdate::parse_http_date(value).ok()
}

/// Whether a timestamp is expired at `now`. Strictly less-than: an entry
/// expiring exactly at `now` is still servable.
pub fn is_expired(timestamp: SystemTime, now: SystemTime) -> bool {
    timestamp < now
}

/// Derive a TTL in seconds from a response's own caching headers.
///
/// Prefers `Cache-Control: max-age=<n>` (a present but unparsable directive
/// counts as 0), then falls back to the `Expires` header relative to `now`.
/// Returns `None` when the response carries no TTL signal. Auxiliary
/// information only: the fetcher stamps entries with its configured fixed
/// TTL regardless of what the response claims.
pub fn ttl_from_headers(headers: &HeaderMap, now: SystemTime) -> Option<i64> {
    let cache_control = headers
        .get(http::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok());
    if let Some(value) = cache_control {
        let max_age = value
            .split(',')
            .map(str::trim)
            .find_map(|d| d.strip_prefix("max-age="));
        if let Some(directive) = max_age {
            return Some(directive.parse::<i64>().unwrap_or(0));
        }
    }

    let expires = headers.get(http::header::EXPIRES)?;
    let expires_at = decode(expires.to_str().ok()?)?;
    let seconds = match expires_at.duration_since(now) {
        Ok(ahead) => ahead.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    };
    Some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderValue, CACHE_CONTROL, EXPIRES};

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_compute_expiry() {
        let expiry = compute_expiry(at(100), Duration::from_secs(10));
        assert_eq!(expiry, at(110));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        // HTTP-dates have whole-second precision, so compare at second
        // granularity.
        let now = at(1_700_000_000) + Duration::from_millis(451);
        let decoded = decode(&encode(now)).unwrap();
        assert_eq!(decoded, at(1_700_000_000));
    }

    #[test]
    fn test_decode_garbage_is_absent() {
        assert!(decode("not a date").is_none());
        assert!(decode("").is_none());
    }

    #[test]
    fn test_is_expired_strict() {
        assert!(is_expired(at(99), at(100)));
        assert!(!is_expired(at(100), at(100)));
        assert!(!is_expired(at(101), at(100)));
    }

    #[test]
    fn test_ttl_prefers_max_age() {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600"));
        headers.insert(EXPIRES, HeaderValue::from_static("Thu, 01 Jan 1970 00:00:50 GMT"));
        assert_eq!(ttl_from_headers(&headers, at(0)), Some(3600));
    }

    #[test]
    fn test_ttl_unparsable_max_age_is_zero() {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=banana"));
        assert_eq!(ttl_from_headers(&headers, at(0)), Some(0));
    }

    #[test]
    fn test_ttl_falls_back_to_expires() {
        let mut headers = HeaderMap::new();
        headers.insert(EXPIRES, HeaderValue::from_static("Thu, 01 Jan 1970 00:01:40 GMT"));
        assert_eq!(ttl_from_headers(&headers, at(40)), Some(60));
    }

    #[test]
    fn test_ttl_past_expires_is_negative() {
        let mut headers = HeaderMap::new();
        headers.insert(EXPIRES, HeaderValue::from_static("Thu, 01 Jan 1970 00:00:10 GMT"));
        assert_eq!(ttl_from_headers(&headers, at(40)), Some(-30));
    }

    #[test]
    fn test_ttl_no_signal() {
        assert_eq!(ttl_from_headers(&HeaderMap::new(), at(0)), None);
    }
}
