//! Feed fetcher with a short-lived cache.
//!
//! Feeds are served from memory for `cache_ttl`. Once stale, the fetcher
//! revalidates with `If-None-Match` / `If-Modified-Since` when the upstream
//! sent validators, and reuses the cached body on `304 Not Modified`. Stale
//! entries are kept for [`STALE_RETENTION`] past the TTL so they can be
//! revalidated, then evicted.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use moka::future::Cache;
use thiserror::Error;

/// Most feeds held in the cache at once
pub const MAX_CACHED_FEEDS: u64 = 64;

/// How long an entry outlives its TTL before eviction
pub const STALE_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Why one feed could not be retrieved
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    pub status: Option<u16>,
    pub message: String,
}

#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone)]
struct CachedFeed {
    body: Vec<u8>,
    fetched_at: Instant,
    etag: Option<String>,
    last_modified: Option<String>,
}

pub struct HttpFeedClient {
    client: Client,
    timeout: Duration,
    cache_ttl: Duration,
    cache: Cache<String, CachedFeed>,
}

impl HttpFeedClient {
    pub fn new(timeout: Duration, cache_ttl: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reconciler/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError {
                status: None,
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            timeout,
            cache_ttl,
            cache: Cache::builder()
                .max_capacity(MAX_CACHED_FEEDS)
                .time_to_live(cache_ttl + STALE_RETENTION)
                .build(),
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> FetchError {
        let message = if err.is_timeout() {
            format!("timed out after {:?}", self.timeout)
        } else {
            err.to_string()
        };
        FetchError {
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let cached = self.cache.get(url).await;

        if let Some(ref entry) = cached {
            if entry.fetched_at.elapsed() < self.cache_ttl {
                tracing::debug!("Serving feed from cache");
                return Ok(entry.body.clone());
            }
        }

        let mut request = self.client.get(url);
        if let Some(ref entry) = cached {
            if let Some(ref etag) = entry.etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(ref modified) = entry.last_modified {
                request = request.header(IF_MODIFIED_SINCE, modified);
            }
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            if let Some(mut entry) = cached {
                tracing::debug!("Feed not modified, refreshing cache entry");
                entry.fetched_at = Instant::now();
                let body = entry.body.clone();
                self.cache.insert(url.to_string(), entry).await;
                return Ok(body);
            }
        }

        if !status.is_success() {
            return Err(FetchError {
                status: Some(status.as_u16()),
                message: format!(
                    "Failed to fetch iCal data: {}",
                    status.canonical_reason().unwrap_or("unexpected status")
                ),
            });
        }

        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let etag = header(ETAG);
        let last_modified = header(LAST_MODIFIED);

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?
            .to_vec();

        tracing::debug!(bytes = body.len(), "Fetched feed");

        self.cache
            .insert(
                url.to_string(),
                CachedFeed {
                    body: body.clone(),
                    fetched_at: Instant::now(),
                    etag,
                    last_modified,
                },
            )
            .await;

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ICS: &str = "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n";

    #[tokio::test]
    async fn test_cached_within_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/red.ics"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ICS))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpFeedClient::new(Duration::from_secs(5), Duration::from_secs(3600)).unwrap();
        let url = format!("{}/red.ics", server.uri());

        assert_eq!(client.fetch(&url).await.unwrap(), ICS.as_bytes());
        assert_eq!(client.fetch(&url).await.unwrap(), ICS.as_bytes());
    }

    #[tokio::test]
    async fn test_non_success_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpFeedClient::new(Duration::from_secs(5), Duration::from_secs(3600)).unwrap();
        let err = client
            .fetch(&format!("{}/missing.ics", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.status, Some(404));
        assert_eq!(err.message, "Failed to fetch iCal data: Not Found");
    }

    #[tokio::test]
    async fn test_stale_entry_is_revalidated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("if-none-match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_string(ICS),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpFeedClient::new(Duration::from_secs(5), Duration::ZERO).unwrap();
        let url = format!("{}/betsie.ics", server.uri());

        assert_eq!(client.fetch(&url).await.unwrap(), ICS.as_bytes());
        assert_eq!(client.fetch(&url).await.unwrap(), ICS.as_bytes());
    }

    #[tokio::test]
    async fn test_hung_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(ICS)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client =
            HttpFeedClient::new(Duration::from_millis(200), Duration::from_secs(3600)).unwrap();
        let err = client
            .fetch(&format!("{}/slow.ics", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.status, None);
        assert!(err.message.starts_with("timed out"));
    }
}
