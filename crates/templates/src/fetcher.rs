//! Template fetcher with TTL and early refresh

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use answerflow_core::{Error, Result};

/// Entries younger than this are served without any upstream activity.
const FRESH_FOR: Duration = Duration::from_secs(12 * 60);

/// Entries older than this are no longer served without a fetch attempt.
const EXPIRES_AFTER: Duration = Duration::from_secs(15 * 60);

/// Per-request upstream timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct CacheEntry {
    body: Arc<Vec<u8>>,
    fetched_at: Instant,
}

/// Process-wide cache in front of the template host.
///
/// - hit younger than the fresh window: served from cache
/// - hit between fresh and expiry: served from cache, refreshed in the
///   background (one refresh per URL at a time)
/// - miss or expired: fetched synchronously, single-flight per URL; on
///   upstream failure a stale body is served when one exists
#[derive(Clone)]
pub struct TemplateFetcher {
    client: reqwest::Client,
    entries: Arc<DashMap<String, CacheEntry>>,
    locks: Arc<DashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    fresh_for: Duration,
    expires_after: Duration,
}

impl TemplateFetcher {
    pub fn new() -> Result<Self> {
        Self::with_windows(FRESH_FOR, EXPIRES_AFTER)
    }

    /// Construct with custom freshness windows. Production uses
    /// [`TemplateFetcher::new`]; tests shrink the windows.
    pub fn with_windows(fresh_for: Duration, expires_after: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            entries: Arc::new(DashMap::new()),
            locks: Arc::new(DashMap::new()),
            fresh_for,
            expires_after,
        })
    }

    /// Fetch the body at `url`, honouring the cache policy.
    pub async fn fetch(&self, url: &str) -> Result<Arc<Vec<u8>>> {
        if let Some(entry) = self.entries.get(url) {
            let age = entry.fetched_at.elapsed();
            if age < self.fresh_for {
                return Ok(entry.body.clone());
            }
            if age < self.expires_after {
                let body = entry.body.clone();
                drop(entry);
                self.spawn_refresh(url.to_string());
                return Ok(body);
            }
        }

        // Miss or expired entry: fetch now, one flight per URL.
        let lock = self.url_lock(url);
        let _guard = lock.lock().await;

        // Another caller may have fetched while we waited for the lock.
        if let Some(entry) = self.entries.get(url) {
            if entry.fetched_at.elapsed() < self.expires_after {
                return Ok(entry.body.clone());
            }
        }

        match self.fetch_upstream(url).await {
            Ok(body) => {
                self.insert(url, body.clone());
                Ok(body)
            }
            Err(e) => {
                if let Some(stale) = self.entries.get(url) {
                    tracing::warn!(url, error = %e, "template fetch failed, serving stale body");
                    return Ok(stale.body.clone());
                }
                Err(Error::UpstreamUnavailable(format!("{url}: {e}")))
            }
        }
    }

    /// Fetch and decode as UTF-8.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let body = self.fetch(url).await?;
        String::from_utf8(body.as_ref().clone())
            .map_err(|e| Error::UpstreamUnavailable(format!("{url}: body is not UTF-8: {e}")))
    }

    fn url_lock(&self, url: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn insert(&self, url: &str, body: Arc<Vec<u8>>) {
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                body,
                fetched_at: Instant::now(),
            },
        );
    }

    fn spawn_refresh(&self, url: String) {
        let fetcher = self.clone();
        tokio::spawn(async move {
            let lock = fetcher.url_lock(&url);
            // A held lock means a refresh or fetch is already underway.
            let Ok(_guard) = lock.try_lock() else {
                return;
            };

            // The entry may have been replaced while this task was queued.
            if let Some(entry) = fetcher.entries.get(&url) {
                if entry.fetched_at.elapsed() < fetcher.fresh_for {
                    return;
                }
            }

            match fetcher.fetch_upstream(&url).await {
                Ok(body) => {
                    fetcher.insert(&url, body);
                    tracing::debug!(url, "template refreshed in background");
                }
                Err(e) => {
                    tracing::warn!(url, error = %e, "background template refresh failed");
                }
            }
        });
    }

    async fn fetch_upstream(&self, url: &str) -> std::result::Result<Arc<Vec<u8>>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(Arc::new(body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(fresh_ms: u64, expiry_ms: u64) -> TemplateFetcher {
        TemplateFetcher::with_windows(
            Duration::from_millis(fresh_ms),
            Duration::from_millis(expiry_ms),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_cold_fetches_hit_upstream_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("prompt"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher(60_000, 90_000);
        let url = format!("{}/p.txt", server.uri());
        let (a, b) = tokio::join!(fetcher.fetch(&url), fetcher.fetch(&url));
        assert_eq!(a.unwrap().as_slice(), b"prompt");
        assert_eq!(b.unwrap().as_slice(), b"prompt");
    }

    #[tokio::test]
    async fn test_fresh_hit_performs_no_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("prompt"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher(60_000, 90_000);
        let url = format!("{}/p.txt", server.uri());
        fetcher.fetch(&url).await.unwrap();
        let body = fetcher.fetch(&url).await.unwrap();
        assert_eq!(body.as_slice(), b"prompt");
    }

    #[tokio::test]
    async fn test_early_refresh_serves_cached_then_updates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("v1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/p.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("v2"))
            .mount(&server)
            .await;

        let fetcher = fetcher(100, 5_000);
        let url = format!("{}/p.txt", server.uri());
        assert_eq!(fetcher.fetch(&url).await.unwrap().as_slice(), b"v1");

        tokio::time::sleep(Duration::from_millis(150)).await;

        // Inside the early-refresh window: the stale body is served now
        // and the refresh happens off the request path.
        assert_eq!(fetcher.fetch(&url).await.unwrap().as_slice(), b"v1");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fetcher.fetch(&url).await.unwrap().as_slice(), b"v2");
    }

    #[tokio::test]
    async fn test_stale_body_served_when_upstream_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("prompt"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/p.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = fetcher(50, 100);
        let url = format!("{}/p.txt", server.uri());
        fetcher.fetch(&url).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        // Entry is past expiry and the upstream now errors; the stale
        // body is still preferable to failing the request.
        assert_eq!(fetcher.fetch(&url).await.unwrap().as_slice(), b"prompt");
    }

    #[tokio::test]
    async fn test_cold_miss_with_failing_upstream_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p.txt"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = fetcher(50, 100);
        let url = format!("{}/p.txt", server.uri());
        assert!(matches!(
            fetcher.fetch(&url).await,
            Err(Error::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_text_rejects_invalid_utf8() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blob"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfe, 0x00]))
            .mount(&server)
            .await;

        let fetcher = fetcher(60_000, 90_000);
        let url = format!("{}/blob", server.uri());
        // Raw bytes are fine, text decoding is not.
        assert!(fetcher.fetch(&url).await.is_ok());
        assert!(fetcher.fetch_text(&url).await.is_err());
    }
}
