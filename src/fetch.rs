//! HTTP fetcher (C5): issue GETs with configured headers/proxy/timeout and
//! redirect policy, memoizing responses in an in-process, 60s-TTL cache.
//!
//! All fetch failures (connect error, invalid URL, read error, timeout,
//! closed resource, anything else) are swallowed here and reported to the
//! caller as `None` — the spec's "fetch errors never leave C5" policy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error;

const CACHE_TTL: Duration = Duration::from_secs(60);

/// Configuration the fetcher is built from. A subset of the run's
/// [`crate::config::Options`], split out so the fetcher can be constructed
/// and tested independently.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub proxy: Option<String>,
    pub timeout: Duration,
    pub follow_redirects: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            headers: HashMap::new(),
            proxy: None,
            timeout: Duration::from_secs(5),
            follow_redirects: false,
        }
    }
}

/// A fetched response, with just the fields the crawl engine needs.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

struct CacheEntry {
    inserted_at: Instant,
    response: Arc<CachedResponse>,
}

pub struct Fetcher {
    client: Client,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl Fetcher {
    pub fn new(options: &FetchOptions) -> Result<Self, reqwest::Error> {
        let mut header_map = HeaderMap::new();
        for (key, value) in &options.headers {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            if let (Ok(name), Ok(val)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                header_map.insert(name, val);
            }
        }

        let mut builder = Client::builder()
            .default_headers(header_map)
            .danger_accept_invalid_certs(true)
            .timeout(options.timeout)
            .redirect(if options.follow_redirects {
                Policy::limited(10)
            } else {
                Policy::none()
            });

        if let Some(proxy) = &options.proxy {
            if !proxy.is_empty() {
                builder = builder.proxy(Proxy::all(proxy)?);
            }
        }

        Ok(Fetcher {
            client: builder.build()?,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch `url`, consulting and populating the response cache. Returns
    /// `None` on any failure; the failure is logged, never propagated.
    pub async fn fetch(&self, url: &str) -> Option<Arc<CachedResponse>> {
        if let Some(cached) = self.cache_get(url).await {
            return Some(cached);
        }

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(err) => {
                error::warn(&format!("Failed to fetch URL {url}: {err}")).await;
                return None;
            }
        };

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        let body = match response.text().await {
            Ok(b) => b,
            Err(err) => {
                error::warn(&format!("Failed to read response body for {url}: {err}")).await;
                return None;
            }
        };

        let cached = Arc::new(CachedResponse {
            status,
            headers,
            body,
        });
        self.cache_put(url, Arc::clone(&cached)).await;
        Some(cached)
    }

    async fn cache_get(&self, url: &str) -> Option<Arc<CachedResponse>> {
        let cache = self.cache.lock().await;
        let entry = cache.get(url)?;
        if entry.inserted_at.elapsed() >= CACHE_TTL {
            return None;
        }
        Some(Arc::clone(&entry.response))
    }

    async fn cache_put(&self, url: &str, response: Arc<CachedResponse>) {
        let mut cache = self.cache.lock().await;
        cache.insert(
            url.to_string(),
            CacheEntry {
                inserted_at: Instant::now(),
                response,
            },
        );
    }
}
