//! URL Probing
//!
//! HEAD-with-GET-fallback reachability checks used by the citations and
//! internal-links stages. Each URL is probed at most once per run via a
//! lock-free cache, which doubles as the record of every URL probed.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::constants::{concurrency, network};
use crate::types::{ForgeError, Result};

/// Result of probing one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 2xx or 3xx response
    Valid(u16),
    /// Anything else, including transport errors and timeouts
    Invalid(String),
}

impl ProbeOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

#[async_trait]
pub trait UrlProber: Send + Sync {
    /// Probe a single URL. Never errors: failures are `Invalid`.
    async fn probe(&self, url: &str) -> ProbeOutcome;

    /// Every URL probed so far in this run
    fn probed_urls(&self) -> Vec<String>;
}

pub type SharedProber = Arc<dyn UrlProber>;

/// Probe a batch of URLs with bounded parallelism, preserving input order.
pub async fn probe_all(
    prober: &SharedProber,
    urls: Vec<String>,
    max_concurrency: usize,
) -> Vec<(String, ProbeOutcome)> {
    let mut results: Vec<(usize, String, ProbeOutcome)> = futures::stream::iter(
        urls.into_iter().enumerate().map(|(i, url)| {
            let prober = Arc::clone(prober);
            async move {
                let outcome = prober.probe(&url).await;
                (i, url, outcome)
            }
        }),
    )
    .buffer_unordered(max_concurrency.max(1))
    .collect::<Vec<_>>()
    .await;

    results.sort_by_key(|(i, _, _)| *i);
    results
        .into_iter()
        .map(|(_, url, outcome)| (url, outcome))
        .collect()
}

// =============================================================================
// HTTP Prober
// =============================================================================

/// Reqwest-backed prober with per-URL timeout and in-run caching.
///
/// Redirects are not followed so that 3xx statuses stay observable; the
/// spec counts them as valid.
pub struct HttpProber {
    client: reqwest::Client,
    cache: DashMap<String, ProbeOutcome>,
}

impl HttpProber {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                ForgeError::Config(format!("Failed to create probe HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            cache: DashMap::new(),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(network::PROBE_TIMEOUT_SECS)
    }

    async fn probe_uncached(&self, url: &str) -> ProbeOutcome {
        match self.client.head(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if (200..400).contains(&status) {
                    ProbeOutcome::Valid(status)
                } else if status == 405 || status == 501 {
                    // HEAD refused: fall back to GET once
                    self.probe_get(url).await
                } else {
                    ProbeOutcome::Invalid(format!("status {}", status))
                }
            }
            Err(e) if e.is_timeout() => ProbeOutcome::Invalid("timeout".to_string()),
            Err(_) => self.probe_get(url).await,
        }
    }

    async fn probe_get(&self, url: &str) -> ProbeOutcome {
        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if (200..400).contains(&status) {
                    ProbeOutcome::Valid(status)
                } else {
                    ProbeOutcome::Invalid(format!("status {}", status))
                }
            }
            Err(e) => ProbeOutcome::Invalid(e.to_string()),
        }
    }
}

#[async_trait]
impl UrlProber for HttpProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        if let Some(cached) = self.cache.get(url) {
            return cached.clone();
        }
        let outcome = self.probe_uncached(url).await;
        debug!(url, valid = outcome.is_valid(), "Probed URL");
        self.cache.insert(url.to_string(), outcome.clone());
        outcome
    }

    fn probed_urls(&self) -> Vec<String> {
        self.cache.iter().map(|e| e.key().clone()).collect()
    }
}

/// Default bounded batch probe using the shared concurrency cap
pub async fn probe_all_default(
    prober: &SharedProber,
    urls: Vec<String>,
) -> Vec<(String, ProbeOutcome)> {
    probe_all(prober, urls, concurrency::PROBE_CONCURRENCY).await
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticProber;

    #[tokio::test]
    async fn test_probe_all_preserves_order() {
        let prober: SharedProber = Arc::new(StaticProber::accepting(&["https://a.example/"]));
        let urls = vec![
            "https://a.example/".to_string(),
            "https://b.example/".to_string(),
            "https://c.example/".to_string(),
        ];
        let results = probe_all(&prober, urls.clone(), 2).await;
        let returned: Vec<&String> = results.iter().map(|(u, _)| u).collect();
        assert_eq!(returned, urls.iter().collect::<Vec<_>>());
        assert!(results[0].1.is_valid());
        assert!(!results[1].1.is_valid());
    }

    #[tokio::test]
    async fn test_probed_urls_recorded() {
        let prober: SharedProber = Arc::new(StaticProber::accepting(&[]));
        let _ = probe_all(&prober, vec!["https://x.example/".to_string()], 4).await;
        assert_eq!(prober.probed_urls(), vec!["https://x.example/".to_string()]);
    }
}
