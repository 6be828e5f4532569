//! Unified Timeout Configuration
//!
//! Centralized timeout management with operation-specific defaults.

use std::future::Future;
use std::time::Duration;

use crate::constants::network as net_constants;
use crate::types::{ForgeError, Result};

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Full-article generation call
    pub llm_request: Duration,
    /// Per-field refinement call
    pub field_review: Duration,
    /// Single URL probe
    pub probe: Duration,
    /// Sitemap fetch
    pub sitemap: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_request: Duration::from_secs(net_constants::LLM_TIMEOUT_SECS),
            field_review: Duration::from_secs(net_constants::FIELD_TIMEOUT_SECS),
            probe: Duration::from_secs(net_constants::PROBE_TIMEOUT_SECS),
            sitemap: Duration::from_secs(net_constants::SITEMAP_TIMEOUT_SECS),
        }
    }
}

pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ForgeError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_config_defaults() {
        let config = TimeoutConfig::default();
        assert_eq!(config.llm_request.as_secs(), 60);
        assert_eq!(config.field_review.as_secs(), 30);
        assert_eq!(config.probe.as_secs(), 2);
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, ForgeError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, ForgeError>(42)
            },
            "slow operation",
        )
        .await;
        assert!(matches!(result.unwrap_err(), ForgeError::Timeout { .. }));
    }
}
