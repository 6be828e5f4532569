//! Retry Decorator
//!
//! Wraps any provider with classification-driven retries: exponential
//! backoff with jitter for rate-limit/network/transient/parse failures,
//! fail-fast for auth and bad-request errors.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use super::{LlmProvider, LlmResponse, SharedProvider, ToolOptions};
use crate::constants::retry as retry_constants;
use crate::types::{ErrorClassifier, ForgeError, Result};

/// Provider decorator applying the pipeline retry policy
pub struct RetryingProvider {
    inner: SharedProvider,
}

impl RetryingProvider {
    pub fn new(inner: SharedProvider) -> Self {
        Self { inner }
    }

    fn backoff() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(retry_constants::BASE_DELAY_SECS))
            .with_factor(retry_constants::BACKOFF_FACTOR)
            .with_max_times(retry_constants::MAX_ATTEMPTS - 1)
            .with_jitter()
    }
}

/// Decide whether an error is worth another attempt
fn should_retry(err: &ForgeError) -> bool {
    match err {
        ForgeError::Llm(e) => e.is_retryable(),
        ForgeError::LlmApi(msg) => ErrorClassifier::classify(msg, "llm").is_retryable(),
        ForgeError::Http(_) => true,
        ForgeError::Timeout { .. } => true,
        // Structured output that failed schema extraction may parse on retry
        ForgeError::Parse { .. } => true,
        _ => false,
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    async fn generate(
        &self,
        prompt: &str,
        schema: &Value,
        tools: ToolOptions,
    ) -> Result<LlmResponse> {
        (|| async { self.inner.generate(prompt, schema, tools).await })
            .retry(Self::backoff())
            .when(should_retry)
            .notify(|err: &ForgeError, wait: Duration| {
                warn!(
                    provider = self.inner.name(),
                    wait_secs = wait.as_secs(),
                    "LLM call failed, retrying: {}",
                    err
                );
            })
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorCategory, LlmError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyProvider {
        calls: AtomicUsize,
        fail_first: usize,
        category: ErrorCategory,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _schema: &Value,
            _tools: ToolOptions,
        ) -> Result<LlmResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(LlmError::new(self.category, "boom")
                    .retry_after(Duration::from_millis(1))
                    .into())
            } else {
                Ok(LlmResponse::content_only(Value::String("ok".into())))
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let inner = Arc::new(FlakyProvider {
            calls: AtomicUsize::new(0),
            fail_first: 2,
            category: ErrorCategory::Transient,
        });
        let provider = RetryingProvider::new(inner.clone());
        let result = provider
            .generate("p", &Value::Null, ToolOptions::none())
            .await;
        assert!(result.is_ok());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_fails_fast() {
        let inner = Arc::new(FlakyProvider {
            calls: AtomicUsize::new(0),
            fail_first: 10,
            category: ErrorCategory::Auth,
        });
        let provider = RetryingProvider::new(inner.clone());
        let result = provider
            .generate("p", &Value::Null, ToolOptions::none())
            .await;
        assert!(result.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let inner = Arc::new(FlakyProvider {
            calls: AtomicUsize::new(0),
            fail_first: 10,
            category: ErrorCategory::Transient,
        });
        let provider = RetryingProvider::new(inner.clone());
        let result = provider
            .generate("p", &Value::Null, ToolOptions::none())
            .await;
        assert!(result.is_err());
        assert_eq!(
            inner.calls.load(Ordering::SeqCst),
            retry_constants::MAX_ATTEMPTS
        );
    }
}
