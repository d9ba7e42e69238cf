use async_trait::async_trait;
use enrich::{Place, PlaceSearch};
use extract::{PipelineError, Result, TextGenerator};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
    attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64, attempt_timeout: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
            attempt_timeout,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff_ms,
            config.max_backoff_ms,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Run `f` with a per-attempt timeout, retrying transient failures with
    /// exponential backoff. `timed_out` builds the error for an expired attempt.
    pub async fn retry<F, Fut, T>(
        &self,
        operation_name: &str,
        timed_out: fn(String) -> PipelineError,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let outcome = match timeout(self.attempt_timeout, f()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(timed_out(format!(
                    "{} timed out after {}ms",
                    operation_name,
                    self.attempt_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %e,
                            "Operation failed after max retries"
                        );
                        return Err(e);
                    }

                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis(),
                        error = %e,
                        "Operation failed, retrying"
                    );

                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }
}

/// Generator wrapper adding the retry policy around every call.
pub struct RetryingGenerator {
    inner: Arc<dyn TextGenerator>,
    policy: RetryPolicy,
}

impl RetryingGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl TextGenerator for RetryingGenerator {
    fn check_credentials(&self) -> Result<()> {
        self.inner.check_credentials()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.policy
            .retry("generation", |m| PipelineError::transient_generation(m), || {
                self.inner.generate(prompt)
            })
            .await
    }
}

pub struct RetryingSearch {
    inner: Arc<dyn PlaceSearch>,
    policy: RetryPolicy,
}

impl RetryingSearch {
    pub fn new(inner: Arc<dyn PlaceSearch>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl PlaceSearch for RetryingSearch {
    fn check_credentials(&self) -> Result<()> {
        self.inner.check_credentials()
    }

    async fn search(&self, query: &str) -> Result<Vec<Place>> {
        self.policy
            .retry("place_search", |m| PipelineError::transient_enrichment(m), || {
                self.inner.search(query)
            })
            .await
    }
}
