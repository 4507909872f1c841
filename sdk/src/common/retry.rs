use super::errors::{AzureError, AzureResult};
use std::future::Future;
use std::time::Duration;

/// Retry policy with exponential backoff for transient Azure API failures.
///
/// Delays follow `base_delay * 2^attempt`. When the service answers with a
/// `Retry-After` hint the larger of the two delays wins. Non-retryable errors
/// (see [`AzureError::is_retryable`]) fail immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt
    pub max_retries: u32,
    /// Base delay for the exponential backoff
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries, for callers that handle transients themselves.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Run `operation` until it succeeds or retries are exhausted.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> AzureResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AzureResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() {
                        log::debug!("Non-retryable error during {operation}, failing immediately: {e}");
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt, &e);
                    last_error = Some(e);

                    if attempt < self.max_retries {
                        log::debug!(
                            "Attempt {} of {operation} failed, retrying in {:?}: {}",
                            attempt + 1,
                            delay,
                            last_error.as_ref().unwrap()
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap())
    }

    fn delay_for(&self, attempt: u32, error: &AzureError) -> Duration {
        let backoff = self.base_delay * 2_u32.pow(attempt);
        match error {
            AzureError::RateLimited {
                retry_after_seconds,
                ..
            } => backoff.max(Duration::from_secs(*retry_after_seconds)),
            _ => backoff,
        }
    }
}
