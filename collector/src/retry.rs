use earthworm_core::{CollectionSettings, CoreError, ErrorExt};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Caller-level retry: a transient failure gets one more attempt after a
/// pause, anything else is returned as is.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Pause before retrying when the error carries no Retry-After hint.
    pub delay: Duration,
    /// Upper bound on any pause, including server-provided Retry-After.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl From<&CollectionSettings> for RetryPolicy {
    fn from(settings: &CollectionSettings) -> Self {
        Self {
            delay: Duration::from_millis(settings.retry_delay_ms),
            ..Self::default()
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, error: &CoreError) -> Duration {
        error.retry_after().unwrap_or(self.delay).min(self.max_delay)
    }

    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("{} succeeded after {} retry", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for(&error);
                    error.log_warn();
                    warn!("Retrying {} in {:?}", operation_name, delay);
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if error.is_retryable() {
                        error!(
                            "{} failed after {} attempts: {}",
                            operation_name,
                            attempt + 1,
                            error
                        );
                    } else {
                        debug!("Not retrying {}: {}", operation_name, error);
                    }
                    return Err(error);
                }
            }
        }
    }
}
