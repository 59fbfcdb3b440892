use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::sleep;
use tracing::{debug, warn};
#[cfg(test)]
use unimock::unimock;
use url::Url;

use crate::{
    error::NetError,
    traits::Net,
    types::{Headers, RetryPolicy},
};

#[cfg_attr(test, unimock(api = RetryPolicyMock))]
pub trait RetryPolicyTrait: Send + Sync {
    fn should_retry(&self, error: &NetError, attempt: u32) -> bool;
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
    /// Hard cap on retries, checked before [`Self::should_retry`].
    fn max_attempts(&self) -> u32;
}

/// Retries errors that [`NetError::is_retryable`] accepts, up to
/// `max_retries` times.
pub struct DefaultRetryPolicy {
    policy: RetryPolicy,
}

impl DefaultRetryPolicy {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl RetryPolicyTrait for DefaultRetryPolicy {
    fn should_retry(&self, error: &NetError, attempt: u32) -> bool {
        attempt < self.policy.max_retries && error.is_retryable()
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.policy.delay_for_attempt(attempt)
    }

    fn max_attempts(&self) -> u32 {
        self.policy.max_retries
    }
}

/// Retry decorator for Net implementations
pub struct RetryNet<N, P> {
    inner: N,
    retry_policy: P,
}

impl<N: Net, P: RetryPolicyTrait> RetryNet<N, P> {
    pub fn new(inner: N, retry_policy: P) -> Self {
        Self {
            inner,
            retry_policy,
        }
    }
}

#[async_trait]
impl<N: Net, P: RetryPolicyTrait> Net for RetryNet<N, P> {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError> {
        let mut attempt = 0;

        loop {
            let error = match self.inner.get_bytes(url.clone(), headers.clone()).await {
                Ok(bytes) => return Ok(bytes),
                Err(error) => error,
            };

            if attempt >= self.retry_policy.max_attempts()
                || !self.retry_policy.should_retry(&error, attempt)
            {
                if attempt > 0 && error.is_retryable() {
                    warn!(%url, attempts = attempt + 1, %error, "giving up on request");
                    return Err(NetError::RetryExhausted {
                        max_retries: attempt,
                        source: Box::new(error),
                    });
                }
                return Err(error);
            }

            attempt += 1;
            let delay = self.retry_policy.delay_for_attempt(attempt);
            debug!(%url, attempt, ?delay, %error, "retrying request");
            sleep(delay).await;
        }
    }
}
