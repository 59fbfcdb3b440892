use std::{cmp::min, collections::HashMap, time::Duration};

use derive_setters::Setters;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<HashMap<String, String>> for Headers {
    fn from(map: HashMap<String, String>) -> Self {
        Self { inner: map }
    }
}

/// Exponential backoff for [`RetryNet`](crate::RetryNet).
#[derive(Clone, Debug, PartialEq, Eq, Setters)]
#[setters(prefix = "with_")]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Delay before attempt number `attempt` (the first attempt is 0).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        min(self.base_delay.saturating_mul(factor), self.max_delay)
    }
}

/// Transport configuration.
///
/// ```
/// use std::time::Duration;
/// use lookout_net::{NetOptions, RetryPolicy};
///
/// let options = NetOptions::default()
///     .with_request_timeout(Duration::from_secs(10))
///     .with_retry_policy(RetryPolicy::default().with_max_retries(2));
/// assert_eq!(options.retry_policy.max_retries, 2);
/// ```
#[derive(Clone, Debug, Setters)]
#[setters(prefix = "with_")]
pub struct NetOptions {
    /// Upper bound for one request, connect to last body byte.
    pub request_timeout: Duration,
    pub retry_policy: RetryPolicy,
    /// Max idle connections per host. Set to 0 to disable pooling.
    pub pool_max_idle_per_host: usize,
    /// Sent with every request.
    pub headers: Headers,
}

impl Default for NetOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            pool_max_idle_per_host: 4,
            headers: Headers::new(),
        }
    }
}
