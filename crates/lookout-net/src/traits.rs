use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use unimock::unimock;
use url::Url;

use crate::{
    error::NetError,
    retry::{DefaultRetryPolicy, RetryNet},
    timeout::TimeoutNet,
    types::{Headers, RetryPolicy},
};

#[cfg_attr(test, unimock(api = NetMock))]
#[async_trait]
pub trait Net: Send + Sync {
    /// Get all bytes from a URL
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError>;
}

#[async_trait]
impl<N: Net + ?Sized> Net for Arc<N> {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError> {
        (**self).get_bytes(url, headers).await
    }
}

pub trait NetExt: Net + Sized {
    /// Add timeout layer
    fn with_timeout(self, timeout: Duration) -> TimeoutNet<Self> {
        TimeoutNet::new(self, timeout)
    }

    /// Add retry layer
    fn with_retry(self, policy: RetryPolicy) -> RetryNet<Self, DefaultRetryPolicy> {
        RetryNet::new(self, DefaultRetryPolicy::new(policy))
    }
}

impl<T: Net> NetExt for T {}
