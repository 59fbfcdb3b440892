use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::{error::NetError, traits::Net, types::Headers};

/// Timeout decorator for Net implementations
pub struct TimeoutNet<N> {
    inner: N,
    timeout: Duration,
}

impl<N: Net> TimeoutNet<N> {
    pub fn new(inner: N, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<N: Net> Net for TimeoutNet<N> {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError> {
        tokio::time::timeout(self.timeout, self.inner.get_bytes(url.clone(), headers))
            .await
            .map_err(|_| {
                debug!(%url, timeout = ?self.timeout, "request timed out");
                NetError::Timeout
            })?
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use unimock::{MockFn, Unimock, matching};

    use super::*;
    use crate::NetMock;

    struct Stalled;

    #[async_trait]
    impl Net for Stalled {
        async fn get_bytes(&self, _url: Url, _headers: Option<Headers>) -> Result<Bytes, NetError> {
            std::future::pending().await
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_fast_response_passes_through() {
        let mock = Unimock::new(
            NetMock::get_bytes
                .some_call(matching!(_, _))
                .returns(Ok(Bytes::from_static(b"{}"))),
        );
        let net = TimeoutNet::new(mock, Duration::from_secs(5));

        let url = Url::parse("http://test.com/frames").unwrap();
        assert_eq!(net.get_bytes(url, None).await.unwrap(), Bytes::from_static(b"{}"));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_stalled_request_times_out() {
        let net = TimeoutNet::new(Stalled, Duration::from_millis(50));

        let url = Url::parse("http://test.com/frames").unwrap();
        assert_eq!(net.get_bytes(url, None).await, Err(NetError::Timeout));
    }

    #[rstest]
    #[tokio::test]
    async fn test_inner_error_is_kept() {
        let mock = Unimock::new(
            NetMock::get_bytes
                .some_call(matching!(_, _))
                .returns(Err(NetError::http_status(404, "http://test.com/frames"))),
        );
        let net = TimeoutNet::new(mock, Duration::from_secs(5));

        let url = Url::parse("http://test.com/frames").unwrap();
        let error = net.get_bytes(url, None).await.unwrap_err();
        assert_eq!(error.status_code(), Some(404));
    }
}
