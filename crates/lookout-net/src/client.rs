use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::trace;
use url::Url;

use crate::{
    error::{NetError, NetResult},
    traits::Net,
    types::{Headers, NetOptions},
};

/// [`Net`] over a pooled reqwest client.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    options: NetOptions,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns [`NetError::Http`] if the TLS backend cannot be initialised.
    pub fn new(options: NetOptions) -> NetResult<Self> {
        let inner = Client::builder()
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .build()
            .map_err(|e| NetError::http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { inner, options })
    }

    pub fn options(&self) -> &NetOptions {
        &self.options
    }

    fn apply_headers(
        mut req: reqwest::RequestBuilder,
        headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    ) -> reqwest::RequestBuilder {
        for (k, v) in headers {
            req = req.header(k.as_ref(), v.as_ref());
        }
        req
    }
}

#[async_trait]
impl Net for HttpClient {
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError> {
        trace!(%url, "GET");
        let req = self.inner.get(url.clone());
        let req = Self::apply_headers(req, self.options.headers.iter());
        let req = match &headers {
            Some(headers) => Self::apply_headers(req, headers.iter()),
            None => req,
        };
        let req = req.timeout(self.options.request_timeout);

        let resp = req.send().await.map_err(NetError::from)?;
        let status = resp.status();

        if !status.is_success() {
            return Err(NetError::http_status(status.as_u16(), url.as_str()));
        }

        resp.bytes().await.map_err(NetError::from)
    }
}
