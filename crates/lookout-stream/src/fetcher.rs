use std::sync::Arc;

use async_trait::async_trait;
use lookout_net::Net;
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;
use url::Url;

use crate::{
    chunk::{ChunkRequest, FrameChunk},
    error::{FetchError, FetchResult},
};

/// Retrieves one chunk of frames. The seam between the source state
/// machine and the transport.
#[cfg_attr(
    any(test, feature = "test-utils"),
    unimock::unimock(api = FrameFetcherMock)
)]
#[async_trait]
pub trait FrameFetcher: Send + Sync + 'static {
    async fn fetch_chunk(&self, request: ChunkRequest) -> FetchResult<FrameChunk>;
}

#[async_trait]
impl<F: FrameFetcher + ?Sized> FrameFetcher for Arc<F> {
    async fn fetch_chunk(&self, request: ChunkRequest) -> FetchResult<FrameChunk> {
        (**self).fetch_chunk(request).await
    }
}

/// [`FrameFetcher`] issuing `GET endpoint?frameNumber=..&numFrames=..` requests.
pub struct HttpFrameFetcher<N> {
    net: N,
    endpoint: Url,
}

impl<N: Net> HttpFrameFetcher<N> {
    pub fn new(net: N, endpoint: Url) -> Self {
        Self { net, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl<N: Net + 'static> FrameFetcher for HttpFrameFetcher<N> {
    async fn fetch_chunk(&self, request: ChunkRequest) -> FetchResult<FrameChunk> {
        let url = request.to_url(&self.endpoint);
        let body = self.net.get_bytes(url, None).await?;
        let chunk: FrameChunk = serde_json::from_slice(&body)?;
        trace!(
            frame = request.frame_number,
            range = ?chunk.range,
            frames = chunk.frames.len(),
            "chunk received"
        );
        Ok(chunk)
    }
}

#[derive(Deserialize)]
struct SampleBody {
    sample: Value,
}

/// One-off request for a single sample: `GET url?sampleId=..`, returning
/// the `sample` object of the response.
///
/// # Errors
///
/// [`FetchError::Net`] on transport failure, [`FetchError::Body`] if the
/// response is not `{"sample": {...}}`.
pub async fn fetch_sample<N: Net + ?Sized>(
    net: &N,
    url: &Url,
    sample_id: &str,
) -> FetchResult<Value> {
    let mut url = url.clone();
    url.query_pairs_mut().append_pair("sampleId", sample_id);

    let body = net.get_bytes(url, None).await?;
    let SampleBody { sample } = serde_json::from_slice(&body)?;
    if !sample.is_object() {
        return Err(FetchError::Body(format!(
            "sample {sample_id} is not an object"
        )));
    }
    Ok(sample)
}
