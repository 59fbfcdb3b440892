use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// The video sample a stream walks through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamTarget {
    pub sample_id: String,
    /// Read frames from the original media rather than a derived one.
    pub source: bool,
    /// First frame to fetch.
    pub start_frame: u64,
    /// The sequence ends once the cursor reaches this frame.
    pub frame_count: u64,
}

impl StreamTarget {
    pub fn new(sample_id: impl Into<String>, frame_count: u64) -> Self {
        Self {
            sample_id: sample_id.into(),
            source: false,
            start_frame: 0,
            frame_count,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: bool) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_start_frame(mut self, start_frame: u64) -> Self {
        self.start_frame = start_frame;
        self
    }

    pub(crate) fn request(&self, frame_number: u64, num_frames: u64) -> ChunkRequest {
        ChunkRequest {
            frame_number,
            num_frames,
            frame_count: self.frame_count,
            sample_id: self.sample_id.clone(),
            source: self.source,
        }
    }
}

/// One chunk request, as sent in the query string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRequest {
    pub frame_number: u64,
    pub num_frames: u64,
    pub frame_count: u64,
    pub sample_id: String,
    pub source: bool,
}

impl ChunkRequest {
    /// `endpoint` with this request's query parameters appended.
    pub fn to_url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .append_pair("frameNumber", &self.frame_number.to_string())
            .append_pair("numFrames", &self.num_frames.to_string())
            .append_pair("frameCount", &self.frame_count.to_string())
            .append_pair("sampleId", &self.sample_id)
            .append_pair("source", if self.source { "true" } else { "false" });
        url
    }
}

/// A contiguous batch of per-frame label records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameChunk {
    pub frames: Vec<Value>,
    /// Inclusive `[first, last]` frame numbers.
    pub range: [u64; 2],
}

impl FrameChunk {
    pub fn start(&self) -> u64 {
        self.range[0]
    }

    pub fn end(&self) -> u64 {
        self.range[1]
    }
}
