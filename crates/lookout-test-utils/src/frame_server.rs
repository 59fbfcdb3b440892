//! A fake label server answering frame-chunk and single-sample requests.
//!
//! Every frame carries one `Detections` container with a single 2x2 mask
//! filled with the frame number, so tests can check both ordering and
//! decoding from the same response.

use std::{collections::HashSet, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use derive_setters::Setters;
use lookout_codec::{Dtype, NdArray, encode};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::http_server::TestHttpServer;

/// Query string of a frame-chunk request, as received by the server.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameQuery {
    pub frame_number: u64,
    pub num_frames: u64,
    pub frame_count: u64,
    pub sample_id: String,
    pub source: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SampleQuery {
    sample_id: String,
}

#[derive(Clone, Debug, Default, Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct FrameServerConfig {
    /// Answer the chunk starting at this frame with HTTP 500.
    pub fail_at: Option<u64>,
    /// Sleep before answering a chunk request.
    pub delay: Option<Duration>,
    /// Shift every returned range by this many frames.
    pub range_skew: u64,
    /// Sample ids answered with HTTP 404.
    pub missing: HashSet<String>,
}

#[derive(Default)]
struct ServerState {
    config: FrameServerConfig,
    frame_requests: Mutex<Vec<FrameQuery>>,
    sample_requests: Mutex<Vec<String>>,
}

pub struct FrameServer {
    server: TestHttpServer,
    state: Arc<ServerState>,
}

impl FrameServer {
    pub async fn start() -> Self {
        Self::with_config(FrameServerConfig::default()).await
    }

    pub async fn with_config(config: FrameServerConfig) -> Self {
        let state = Arc::new(ServerState {
            config,
            ..ServerState::default()
        });
        let router = Router::new()
            .route("/frames", get(frames))
            .route("/sample", get(sample))
            .with_state(Arc::clone(&state));

        Self {
            server: TestHttpServer::new(router).await,
            state,
        }
    }

    #[must_use]
    pub fn frames_url(&self) -> Url {
        self.server.url("/frames")
    }

    #[must_use]
    pub fn sample_url(&self) -> Url {
        self.server.url("/sample")
    }

    /// Chunk requests received so far, in arrival order.
    #[must_use]
    pub fn frame_requests(&self) -> Vec<FrameQuery> {
        self.state
            .frame_requests
            .lock()
            .clone()
    }

    #[must_use]
    pub fn sample_requests(&self) -> Vec<String> {
        self.state
            .sample_requests
            .lock()
            .clone()
    }
}

/// Mask carried by frame `n`.
#[must_use]
pub fn frame_mask(n: u64) -> NdArray {
    let fill = u8::try_from(n % 256).expect("modulo fits in u8");
    NdArray::new(Dtype::Uint8, vec![2, 2], vec![fill; 4]).expect("2x2 uint8 mask")
}

/// Segmentation mask carried by every single sample.
#[must_use]
pub fn sample_mask() -> NdArray {
    NdArray::new(Dtype::Uint8, vec![3, 2], vec![0, 1, 1, 0, 1, 1]).expect("3x2 uint8 mask")
}

fn frame(sample_id: &str, n: u64) -> Value {
    json!({
        "_id": format!("{sample_id}-frame-{n}"),
        "frame_number": n,
        "objects": {
            "_cls": "Detections",
            "detections": [{
                "_cls": "Detection",
                "_id": format!("{sample_id}-det-{n}"),
                "label": "vehicle",
                "bounding_box": [0.1, 0.1, 0.5, 0.5],
                "mask": encode(&frame_mask(n)),
            }],
        },
    })
}

async fn frames(State(state): State<Arc<ServerState>>, Query(query): Query<FrameQuery>) -> Response {
    state
        .frame_requests
        .lock()
        .push(query.clone());

    if let Some(delay) = state.config.delay {
        tokio::time::sleep(delay).await;
    }
    if state.config.fail_at == Some(query.frame_number) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "frame store unavailable").into_response();
    }

    let start = query.frame_number;
    let end = (start + query.num_frames.max(1)).min(query.frame_count.max(start + 1)) - 1;
    let frames: Vec<Value> = (start..=end).map(|n| frame(&query.sample_id, n)).collect();
    let skew = state.config.range_skew;

    Json(json!({ "frames": frames, "range": [start + skew, end + skew] })).into_response()
}

async fn sample(State(state): State<Arc<ServerState>>, Query(query): Query<SampleQuery>) -> Response {
    state
        .sample_requests
        .lock()
        .push(query.sample_id.clone());

    if state.config.missing.contains(&query.sample_id) {
        return (StatusCode::NOT_FOUND, "no such sample").into_response();
    }

    Json(json!({
        "sample": {
            "_id": query.sample_id,
            "filepath": "/datasets/quickstart/clip.mp4",
            "ground_truth": {
                "_cls": "Segmentation",
                "_id": "seg-1",
                "mask": encode(&sample_mask()),
            },
        },
    }))
    .into_response()
}
