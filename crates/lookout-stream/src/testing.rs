//! In-memory [`FrameFetcher`] for tests.
//!
//! Unlike a unimock [`FrameFetcherMock`](crate::FrameFetcherMock), the
//! scripted fetcher answers any number of requests for a synthetic video and
//! keeps a log of what was asked, which is what ordering and backpressure
//! tests need.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use lookout_net::NetError;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Notify;

use crate::{
    chunk::{ChunkRequest, FrameChunk},
    error::{FetchError, FetchResult},
    fetcher::FrameFetcher,
};

/// Serves frames `{"frame_number": n}` for whatever range is requested.
#[derive(Default)]
pub struct ScriptedFetcher {
    requests: Mutex<Vec<ChunkRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    failures: Mutex<HashMap<u64, FetchError>>,
    ranges: Mutex<HashMap<u64, [u64; 2]>>,
    delay: Option<Duration>,
    requested: Notify,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every request sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Answer the chunk starting at `frame` with `error`.
    pub fn fail_at(&self, frame: u64, error: FetchError) {
        self.failures.lock().insert(frame, error);
    }

    /// Answer the chunk starting at `frame` with HTTP 500.
    pub fn fail_with_server_error_at(&self, frame: u64) {
        self.fail_at(
            frame,
            FetchError::Net(NetError::http_status(500, "mock://frames")),
        );
    }

    /// Report `range` for the chunk starting at `frame`.
    pub fn override_range(&self, frame: u64, range: [u64; 2]) {
        self.ranges.lock().insert(frame, range);
    }

    pub fn requests(&self) -> Vec<ChunkRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Highest number of concurrently running requests seen.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` requests have been issued.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.requested.notified();
            if self.request_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl FrameFetcher for ScriptedFetcher {
    async fn fetch_chunk(&self, request: ChunkRequest) -> FetchResult<FrameChunk> {
        self.requests.lock().push(request.clone());
        self.requested.notify_waiters();

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let start = request.frame_number;
        if let Some(error) = self.failures.lock().get(&start) {
            return Err(error.clone());
        }

        let end = (start + request.num_frames).min(request.frame_count.max(start + 1)) - 1;
        let range = self.ranges.lock().get(&start).copied().unwrap_or([start, end]);
        let frames = (range[0]..=range[1])
            .map(|n| json!({ "frame_number": n }))
            .collect();

        Ok(FrameChunk { frames, range })
    }
}
