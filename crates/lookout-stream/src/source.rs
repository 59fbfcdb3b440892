use std::{
    pin::Pin,
    task::{Context, Poll, ready},
};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    chunk::{FrameChunk, StreamTarget},
    error::{FetchError, FetchResult},
    fetcher::FrameFetcher,
    options::StreamOptions,
};

/// Where a [`ChunkedFrameSource`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceState {
    /// More chunks may follow.
    Active,
    /// Every frame up to the frame count has been delivered.
    Exhausted,
    /// A fetch failed; the error was the last item.
    Failed,
    Cancelled,
}

/// Pull-based sequence of [`FrameChunk`]s for one video sample.
///
/// Chunks arrive in increasing, contiguous range order. The producer task
/// reserves a queue slot before each request, so buffered plus in-flight
/// chunks never exceed `look_ahead` and only one request is outstanding.
/// Failures are not retried; wrap the transport instead.
pub struct ChunkedFrameSource {
    rx: mpsc::Receiver<FetchResult<FrameChunk>>,
    cancel: CancellationToken,
    state: SourceState,
}

impl ChunkedFrameSource {
    /// Start producing chunks for `target` on the current tokio runtime.
    pub fn spawn<F: FrameFetcher>(fetcher: F, target: StreamTarget, options: StreamOptions) -> Self {
        Self::spawn_with_cancel(fetcher, target, options, &CancellationToken::new())
    }

    /// Like [`spawn`](Self::spawn), cancelled together with `parent`.
    pub fn spawn_with_cancel<F: FrameFetcher>(
        fetcher: F,
        target: StreamTarget,
        options: StreamOptions,
        parent: &CancellationToken,
    ) -> Self {
        let options = options.normalized();
        let cancel = parent.child_token();
        let (tx, rx) = mpsc::channel(options.look_ahead);

        let producer = Producer {
            fetcher,
            cursor: target.start_frame,
            target,
            chunk_size: options.chunk_size,
            tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(producer.run());

        Self {
            rx,
            cancel,
            state: SourceState::Active,
        }
    }

    /// Next chunk, `None` once the sequence has ended.
    ///
    /// After a `Some(Err(_))` the source is [`SourceState::Failed`] and
    /// yields `None` from then on.
    pub async fn next_chunk(&mut self) -> Option<FetchResult<FrameChunk>> {
        std::future::poll_fn(|cx| self.poll_chunk(cx)).await
    }

    /// Stop the producer. Takes effect at the next pull; chunks already
    /// buffered are discarded.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!("frame source cancelled");
            self.cancel.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelling this source from elsewhere.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SourceState {
        if self.state == SourceState::Active && self.cancel.is_cancelled() {
            return SourceState::Cancelled;
        }
        self.state
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<FetchResult<FrameChunk>>> {
        if self.state != SourceState::Active {
            return Poll::Ready(None);
        }
        if self.cancel.is_cancelled() {
            self.finish(SourceState::Cancelled);
            return Poll::Ready(None);
        }

        match ready!(self.rx.poll_recv(cx)) {
            Some(Ok(chunk)) => Poll::Ready(Some(Ok(chunk))),
            Some(Err(error)) => {
                self.finish(SourceState::Failed);
                Poll::Ready(Some(Err(error)))
            }
            None if self.cancel.is_cancelled() => {
                self.finish(SourceState::Cancelled);
                Poll::Ready(None)
            }
            None => {
                self.finish(SourceState::Exhausted);
                Poll::Ready(None)
            }
        }
    }

    fn finish(&mut self, state: SourceState) {
        trace!(?state, "frame source finished");
        self.state = state;
        self.rx.close();
    }
}

impl Stream for ChunkedFrameSource {
    type Item = FetchResult<FrameChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_chunk(cx)
    }
}

impl Drop for ChunkedFrameSource {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Producer<F> {
    fetcher: F,
    target: StreamTarget,
    cursor: u64,
    chunk_size: u64,
    tx: mpsc::Sender<FetchResult<FrameChunk>>,
    cancel: CancellationToken,
}

impl<F: FrameFetcher> Producer<F> {
    async fn run(mut self) {
        debug!(
            sample_id = %self.target.sample_id,
            cursor = self.cursor,
            frame_count = self.target.frame_count,
            chunk_size = self.chunk_size,
            "frame producer started"
        );

        while self.cursor < self.target.frame_count {
            let permit = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                permit = self.tx.reserve() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let request = self.target.request(self.cursor, self.chunk_size);
            trace!(cursor = self.cursor, "fetching chunk");
            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.fetcher.fetch_chunk(request) => result,
            };

            match result.and_then(|chunk| advance(&mut self.cursor, chunk)) {
                Ok(chunk) => permit.send(Ok(chunk)),
                Err(error) => {
                    debug!(cursor = self.cursor, %error, "chunk fetch failed");
                    permit.send(Err(error));
                    break;
                }
            }
        }

        debug!(
            sample_id = %self.target.sample_id,
            cursor = self.cursor,
            cancelled = self.cancel.is_cancelled(),
            "frame producer stopped"
        );
    }
}

/// Check that `chunk` continues at `cursor` and move past it.
fn advance(cursor: &mut u64, chunk: FrameChunk) -> FetchResult<FrameChunk> {
    let [start, end] = chunk.range;
    if start != *cursor || end < start {
        return Err(FetchError::RangeMismatch {
            expected: *cursor,
            range: chunk.range,
        });
    }
    *cursor = end.saturating_add(1);
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use futures::StreamExt;
    use rstest::rstest;
    use serde_json::json;
    use unimock::{MockFn, Unimock, matching};

    use super::*;
    use crate::{ChunkRequest, FrameFetcherMock, testing::ScriptedFetcher};

    fn options(chunk_size: u64, look_ahead: usize) -> StreamOptions {
        StreamOptions::default()
            .with_chunk_size(chunk_size)
            .with_look_ahead(look_ahead)
    }

    async fn ranges(source: &mut ChunkedFrameSource) -> Vec<[u64; 2]> {
        let mut ranges = Vec::new();
        while let Some(chunk) = source.next_chunk().await {
            ranges.push(chunk.unwrap().range);
        }
        ranges
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_five_frames_in_chunks_of_two() {
        let fetcher = ScriptedFetcher::new();
        let target = StreamTarget::new("video", 5);
        let mut source = ChunkedFrameSource::spawn(Arc::clone(&fetcher), target, options(2, 2));

        assert_eq!(source.next_chunk().await.unwrap().unwrap().range, [0, 1]);
        assert_eq!(source.next_chunk().await.unwrap().unwrap().range, [2, 3]);
        let last = source.next_chunk().await.unwrap().unwrap();
        assert_eq!(last.range, [4, 4]);
        assert_eq!(last.frames, vec![json!({"frame_number": 4})]);

        assert!(source.next_chunk().await.is_none());
        assert_eq!(source.state(), SourceState::Exhausted);
        assert_eq!(fetcher.request_count(), 3);

        let numbers: Vec<_> = fetcher.requests().iter().map(|r| r.frame_number).collect();
        assert_eq!(numbers, vec![0, 2, 4]);
        assert!(fetcher.requests().iter().all(|r| r.num_frames == 2 && r.frame_count == 5));
    }

    #[rstest]
    #[case(1, 1)]
    #[case(7, 3)]
    #[case(10, 10)]
    #[case(10, 20)]
    #[case(33, 4)]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_ranges_partition_all_frames(#[case] frame_count: u64, #[case] chunk_size: u64) {
        let fetcher = ScriptedFetcher::new();
        let mut source = ChunkedFrameSource::spawn(
            fetcher,
            StreamTarget::new("video", frame_count),
            options(chunk_size, 2),
        );

        let ranges = ranges(&mut source).await;

        assert_eq!(ranges.first().map(|r| r[0]), Some(0));
        assert_eq!(ranges.last().map(|r| r[1]), Some(frame_count - 1));
        for pair in ranges.windows(2) {
            assert_eq!(pair[1][0], pair[0][1] + 1);
        }
        assert!(ranges.iter().all(|r| r[1] - r[0] < chunk_size));
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_start_frame_offsets_cursor() {
        let fetcher = ScriptedFetcher::new();
        let target = StreamTarget::new("video", 5).with_start_frame(3);
        let mut source = ChunkedFrameSource::spawn(fetcher, target, options(2, 2));

        assert_eq!(ranges(&mut source).await, vec![[3, 4]]);
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_empty_video_never_fetches() {
        let fetcher = ScriptedFetcher::new();
        let mut source =
            ChunkedFrameSource::spawn(Arc::clone(&fetcher), StreamTarget::new("video", 0), options(2, 2));

        assert!(source.next_chunk().await.is_none());
        assert_eq!(source.state(), SourceState::Exhausted);
        assert_eq!(fetcher.request_count(), 0);
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_cancel_stops_without_new_requests() {
        let fetcher = ScriptedFetcher::new();
        let mut source = ChunkedFrameSource::spawn(
            Arc::clone(&fetcher),
            StreamTarget::new("video", 100),
            options(2, 1),
        );

        assert_eq!(source.next_chunk().await.unwrap().unwrap().range, [0, 1]);
        // The producer refills the single look-ahead slot, then waits.
        fetcher.wait_for_requests(2).await;

        source.cancel();
        assert!(source.is_cancelled());
        assert!(source.next_chunk().await.is_none());
        assert!(source.next_chunk().await.is_none());
        assert_eq!(source.state(), SourceState::Cancelled);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetcher.request_count(), 2);
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_external_token_cancels() {
        let parent = CancellationToken::new();
        let fetcher = ScriptedFetcher::new();
        let mut source = ChunkedFrameSource::spawn_with_cancel(
            fetcher,
            StreamTarget::new("video", 100),
            options(5, 2),
            &parent,
        );

        parent.cancel();
        assert!(source.next_chunk().await.is_none());
        assert_eq!(source.state(), SourceState::Cancelled);
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_drop_stops_producer() {
        let fetcher = ScriptedFetcher::new();
        let source = ChunkedFrameSource::spawn(
            Arc::clone(&fetcher),
            StreamTarget::new("video", 100),
            options(1, 1),
        );
        fetcher.wait_for_requests(1).await;
        drop(source);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetcher.request_count(), 1);
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_failure_is_delivered_once_and_not_retried() {
        let fetcher = ScriptedFetcher::new();
        fetcher.fail_with_server_error_at(2);
        let mut source = ChunkedFrameSource::spawn(
            Arc::clone(&fetcher),
            StreamTarget::new("video", 6),
            options(2, 2),
        );

        assert_eq!(source.next_chunk().await.unwrap().unwrap().range, [0, 1]);
        let error = source.next_chunk().await.unwrap().unwrap_err();
        assert!(matches!(error, FetchError::Net(ref e) if e.status_code() == Some(500)));

        assert!(source.next_chunk().await.is_none());
        assert_eq!(source.state(), SourceState::Failed);
        assert_eq!(fetcher.request_count(), 2);
    }

    #[rstest]
    #[case::gap([3, 4])]
    #[case::overlap([1, 3])]
    #[case::inverted([2, 1])]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_discontinuous_range_fails(#[case] range: [u64; 2]) {
        let fetcher = ScriptedFetcher::new();
        fetcher.override_range(2, range);
        let mut source = ChunkedFrameSource::spawn(fetcher, StreamTarget::new("video", 6), options(2, 2));

        assert!(source.next_chunk().await.unwrap().is_ok());
        assert_eq!(
            source.next_chunk().await.unwrap(),
            Err(FetchError::RangeMismatch { expected: 2, range })
        );
        assert_eq!(source.state(), SourceState::Failed);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn test_look_ahead_bounds_prefetch() {
        let fetcher = ScriptedFetcher::with_delay(Duration::from_millis(10));
        let mut source = ChunkedFrameSource::spawn(
            Arc::clone(&fetcher),
            StreamTarget::new("video", 100),
            options(1, 3),
        );

        fetcher.wait_for_requests(3).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fetcher.request_count(), 3);

        assert_eq!(source.next_chunk().await.unwrap().unwrap().range, [0, 0]);
        fetcher.wait_for_requests(4).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fetcher.request_count(), 4);
        assert_eq!(fetcher.max_in_flight(), 1);
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_stream_collects_every_chunk() {
        let source = ChunkedFrameSource::spawn(
            ScriptedFetcher::new(),
            StreamTarget::new("video", 9),
            options(4, 2),
        );

        let chunks: Vec<_> = source.map(|c| c.unwrap().range).collect().await;
        assert_eq!(chunks, vec![[0, 3], [4, 7], [8, 8]]);
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_request_carries_target_fields() {
        let chunk = FrameChunk {
            frames: vec![json!({}), json!({})],
            range: [10, 11],
        };
        let fetcher = Unimock::new(
            FrameFetcherMock::fetch_chunk
                .next_call(matching!(ChunkRequest {
                    frame_number: 10,
                    num_frames: 20,
                    frame_count: 12,
                    source: true,
                    ..
                }))
                .returns(Ok(chunk.clone())),
        );
        let target = StreamTarget::new("clip", 12)
            .with_source(true)
            .with_start_frame(10);
        let mut source = ChunkedFrameSource::spawn(fetcher, target, StreamOptions::default());

        assert_eq!(source.next_chunk().await, Some(Ok(chunk)));
        assert_eq!(source.next_chunk().await, None);
    }
}
