use std::time::Duration;

use lookout_codec::encode;
use lookout_labels::BufferRef;
use lookout_stream::StreamOptions;
use lookout_test_utils::{FrameServer, FrameServerConfig, frame_mask, sample_mask};
use lookout_worker::{
    Envelope, ErrorKind, ProtocolError, WorkerConfig, WorkerError, WorkerHandle, WorkerReply,
    spawn_worker,
};
use rstest::*;
use serde_json::{Value, json};

const QUIET: Duration = Duration::from_millis(300);

fn worker(chunk_size: u64) -> WorkerHandle {
    let config =
        WorkerConfig::default().with_stream(StreamOptions::default().with_chunk_size(chunk_size));
    spawn_worker(config).unwrap()
}

fn start_stream(server: &FrameServer, uuid: &str, frame_count: u64) -> Value {
    json!({
        "method": "startStream",
        "sampleId": format!("sample-{uuid}"),
        "source": false,
        "frameNumber": 0,
        "frameCount": frame_count,
        "uuid": uuid,
        "url": server.frames_url().as_str(),
    })
}

fn next_chunk(uuid: &str) -> Value {
    json!({"method": "requestNextChunk", "uuid": uuid})
}

async fn recv(handle: &mut WorkerHandle) -> Envelope {
    tokio::time::timeout(Duration::from_secs(5), handle.recv())
        .await
        .expect("worker reply")
        .expect("worker running")
}

async fn assert_quiet(handle: &mut WorkerHandle) {
    assert!(
        tokio::time::timeout(QUIET, handle.recv()).await.is_err(),
        "worker replied unexpectedly"
    );
}

fn chunk_range(envelope: &Envelope) -> ([u64; 2], &str) {
    match &envelope.reply {
        WorkerReply::Chunk { range, uuid, .. } => (*range, uuid),
        other => panic!("expected a chunk, got {other:?}"),
    }
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn decode_sample_moves_buffers_to_host() {
    let mut handle = worker(20);
    let mask = sample_mask();

    handle
        .post(json!({
            "method": "decodeSample",
            "uuid": "d1",
            "sample": {
                "_id": "s",
                "gt": {"_cls": "Segmentation", "_id": "seg", "mask": encode(&mask)},
            },
        }))
        .await
        .unwrap();

    let envelope = recv(&mut handle).await;
    let WorkerReply::Sample { sample, uuid } = envelope.reply else {
        panic!("expected a sample reply");
    };
    assert_eq!(uuid.as_deref(), Some("d1"));
    assert_eq!(sample["id"], "s");
    assert_eq!(sample["gt"]["id"], "seg");

    let reference = BufferRef::from_value(&sample["gt"]["mask"]).unwrap();
    assert_eq!(envelope.transfer.len(), 1);
    assert_eq!(envelope.transfer[reference.index], mask);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn stream_delivers_contiguous_chunks_then_goes_quiet() {
    let server = FrameServer::start().await;
    let mut handle = worker(2);

    handle.post(start_stream(&server, "a", 5)).await.unwrap();
    let first = recv(&mut handle).await;
    assert_eq!(chunk_range(&first), ([0, 1], "a"));
    assert_eq!(first.transfer, vec![frame_mask(0), frame_mask(1)]);

    handle.post(next_chunk("a")).await.unwrap();
    assert_eq!(chunk_range(&recv(&mut handle).await), ([2, 3], "a"));

    handle.post(next_chunk("a")).await.unwrap();
    let last = recv(&mut handle).await;
    assert_eq!(chunk_range(&last), ([4, 4], "a"));
    let WorkerReply::Chunk { frames, .. } = &last.reply else {
        unreachable!()
    };
    let detection = &frames[0]["objects"]["detections"][0];
    assert_eq!(detection["id"], "sample-a-det-4");
    assert_eq!(BufferRef::from_value(&detection["mask"]).unwrap().index, 0);

    handle.post(next_chunk("a")).await.unwrap();
    assert_quiet(&mut handle).await;
    assert_eq!(server.frame_requests().len(), 3);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn new_stream_supersedes_the_old_one() {
    let config = FrameServerConfig::default().with_delay(Duration::from_millis(200));
    let server = FrameServer::with_config(config).await;
    let mut handle = worker(2);

    handle.post(start_stream(&server, "a", 10)).await.unwrap();
    handle.post(start_stream(&server, "b", 10)).await.unwrap();

    let first = recv(&mut handle).await;
    assert_eq!(chunk_range(&first), ([0, 1], "b"));

    handle.post(next_chunk("a")).await.unwrap();
    assert_quiet(&mut handle).await;

    handle.post(next_chunk("b")).await.unwrap();
    assert_eq!(chunk_range(&recv(&mut handle).await), ([2, 3], "b"));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn stream_failure_is_reported_to_the_host() {
    let server = FrameServer::with_config(FrameServerConfig::default().with_fail_at(2)).await;
    let mut handle = worker(2);

    handle.post(start_stream(&server, "a", 10)).await.unwrap();
    assert_eq!(chunk_range(&recv(&mut handle).await), ([0, 1], "a"));

    handle.post(next_chunk("a")).await.unwrap();
    let envelope = recv(&mut handle).await;
    match envelope.reply {
        WorkerReply::Error { error, uuid } => {
            assert_eq!(error.kind, ErrorKind::Fetch);
            assert!(error.message.contains("500"), "{}", error.message);
            assert_eq!(uuid.as_deref(), Some("a"));
        }
        other => panic!("expected an error, got {other:?}"),
    }

    handle.post(next_chunk("a")).await.unwrap();
    assert_quiet(&mut handle).await;
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn fetch_single_sample_normalizes_response() {
    let server = FrameServer::start().await;
    let mut handle = worker(20);

    handle
        .post(json!({
            "method": "fetchSingleSample",
            "sampleId": "s-9",
            "url": server.sample_url().as_str(),
            "uuid": "q",
        }))
        .await
        .unwrap();

    let envelope = recv(&mut handle).await;
    assert_eq!(envelope.reply.uuid(), Some("q"));
    let WorkerReply::Sample { sample, .. } = &envelope.reply else {
        panic!("expected a sample reply");
    };
    assert_eq!(sample["id"], "s-9");
    assert!(sample.get("_id").is_none());
    assert_eq!(envelope.transfer, vec![sample_mask()]);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn missing_sample_is_a_fetch_error() {
    let config = FrameServerConfig::default().with_missing(["gone".to_string()].into());
    let server = FrameServer::with_config(config).await;
    let mut handle = worker(20);

    handle
        .post(json!({
            "method": "fetchSingleSample",
            "sampleId": "gone",
            "url": server.sample_url().as_str(),
            "uuid": "q",
        }))
        .await
        .unwrap();

    match recv(&mut handle).await.reply {
        WorkerReply::Error { error, .. } => assert_eq!(error.kind, ErrorKind::Fetch),
        other => panic!("expected an error, got {other:?}"),
    }
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn decode_error_does_not_stop_the_worker() {
    let mut handle = worker(20);

    handle
        .post(json!({
            "method": "decodeSample",
            "sample": {"gt": {"_cls": "Heatmap", "map": "%%%"}},
        }))
        .await
        .unwrap();
    match recv(&mut handle).await.reply {
        WorkerReply::Error { error, uuid } => {
            assert_eq!(error.kind, ErrorKind::Decode);
            assert!(error.message.contains("gt.map"), "{}", error.message);
            assert_eq!(uuid, None);
        }
        other => panic!("expected an error, got {other:?}"),
    }

    handle
        .post(json!({"method": "decodeSample", "sample": {"_id": "ok"}}))
        .await
        .unwrap();
    let envelope = recv(&mut handle).await;
    assert_eq!(
        envelope.reply,
        WorkerReply::Sample {
            sample: json!({"id": "ok"}),
            uuid: None,
        }
    );
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn unknown_method_stops_the_worker() {
    let mut handle = worker(20);

    handle.post(json!({"method": "explode"})).await.unwrap();
    assert!(handle.recv().await.is_none());

    let error = handle.shutdown().await.unwrap_err();
    assert!(matches!(
        error,
        WorkerError::Protocol(ProtocolError::UnknownMethod(ref m)) if m == "explode"
    ));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn malformed_request_stops_the_worker() {
    let handle = worker(20);

    handle
        .post(json!({"method": "startStream", "sampleId": "s"}))
        .await
        .unwrap();

    let error = handle.shutdown().await.unwrap_err();
    assert!(matches!(
        error,
        WorkerError::Protocol(ProtocolError::Malformed { ref method, .. }) if method == "startStream"
    ));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn shutdown_after_closing_inbox_is_clean() {
    let handle = worker(20);
    handle.shutdown().await.unwrap();
}
