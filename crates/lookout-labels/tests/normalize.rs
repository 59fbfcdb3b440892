use lookout_codec::{Dtype, NdArray, encode};
use lookout_labels::{BufferRef, normalize_sample};
use serde_json::{Value, json};

fn mask(rows: usize, cols: usize) -> String {
    let data = (0..rows * cols).map(|i| (i % 2) as u8).collect();
    encode(&NdArray::new(Dtype::Uint8, vec![rows, cols], data).unwrap())
}

fn video_sample() -> Value {
    json!({
        "_id": "65f0",
        "filepath": "/data/clip.mp4",
        "ground_truth": {
            "_cls": "Detections",
            "detections": [
                {"_cls": "Detection", "_id": "d0", "label": "car", "mask": mask(4, 6)},
                {"_cls": "Detection", "_id": "d1", "label": "car"},
            ],
        },
        "frames": [
            {"_id": "f1", "frame_number": 1,
             "seg": {"_cls": "Segmentation", "_id": "s1", "mask": mask(2, 2)}},
            {"_id": "f2", "frame_number": 2,
             "heat": {"_cls": "Heatmap", "_id": "h2", "map": mask(3, 3), "range": [0, 1]}},
        ],
    })
}

#[test]
fn normalizes_video_sample_end_to_end() {
    let mut sample = video_sample();
    let transfer = normalize_sample(&mut sample).unwrap();

    assert_eq!(sample["id"], json!("65f0"));
    assert_eq!(sample["ground_truth"]["detections"][1]["id"], json!("d1"));
    assert_eq!(sample["frames"][1]["heat"]["range"], json!([0, 1]));

    let references: Vec<BufferRef> = [
        &sample["ground_truth"]["detections"][0]["mask"],
        &sample["frames"][0]["seg"]["mask"],
        &sample["frames"][1]["heat"]["map"],
    ]
    .into_iter()
    .map(|v| BufferRef::from_value(v).unwrap())
    .collect();

    let indices: Vec<_> = references.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let buffers = transfer.into_vec();
    assert_eq!(buffers.len(), 3);
    assert_eq!(buffers[0].shape(), &[4, 6]);
    assert_eq!(buffers[2].as_bytes().len(), 9);
}

#[test]
fn normalizing_twice_changes_nothing() {
    let mut sample = video_sample();
    normalize_sample(&mut sample).unwrap();
    let once = sample.clone();

    let transfer = normalize_sample(&mut sample).unwrap();

    assert!(transfer.is_empty());
    assert_eq!(sample, once);
}
