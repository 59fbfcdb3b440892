use std::{fmt, str::FromStr};

use serde_json::{Map, Value};

use crate::normalize::KIND_FIELD;

/// Label kinds the normalizer knows about, keyed by the `_cls` tag.
///
/// Adding a kind means extending the matches below; the compiler points
/// at every place that needs a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Classification,
    Classifications,
    Detection,
    Detections,
    Keypoint,
    Keypoints,
    Polyline,
    Polylines,
    Segmentation,
    Heatmap,
    TemporalDetection,
    TemporalDetections,
}

impl LabelKind {
    pub const ALL: [LabelKind; 12] = [
        Self::Classification,
        Self::Classifications,
        Self::Detection,
        Self::Detections,
        Self::Keypoint,
        Self::Keypoints,
        Self::Polyline,
        Self::Polylines,
        Self::Segmentation,
        Self::Heatmap,
        Self::TemporalDetection,
        Self::TemporalDetections,
    ];

    /// Kind of a label object, read from its `_cls` tag.
    pub fn of(label: &Map<String, Value>) -> Option<Self> {
        label.get(KIND_FIELD)?.as_str()?.parse().ok()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classification => "Classification",
            Self::Classifications => "Classifications",
            Self::Detection => "Detection",
            Self::Detections => "Detections",
            Self::Keypoint => "Keypoint",
            Self::Keypoints => "Keypoints",
            Self::Polyline => "Polyline",
            Self::Polylines => "Polylines",
            Self::Segmentation => "Segmentation",
            Self::Heatmap => "Heatmap",
            Self::TemporalDetection => "TemporalDetection",
            Self::TemporalDetections => "TemporalDetections",
        }
    }

    /// For container kinds, the field holding the ordered list of
    /// sub-labels.
    pub fn list_field(self) -> Option<&'static str> {
        match self {
            Self::Classifications => Some("classifications"),
            Self::Detections | Self::TemporalDetections => Some("detections"),
            Self::Keypoints => Some("keypoints"),
            Self::Polylines => Some("polylines"),
            Self::Classification
            | Self::Detection
            | Self::Keypoint
            | Self::Polyline
            | Self::Segmentation
            | Self::Heatmap
            | Self::TemporalDetection => None,
        }
    }

    /// Field that may carry an encoded array. For container kinds it is
    /// looked up on every element of [`list_field`](Self::list_field).
    pub fn array_field(self) -> Option<&'static str> {
        match self {
            Self::Detection | Self::Detections | Self::Segmentation => Some("mask"),
            Self::Heatmap => Some("map"),
            Self::Classification
            | Self::Classifications
            | Self::Keypoint
            | Self::Keypoints
            | Self::Polyline
            | Self::Polylines
            | Self::TemporalDetection
            | Self::TemporalDetections => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl FromStr for LabelKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in LabelKind::ALL {
            assert_eq!(kind.as_str().parse::<LabelKind>(), Ok(kind));
        }
    }

    #[rstest]
    #[case::lowercase("detection")]
    #[case::unknown("GeoLocation")]
    #[case::empty("")]
    fn test_unknown_names(#[case] name: &str) {
        assert_eq!(
            name.parse::<LabelKind>(),
            Err(UnknownKind(name.to_string()))
        );
    }

    #[rstest]
    #[case(json!({"_cls": "Detections", "detections": []}), Some(LabelKind::Detections))]
    #[case(json!({"_cls": "Heatmap"}), Some(LabelKind::Heatmap))]
    #[case(json!({"_cls": 3}), None)]
    #[case(json!({"label": "cat"}), None)]
    fn test_of(#[case] label: Value, #[case] expected: Option<LabelKind>) {
        assert_eq!(LabelKind::of(label.as_object().unwrap()), expected);
    }

    #[test]
    fn test_containers_decode_masks_on_elements() {
        assert_eq!(LabelKind::Detections.list_field(), Some("detections"));
        assert_eq!(LabelKind::Detections.array_field(), Some("mask"));
        assert_eq!(LabelKind::TemporalDetections.array_field(), None);
    }
}
