//! Messages exchanged with the host.
//!
//! Requests arrive as JSON objects tagged by `method`; replies are plain
//! JSON objects travelling in an [`Envelope`] together with the buffers
//! they reference.

use std::fmt::Display;

use lookout_codec::NdArray;
use lookout_labels::Transfer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::ProtocolError;

const METHODS: [&str; 4] = [
    "decodeSample",
    "startStream",
    "requestNextChunk",
    "fetchSingleSample",
];

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(
    tag = "method",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum HostRequest {
    /// Normalize a sample the host already has.
    DecodeSample {
        sample: Value,
        #[serde(default)]
        uuid: Option<String>,
    },
    /// Replace the active stream and deliver its first chunk.
    StartStream {
        sample_id: String,
        #[serde(default)]
        source: bool,
        #[serde(default)]
        frame_number: u64,
        frame_count: u64,
        uuid: String,
        url: Url,
    },
    RequestNextChunk {
        uuid: String,
    },
    FetchSingleSample {
        sample_id: String,
        url: Url,
        uuid: String,
    },
}

impl HostRequest {
    /// Parse a posted message.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MissingMethod`] or [`ProtocolError::UnknownMethod`]
    /// if the tag is absent or not understood, [`ProtocolError::Malformed`]
    /// if the fields do not match the method.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let method = match value.get("method") {
            Some(Value::String(method)) => method.clone(),
            Some(other) => return Err(ProtocolError::UnknownMethod(other.to_string())),
            None => return Err(ProtocolError::MissingMethod),
        };
        if !METHODS.contains(&method.as_str()) {
            return Err(ProtocolError::UnknownMethod(method));
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed {
            method,
            message: e.to_string(),
        })
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::DecodeSample { .. } => METHODS[0],
            Self::StartStream { .. } => METHODS[1],
            Self::RequestNextChunk { .. } => METHODS[2],
            Self::FetchSingleSample { .. } => METHODS[3],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The network request failed.
    Fetch,
    /// The response could not be normalized.
    Decode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkerReply {
    Sample {
        sample: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        uuid: Option<String>,
    },
    Chunk {
        frames: Vec<Value>,
        range: [u64; 2],
        uuid: String,
    },
    Error {
        error: ErrorBody,
        #[serde(skip_serializing_if = "Option::is_none")]
        uuid: Option<String>,
    },
}

impl WorkerReply {
    pub fn uuid(&self) -> Option<&str> {
        match self {
            Self::Sample { uuid, .. } | Self::Error { uuid, .. } => uuid.as_deref(),
            Self::Chunk { uuid, .. } => Some(uuid),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One outbound message: the reply plus the buffers it references, moved
/// to the host.
#[derive(Debug, PartialEq)]
pub struct Envelope {
    pub reply: WorkerReply,
    pub transfer: Vec<NdArray>,
}

impl Envelope {
    pub(crate) fn new(reply: WorkerReply, transfer: Transfer) -> Self {
        Self {
            reply,
            transfer: transfer.into_vec(),
        }
    }

    pub(crate) fn error(kind: ErrorKind, error: impl Display, uuid: Option<String>) -> Self {
        Self {
            reply: WorkerReply::Error {
                error: ErrorBody {
                    kind,
                    message: error.to_string(),
                },
                uuid,
            },
            transfer: Vec::new(),
        }
    }
}
