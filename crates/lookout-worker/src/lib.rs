//! Frame worker.
//!
//! Receives JSON messages from a host, normalizes samples and frame chunks
//! with [`lookout_labels`], streams frames with [`lookout_stream`] and
//! replies with [`Envelope`]s that carry the decoded buffers by value.
//!
//! | Method              | Reply                                        |
//! |---------------------|----------------------------------------------|
//! | `decodeSample`      | `{sample, uuid?}`                            |
//! | `startStream`       | first `{frames, range, uuid}`                |
//! | `requestNextChunk`  | next `{frames, range, uuid}`, or nothing     |
//! | `fetchSingleSample` | `{sample, uuid}`                             |
//!
//! Failed fetches and decodes are answered with
//! `{error: {kind, message}, uuid}`. An unknown method stops the worker.

#![forbid(unsafe_code)]

mod config;
mod error;
mod protocol;
mod session;
mod worker;

pub use config::WorkerConfig;
pub use error::{ProtocolError, WorkerError, WorkerResult};
pub use protocol::{Envelope, ErrorBody, ErrorKind, HostRequest, WorkerReply};
pub use session::WorkerSession;
pub use worker::{Worker, WorkerHandle, build_net, spawn_worker, spawn_worker_with_net};
