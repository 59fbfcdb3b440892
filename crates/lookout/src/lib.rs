#![forbid(unsafe_code)]

//! # Lookout
//!
//! Facade crate for the frame worker of a visual dataset explorer.
//!
//! ## Quick start
//!
//! ```no_run
//! use lookout::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), WorkerError> {
//! lookout::init_tracing();
//! let mut worker = spawn_worker(WorkerConfig::default())?;
//!
//! worker
//!     .post(json!({
//!         "method": "startStream",
//!         "sampleId": "65f0c2",
//!         "frameNumber": 0,
//!         "frameCount": 240,
//!         "uuid": "stream-1",
//!         "url": "http://localhost:5151/frames",
//!     }))
//!     .await?;
//!
//! if let Some(Envelope { reply, transfer }) = worker.recv().await {
//!     println!("{} buffers for {:?}", transfer.len(), reply.uuid());
//! }
//! # Ok(())
//! # }
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod codec {
    pub use lookout_codec::*;
}

pub mod labels {
    pub use lookout_labels::*;
}

pub mod net {
    pub use lookout_net::*;
}

pub mod stream {
    pub use lookout_stream::*;
}

pub mod worker {
    pub use lookout_worker::*;
}

pub mod prelude {
    pub use lookout_codec::{Dtype, NdArray};
    pub use lookout_labels::{BufferRef, Transfer};
    pub use lookout_worker::{
        Envelope, HostRequest, WorkerConfig, WorkerError, WorkerHandle, WorkerReply, spawn_worker,
    };
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
