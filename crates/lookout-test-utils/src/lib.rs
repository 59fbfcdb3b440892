#![forbid(unsafe_code)]
#![expect(
    clippy::expect_used,
    reason = "test utility crate, a failed setup aborts the test"
)]

//! Shared test utilities for the lookout workspace.

pub mod frame_server;
pub mod http_server;

pub use frame_server::{FrameQuery, FrameServer, FrameServerConfig, frame_mask, sample_mask};
pub use http_server::TestHttpServer;
