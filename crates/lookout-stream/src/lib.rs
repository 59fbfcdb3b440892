//! Chunked frame source.
//!
//! A [`ChunkedFrameSource`] pulls the per-frame labels of one video sample
//! from the label server in contiguous chunks. A background producer keeps
//! at most `look_ahead` chunks buffered or in flight and never has more than
//! one request outstanding. Cancelling (or dropping) the source stops the
//! producer; later pulls end the sequence without touching the network.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use lookout_net::{HttpClient, NetOptions};
//! use lookout_stream::{ChunkedFrameSource, HttpFrameFetcher, StreamOptions, StreamTarget};
//!
//! let net = HttpClient::new(NetOptions::default())?;
//! let fetcher = HttpFrameFetcher::new(net, "http://localhost:5151/frames".parse()?);
//! let target = StreamTarget::new("65f0c2", 120);
//! let mut source = ChunkedFrameSource::spawn(fetcher, target, StreamOptions::default());
//!
//! while let Some(chunk) = source.next_chunk().await {
//!     let chunk = chunk?;
//!     println!("frames {}..={}", chunk.range[0], chunk.range[1]);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod chunk;
mod error;
mod fetcher;
mod options;
mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use chunk::{ChunkRequest, FrameChunk, StreamTarget};
pub use error::{FetchError, FetchResult};
#[cfg(any(test, feature = "test-utils"))]
pub use fetcher::FrameFetcherMock;
pub use fetcher::{FrameFetcher, HttpFrameFetcher, fetch_sample};
pub use options::StreamOptions;
pub use source::{ChunkedFrameSource, SourceState};
