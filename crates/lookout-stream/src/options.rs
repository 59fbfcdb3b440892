use derive_setters::Setters;

/// Tuning for a [`ChunkedFrameSource`](crate::ChunkedFrameSource).
#[derive(Clone, Debug, PartialEq, Eq, Setters)]
#[setters(prefix = "with_")]
pub struct StreamOptions {
    /// Frames requested per chunk. Default: 20.
    pub chunk_size: u64,
    /// Chunks buffered or in flight ahead of the consumer. Default: 2.
    pub look_ahead: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: 20,
            look_ahead: 2,
        }
    }
}

impl StreamOptions {
    /// Zero values are raised to one; a zero-sized chunk or queue can never
    /// make progress.
    pub(crate) fn normalized(self) -> Self {
        Self {
            chunk_size: self.chunk_size.max(1),
            look_ahead: self.look_ahead.max(1),
        }
    }
}
