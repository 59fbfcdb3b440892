use lookout_stream::{ChunkedFrameSource, FetchResult, FrameChunk};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::ProtocolError;

/// Result of network work finished off the worker loop.
#[derive(Debug)]
pub(crate) enum Completion {
    /// Outcome of one pull; `None` when the stream has ended.
    Chunk {
        uuid: String,
        generation: u64,
        item: Option<FetchResult<FrameChunk>>,
    },
    Sample {
        uuid: String,
        result: FetchResult<serde_json::Value>,
    },
}

/// The stream currently served to the host, if any.
///
/// Starting a stream replaces (and cancels) the previous one. Pull requests
/// name their stream by id. Completions also carry the generation of the
/// start that produced them, so a restart under the same id still drops
/// chunks of the old source.
#[derive(Default)]
pub struct WorkerSession {
    active: Option<ActiveStream>,
    generations: u64,
}

struct ActiveStream {
    uuid: String,
    generation: u64,
    demand: mpsc::UnboundedSender<()>,
    cancel: CancellationToken,
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl WorkerSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_uuid(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.uuid.as_str())
    }

    pub fn is_current(&self, uuid: &str) -> bool {
        self.active_uuid() == Some(uuid)
    }

    /// Whether a completion tagged `uuid`/`generation` belongs to the
    /// active stream.
    pub(crate) fn owns(&self, uuid: &str, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|s| s.uuid == uuid && s.generation == generation)
    }

    /// Make `source` the active stream and ask for its first chunk.
    ///
    /// Returns the id of the stream it superseded.
    pub(crate) fn start(
        &mut self,
        uuid: String,
        source: ChunkedFrameSource,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Option<String> {
        self.generations += 1;
        let generation = self.generations;
        let (demand, demand_rx) = mpsc::unbounded_channel();
        let cancel = source.cancel_token();
        tokio::spawn(pull(uuid.clone(), generation, source, demand_rx, completions));

        let _ = demand.send(());
        let previous = self.active.replace(ActiveStream {
            uuid,
            generation,
            demand,
            cancel,
        });
        previous.map(|stream| {
            debug!(uuid = %stream.uuid, "stream superseded");
            stream.uuid.clone()
        })
    }

    /// Ask the active stream for its next chunk.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::StaleSession`] if `uuid` is not the active stream.
    pub(crate) fn demand(&self, uuid: &str) -> Result<(), ProtocolError> {
        match &self.active {
            Some(stream) if stream.uuid == uuid => {
                let _ = stream.demand.send(());
                Ok(())
            }
            _ => Err(ProtocolError::StaleSession(uuid.to_string())),
        }
    }

    /// Drop the active stream.
    pub fn cancel(&mut self) {
        if let Some(stream) = self.active.take() {
            debug!(uuid = %stream.uuid, "stream cancelled");
        }
    }
}

/// Serves pull demands for one stream, one at a time and in order.
async fn pull(
    uuid: String,
    generation: u64,
    mut source: ChunkedFrameSource,
    mut demand: mpsc::UnboundedReceiver<()>,
    completions: mpsc::UnboundedSender<Completion>,
) {
    trace!(%uuid, generation, "puller started");
    while demand.recv().await.is_some() {
        // A cancelled source answers `None` without waiting.
        let item = source.next_chunk().await;
        let ended = item.is_none();
        let completion = Completion::Chunk {
            uuid: uuid.clone(),
            generation,
            item,
        };
        if completions.send(completion).is_err() || (ended && source.is_cancelled()) {
            break;
        }
    }
    trace!(%uuid, state = ?source.state(), "puller stopped");
}
