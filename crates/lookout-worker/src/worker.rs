use std::sync::Arc;

use lookout_labels::{normalize_frames, normalize_sample};
use lookout_net::{HttpClient, Net, NetExt, NetResult};
use lookout_stream::{
    ChunkedFrameSource, FrameChunk, HttpFrameFetcher, StreamOptions, StreamTarget, fetch_sample,
};
use serde_json::Value;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::{
    config::WorkerConfig,
    error::{WorkerError, WorkerResult},
    protocol::{Envelope, ErrorKind, HostRequest, WorkerReply},
    session::{Completion, WorkerSession},
};

/// Build the transport described by `config`: the HTTP client, wrapped in
/// a retry layer when retries are enabled and a timeout layer when a
/// deadline is set.
///
/// # Errors
///
/// See [`HttpClient::new`].
pub fn build_net(config: &WorkerConfig) -> NetResult<Arc<dyn Net>> {
    let client = HttpClient::new(config.net.clone())?;
    let policy = config.net.retry_policy.clone();
    let retry = policy.max_retries > 0;

    let net: Arc<dyn Net> = match (retry, config.deadline) {
        (false, None) => Arc::new(client),
        (false, Some(deadline)) => Arc::new(client.with_timeout(deadline)),
        (true, None) => Arc::new(client.with_retry(policy)),
        (true, Some(deadline)) => Arc::new(client.with_retry(policy).with_timeout(deadline)),
    };
    Ok(net)
}

/// The worker loop. Owns the session; everything that decodes runs here,
/// one message at a time.
pub struct Worker {
    net: Arc<dyn Net>,
    stream: StreamOptions,
    session: WorkerSession,
    outbox: mpsc::Sender<Envelope>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(net: Arc<dyn Net>, stream: StreamOptions, outbox: mpsc::Sender<Envelope>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            net,
            stream,
            session: WorkerSession::new(),
            outbox,
            completions_tx,
            completions_rx,
            cancel: CancellationToken::new(),
        }
    }

    /// Serve `inbox` until the host hangs up.
    ///
    /// # Errors
    ///
    /// [`WorkerError::Protocol`] on a message the worker does not
    /// understand. The loop stops at that message.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<Value>) -> WorkerResult<()> {
        debug!("worker started");
        let _guard = self.cancel.clone().drop_guard();

        loop {
            let reply = tokio::select! {
                biased;
                message = inbox.recv() => {
                    let Some(message) = message else {
                        debug!("inbox closed");
                        break;
                    };
                    self.handle_message(message)?
                }
                Some(completion) = self.completions_rx.recv() => self.handle_completion(completion),
            };

            if let Some(envelope) = reply
                && self.outbox.send(envelope).await.is_err()
            {
                debug!("host stopped listening");
                break;
            }
        }

        self.session.cancel();
        debug!("worker stopped");
        Ok(())
    }

    fn handle_message(&mut self, message: Value) -> WorkerResult<Option<Envelope>> {
        let request = HostRequest::from_value(message).inspect_err(|error| {
            warn!(%error, "rejecting host message");
        })?;
        trace!(method = request.method(), "host request");

        match request {
            HostRequest::DecodeSample { sample, uuid } => Ok(Some(decode_sample(sample, uuid))),
            HostRequest::StartStream {
                sample_id,
                source,
                frame_number,
                frame_count,
                uuid,
                url,
            } => {
                let target = StreamTarget::new(sample_id, frame_count)
                    .with_source(source)
                    .with_start_frame(frame_number);
                self.start_stream(uuid, url, target);
                Ok(None)
            }
            HostRequest::RequestNextChunk { uuid } => {
                if let Err(error) = self.session.demand(&uuid) {
                    trace!(%error, "ignoring pull");
                }
                Ok(None)
            }
            HostRequest::FetchSingleSample {
                sample_id,
                url,
                uuid,
            } => {
                self.fetch_single_sample(uuid, url, sample_id);
                Ok(None)
            }
        }
    }

    fn start_stream(&mut self, uuid: String, url: Url, target: StreamTarget) {
        debug!(%uuid, sample_id = %target.sample_id, frame_count = target.frame_count, "starting stream");
        let fetcher = HttpFrameFetcher::new(Arc::clone(&self.net), url);
        let source = ChunkedFrameSource::spawn_with_cancel(
            fetcher,
            target,
            self.stream.clone(),
            &self.cancel,
        );
        self.session
            .start(uuid, source, self.completions_tx.clone());
    }

    fn fetch_single_sample(&self, uuid: String, url: Url, sample_id: String) {
        let net = Arc::clone(&self.net);
        let completions = self.completions_tx.clone();
        let cancel = self.cancel.child_token();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                result = fetch_sample(net.as_ref(), &url, &sample_id) => result,
            };
            let _ = completions.send(Completion::Sample { uuid, result });
        });
    }

    fn handle_completion(&mut self, completion: Completion) -> Option<Envelope> {
        match completion {
            Completion::Chunk {
                uuid,
                generation,
                item,
            } => {
                if !self.session.owns(&uuid, generation) {
                    trace!(%uuid, generation, "dropping chunk of superseded stream");
                    return None;
                }
                match item? {
                    Ok(chunk) => Some(chunk_reply(chunk, uuid)),
                    Err(error) => {
                        debug!(%uuid, %error, "stream fetch failed");
                        Some(Envelope::error(ErrorKind::Fetch, error, Some(uuid)))
                    }
                }
            }
            Completion::Sample { uuid, result } => match result {
                Ok(sample) => Some(decode_sample(sample, Some(uuid))),
                Err(error) => {
                    debug!(%uuid, %error, "sample fetch failed");
                    Some(Envelope::error(ErrorKind::Fetch, error, Some(uuid)))
                }
            },
        }
    }
}

fn decode_sample(mut sample: Value, uuid: Option<String>) -> Envelope {
    match normalize_sample(&mut sample) {
        Ok(transfer) => Envelope::new(WorkerReply::Sample { sample, uuid }, transfer),
        Err(error) => {
            warn!(uuid = ?uuid, %error, "sample decode failed");
            Envelope::error(ErrorKind::Decode, error, uuid)
        }
    }
}

fn chunk_reply(chunk: FrameChunk, uuid: String) -> Envelope {
    let FrameChunk { mut frames, range } = chunk;
    match normalize_frames(&mut frames) {
        Ok(transfer) => {
            trace!(%uuid, ?range, buffers = transfer.len(), "delivering chunk");
            Envelope::new(WorkerReply::Chunk { frames, range, uuid }, transfer)
        }
        Err(error) => {
            warn!(%uuid, ?range, %error, "chunk decode failed");
            Envelope::error(ErrorKind::Decode, error, Some(uuid))
        }
    }
}

/// Host-side end of a running worker.
pub struct WorkerHandle {
    inbox: mpsc::Sender<Value>,
    outbox: mpsc::Receiver<Envelope>,
    task: JoinHandle<WorkerResult<()>>,
}

impl WorkerHandle {
    /// Post a message to the worker.
    ///
    /// # Errors
    ///
    /// [`WorkerError::Closed`] if the worker has stopped.
    pub async fn post(&self, message: Value) -> WorkerResult<()> {
        self.inbox.send(message).await.map_err(|_| WorkerError::Closed)
    }

    /// Next outbound message, `None` once the worker has stopped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.outbox.recv().await
    }

    pub fn sender(&self) -> mpsc::Sender<Value> {
        self.inbox.clone()
    }

    /// Close the inbox and wait for the worker to finish.
    ///
    /// # Errors
    ///
    /// The error that stopped the worker, if any.
    pub async fn shutdown(self) -> WorkerResult<()> {
        let Self { inbox, outbox, task } = self;
        drop(inbox);
        drop(outbox);
        task.await.map_err(|e| WorkerError::Join(e.to_string()))?
    }
}

/// Start a worker with the HTTP transport described by `config`.
///
/// # Errors
///
/// [`WorkerError::Net`] if the HTTP client cannot be built.
pub fn spawn_worker(config: WorkerConfig) -> WorkerResult<WorkerHandle> {
    let net = build_net(&config)?;
    Ok(spawn_worker_with_net(config, net))
}

/// Start a worker over an existing transport.
pub fn spawn_worker_with_net(config: WorkerConfig, net: Arc<dyn Net>) -> WorkerHandle {
    let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity.max(1));
    let (outbox_tx, outbox_rx) = mpsc::channel(config.outbox_capacity.max(1));

    let worker = Worker::new(net, config.stream, outbox_tx);
    let task = tokio::spawn(worker.run(inbox_rx));

    WorkerHandle {
        inbox: inbox_tx,
        outbox: outbox_rx,
        task,
    }
}
