use std::time::Duration;

use derive_setters::Setters;
use lookout_net::NetOptions;
use lookout_stream::StreamOptions;

/// Configuration for [`spawn_worker`](crate::spawn_worker).
///
/// ```
/// use lookout_stream::StreamOptions;
/// use lookout_worker::WorkerConfig;
///
/// let config = WorkerConfig::default()
///     .with_stream(StreamOptions::default().with_chunk_size(50))
///     .with_outbox_capacity(4);
/// assert_eq!(config.stream.chunk_size, 50);
/// ```
#[derive(Clone, Debug, Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct WorkerConfig {
    /// HTTP client settings, including the optional retry policy.
    pub net: NetOptions,
    pub stream: StreamOptions,
    /// Upper bound on one logical request, retries included. Default: none.
    pub deadline: Option<Duration>,
    /// Host messages queued before `post` waits. Default: 32.
    pub inbox_capacity: usize,
    /// Replies queued before the worker waits for the host. Default: 32.
    pub outbox_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            net: NetOptions::default(),
            stream: StreamOptions::default(),
            deadline: None,
            inbox_capacity: 32,
            outbox_capacity: 32,
        }
    }
}
