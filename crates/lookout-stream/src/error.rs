use lookout_net::NetError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error(transparent)]
    Net(#[from] NetError),

    /// The server answered, but not with the expected JSON document.
    #[error("unexpected response body: {0}")]
    Body(String),

    /// A chunk that does not continue where the previous one ended.
    #[error("chunk range {range:?} does not start at frame {expected}")]
    RangeMismatch { expected: u64, range: [u64; 2] },
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        Self::Body(error.to_string())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
