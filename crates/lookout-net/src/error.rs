use thiserror::Error;

/// Transport-level failure of a single request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("Timeout")]
    Timeout,
    #[error("Request failed after {max_retries} retries: {source}")]
    RetryExhausted {
        max_retries: u32,
        source: Box<NetError>,
    },
    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl NetError {
    pub fn http_status(status: u16, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    pub fn http<S: Into<String>>(msg: S) -> Self {
        Self::Http(msg.into())
    }

    /// Classify a reqwest failure.
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else if let Some(status) = error.status() {
            let url = error.url().map(ToString::to_string).unwrap_or_default();
            Self::http_status(status.as_u16(), url)
        } else {
            Self::Http(error.to_string())
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetError::Timeout | NetError::Connect(_) => true,
            NetError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            NetError::Http(_) | NetError::RetryExhausted { .. } | NetError::InvalidUrl(_) => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::Timeout)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            NetError::HttpStatus { status, .. } => Some(*status),
            NetError::RetryExhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NetError {
    fn from(error: reqwest::Error) -> Self {
        Self::from_reqwest(error)
    }
}

impl From<url::ParseError> for NetError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}

pub type NetResult<T> = Result<T, NetError>;
