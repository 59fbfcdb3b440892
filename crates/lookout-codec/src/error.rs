use thiserror::Error;

/// Failures while turning encoded text into an [`NdArray`](crate::NdArray).
///
/// Every variant is fatal for the field being decoded. Callers must not
/// substitute a default array: an overlay drawn from a truncated mask is
/// worse than no overlay.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(String),

    #[error("invalid zlib stream: {0}")]
    Inflate(String),

    #[error("missing NPY magic string")]
    BadMagic,

    #[error("unsupported NPY version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("NPY header truncated: need {needed} bytes, have {available}")]
    TruncatedHeader { needed: usize, available: usize },

    #[error("malformed NPY header: {0}")]
    MalformedHeader(String),

    #[error("unsupported element type '{0}'")]
    UnsupportedDtype(String),

    #[error("fortran-ordered arrays are not supported")]
    FortranOrder,

    #[error("shape {shape:?} overflows the addressable size")]
    ShapeOverflow { shape: Vec<usize> },

    #[error("payload is {actual} bytes, shape {shape:?} of {dtype} needs {expected}")]
    LengthMismatch {
        dtype: String,
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
}

impl DecodeError {
    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedHeader(msg.into())
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;
