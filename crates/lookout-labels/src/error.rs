use lookout_codec::DecodeError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LabelError {
    /// An embedded array in `field` could not be decoded. The field keeps
    /// its textual value.
    #[error("failed to decode field '{field}': {source}")]
    Decode {
        field: String,
        #[source]
        source: DecodeError,
    },

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl LabelError {
    pub(crate) fn decode(field: impl Into<String>, source: DecodeError) -> Self {
        Self::Decode {
            field: field.into(),
            source,
        }
    }
}

pub type LabelResult<T> = Result<T, LabelError>;
