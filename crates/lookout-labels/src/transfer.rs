use lookout_codec::{Dtype, NdArray};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key marking a buffer reference inside a normalized record.
pub const BUFFER_KEY: &str = "$buffer";

/// Placeholder left in a record where an encoded array used to be.
///
/// `index` points into the [`Transfer`] that travels alongside the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferRef {
    #[serde(rename = "$buffer")]
    pub index: usize,
    pub dtype: Dtype,
    pub shape: Vec<usize>,
}

impl BufferRef {
    /// Read a buffer reference back out of a normalized record.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.as_object()?.contains_key(BUFFER_KEY) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub(crate) fn to_value(&self) -> Value {
        serde_json::json!({
            BUFFER_KEY: self.index,
            "dtype": self.dtype,
            "shape": self.shape,
        })
    }
}

/// Arrays decoded during one normalization, in reference order.
///
/// Handing a `Transfer` to the host moves the arrays; the normalizer keeps
/// nothing.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Transfer {
    buffers: Vec<NdArray>,
}

impl Transfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `array` and return the reference to leave behind.
    pub fn push(&mut self, array: NdArray) -> BufferRef {
        let reference = BufferRef {
            index: self.buffers.len(),
            dtype: array.dtype(),
            shape: array.shape().to_vec(),
        };
        self.buffers.push(array);
        reference
    }

    pub fn get(&self, reference: &BufferRef) -> Option<&NdArray> {
        self.buffers.get(reference.index)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NdArray> {
        self.buffers.iter()
    }

    pub fn into_vec(self) -> Vec<NdArray> {
        self.buffers
    }
}

impl IntoIterator for Transfer {
    type Item = NdArray;
    type IntoIter = std::vec::IntoIter<NdArray>;

    fn into_iter(self) -> Self::IntoIter {
        self.buffers.into_iter()
    }
}
