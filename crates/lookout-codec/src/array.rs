use crate::{
    dtype::Dtype,
    error::{DecodeError, DecodeResult},
};

/// A dense, C-ordered, little-endian n-dimensional array.
///
/// The array owns its bytes. Handing it to a host moves it; nothing else
/// keeps a view, so the sender cannot observe or mutate it afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NdArray {
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl NdArray {
    /// Build an array, checking that `data` holds exactly
    /// `product(shape) * dtype.itemsize()` bytes.
    ///
    /// # Errors
    ///
    /// [`DecodeError::ShapeOverflow`] if the element count overflows `usize`,
    /// [`DecodeError::LengthMismatch`] if `data` has the wrong length.
    pub fn new(dtype: Dtype, shape: Vec<usize>, data: Vec<u8>) -> DecodeResult<Self> {
        let expected = byte_len(dtype, &shape)?;
        if data.len() != expected {
            return Err(DecodeError::LengthMismatch {
                dtype: dtype.name().to_string(),
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dtype, shape, data })
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements (1 for a 0-d array).
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw little-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the array and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

pub(crate) fn byte_len(dtype: Dtype, shape: &[usize]) -> DecodeResult<usize> {
    shape
        .iter()
        .try_fold(dtype.itemsize(), |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| DecodeError::ShapeOverflow {
            shape: shape.to_vec(),
        })
}
