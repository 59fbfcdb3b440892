//! `lookout-codec`
//!
//! Decodes the compact textual form in which label arrays (segmentation
//! masks, heatmaps, per-detection masks) travel inside JSON:
//!
//! ```text
//! base64( zlib( NPY document ) )
//! ```
//!
//! The NPY header declares the element type and shape; [`decode`] checks
//! that the payload agrees with both and returns an owned [`NdArray`].
//! [`encode`] is the exact inverse and exists so producers and tests can
//! build fixtures.

#![forbid(unsafe_code)]

mod array;
mod dtype;
mod error;
mod npy;
mod text;

pub use array::NdArray;
pub use dtype::{ByteOrder, Dtype};
pub use error::{DecodeError, DecodeResult};
pub use text::{decode, decode_npy, encode, encode_npy};
