//! `lookout-labels`
//!
//! Normalizes label records as they arrive from the label server:
//!
//! - `_id` becomes `id` on the record, on single labels and on the
//!   elements of list labels,
//! - encoded array fields (`mask`, `map`) are decoded with
//!   [`lookout_codec`] and replaced by a [`BufferRef`],
//! - decoded arrays are collected into a [`Transfer`] so the caller can
//!   hand them to the host without copying.
//!
//! Records are mutated in place; only the new buffers are returned.

#![forbid(unsafe_code)]

mod error;
mod kind;
mod normalize;
mod transfer;

pub use error::{LabelError, LabelResult};
pub use kind::LabelKind;
pub use normalize::{
    FRAMES_FIELD, ID_FIELD, INTERNAL_ID_FIELD, KIND_FIELD, normalize, normalize_frames,
    normalize_into, normalize_sample,
};
pub use transfer::{BUFFER_KEY, BufferRef, Transfer};
