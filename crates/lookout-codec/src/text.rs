use std::io::{Read, Write};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};

use crate::{
    array::NdArray,
    error::{DecodeError, DecodeResult},
    npy,
};

/// Decode `base64(zlib(npy))` text into an owned array.
///
/// # Errors
///
/// Any [`DecodeError`]: bad base64, corrupt zlib stream, malformed NPY
/// header, unsupported dtype, or a payload whose length disagrees with the
/// declared shape.
pub fn decode(text: &str) -> DecodeResult<NdArray> {
    let compressed = BASE64
        .decode(text.trim())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    let mut raw = Vec::with_capacity(compressed.len() * 4);
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut raw)
        .map_err(|e| DecodeError::Inflate(e.to_string()))?;

    npy::read(&raw)
}

/// Decode an uncompressed NPY document.
///
/// # Errors
///
/// Same header and length errors as [`decode`].
pub fn decode_npy(bytes: &[u8]) -> DecodeResult<NdArray> {
    npy::read(bytes)
}

/// Encode an array as `base64(zlib(npy))`. Inverse of [`decode`].
///
/// # Panics
///
/// Only if compressing into an in-memory `Vec` fails, which it cannot.
#[must_use]
#[expect(clippy::expect_used, reason = "writes into a Vec never fail")]
pub fn encode(array: &NdArray) -> String {
    let raw = npy::write(array);
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder
        .write_all(&raw)
        .expect("zlib compression into a Vec is infallible");
    let compressed = encoder
        .finish()
        .expect("zlib compression into a Vec is infallible");
    BASE64.encode(compressed)
}

/// Encode an array as an uncompressed NPY document.
#[must_use]
pub fn encode_npy(array: &NdArray) -> Vec<u8> {
    npy::write(array)
}
