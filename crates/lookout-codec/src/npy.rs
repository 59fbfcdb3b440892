//! NPY container: magic, version, header dict, raw C-ordered payload.

use tracing::trace;

use crate::{
    array::{NdArray, byte_len},
    dtype::{ByteOrder, Dtype},
    error::{DecodeError, DecodeResult},
};

const MAGIC: &[u8] = b"\x93NUMPY";
const PREAMBLE_ALIGN: usize = 64;

#[derive(Debug, PartialEq)]
struct Header {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
}

pub(crate) fn read(bytes: &[u8]) -> DecodeResult<NdArray> {
    if !bytes.starts_with(MAGIC) {
        return Err(DecodeError::BadMagic);
    }
    let (major, minor) = match bytes.get(MAGIC.len()..MAGIC.len() + 2) {
        Some(&[major, minor]) => (major, minor),
        _ => {
            return Err(DecodeError::TruncatedHeader {
                needed: MAGIC.len() + 2,
                available: bytes.len(),
            });
        }
    };

    let len_start = MAGIC.len() + 2;
    let len_size = match major {
        1 => 2,
        2 | 3 => 4,
        _ => return Err(DecodeError::UnsupportedVersion { major, minor }),
    };
    let len_bytes =
        bytes
            .get(len_start..len_start + len_size)
            .ok_or(DecodeError::TruncatedHeader {
                needed: len_start + len_size,
                available: bytes.len(),
            })?;
    let header_len = len_bytes
        .iter()
        .rev()
        .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));

    let header_start = len_start + len_size;
    let header_end = header_start + header_len;
    let header_bytes =
        bytes
            .get(header_start..header_end)
            .ok_or(DecodeError::TruncatedHeader {
                needed: header_end,
                available: bytes.len(),
            })?;
    let header_text = std::str::from_utf8(header_bytes)
        .map_err(|e| DecodeError::malformed(format!("header is not UTF-8: {e}")))?;
    let header = parse_header(header_text)?;

    if header.fortran_order {
        return Err(DecodeError::FortranOrder);
    }
    let (dtype, order) = Dtype::parse_descr(&header.descr)?;

    let payload = &bytes[header_end..];
    let expected = byte_len(dtype, &header.shape)?;
    if payload.len() != expected {
        return Err(DecodeError::LengthMismatch {
            dtype: dtype.name().to_string(),
            shape: header.shape,
            expected,
            actual: payload.len(),
        });
    }

    let mut data = payload.to_vec();
    if order == ByteOrder::Big && dtype.itemsize() > 1 {
        for element in data.chunks_exact_mut(dtype.itemsize()) {
            element.reverse();
        }
    }

    trace!(
        version = major,
        %dtype,
        shape = ?header.shape,
        bytes = data.len(),
        "decoded NPY payload"
    );
    NdArray::new(dtype, header.shape, data)
}

pub(crate) fn write(array: &NdArray) -> Vec<u8> {
    let shape = match array.shape() {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(ToString::to_string).collect();
            format!("({})", parts.join(", "))
        }
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {shape}, }}",
        array.dtype().descr()
    );

    // v1 stores the header length in a u16; fall back to v2 for huge shapes.
    let (major, len_size) = if header.len() + PREAMBLE_ALIGN < usize::from(u16::MAX) {
        (1u8, 2usize)
    } else {
        (2u8, 4usize)
    };
    let unpadded = MAGIC.len() + 2 + len_size + header.len() + 1;
    let padding = (PREAMBLE_ALIGN - unpadded % PREAMBLE_ALIGN) % PREAMBLE_ALIGN;
    header.extend(std::iter::repeat_n(' ', padding));
    header.push('\n');

    let mut out = Vec::with_capacity(unpadded + padding + array.as_bytes().len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[major, 0]);
    let header_len = header.len() as u32;
    out.extend_from_slice(&header_len.to_le_bytes()[..len_size]);
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(array.as_bytes());
    out
}

fn parse_header(text: &str) -> DecodeResult<Header> {
    let mut cursor = Cursor { rest: text };
    let mut descr = None;
    let mut fortran_order = None;
    let mut shape = None;

    cursor.expect('{')?;
    loop {
        if cursor.eat('}') {
            break;
        }
        let key = cursor.quoted()?;
        cursor.expect(':')?;
        match key {
            "descr" => descr = Some(cursor.quoted()?.to_string()),
            "fortran_order" => {
                fortran_order = Some(match cursor.word() {
                    "True" => true,
                    "False" => false,
                    other => {
                        return Err(DecodeError::malformed(format!(
                            "fortran_order must be True or False, got '{other}'"
                        )));
                    }
                });
            }
            "shape" => shape = Some(cursor.tuple()?),
            other => {
                return Err(DecodeError::malformed(format!("unexpected key '{other}'")));
            }
        }
        if !cursor.eat(',') {
            cursor.expect('}')?;
            break;
        }
    }

    Ok(Header {
        descr: descr.ok_or_else(|| DecodeError::malformed("missing 'descr'"))?,
        fortran_order: fortran_order
            .ok_or_else(|| DecodeError::malformed("missing 'fortran_order'"))?,
        shape: shape.ok_or_else(|| DecodeError::malformed("missing 'shape'"))?,
    })
}

/// Just enough of a Python literal reader for NPY header dicts.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn expect(&mut self, c: char) -> DecodeResult<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(DecodeError::malformed(format!(
                "expected '{c}' at '{}'",
                self.rest.chars().take(16).collect::<String>()
            )))
        }
    }

    fn quoted(&mut self) -> DecodeResult<&'a str> {
        self.skip_ws();
        let quote = match self.rest.chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(DecodeError::malformed("expected quoted string")),
        };
        let body = &self.rest[1..];
        let end = body
            .find(quote)
            .ok_or_else(|| DecodeError::malformed("unterminated string"))?;
        self.rest = &body[end + 1..];
        Ok(&body[..end])
    }

    fn word(&mut self) -> &'a str {
        self.skip_ws();
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(self.rest.len());
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        word
    }

    fn tuple(&mut self) -> DecodeResult<Vec<usize>> {
        self.expect('(')?;
        let mut dims = Vec::new();
        loop {
            if self.eat(')') {
                break;
            }
            let word = self.word();
            // Python 2 writers emit longs as `3L`.
            let digits = word.strip_suffix('L').unwrap_or(word);
            let dim = digits
                .parse::<usize>()
                .map_err(|_| DecodeError::malformed(format!("bad dimension '{word}'")))?;
            dims.push(dim);
            if !self.eat(',') {
                self.expect(')')?;
                break;
            }
        }
        Ok(dims)
    }
}
