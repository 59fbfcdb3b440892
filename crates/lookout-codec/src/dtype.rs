use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, DecodeResult};

/// Element type of an [`NdArray`](crate::NdArray).
///
/// Serialized with numpy's names (`"uint8"`, `"float32"`, ...), which is
/// what hosts see in buffer references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Bool,
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Float32,
    Float64,
}

/// Byte order declared by an NPY `descr`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub(crate) fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

impl Dtype {
    /// Size of one element in bytes.
    pub fn itemsize(self) -> usize {
        match self {
            Self::Bool | Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    /// Numpy type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Uint8 => "uint8",
            Self::Int8 => "int8",
            Self::Uint16 => "uint16",
            Self::Int16 => "int16",
            Self::Uint32 => "uint32",
            Self::Int32 => "int32",
            Self::Uint64 => "uint64",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    fn code(self) -> &'static str {
        match self {
            Self::Bool => "b1",
            Self::Uint8 => "u1",
            Self::Int8 => "i1",
            Self::Uint16 => "u2",
            Self::Int16 => "i2",
            Self::Uint32 => "u4",
            Self::Int32 => "i4",
            Self::Uint64 => "u8",
            Self::Int64 => "i8",
            Self::Float32 => "f4",
            Self::Float64 => "f8",
        }
    }

    /// Little-endian NPY descriptor, e.g. `"<u2"` or `"|u1"`.
    pub fn descr(self) -> String {
        let order = if self.itemsize() == 1 { '|' } else { '<' };
        format!("{order}{}", self.code())
    }

    /// Parse an NPY `descr` such as `"<f4"`, `">i2"` or `"|b1"`.
    pub fn parse_descr(descr: &str) -> DecodeResult<(Self, ByteOrder)> {
        let unsupported = || DecodeError::UnsupportedDtype(descr.to_string());

        let mut chars = descr.chars();
        let order = match chars.next() {
            Some('<') => ByteOrder::Little,
            Some('>') => ByteOrder::Big,
            Some('=') => ByteOrder::native(),
            Some('|') => ByteOrder::Little,
            _ => return Err(unsupported()),
        };

        let dtype = match chars.as_str() {
            "b1" | "?" => Self::Bool,
            "u1" => Self::Uint8,
            "i1" => Self::Int8,
            "u2" => Self::Uint16,
            "i2" => Self::Int16,
            "u4" => Self::Uint32,
            "i4" => Self::Int32,
            "u8" => Self::Uint64,
            "i8" => Self::Int64,
            "f4" => Self::Float32,
            "f8" => Self::Float64,
            _ => return Err(unsupported()),
        };

        // '|' means "not applicable" and is only valid for single-byte types.
        if descr.starts_with('|') && dtype.itemsize() != 1 {
            return Err(unsupported());
        }

        Ok((dtype, order))
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
