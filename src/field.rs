// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::Bytes;

/// Logical type of a field
///
/// `Text` is stored like `Str` but is additionally whitespace-tokenized into
/// the inverted index at write time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FieldType {
    /// Signed 64-bit integer
    Int64,

    /// Unsigned 64-bit integer
    UInt64,

    /// Unsigned 32-bit integer
    UInt32,

    /// 32-bit float
    Float32,

    /// 64-bit float
    Float64,

    /// Variable-width byte string
    Str,

    /// Variable-width byte string, indexed into postings
    Text,
}

impl FieldType {
    /// Element width in bytes for fixed-width types, `None` for strings.
    #[must_use]
    pub fn element_width(self) -> Option<usize> {
        match self {
            Self::Int64 | Self::UInt64 | Self::Float64 => Some(8),
            Self::UInt32 | Self::Float32 => Some(4),
            Self::Str | Self::Text => None,
        }
    }

    /// Whether values of this type are fixed-width numerics.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        self.element_width().is_some()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Int64 => "i64",
                Self::UInt64 => "u64",
                Self::UInt32 => "u32",
                Self::Float32 => "f32",
                Self::Float64 => "f64",
                Self::Str => "str",
                Self::Text => "text",
            }
        )
    }
}

/// A single field value (tagged variant)
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Signed 64-bit integer
    Int64(i64),

    /// Unsigned 64-bit integer
    UInt64(u64),

    /// 32-bit float
    Float32(f32),

    /// 64-bit float
    Float64(f64),

    /// Owned byte sequence
    Bytes(Bytes),

    /// Absent value; columns substitute the type's default
    Null,
}

impl FieldValue {
    /// Whether this is the null variant.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::UInt64(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        Self::Float32(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for FieldValue {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}
