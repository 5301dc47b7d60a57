// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::DecodeError,
    field::{FieldType, FieldValue},
    Bytes,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::sync::Arc;

/// Typed columnar buffer
///
/// Numeric columns are contiguous arrays of fixed-width elements. String
/// columns store end offsets plus a concatenated chars buffer: string *i*
/// spans `offsets[i-1]..offsets[i]`, with an implicit leading offset of 0.
///
/// Invariants: offsets are non-decreasing and the last offset equals
/// `chars.len()`.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    /// Signed 64-bit integers
    Int64(Vec<i64>),

    /// Unsigned 64-bit integers
    UInt64(Vec<u64>),

    /// Unsigned 32-bit integers
    UInt32(Vec<u32>),

    /// 32-bit floats
    Float32(Vec<f32>),

    /// 64-bit floats
    Float64(Vec<f64>),

    /// Variable-width strings as end offsets + concatenated chars
    Str {
        /// End offset of each string in `chars`
        offsets: Vec<u64>,
        /// Concatenated string bytes
        chars: Vec<u8>,
    },
}

impl Column {
    /// Creates an empty column for the given field type.
    #[must_use]
    pub fn new(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Int64 => Self::Int64(Vec::new()),
            FieldType::UInt64 => Self::UInt64(Vec::new()),
            FieldType::UInt32 => Self::UInt32(Vec::new()),
            FieldType::Float32 => Self::Float32(Vec::new()),
            FieldType::Float64 => Self::Float64(Vec::new()),
            FieldType::Str | FieldType::Text => Self::Str {
                offsets: Vec::new(),
                chars: Vec::new(),
            },
        }
    }

    /// The storage type of this column (`Str` for text fields).
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Int64(_) => FieldType::Int64,
            Self::UInt64(_) => FieldType::UInt64,
            Self::UInt32(_) => FieldType::UInt32,
            Self::Float32(_) => FieldType::Float32,
            Self::Float64(_) => FieldType::Float64,
            Self::Str { .. } => FieldType::Str,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int64(v) => v.len(),
            Self::UInt64(v) => v.len(),
            Self::UInt32(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Str { offsets, .. } => offsets.len(),
        }
    }

    /// Whether the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw storage size in bytes (`chars + 8·n` for strings, `n·width` for numerics).
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Int64(v) => v.len() * 8,
            Self::UInt64(v) => v.len() * 8,
            Self::UInt32(v) => v.len() * 4,
            Self::Float32(v) => v.len() * 4,
            Self::Float64(v) => v.len() * 8,
            Self::Str { offsets, chars } => chars.len() + 8 * offsets.len(),
        }
    }

    /// Appends a value. Nulls append the type's default.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the value type does not match the column type.
    pub fn push(&mut self, value: FieldValue) -> crate::Result<()> {
        match (self, value) {
            (Self::Int64(v), FieldValue::Int64(x)) => v.push(x),
            (Self::Int64(v), FieldValue::Null) => v.push(0),
            (Self::UInt64(v), FieldValue::UInt64(x)) => v.push(x),
            (Self::UInt64(v), FieldValue::Null) => v.push(0),
            (Self::UInt32(v), FieldValue::UInt64(x)) => {
                let x = u32::try_from(x)
                    .map_err(|_| crate::Error::InvalidInput("u32 column value out of range"))?;
                v.push(x);
            }
            (Self::UInt32(v), FieldValue::Null) => v.push(0),
            (Self::Float32(v), FieldValue::Float32(x)) => v.push(x),
            (Self::Float32(v), FieldValue::Null) => v.push(0.0),
            (Self::Float64(v), FieldValue::Float64(x)) => v.push(x),
            (Self::Float64(v), FieldValue::Null) => v.push(0.0),
            (Self::Str { offsets, chars }, FieldValue::Bytes(b)) => {
                chars.extend_from_slice(&b);
                offsets.push(chars.len() as u64);
            }
            (Self::Str { offsets, chars }, FieldValue::Null) => {
                offsets.push(chars.len() as u64);
            }
            _ => return Err(crate::Error::InvalidInput("value type mismatches column")),
        }
        Ok(())
    }

    /// Reads the value at `row`.
    #[must_use]
    pub fn get(&self, row: usize) -> Option<FieldValue> {
        if row >= self.len() {
            return None;
        }

        Some(match self {
            Self::Int64(v) => FieldValue::Int64(v[row]),
            Self::UInt64(v) => FieldValue::UInt64(v[row]),
            Self::UInt32(v) => FieldValue::UInt64(u64::from(v[row])),
            Self::Float32(v) => FieldValue::Float32(v[row]),
            Self::Float64(v) => FieldValue::Float64(v[row]),
            Self::Str { offsets, chars } => {
                let start = if row == 0 {
                    0
                } else {
                    offsets[row - 1] as usize
                };
                let end = offsets[row] as usize;
                FieldValue::Bytes(Bytes::from(&chars[start..end]))
            }
        })
    }

    /// Conservative `(min, max)` of the column, mapped into `i64`.
    ///
    /// Float bounds are floored/ceiled so the interval always contains every
    /// value. Strings have no numeric bounds.
    #[must_use]
    pub fn min_max_i64(&self) -> Option<(i64, i64)> {
        fn fold<T: Copy, F: Fn(T) -> i64, G: Fn(T) -> i64>(
            values: &[T],
            lo: F,
            hi: G,
        ) -> Option<(i64, i64)> {
            let mut iter = values.iter();
            let first = *iter.next()?;
            let mut min = lo(first);
            let mut max = hi(first);
            for &v in iter {
                min = min.min(lo(v));
                max = max.max(hi(v));
            }
            Some((min, max))
        }

        match self {
            Self::Int64(v) => fold(v, |x| x, |x| x),
            #[allow(clippy::cast_possible_wrap)]
            Self::UInt64(v) => fold(
                v,
                |x| x.min(i64::MAX as u64) as i64,
                |x| x.min(i64::MAX as u64) as i64,
            ),
            Self::UInt32(v) => fold(v, i64::from, i64::from),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float32(v) => fold(v, |x| x.floor() as i64, |x| x.ceil() as i64),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float64(v) => fold(v, |x| x.floor() as i64, |x| x.ceil() as i64),
            Self::Str { .. } => None,
        }
    }

    /// Counts rows with `low <= v <= high`. Strings always count zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn count_in_range(&self, low: i64, high: i64) -> u64 {
        match self {
            Self::Int64(v) => v.iter().filter(|&&x| x >= low && x <= high).count() as u64,
            #[allow(clippy::cast_sign_loss)]
            Self::UInt64(v) => {
                if high < 0 {
                    return 0;
                }
                let low = if low < 0 { 0 } else { low as u64 };
                let high = high as u64;
                v.iter().filter(|&&x| x >= low && x <= high).count() as u64
            }
            Self::UInt32(v) => v
                .iter()
                .filter(|&&x| i64::from(x) >= low && i64::from(x) <= high)
                .count() as u64,
            Self::Float32(v) => v
                .iter()
                .filter(|&&x| f64::from(x) >= low as f64 && f64::from(x) <= high as f64)
                .count() as u64,
            Self::Float64(v) => v
                .iter()
                .filter(|&&x| x >= low as f64 && x <= high as f64)
                .count() as u64,
            Self::Str { .. } => 0,
        }
    }

    /// Serializes the raw column storage (little-endian).
    ///
    /// Strings serialize offsets then chars side by side, so a granule
    /// compresses as one buffer.
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        #[allow(clippy::expect_used)]
        match self {
            Self::Int64(v) => {
                for &x in v {
                    out.write_i64::<LittleEndian>(x).expect("vec write");
                }
            }
            Self::UInt64(v) => {
                for &x in v {
                    out.write_u64::<LittleEndian>(x).expect("vec write");
                }
            }
            Self::UInt32(v) => {
                for &x in v {
                    out.write_u32::<LittleEndian>(x).expect("vec write");
                }
            }
            Self::Float32(v) => {
                for &x in v {
                    out.write_f32::<LittleEndian>(x).expect("vec write");
                }
            }
            Self::Float64(v) => {
                for &x in v {
                    out.write_f64::<LittleEndian>(x).expect("vec write");
                }
            }
            Self::Str { offsets, chars } => {
                for &x in offsets {
                    out.write_u64::<LittleEndian>(x).expect("vec write");
                }
                out.extend_from_slice(chars);
            }
        }
    }

    /// Deserializes raw column storage written by [`Column::serialize_into`].
    ///
    /// # Errors
    ///
    /// Returns a decode error if the buffer length does not match `num_rows`
    /// or the string invariants are violated.
    pub fn deserialize(
        field_type: FieldType,
        num_rows: usize,
        bytes: &[u8],
    ) -> Result<Self, DecodeError> {
        let mut reader = bytes;

        if let Some(width) = field_type.element_width() {
            if bytes.len() != num_rows * width {
                return Err(DecodeError::LengthMismatch((num_rows * width, bytes.len())));
            }
        } else if bytes.len() < num_rows * 8 {
            return Err(DecodeError::UnexpectedEof);
        }

        Ok(match field_type {
            FieldType::Int64 => {
                let mut v = Vec::with_capacity(num_rows);
                for _ in 0..num_rows {
                    v.push(reader.read_i64::<LittleEndian>()?);
                }
                Self::Int64(v)
            }
            FieldType::UInt64 => {
                let mut v = Vec::with_capacity(num_rows);
                for _ in 0..num_rows {
                    v.push(reader.read_u64::<LittleEndian>()?);
                }
                Self::UInt64(v)
            }
            FieldType::UInt32 => {
                let mut v = Vec::with_capacity(num_rows);
                for _ in 0..num_rows {
                    v.push(reader.read_u32::<LittleEndian>()?);
                }
                Self::UInt32(v)
            }
            FieldType::Float32 => {
                let mut v = Vec::with_capacity(num_rows);
                for _ in 0..num_rows {
                    v.push(reader.read_f32::<LittleEndian>()?);
                }
                Self::Float32(v)
            }
            FieldType::Float64 => {
                let mut v = Vec::with_capacity(num_rows);
                for _ in 0..num_rows {
                    v.push(reader.read_f64::<LittleEndian>()?);
                }
                Self::Float64(v)
            }
            FieldType::Str | FieldType::Text => {
                let mut offsets = Vec::with_capacity(num_rows);
                for _ in 0..num_rows {
                    offsets.push(reader.read_u64::<LittleEndian>()?);
                }

                let chars = reader.to_vec();

                let mut prev = 0u64;
                for &off in &offsets {
                    if off < prev {
                        return Err(DecodeError::InvalidHeader("string offsets not monotonic"));
                    }
                    prev = off;
                }
                if prev as usize != chars.len() {
                    return Err(DecodeError::LengthMismatch((prev as usize, chars.len())));
                }

                Self::Str { offsets, chars }
            }
        })
    }

    /// Borrows the doc-id array of a `UInt32` column.
    #[must_use]
    pub fn as_u32_slice(&self) -> Option<&[u32]> {
        match self {
            Self::UInt32(v) => Some(v),
            _ => None,
        }
    }

    /// Borrows the weight array of a `Float32` column.
    #[must_use]
    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        match self {
            Self::Float32(v) => Some(v),
            _ => None,
        }
    }
}

/// A shareable column with copy-on-write mutation
///
/// Cloning is cheap (shared storage). [`SharedColumn::make_mut`] deep-copies
/// the storage if and only if it is observed shared, so published columns are
/// never mutated in place.
#[derive(Clone, Debug)]
pub struct SharedColumn(Arc<Column>);

impl SharedColumn {
    /// Wraps an owned column.
    #[must_use]
    pub fn new(column: Column) -> Self {
        Self(Arc::new(column))
    }

    /// Number of owners of the underlying storage.
    #[must_use]
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Mutable access; deep-copies first if the storage is shared.
    pub fn make_mut(&mut self) -> &mut Column {
        Arc::make_mut(&mut self.0)
    }
}

impl std::ops::Deref for SharedColumn {
    type Target = Column;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Column> for SharedColumn {
    fn from(value: Column) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn column_push_get_roundtrip() -> crate::Result<()> {
        let mut col = Column::new(FieldType::Int64);
        col.push(FieldValue::Int64(-3))?;
        col.push(FieldValue::Null)?;
        col.push(FieldValue::Int64(99))?;

        assert_eq!(3, col.len());
        assert_eq!(Some(FieldValue::Int64(-3)), col.get(0));
        assert_eq!(Some(FieldValue::Int64(0)), col.get(1));
        assert_eq!(Some(FieldValue::Int64(99)), col.get(2));
        assert_eq!(None, col.get(3));

        Ok(())
    }

    #[test]
    fn column_type_mismatch_is_invalid_input() {
        let mut col = Column::new(FieldType::Int64);
        assert!(matches!(
            col.push(FieldValue::Float32(1.0)),
            Err(crate::Error::InvalidInput(_))
        ));
    }

    #[test]
    fn string_column_offsets_and_byte_size() -> crate::Result<()> {
        let mut col = Column::new(FieldType::Str);
        col.push(FieldValue::from("ab"))?;
        col.push(FieldValue::Null)?;
        col.push(FieldValue::from("xyz"))?;

        assert_eq!(Some(FieldValue::from("ab")), col.get(0));
        assert_eq!(Some(FieldValue::from("")), col.get(1));
        assert_eq!(Some(FieldValue::from("xyz")), col.get(2));

        // chars (5) + 8 per offset
        assert_eq!(5 + 8 * 3, col.byte_size());

        Ok(())
    }

    #[test]
    fn column_serialize_roundtrip() -> crate::Result<()> {
        let mut col = Column::new(FieldType::Str);
        for s in ["granite", "", "basalt", "obsidian"] {
            col.push(FieldValue::from(s))?;
        }

        let mut buf = vec![];
        col.serialize_into(&mut buf);

        let restored = Column::deserialize(FieldType::Str, col.len(), &buf)?;
        assert_eq!(col, restored);

        Ok(())
    }

    #[test]
    fn column_deserialize_rejects_bad_offsets() {
        let mut buf = vec![];
        let col = Column::Str {
            offsets: vec![5, 2],
            chars: b"ab".to_vec(),
        };
        col.serialize_into(&mut buf);

        assert!(Column::deserialize(FieldType::Str, 2, &buf).is_err());
    }

    #[test]
    fn min_max_is_conservative_for_floats() -> crate::Result<()> {
        let mut col = Column::new(FieldType::Float64);
        col.push(FieldValue::Float64(-1.5))?;
        col.push(FieldValue::Float64(2.5))?;

        assert_eq!(Some((-2, 3)), col.min_max_i64());

        Ok(())
    }

    #[test]
    fn shared_column_copy_on_write() -> crate::Result<()> {
        let mut col = Column::new(FieldType::Int64);
        col.push(FieldValue::Int64(1))?;

        let mut shared = SharedColumn::new(col);
        let other = shared.clone();
        assert_eq!(2, shared.share_count());

        shared.make_mut().push(FieldValue::Int64(2))?;

        assert_eq!(2, shared.len());
        assert_eq!(1, other.len());

        Ok(())
    }
}
