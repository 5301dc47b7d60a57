// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Packed finite-state transducer
//!
//! An immutable map from byte sequences to non-negative integer outputs,
//! stored as a single contiguous byte buffer plus a root-node offset. Each
//! node picks one of four arc encodings depending on its label density:
//!
//! | Encoding          | When                                | Arc lookup |
//! |-------------------|-------------------------------------|------------|
//! | Continuous        | labels form a dense range           | O(1)       |
//! | Direct addressing | range <= 64 and count >= range / 4  | O(1)       |
//! | Binary search     | count >= 6                          | O(log n)   |
//! | Linear scan       | fewer than 6 arcs                   | O(n)       |
//!
//! The output of an accepted input is the sum of arc outputs along the path
//! plus the final state's output.

mod builder;

pub use builder::FstBuilder;

use crate::{coding::DecodeError, Bytes, Checksum};
use byteorder::{ByteOrder, LittleEndian};
use std::sync::OnceLock;

/// Output value type (file pointer to a term block)
pub type Output = i64;

/// Distinguished "absent" value, disjoint from all real outputs
pub const NO_OUTPUT: Output = -1;

pub(crate) const FST_MAGIC: [u8; 4] = *b"DFST";
pub(crate) const FST_VERSION: u8 = 1;

// Arc encoding tags
pub(crate) const ARCS_FOR_DIRECT_ADDRESSING: u8 = 0;
pub(crate) const ARCS_FOR_BINARY_SEARCH: u8 = 1;
pub(crate) const ARCS_FOR_CONTINUOUS: u8 = 2;
pub(crate) const ARCS_FOR_LINEAR_SCAN: u8 = 3;

const FLAG_FINAL: u8 = 1;

// Fixed-width arc: output u64 + target u64 (+ label byte for binary search)
const FIXED_ARC_BYTES: usize = 16;

/// Bounds-checked cursor over the packed byte buffer
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = *self.data.get(self.pos).ok_or(DecodeError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    pub(crate) fn read_uvarint(&mut self) -> Result<u64, DecodeError> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let b = self.read_u8()?;
            if shift >= 64 {
                return Err(DecodeError::InvalidHeader("varint overflow"));
            }
            result |= u64::from(b & 0x7F) << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    pub(crate) fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        let end = self.pos + 8;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or(DecodeError::UnexpectedEof)?;
        self.pos = end;
        Ok(LittleEndian::read_u64(slice))
    }

    pub(crate) fn slice(&self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.data
            .get(self.pos..self.pos + len)
            .ok_or(DecodeError::UnexpectedEof)
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        if self.pos + len > self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        self.pos += len;
        Ok(())
    }
}

pub(crate) fn push_uvarint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub(crate) fn push_u64_le(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// A parsed node header plus enough state to locate its arcs
struct ParsedNode {
    encoding: u8,
    is_final: bool,
    final_output: u64,
    arc_count: usize,
    first_label: u8,
    label_range: usize,
    bits_start: usize,
    arcs_start: usize,
}

impl ParsedNode {
    fn parse(data: &[u8], offset: usize) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(data, offset);

        let encoding = reader.read_u8()?;
        if encoding > ARCS_FOR_LINEAR_SCAN {
            return Err(DecodeError::InvalidTag(("FstArcEncoding", encoding)));
        }

        let flags = reader.read_u8()?;
        let is_final = flags & FLAG_FINAL != 0;
        let final_output = if is_final { reader.read_uvarint()? } else { 0 };

        let (arc_count, first_label, label_range, bits_start) = match encoding {
            ARCS_FOR_DIRECT_ADDRESSING => {
                let first_label = reader.read_u8()?;
                let label_range = reader.read_u8()? as usize;
                let bits_start = reader.position();
                let bit_table = reader.slice(label_range.div_ceil(8))?;
                reader.skip(label_range.div_ceil(8))?;
                let arc_count = bit_table.iter().map(|b| b.count_ones() as usize).sum();
                (arc_count, first_label, label_range, bits_start)
            }
            ARCS_FOR_CONTINUOUS => {
                let arc_count = usize::try_from(reader.read_uvarint()?)
                    .map_err(|_| DecodeError::InvalidHeader("arc count"))?;
                let first_label = reader.read_u8()?;
                (arc_count, first_label, arc_count, 0)
            }
            _ => {
                let arc_count = usize::try_from(reader.read_uvarint()?)
                    .map_err(|_| DecodeError::InvalidHeader("arc count"))?;
                (arc_count, 0, 0, 0)
            }
        };

        Ok(Self {
            encoding,
            is_final,
            final_output,
            arc_count,
            first_label,
            label_range,
            bits_start,
            arcs_start: reader.position(),
        })
    }

    /// Looks up the outgoing arc for `label`, returning `(output, target)`.
    fn find_arc(&self, data: &[u8], label: u8) -> Result<Option<(u64, usize)>, DecodeError> {
        match self.encoding {
            ARCS_FOR_CONTINUOUS => {
                if label < self.first_label {
                    return Ok(None);
                }
                let index = (label - self.first_label) as usize;
                if index >= self.arc_count {
                    return Ok(None);
                }
                self.read_fixed_arc(data, self.arcs_start + index * FIXED_ARC_BYTES)
                    .map(Some)
            }

            ARCS_FOR_DIRECT_ADDRESSING => {
                if label < self.first_label {
                    return Ok(None);
                }
                let bit = (label - self.first_label) as usize;
                if bit >= self.label_range {
                    return Ok(None);
                }

                let table = ByteReader::new(data, self.bits_start)
                    .slice(self.label_range.div_ceil(8))?;
                if table[bit / 8] & (1 << (bit % 8)) == 0 {
                    return Ok(None);
                }

                // Rank of the set bit = arc index
                let mut index = 0usize;
                for (byte_idx, byte) in table.iter().enumerate().take(bit / 8 + 1) {
                    if byte_idx < bit / 8 {
                        index += byte.count_ones() as usize;
                    } else {
                        let mask = (1u16 << (bit % 8)) - 1;
                        index += (byte & mask as u8).count_ones() as usize;
                    }
                }

                self.read_fixed_arc(data, self.arcs_start + index * FIXED_ARC_BYTES)
                    .map(Some)
            }

            ARCS_FOR_BINARY_SEARCH => {
                let arc_bytes = 1 + FIXED_ARC_BYTES;
                let mut left = 0usize;
                let mut right = self.arc_count;
                while left < right {
                    let mid = (left + right) / 2;
                    let pos = self.arcs_start + mid * arc_bytes;
                    let mid_label = *data.get(pos).ok_or(DecodeError::UnexpectedEof)?;
                    match mid_label.cmp(&label) {
                        std::cmp::Ordering::Less => left = mid + 1,
                        std::cmp::Ordering::Greater => right = mid,
                        std::cmp::Ordering::Equal => {
                            return self.read_fixed_arc(data, pos + 1).map(Some);
                        }
                    }
                }
                Ok(None)
            }

            _ => {
                // Linear scan over variable-width arcs
                let mut reader = ByteReader::new(data, self.arcs_start);
                for _ in 0..self.arc_count {
                    let arc_label = reader.read_u8()?;
                    let output = reader.read_uvarint()?;
                    let target = reader.read_uvarint()?;
                    if arc_label == label {
                        let target = usize::try_from(target)
                            .map_err(|_| DecodeError::InvalidHeader("arc target"))?;
                        return Ok(Some((output, target)));
                    }
                }
                Ok(None)
            }
        }
    }

    fn read_fixed_arc(&self, data: &[u8], pos: usize) -> Result<(u64, usize), DecodeError> {
        let mut reader = ByteReader::new(data, pos);
        let output = reader.read_u64_le()?;
        let target = usize::try_from(reader.read_u64_le()?)
            .map_err(|_| DecodeError::InvalidHeader("arc target"))?;
        Ok((output, target))
    }
}

/// Immutable map from byte sequences to non-negative integer outputs
///
/// Built once by [`FstBuilder`]; concurrent readers require no
/// synchronization.
pub struct Fst {
    data: Vec<u8>,
    root: Option<usize>,
    entries_raw: Vec<u8>,
    entries: OnceLock<Vec<(Bytes, Output)>>,
}

impl Default for Fst {
    /// An unset FST; all lookups return [`NO_OUTPUT`] without error.
    fn default() -> Self {
        Self::from_parts(Vec::new(), None, Vec::new())
    }
}

impl std::fmt::Debug for Fst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Fst(packed={}B, entries={}B)",
            self.data.len(),
            self.entries_raw.len(),
        )
    }
}

impl Fst {
    pub(crate) fn from_parts(
        data: Vec<u8>,
        root: Option<usize>,
        entries: Vec<(Bytes, Output)>,
    ) -> Self {
        let entries_raw = encode_entries(&entries);
        let cell = OnceLock::new();
        let _ = cell.set(entries);
        Self {
            data,
            root,
            entries_raw,
            entries: cell,
        }
    }

    /// Looks up the output for exactly `input`.
    ///
    /// Returns [`NO_OUTPUT`] if `input` was not stored; a stored input's
    /// proper prefix or extension is not a match. An empty FST returns
    /// [`NO_OUTPUT`] without error.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the packed buffer is corrupt.
    pub fn get(&self, input: &[u8]) -> crate::Result<Output> {
        let Some(root) = self.root else {
            return Ok(NO_OUTPUT);
        };

        let mut node = ParsedNode::parse(&self.data, root)?;
        let mut acc = 0u64;

        for &label in input {
            match node.find_arc(&self.data, label)? {
                Some((output, target)) => {
                    acc += output;
                    node = ParsedNode::parse(&self.data, target)?;
                }
                None => return Ok(NO_OUTPUT),
            }
        }

        if node.is_final {
            #[allow(clippy::cast_possible_wrap)]
            Ok((acc + node.final_output) as Output)
        } else {
            Ok(NO_OUTPUT)
        }
    }

    /// Finds the longest stored input that is a prefix of `input`.
    ///
    /// Returns `(prefix_length, output)` for the largest such prefix, or
    /// `None` if no stored input (including the empty one) prefixes `input`.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the packed buffer is corrupt.
    pub fn longest_prefix_match(&self, input: &[u8]) -> crate::Result<Option<(usize, Output)>> {
        let Some(root) = self.root else {
            return Ok(None);
        };

        let mut node = ParsedNode::parse(&self.data, root)?;
        let mut acc = 0u64;
        let mut best = None;

        #[allow(clippy::cast_possible_wrap)]
        for (depth, &label) in input.iter().enumerate() {
            if node.is_final {
                best = Some((depth, (acc + node.final_output) as Output));
            }
            match node.find_arc(&self.data, label)? {
                Some((output, target)) => {
                    acc += output;
                    node = ParsedNode::parse(&self.data, target)?;
                }
                None => return Ok(best),
            }
        }

        #[allow(clippy::cast_possible_wrap)]
        if node.is_final {
            best = Some((input.len(), (acc + node.final_output) as Output));
        }

        Ok(best)
    }

    /// All stored `(input, output)` pairs in byte-wise ascending input order.
    ///
    /// Materialized lazily on first call; repeated calls observe identical
    /// results.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the serialized entry stream is corrupt.
    pub fn entries(&self) -> crate::Result<&[(Bytes, Output)]> {
        if let Some(entries) = self.entries.get() {
            return Ok(entries);
        }
        let decoded = decode_entries(&self.entries_raw)?;
        Ok(self.entries.get_or_init(|| decoded))
    }

    /// Iterates all `(input, output)` pairs in ascending input order.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the serialized entry stream is corrupt.
    pub fn iter_all(&self) -> crate::Result<std::slice::Iter<'_, (Bytes, Output)>> {
        Ok(self.entries()?.iter())
    }

    /// Number of stored inputs.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the serialized entry stream is corrupt.
    pub fn len(&self) -> crate::Result<usize> {
        Ok(self.entries()?.len())
    }

    /// Whether no inputs are stored.
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the serialized entry stream is corrupt.
    pub fn is_empty(&self) -> crate::Result<bool> {
        Ok(self.entries()?.is_empty())
    }

    /// Serializes the FST into a single byte stream.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + self.entries_raw.len() + 64);

        out.extend_from_slice(&FST_MAGIC);
        out.push(FST_VERSION);
        push_u64_le(&mut out, self.root.map_or(u64::MAX, |r| r as u64));
        push_u64_le(&mut out, self.entries_raw.len() as u64);
        out.extend_from_slice(&self.entries_raw);
        push_u64_le(&mut out, self.data.len() as u64);
        out.extend_from_slice(&self.data);

        let checksum = Checksum::of(&out);
        push_u64_le(&mut out, checksum.into_u64());

        out
    }

    /// Deserializes an FST written by [`Fst::serialize`].
    ///
    /// Entries are *not* materialized eagerly; they decode on first
    /// [`Fst::entries`] call.
    ///
    /// # Errors
    ///
    /// Returns `Decode` on bad magic, unsupported version, checksum mismatch,
    /// or a truncated stream.
    pub fn deserialize(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() < FST_MAGIC.len() + 1 + 8 {
            return Err(DecodeError::UnexpectedEof.into());
        }

        let (body, checksum_bytes) = bytes.split_at(bytes.len() - 8);
        let expected = Checksum::from_raw(LittleEndian::read_u64(checksum_bytes));
        Checksum::of(body).check(expected)?;

        let mut reader = ByteReader::new(body, 0);
        if reader.slice(FST_MAGIC.len())? != FST_MAGIC.as_slice() {
            return Err(DecodeError::InvalidHeader("Fst").into());
        }
        reader.skip(FST_MAGIC.len())?;

        let version = reader.read_u8()?;
        if version != FST_VERSION {
            return Err(DecodeError::InvalidVersion(u32::from(version)).into());
        }

        let root_raw = reader.read_u64_le()?;
        let root = if root_raw == u64::MAX {
            None
        } else {
            Some(
                usize::try_from(root_raw)
                    .map_err(|_| DecodeError::InvalidHeader("root offset"))?,
            )
        };

        let entries_len = usize::try_from(reader.read_u64_le()?)
            .map_err(|_| DecodeError::InvalidHeader("entries length"))?;
        let entries_raw = reader.slice(entries_len)?.to_vec();
        reader.skip(entries_len)?;

        let data_len = usize::try_from(reader.read_u64_le()?)
            .map_err(|_| DecodeError::InvalidHeader("data length"))?;
        let data = reader.slice(data_len)?.to_vec();
        reader.skip(data_len)?;

        if reader.position() != body.len() {
            return Err(DecodeError::LengthMismatch((body.len(), reader.position())).into());
        }

        if let Some(root) = root {
            if root >= data.len() {
                return Err(DecodeError::InvalidHeader("root offset out of bounds").into());
            }
        }

        Ok(Self {
            data,
            root,
            entries_raw,
            entries: OnceLock::new(),
        })
    }
}

fn encode_entries(entries: &[(Bytes, Output)]) -> Vec<u8> {
    let mut out = Vec::new();
    push_uvarint(&mut out, entries.len() as u64);
    #[allow(clippy::cast_sign_loss)]
    for (input, output) in entries {
        push_uvarint(&mut out, input.len() as u64);
        out.extend_from_slice(input);
        push_uvarint(&mut out, *output as u64);
    }
    out
}

fn decode_entries(raw: &[u8]) -> Result<Vec<(Bytes, Output)>, DecodeError> {
    let mut reader = ByteReader::new(raw, 0);
    let count = usize::try_from(reader.read_uvarint()?)
        .map_err(|_| DecodeError::InvalidHeader("entry count"))?;

    let mut entries = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        let len = usize::try_from(reader.read_uvarint()?)
            .map_err(|_| DecodeError::InvalidHeader("entry length"))?;
        let input = Bytes::from(reader.slice(len)?);
        reader.skip(len)?;
        #[allow(clippy::cast_possible_wrap)]
        let output = reader.read_uvarint()? as Output;
        entries.push((input, output));
    }

    if reader.position() != raw.len() {
        return Err(DecodeError::LengthMismatch((raw.len(), reader.position())));
    }

    Ok(entries)
}
