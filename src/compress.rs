// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

const ZSTD_MAX_LEVEL: u8 = 19;

/// Compression algorithm to use
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub enum CompressionType {
    /// No compression
    None,

    /// LZ4 compression
    ///
    /// Recommended for use cases with a focus
    /// on speed over compression ratio.
    Lz4,

    /// ZSTD compression
    ///
    /// Higher compression ratio than LZ4; the level (1-19)
    /// trades speed for space.
    Zstd(u8),
}

impl CompressionType {
    /// Compresses a buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec fails.
    pub fn compress(self, data: &[u8]) -> crate::Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Lz4 => Ok(lz4_flex::compress(data)),
            Self::Zstd(level) => zstd::bulk::compress(data, i32::from(level))
                .map_err(|_| crate::Error::Decompress(self)),
        }
    }

    /// Decompresses a buffer into exactly `uncompressed_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Decompress` if the codec fails or the output length
    /// does not match.
    pub fn decompress(self, data: &[u8], uncompressed_len: usize) -> crate::Result<Vec<u8>> {
        let out = match self {
            Self::None => data.to_vec(),
            Self::Lz4 => lz4_flex::decompress(data, uncompressed_len)
                .map_err(|_| crate::Error::Decompress(self))?,
            Self::Zstd(_) => zstd::bulk::decompress(data, uncompressed_len)
                .map_err(|_| crate::Error::Decompress(self))?,
        };

        if out.len() == uncompressed_len {
            Ok(out)
        } else {
            Err(crate::Error::Decompress(self))
        }
    }

    /// Worst-case compressed size for `len` input bytes.
    ///
    /// Compression buffers sized with this bound can never be under-allocated.
    #[must_use]
    pub fn max_compressed_size(self, len: usize) -> usize {
        match self {
            Self::None => len,
            Self::Lz4 => lz4_flex::block::get_maximum_output_size(len),
            Self::Zstd(_) => zstd::zstd_safe::compress_bound(len),
        }
    }
}

impl Encode for CompressionType {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        match self {
            Self::None => {
                writer.write_u8(0)?;
                writer.write_u8(0)?;
            }

            Self::Lz4 => {
                writer.write_u8(1)?;
                writer.write_u8(0)?;
            }

            Self::Zstd(level) => {
                writer.write_u8(2)?;
                writer.write_u8(*level)?;
            }
        }

        Ok(())
    }
}

impl Decode for CompressionType {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let tag = reader.read_u8()?;
        let level = reader.read_u8()?;

        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            2 => {
                if level == 0 || level > ZSTD_MAX_LEVEL {
                    return Err(DecodeError::InvalidTag(("ZstdLevel", level)));
                }
                Ok(Self::Zstd(level))
            }
            tag => Err(DecodeError::InvalidTag(("CompressionType", tag))),
        }
    }
}

impl std::fmt::Display for CompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "no compression"),
            Self::Lz4 => write!(f, "lz4"),
            Self::Zstd(level) => write!(f, "zstd (level {level})"),
        }
    }
}
