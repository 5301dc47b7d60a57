// Copyright (c) 2024-present, diagon-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::DecodeError;

/// A 64-bit xxh3 checksum
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Checksum(u64);

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Checksum {
    /// Computes the checksum of a byte slice.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(bytes))
    }

    /// Wraps a raw checksum value.
    #[must_use]
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw 64-bit integer.
    #[must_use]
    pub fn into_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn check(self, expected: Self) -> Result<(), DecodeError> {
        if self.0 == expected.0 {
            Ok(())
        } else {
            Err(DecodeError::ChecksumMismatch((self.0, expected.0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Checksum;
    use test_log::test;

    #[test]
    fn checksum_is_stable() {
        assert_eq!(Checksum::of(b"granule"), Checksum::of(b"granule"));
        assert_ne!(Checksum::of(b"granule"), Checksum::of(b"granulf"));
    }

    #[test]
    fn checksum_check() {
        let c = Checksum::of(b"x");
        assert!(c.check(c).is_ok());
        assert!(c.check(Checksum::from_raw(0)).is_err());
    }
}
