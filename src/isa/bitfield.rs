//! Bit-level field access within a 32-bit word.
//!
//! A [`BitField`] names a contiguous run of bits, counted from the
//! least-significant bit. Fields can be read back zero-extended or
//! sign-extended (two's complement), and written without disturbing
//! the bits around them.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A contiguous field of `width` bits starting at bit `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitField {
    offset: u32,
    width: u32,
}

impl BitField {
    /// Create a field of `width` bits at `offset`.
    ///
    /// # Panics
    /// Panics if `width` is zero or the field runs past bit 31.
    pub const fn new(offset: u32, width: u32) -> Self {
        assert!(width > 0, "bit field width must be at least 1");
        assert!(offset + width <= 32, "bit field does not fit in a 32-bit word");
        Self { offset, width }
    }

    /// Create a field from inclusive bit positions `lo..=hi`.
    ///
    /// # Panics
    /// Panics if `lo > hi` or `hi > 31`.
    pub const fn from_bits(lo: u32, hi: u32) -> Self {
        assert!(lo <= hi, "bit field low bit above high bit");
        Self::new(lo, hi - lo + 1)
    }

    #[inline]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Mask of the field's bits, not shifted into position.
    #[inline]
    const fn low_mask(&self) -> u32 {
        u32::MAX >> (32 - self.width)
    }

    /// Mask of the field's bits in their position within the word.
    #[inline]
    pub const fn mask(&self) -> u32 {
        self.low_mask() << self.offset
    }

    /// Largest value the field holds when read unsigned.
    pub const fn max_unsigned(&self) -> u32 {
        self.low_mask()
    }

    /// Smallest value the field holds when read as two's complement.
    pub const fn min_signed(&self) -> i32 {
        (-(1i64 << (self.width - 1))) as i32
    }

    /// Largest value the field holds when read as two's complement.
    pub const fn max_signed(&self) -> i32 {
        ((1i64 << (self.width - 1)) - 1) as i32
    }

    /// Read the field, zero-extended.
    #[inline]
    pub const fn extract(&self, word: u32) -> u32 {
        (word >> self.offset) & self.low_mask()
    }

    /// Read the field, sign-extended from its top bit.
    #[inline]
    pub const fn extract_signed(&self, word: u32) -> i32 {
        let shift = 32 - self.width;
        ((self.extract(word) << shift) as i32) >> shift
    }

    /// Write an unsigned value into the field, keeping all other bits.
    pub fn insert(&self, value: u32, word: u32) -> Result<u32, FieldRangeError> {
        if value > self.max_unsigned() {
            return Err(FieldRangeError {
                value: value as i64,
                min: 0,
                max: self.max_unsigned() as i64,
            });
        }
        Ok((word & !self.mask()) | (value << self.offset))
    }

    /// Write a signed value into the field as two's complement.
    ///
    /// Values outside the field's signed range are rejected rather than
    /// truncated.
    pub fn insert_signed(&self, value: i32, word: u32) -> Result<u32, FieldRangeError> {
        if value < self.min_signed() || value > self.max_signed() {
            return Err(FieldRangeError {
                value: value as i64,
                min: self.min_signed() as i64,
                max: self.max_signed() as i64,
            });
        }
        let bits = (value as u32) & self.low_mask();
        Ok((word & !self.mask()) | (bits << self.offset))
    }
}

/// A value does not fit the field it is being written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value {value} out of range [{min}, {max}]")]
pub struct FieldRangeError {
    pub value: i64,
    pub min: i64,
    pub max: i64,
}
