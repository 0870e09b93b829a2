//! Bit masks over the bytes of a value.
//!
//! Bits are numbered in memory order: bit `i` lives in byte `i / 8` at
//! position `i % 8`, least significant first. [`BitMask::gather`] and
//! [`BitMask::scatter`] walk the set bits in ascending order, so the first
//! set bit of the mask becomes bit 0 of the packed integer (PEXT/PDEP on a
//! little-endian value).
//!
//! Masks are used for two things: describing **spare bits** (bits no valid
//! value of a type ever sets) and addressing the bits an enum uses for its
//! tag or for the index of an empty case.

use std::fmt;

use smallvec::SmallVec;

/// Upper bound on the extra inhabitants a layout reports.
///
/// Keeps inhabitant indices representable in a non-negative `i32`.
pub const MAX_EXTRA_INHABITANTS: u32 = 0x7FFF_FFFF;

/// A mask with one bit per bit of a value.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitMask {
    bytes: SmallVec<[u8; 16]>,
}

impl BitMask {
    /// A mask of `len` bytes with no bits set.
    pub fn zeros(len: usize) -> Self {
        Self {
            bytes: SmallVec::from_elem(0, len),
        }
    }

    /// A mask of `len` bytes with every bit set.
    pub fn ones(len: usize) -> Self {
        Self {
            bytes: SmallVec::from_elem(0xFF, len),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: SmallVec::from_slice(bytes),
        }
    }

    /// Width of the mask in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn count_ones(&self) -> u32 {
        self.bytes.iter().map(|b| b.count_ones()).sum()
    }

    /// True if no bit is set.
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    pub fn test(&self, bit: usize) -> bool {
        self.bytes
            .get(bit / 8)
            .is_some_and(|byte| byte & (1 << (bit % 8)) != 0)
    }

    pub fn set(&mut self, bit: usize) {
        if let Some(byte) = self.bytes.get_mut(bit / 8) {
            *byte |= 1 << (bit % 8);
        }
    }

    /// Bitwise AND. The result has the width of `self`; bytes past the end
    /// of `other` are cleared.
    #[must_use]
    pub fn and(&self, other: &BitMask) -> BitMask {
        let mut out = self.clone();
        for (i, byte) in out.bytes.iter_mut().enumerate() {
            *byte &= other.bytes.get(i).copied().unwrap_or(0);
        }
        out
    }

    /// Bitwise NOT over the full width.
    #[must_use]
    pub fn not(&self) -> BitMask {
        BitMask {
            bytes: self.bytes.iter().map(|b| !b).collect(),
        }
    }

    /// Bits of `self` that are not set in `other`.
    #[must_use]
    pub fn without(&self, other: &BitMask) -> BitMask {
        self.and(&other.not().resized(self.len(), 0xFF))
    }

    /// OR `other` into `self` starting at `byte_offset`. Bits that would land
    /// past the end of `self` are dropped.
    pub fn or_at(&mut self, other: &BitMask, byte_offset: usize) {
        for (i, &byte) in other.bytes.iter().enumerate() {
            if let Some(dst) = self.bytes.get_mut(byte_offset + i) {
                *dst |= byte;
            }
        }
    }

    /// This mask moved to `byte_offset` inside a zeroed mask of `total_len`
    /// bytes.
    #[must_use]
    pub fn placed(&self, byte_offset: usize, total_len: usize) -> BitMask {
        let mut out = BitMask::zeros(total_len);
        out.or_at(self, byte_offset);
        out
    }

    /// Truncate to `len` bytes, or extend with `fill` bytes.
    #[must_use]
    pub fn resized(&self, len: usize, fill: u8) -> BitMask {
        let mut bytes = self.bytes.clone();
        bytes.resize(len, fill);
        BitMask { bytes }
    }

    /// A mask keeping only the lowest `n` set bits of `self`.
    #[must_use]
    pub fn lowest_set_bits(&self, n: u32) -> BitMask {
        let mut out = BitMask::zeros(self.len());
        let mut remaining = n;
        for bit in self.set_bits() {
            if remaining == 0 {
                break;
            }
            out.set(bit);
            remaining -= 1;
        }
        out
    }

    /// Indices of set bits in ascending order.
    pub fn set_bits(&self) -> impl Iterator<Item = usize> + '_ {
        self.bytes.iter().enumerate().flat_map(|(i, &byte)| {
            (0..8).filter(move |b| byte & (1 << b) != 0).map(move |b| i * 8 + b)
        })
    }

    /// Pack the bits of `value` selected by this mask into an integer.
    ///
    /// Only the first 64 selected bits contribute.
    pub fn gather(&self, value: &[u8]) -> u64 {
        let mut out = 0u64;
        for (pos, bit) in self.set_bits().take(64).enumerate() {
            let set = value
                .get(bit / 8)
                .is_some_and(|byte| byte & (1 << (bit % 8)) != 0);
            if set {
                out |= 1 << pos;
            }
        }
        out
    }

    /// Spread the low bits of `packed` over the bits selected by this mask,
    /// overwriting them. Selected bits past the 64th are cleared.
    pub fn scatter(&self, value: &mut [u8], packed: u64) {
        for (pos, bit) in self.set_bits().enumerate() {
            let Some(byte) = value.get_mut(bit / 8) else {
                break;
            };
            let one = pos < 64 && packed & (1 << pos) != 0;
            if one {
                *byte |= 1 << (bit % 8);
            } else {
                *byte &= !(1 << (bit % 8));
            }
        }
    }

    /// Clear every bit of `value` selected by this mask.
    pub fn clear_in(&self, value: &mut [u8]) {
        for (byte, &mask) in value.iter_mut().zip(&self.bytes) {
            *byte &= !mask;
        }
    }

    /// Number of bit patterns with at least one selected bit set.
    ///
    /// Every combination of spare bits except all-zero, times every
    /// combination of the remaining bits: `(2^spare - 1) * 2^other`,
    /// saturated at [`MAX_EXTRA_INHABITANTS`].
    pub fn extra_inhabitant_count(&self) -> u32 {
        let spare = self.count_ones();
        if spare == 0 {
            return 0;
        }
        let other = u32::try_from(self.bit_len()).unwrap_or(u32::MAX) - spare;
        if spare + other >= 32 {
            return MAX_EXTRA_INHABITANTS;
        }
        let raw = ((1u64 << spare) - 1) << other;
        u32::try_from(raw.min(u64::from(MAX_EXTRA_INHABITANTS))).unwrap_or(MAX_EXTRA_INHABITANTS)
    }
}

impl fmt::Debug for BitMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitMask({self})")
    }
}

impl fmt::Display for BitMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.bytes {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Bits needed to distinguish `count` values (`ceil(log2(count))`).
pub fn bits_for(count: u64) -> u32 {
    if count <= 1 {
        0
    } else {
        64 - (count - 1).leading_zeros()
    }
}

/// Whole bytes needed to distinguish `count` values.
pub fn bytes_for(count: u64) -> u32 {
    bits_for(count).div_ceil(8)
}

/// Read a little-endian unsigned integer of `value.len()` bytes (at most 8).
pub fn read_le(value: &[u8]) -> u64 {
    value
        .iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte))
}

/// Write the low `dst.len()` bytes of `value` little-endian.
pub fn write_le(dst: &mut [u8], value: u64) {
    for (i, byte) in dst.iter_mut().enumerate() {
        *byte = if i < 8 {
            #[expect(clippy::cast_possible_truncation, reason = "masked to one byte")]
            let b = (value >> (8 * i)) as u8;
            b
        } else {
            0
        };
    }
}
