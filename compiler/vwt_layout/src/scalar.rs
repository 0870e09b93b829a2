//! Leaf representations: fixed-width integers and reference words.
//!
//! Every composite layout bottoms out in a [`ScalarKind`]. Sizes and
//! alignments assume a 64-bit target: references are one 8-byte word,
//! thick functions are a function word followed by a context word.

use std::fmt;

use crate::bits::BitMask;

/// Spare bits of a heap object pointer, in memory order.
///
/// Heap objects are 8-byte aligned (low 3 bits clear) and live in a 56-bit
/// address space (top byte clear).
pub const POINTER_SPARE_BITS: [u8; 8] = [0x07, 0, 0, 0, 0, 0, 0, 0xFF];

/// Flavour of an owned reference word.
///
/// The runtime dispatches retain/release on this; a layout only records
/// where each word lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Error,
    Strong,
    Unowned,
    Weak,
    UnknownUnowned,
    UnknownWeak,
    Block,
    Bridge,
    ObjC,
}

impl ReferenceKind {
    /// Weak references cannot be moved with a plain byte copy.
    pub fn is_bitwise_takable(self) -> bool {
        !matches!(self, Self::Weak | Self::UnknownWeak)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Strong => "strong",
            Self::Unowned => "unowned",
            Self::Weak => "weak",
            Self::UnknownUnowned => "unknown-unowned",
            Self::UnknownWeak => "unknown-weak",
            Self::Block => "block",
            Self::Bridge => "bridge",
            Self::ObjC => "objc",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A leaf of the layout tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `c`
    I8,
    /// `s`
    I16,
    /// `l`
    I32,
    /// `L`
    I64,
    /// `r`
    ErrorRef,
    /// `N`
    NativeStrong,
    /// `n`
    NativeUnowned,
    /// `W`
    NativeWeak,
    /// `u`
    UnknownUnowned,
    /// `w`
    UnknownWeak,
    /// `b`
    Block,
    /// `B`
    Bridge,
    /// `o`
    ObjC,
    /// `f`: function word + owned context word.
    ThickFunc,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 14] = [
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::ErrorRef,
        Self::NativeStrong,
        Self::NativeUnowned,
        Self::NativeWeak,
        Self::UnknownUnowned,
        Self::UnknownWeak,
        Self::Block,
        Self::Bridge,
        Self::ObjC,
        Self::ThickFunc,
    ];

    /// One-character code used by layout strings.
    pub fn code(self) -> char {
        match self {
            Self::I8 => 'c',
            Self::I16 => 's',
            Self::I32 => 'l',
            Self::I64 => 'L',
            Self::ErrorRef => 'r',
            Self::NativeStrong => 'N',
            Self::NativeUnowned => 'n',
            Self::NativeWeak => 'W',
            Self::UnknownUnowned => 'u',
            Self::UnknownWeak => 'w',
            Self::Block => 'b',
            Self::Bridge => 'B',
            Self::ObjC => 'o',
            Self::ThickFunc => 'f',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Size in bytes.
    pub fn size(self) -> u32 {
        match self {
            Self::I8 => 1,
            Self::I16 => 2,
            Self::I32 => 4,
            Self::ThickFunc => 16,
            _ => 8,
        }
    }

    /// Alignment in bytes. Never larger than 8 on the 64-bit target.
    pub fn alignment(self) -> u32 {
        self.size().min(8)
    }

    /// The owned reference word inside this scalar, as
    /// `(byte offset, kind)`. `None` for plain integers.
    pub fn reference(self) -> Option<(u32, ReferenceKind)> {
        let kind = match self {
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => return None,
            Self::ThickFunc => return Some((8, ReferenceKind::Strong)),
            Self::ErrorRef => ReferenceKind::Error,
            Self::NativeStrong => ReferenceKind::Strong,
            Self::NativeUnowned => ReferenceKind::Unowned,
            Self::NativeWeak => ReferenceKind::Weak,
            Self::UnknownUnowned => ReferenceKind::UnknownUnowned,
            Self::UnknownWeak => ReferenceKind::UnknownWeak,
            Self::Block => ReferenceKind::Block,
            Self::Bridge => ReferenceKind::Bridge,
            Self::ObjC => ReferenceKind::ObjC,
        };
        Some((0, kind))
    }

    /// Bits no valid value of this scalar sets.
    ///
    /// Integers use every bit. Reference words reserve the pointer spare
    /// bits; a thick function reserves them in its context word only.
    pub fn spare_bits(self) -> BitMask {
        match self.reference() {
            None => BitMask::zeros(self.size() as usize),
            Some((offset, _)) => {
                BitMask::from_bytes(&POINTER_SPARE_BITS).placed(offset as usize, self.size() as usize)
            }
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.reference()) {
            (Self::I8, _) => f.write_str("i8"),
            (Self::I16, _) => f.write_str("i16"),
            (Self::I32, _) => f.write_str("i32"),
            (Self::ThickFunc, _) => f.write_str("thick-func"),
            (_, Some((_, kind))) => write!(f, "{kind}-ref"),
            (_, None) => f.write_str("i64"),
        }
    }
}
