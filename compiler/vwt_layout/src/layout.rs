//! Layout data model: [`TypeLayout`], [`FieldDescriptor`], alignment and
//! extra inhabitants.
//!
//! A `TypeLayout` is pure data. It is produced by the
//! [`LayoutEngine`](crate::LayoutEngine), verified once, and shared behind
//! `Arc` by every witness table that embeds it.

use std::fmt;
use std::sync::Arc;

use crate::bits::{read_le, write_le, BitMask};
use crate::enums::EnumLayout;
use crate::error::LayoutError;
use crate::scalar::{ReferenceKind, ScalarKind};

/// Field and case names.
pub type Name = Arc<str>;

// ── Alignment ───────────────────────────────────────────────────

/// A power-of-two alignment in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Align(u32);

impl Align {
    pub const ONE: Align = Align(1);

    /// `None` unless `bytes` is a non-zero power of two.
    pub fn new(bytes: u32) -> Option<Align> {
        bytes.is_power_of_two().then_some(Align(bytes))
    }

    pub fn bytes(self) -> u32 {
        self.0
    }

    /// Round `offset` up to this alignment. `None` on overflow.
    pub fn align_up(self, offset: u32) -> Option<u32> {
        let mask = self.0 - 1;
        offset.checked_add(mask).map(|v| v & !mask)
    }

    pub fn is_aligned(self, offset: u32) -> bool {
        offset & (self.0 - 1) == 0
    }
}

impl fmt::Display for Align {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Ownership ───────────────────────────────────────────────────

/// What copying or destroying a value (or field) has to do beyond moving
/// bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Plain bytes; copy is `memcpy`, destroy is a no-op.
    Trivial,
    /// A reference word the value owns directly.
    OwnedReference,
    /// An aggregate with owned references somewhere inside.
    NestedAggregate,
}

impl Ownership {
    pub fn is_trivial(self) -> bool {
        self == Self::Trivial
    }
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Trivial => "trivial",
            Self::OwnedReference => "owned-reference",
            Self::NestedAggregate => "nested-aggregate",
        })
    }
}

// ── Fields ──────────────────────────────────────────────────────

/// Placement of one struct field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: Name,
    pub offset: u32,
    pub size: u32,
    pub alignment: Align,
    pub trivially_copyable: bool,
    pub ownership: Ownership,
}

impl FieldDescriptor {
    pub fn end(&self) -> u32 {
        self.offset + self.size
    }
}

/// A layout that may not be known yet.
///
/// Forward references and unbound generic parameters stay `Pending` until
/// they resolve; the engine refuses to lay out anything that still contains
/// one instead of guessing a size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutSlot {
    Ready(Arc<TypeLayout>),
    Pending(Name),
}

impl LayoutSlot {
    pub fn ready(&self) -> Result<&Arc<TypeLayout>, LayoutError> {
        match self {
            Self::Ready(layout) => Ok(layout),
            Self::Pending(what) => Err(LayoutError::IncompleteLayout {
                what: what.to_string(),
            }),
        }
    }
}

impl From<Arc<TypeLayout>> for LayoutSlot {
    fn from(layout: Arc<TypeLayout>) -> Self {
        Self::Ready(layout)
    }
}

impl From<TypeLayout> for LayoutSlot {
    fn from(layout: TypeLayout) -> Self {
        Self::Ready(Arc::new(layout))
    }
}

// ── Extra inhabitants ───────────────────────────────────────────

/// Where a layout keeps its extra inhabitants: bit patterns no valid value
/// produces, numbered `0..count`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InhabitantEncoding {
    None,
    /// Patterns with at least one spare bit set. The mask spans the whole
    /// value.
    SpareBits { mask: BitMask },
    /// Little-endian integers `>= first` in `width` bytes at `offset`.
    TagValues { offset: u32, width: u8, first: u64 },
    /// The inner encoding with its first `skip` inhabitants already taken by
    /// an enclosing enum.
    Skip {
        inner: Box<InhabitantEncoding>,
        skip: u32,
    },
}

impl InhabitantEncoding {
    /// The same encoding for a value embedded at `offset` inside a value of
    /// `total_size` bytes.
    #[must_use]
    pub fn placed(&self, offset: u32, total_size: u32) -> InhabitantEncoding {
        match self {
            Self::None => Self::None,
            Self::SpareBits { mask } => Self::SpareBits {
                mask: mask.placed(offset as usize, total_size as usize),
            },
            Self::TagValues {
                offset: inner,
                width,
                first,
            } => Self::TagValues {
                offset: inner + offset,
                width: *width,
                first: *first,
            },
            Self::Skip { inner, skip } => Self::Skip {
                inner: Box::new(inner.placed(offset, total_size)),
                skip: *skip,
            },
        }
    }

    fn store(&self, value: &mut [u8], index: u64) {
        match self {
            Self::None => {}
            Self::SpareBits { mask } => {
                // Spare bits carry (index mod m) + 1 so they are never all
                // zero; the quotient goes into the other bits.
                let spare = mask.count_ones();
                let modulus = if spare >= 64 {
                    u64::MAX
                } else {
                    (1u64 << spare) - 1
                };
                value.fill(0);
                mask.scatter(value, index % modulus + 1);
                mask.not().scatter(value, index / modulus);
            }
            Self::TagValues {
                offset,
                width,
                first,
            } => {
                value.fill(0);
                let start = *offset as usize;
                if let Some(dst) = value.get_mut(start..start + usize::from(*width)) {
                    write_le(dst, first + index);
                }
            }
            Self::Skip { inner, skip } => inner.store(value, index + u64::from(*skip)),
        }
    }

    fn index_of(&self, value: &[u8]) -> Option<u64> {
        match self {
            Self::None => None,
            Self::SpareBits { mask } => {
                let spare = mask.count_ones();
                let packed = mask.gather(value);
                if packed == 0 {
                    return None;
                }
                let modulus = if spare >= 64 {
                    u64::MAX
                } else {
                    (1u64 << spare) - 1
                };
                let rest = mask.not().gather(value);
                rest.checked_mul(modulus)?.checked_add(packed - 1)
            }
            Self::TagValues {
                offset,
                width,
                first,
            } => {
                let start = *offset as usize;
                let raw = read_le(value.get(start..start + usize::from(*width))?);
                raw.checked_sub(*first)
            }
            Self::Skip { inner, skip } => inner.index_of(value)?.checked_sub(u64::from(*skip)),
        }
    }
}

/// Count and encoding of a layout's extra inhabitants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtraInhabitants {
    pub count: u32,
    pub encoding: InhabitantEncoding,
}

impl ExtraInhabitants {
    pub const NONE: ExtraInhabitants = ExtraInhabitants {
        count: 0,
        encoding: InhabitantEncoding::None,
    };

    pub fn new(count: u32, encoding: InhabitantEncoding) -> Self {
        if count == 0 {
            Self::NONE
        } else {
            Self { count, encoding }
        }
    }

    /// Write inhabitant `index` over the whole of `value`.
    ///
    /// Returns `false` (and leaves `value` alone) if `index >= count`.
    pub fn store(&self, value: &mut [u8], index: u32) -> bool {
        if index >= self.count {
            return false;
        }
        self.encoding.store(value, u64::from(index));
        true
    }

    /// The inhabitant index `value` encodes, or `None` for a valid value.
    pub fn index_of(&self, value: &[u8]) -> Option<u32> {
        if self.count == 0 {
            return None;
        }
        let index = self.encoding.index_of(value)?;
        u32::try_from(index).ok().filter(|&i| i < self.count)
    }
}

// ── TypeLayout ──────────────────────────────────────────────────

/// What kind of shape a layout was computed from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutKind {
    Scalar(ScalarKind),
    Struct,
    Enum(Arc<EnumLayout>),
}

/// Byte layout of a concrete type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeLayout {
    pub size: u32,
    pub alignment: Align,
    /// `size` rounded up to `alignment`.
    pub stride: u32,
    /// Struct fields in declaration order; empty for scalars and enums.
    pub fields: Vec<FieldDescriptor>,
    /// Bits (over `size` bytes) that no valid value sets.
    pub spare_bits: BitMask,
    pub extra_inhabitants: ExtraInhabitants,
    pub ownership: Ownership,
    /// Offsets of owned reference words present in every value. Enum
    /// payload references are case-dependent and not listed.
    pub references: Vec<(u32, ReferenceKind)>,
    pub kind: LayoutKind,
    /// Canonical layout string. Case tags and the tag encoding are not part of it.
    pub key: Arc<str>,
}

impl TypeLayout {
    /// Layout of a leaf scalar.
    pub fn scalar(kind: ScalarKind) -> TypeLayout {
        let size = kind.size();
        let spare_bits = kind.spare_bits();
        let count = spare_bits.extra_inhabitant_count();
        let references: Vec<_> = kind.reference().into_iter().collect();
        TypeLayout {
            size,
            alignment: Align::new(kind.alignment()).unwrap_or(Align::ONE),
            stride: size,
            fields: Vec::new(),
            extra_inhabitants: ExtraInhabitants::new(
                count,
                InhabitantEncoding::SpareBits {
                    mask: spare_bits.clone(),
                },
            ),
            spare_bits,
            ownership: if references.is_empty() {
                Ownership::Trivial
            } else {
                Ownership::OwnedReference
            },
            references,
            kind: LayoutKind::Scalar(kind),
            key: Arc::from(kind.code().to_string()),
        }
    }

    pub fn is_trivially_copyable(&self) -> bool {
        self.ownership.is_trivial()
    }

    pub fn enum_layout(&self) -> Option<&Arc<EnumLayout>> {
        match &self.kind {
            LayoutKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Check the structural invariants before a layout is published.
    ///
    /// Violations are engine bugs; they are reported instead of handing out
    /// a layout that would corrupt memory.
    pub fn verify(&self) -> Result<(), LayoutError> {
        if self.alignment.align_up(self.size) != Some(self.stride) {
            return Err(LayoutError::AlignmentViolation {
                what: format!("stride of {}", self.key),
                offset: self.stride,
                alignment: self.alignment.bytes(),
            });
        }
        if self.spare_bits.len() != self.size as usize {
            return Err(LayoutError::FieldOutOfBounds {
                field: "spare bits".to_string(),
                end: u32::try_from(self.spare_bits.len()).unwrap_or(u32::MAX),
                size: self.size,
            });
        }
        for field in &self.fields {
            if !field.alignment.is_aligned(field.offset) {
                return Err(LayoutError::AlignmentViolation {
                    what: format!("field `{}`", field.name),
                    offset: field.offset,
                    alignment: field.alignment.bytes(),
                });
            }
            if field.alignment > self.alignment {
                return Err(LayoutError::AlignmentViolation {
                    what: format!("field `{}` in {}", field.name, self.key),
                    offset: field.offset,
                    alignment: field.alignment.bytes(),
                });
            }
            if field.end() > self.size {
                return Err(LayoutError::FieldOutOfBounds {
                    field: field.name.to_string(),
                    end: field.end(),
                    size: self.size,
                });
            }
        }
        Ok(())
    }
}
