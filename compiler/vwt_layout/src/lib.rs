//! Type layout for the value-witness engine.
//!
//! This crate provides:
//!
//! - **Layout data** ([`TypeLayout`], [`FieldDescriptor`],
//!   [`ExtraInhabitants`]): size, alignment, stride, field placement, spare
//!   bits and extra inhabitants of a concrete type.
//!
//! - **Layout calculation** ([`LayoutEngine::compute_layout`]): structs in
//!   declaration order with natural alignment.
//!
//! - **Enum tag allocation** ([`LayoutEngine::allocate_tags`]): chooses a
//!   [`TagEncoding`] (no payload, single payload, multi payload) and packs
//!   the tag into extra inhabitants or spare bits where it can.
//!
//! - **Layout strings** ([`Shape`]): a compact text form for shapes, used
//!   by the resolver's declarations and the `vwt` tool.
//!
//! - **Dumps** ([`LayoutMap`], [`hex_words`]).
//!
//! # Target
//!
//! Layouts assume a 64-bit little-endian target: reference words are 8
//! bytes, aligned to 8, with spare bits [`POINTER_SPARE_BITS`].
//!
//! # Crate Dependencies
//!
//! Leaf crate. Witness tables (`vwt_witness`) and generic resolution
//! (`vwt_generic`) build on it.

pub mod bits;
mod calc;
pub mod dump;
pub mod enums;
mod error;
pub mod layout;
pub mod scalar;
pub mod shape;
mod stack;

pub use bits::{BitMask, MAX_EXTRA_INHABITANTS};
pub use calc::{allocate_tags, compute_layout, LayoutConfig, LayoutEngine};
pub use dump::{hex_words, LayoutMap, POINTER_WORD};
pub use enums::{
    CaseLayout, EnumCaseDescriptor, EnumLayout, MultiPayloadTag, SinglePayloadTag, TagEncoding,
    TagStore, MAX_TAG_BYTES,
};
pub use error::{LayoutError, ShapeParseError};
pub use layout::{
    Align, ExtraInhabitants, FieldDescriptor, InhabitantEncoding, LayoutKind, LayoutSlot, Name,
    Ownership, TypeLayout,
};
pub use scalar::{ReferenceKind, ScalarKind, POINTER_SPARE_BITS};
pub use shape::{Shape, MAX_SHORTHAND_CASES};
pub use stack::ensure_sufficient_stack;
