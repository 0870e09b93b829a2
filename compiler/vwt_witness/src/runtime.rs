//! The reference-counting runtime seam.
//!
//! Witness tables never touch heap objects themselves. Every owned handle
//! they find is passed to a [`RefCounting`] implementation together with
//! its [`ReferenceKind`]. Handle `0` is null and is never passed on.

use vwt_layout::ReferenceKind;

/// Retain/release entry points of a reference-counting runtime.
pub trait RefCounting: Send + Sync {
    fn retain(&self, kind: ReferenceKind, handle: u64);

    fn release(&self, kind: ReferenceKind, handle: u64);
}
