//! Layout computation errors.
//!
//! All of these are structural: they are raised while a layout is being
//! computed, before anything is published to callers.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A field or payload layout is not known yet (forward reference or
    /// unbound generic parameter). Callers retry once it resolves.
    #[error("layout of {what} is not resolved yet")]
    IncompleteLayout { what: String },

    /// The case count does not fit in the widest supported tag.
    #[error("{cases} tag values do not fit in a {max_bytes}-byte tag")]
    TagOverflow { cases: u64, max_bytes: u32 },

    /// A computed offset is not a multiple of the required alignment.
    #[error("{what} at offset {offset} violates {alignment}-byte alignment")]
    AlignmentViolation {
        what: String,
        offset: u32,
        alignment: u32,
    },

    /// A field extends past the end of its aggregate.
    #[error("field `{field}` ends at byte {end}, past aggregate size {size}")]
    FieldOutOfBounds { field: String, end: u32, size: u32 },

    /// Two enum cases claim the same tag value.
    #[error("enum tag {tag} is used by more than one case")]
    DuplicateTag { tag: u32 },

    /// Aggregate size exceeds `u32::MAX` bytes.
    #[error("layout size overflows u32")]
    SizeOverflow,
}

/// Error parsing a layout string.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("layout string error at byte {position}: {message}")]
pub struct ShapeParseError {
    pub position: usize,
    pub message: String,
}
