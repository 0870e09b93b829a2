//! Witness construction and operation errors.

use thiserror::Error;
use vwt_layout::LayoutError;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WitnessError {
    /// A buffer does not match the table's value size.
    #[error("buffer of {actual} bytes passed to witness of {expected}-byte {key}")]
    BufferSize {
        key: String,
        expected: u32,
        actual: usize,
    },

    /// No case of the enum has this tag.
    #[error("{key} has no case with tag {tag}")]
    InvalidTag { key: String, tag: u32 },

    /// An enum witness was called on a non-enum table.
    #[error("{key} is not an enum")]
    NotAnEnum { key: String },

    /// The enum has no cases, so no value of it exists.
    #[error("{key} is uninhabited")]
    Uninhabited { key: String },

    /// The bytes do not encode any case of the enum.
    #[error("bytes do not encode a valid {key} value")]
    InvalidValue { key: String },

    /// Extra inhabitant index past the layout's count.
    #[error("{key} has {count} extra inhabitants, index {index} is out of range")]
    InhabitantIndex { key: String, index: u32, count: u32 },

    /// Sub-witness tables do not match the layout they are combined with.
    #[error("sub-witnesses do not match {key}: {reason}")]
    SubWitnessMismatch { key: String, reason: String },

    #[error(transparent)]
    Layout(#[from] LayoutError),
}
