//! Resolution errors.

use thiserror::Error;
use vwt_layout::LayoutError;
use vwt_witness::WitnessError;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Witness(#[from] WitnessError),

    /// Declarations that contain themselves by value. `cycle` lists the
    /// path, starting and ending with the same name.
    #[error("`{name}` contains itself by value: {cycle}")]
    Recursive { name: String, cycle: String },

    #[error("`{name}` takes {expected} type arguments, {found} given")]
    Arity {
        name: String,
        expected: u32,
        found: usize,
    },

    /// A declaration body uses a parameter past its parameter count.
    #[error("`{name}` uses A{param} but declares {params} parameters")]
    UnboundParam { name: String, param: u32, params: u32 },

    #[error("`{name}` is already declared")]
    Duplicate { name: String },
}

impl ResolveError {
    /// True for errors a later retry could fix: a name or parameter that is
    /// not resolvable yet.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::Layout(LayoutError::IncompleteLayout { .. })
                | Self::Witness(WitnessError::Layout(LayoutError::IncompleteLayout { .. }))
        )
    }
}
