//! Generic layout resolution for the value-witness engine.
//!
//! Declarations ([`GenericDecl`]) are shapes with type parameters that may
//! embed other declarations by name. A [`Resolver`] instantiates them
//! against concrete witness tables and caches every instantiation, so the
//! table for a given declaration and argument list is built at most once
//! and shared.
//!
//! # Crate Dependencies
//!
//! Depends on `vwt_layout` for shapes and `vwt_witness` for composing
//! tables.

mod cache;
mod error;
mod registry;
mod resolver;

pub use cache::{ArgLayout, InstanceKey, InstantiationCache};
pub use error::ResolveError;
pub use registry::{GenericDecl, Registry};
pub use resolver::Resolver;
