//! Value witness tables for the value-witness engine.
//!
//! A [`ValueWitnessTable`] manipulates opaque values held in byte buffers:
//! copy, take and destroy, enum tag access and payload projection, and
//! extra inhabitants. Owned handles are retained and released through a
//! [`RefCounting`] runtime passed to each call; [`HeapTracker`] is an
//! in-process runtime that counts instead of allocating.
//!
//! Tables are built bottom-up ([`WitnessBuilder`]): each aggregate's table
//! holds its children's tables and a plan of where its handles live.
//!
//! # Crate Dependencies
//!
//! Depends on `vwt_layout` for layouts and tag encodings.

mod compose;
mod error;
mod flags;
mod runtime;
mod table;
mod tracker;

pub use compose::{CaseWitness, WitnessBuilder};
pub use error::WitnessError;
pub use flags::WitnessFlags;
pub use runtime::RefCounting;
pub use table::{build_witness_table, SubWitnesses, ValueWitnessTable};
pub use tracker::HeapTracker;
