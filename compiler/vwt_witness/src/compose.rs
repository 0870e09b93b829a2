//! Building tables bottom-up from child tables.
//!
//! [`WitnessBuilder`] lays out an aggregate from its children's layouts and
//! wraps the result in a witness table in one step, so a layout and its
//! sub-witnesses can never disagree. The generic resolver composes through
//! it; [`WitnessBuilder::concrete`] does the same for shapes without
//! parameters.

use std::sync::Arc;

use vwt_layout::{
    ensure_sufficient_stack, EnumCaseDescriptor, LayoutEngine, LayoutError, LayoutSlot, Name,
    ScalarKind, Shape,
};

use crate::error::WitnessError;
use crate::table::{build_witness_table, SubWitnesses, ValueWitnessTable};

/// One enum case with its payload's table.
#[derive(Clone, Debug)]
pub struct CaseWitness {
    pub name: Name,
    pub tag: u32,
    pub payload: Option<Arc<ValueWitnessTable>>,
}

impl CaseWitness {
    pub fn new(name: impl Into<Name>, tag: u32, payload: Option<Arc<ValueWitnessTable>>) -> Self {
        Self {
            name: name.into(),
            tag,
            payload,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WitnessBuilder {
    engine: LayoutEngine,
}

impl WitnessBuilder {
    pub fn new(engine: LayoutEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &LayoutEngine {
        &self.engine
    }

    pub fn scalar(&self, kind: ScalarKind) -> Arc<ValueWitnessTable> {
        Arc::new(ValueWitnessTable::scalar(kind))
    }

    /// Struct of `fields` in declaration order.
    pub fn structure(
        &self,
        fields: Vec<(Name, Arc<ValueWitnessTable>)>,
    ) -> Result<Arc<ValueWitnessTable>, WitnessError> {
        let slots: Vec<(Name, LayoutSlot)> = fields
            .iter()
            .map(|(name, table)| (name.clone(), LayoutSlot::Ready(Arc::clone(table.layout()))))
            .collect();
        let layout = self.engine.compute_layout(&slots)?;
        let tables = fields.into_iter().map(|(_, table)| table).collect();
        Ok(Arc::new(build_witness_table(
            Arc::new(layout),
            SubWitnesses::Fields(tables),
        )?))
    }

    /// Enum of `cases` in declaration order.
    pub fn enumeration(
        &self,
        cases: Vec<CaseWitness>,
    ) -> Result<Arc<ValueWitnessTable>, WitnessError> {
        let descriptors: Vec<EnumCaseDescriptor> = cases
            .iter()
            .map(|case| EnumCaseDescriptor {
                name: case.name.clone(),
                tag: case.tag,
                payload: case
                    .payload
                    .as_ref()
                    .map(|table| LayoutSlot::Ready(Arc::clone(table.layout()))),
            })
            .collect();
        let layout = self.engine.allocate_tags(&descriptors)?;
        let tables = cases.into_iter().map(|case| case.payload).collect();
        Ok(Arc::new(build_witness_table(
            Arc::new(layout),
            SubWitnesses::Cases(tables),
        )?))
    }

    /// Table for a shape without parameters or named references. Enum
    /// case tags are case positions.
    pub fn concrete(&self, shape: &Shape) -> Result<Arc<ValueWitnessTable>, WitnessError> {
        ensure_sufficient_stack(|| match shape {
            Shape::Scalar(kind) => Ok(self.scalar(*kind)),
            Shape::Struct(fields) => {
                let fields = fields
                    .iter()
                    .map(|(name, s)| Ok((name.clone(), self.concrete(s)?)))
                    .collect::<Result<Vec<_>, WitnessError>>()?;
                self.structure(fields)
            }
            Shape::Enum(cases) => {
                let cases = cases
                    .iter()
                    .zip(0u32..)
                    .map(|((name, s), tag)| {
                        let payload = s.as_ref().map(|s| self.concrete(s)).transpose()?;
                        Ok(CaseWitness::new(name.clone(), tag, payload))
                    })
                    .collect::<Result<Vec<_>, WitnessError>>()?;
                self.enumeration(cases)
            }
            Shape::Param(_) | Shape::Named { .. } => Err(LayoutError::IncompleteLayout {
                what: shape.to_string(),
            }
            .into()),
        })
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
