//! Generic layout resolution.
//!
//! A declaration's body is resolved against concrete argument tables
//! bottom-up: named references resolve their arguments first, then the
//! referenced declaration, then the enclosing aggregate is composed from
//! the results. Every declaration instantiation goes through the
//! [`InstantiationCache`], so equal arguments give the same table.

use std::sync::Arc;

use vwt_layout::{ensure_sufficient_stack, LayoutEngine, LayoutError, Shape};
use vwt_witness::{CaseWitness, ValueWitnessTable, WitnessBuilder};

use crate::cache::{InstanceKey, InstantiationCache};
use crate::error::ResolveError;
use crate::registry::{GenericDecl, Registry};

#[derive(Debug, Default)]
pub struct Resolver {
    registry: Registry,
    cache: InstantiationCache,
    builder: WitnessBuilder,
}

impl Resolver {
    pub fn new(engine: LayoutEngine) -> Self {
        Self {
            registry: Registry::new(),
            cache: InstantiationCache::new(),
            builder: WitnessBuilder::new(engine),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cache(&self) -> &InstantiationCache {
        &self.cache
    }

    pub fn builder(&self) -> &WitnessBuilder {
        &self.builder
    }

    pub fn declare(&self, decl: GenericDecl) -> Result<Arc<GenericDecl>, ResolveError> {
        self.registry.register(decl)
    }

    /// Table of declaration `name` applied to `args`.
    pub fn resolve(
        &self,
        name: &str,
        args: &[Arc<ValueWitnessTable>],
    ) -> Result<Arc<ValueWitnessTable>, ResolveError> {
        let decl = self
            .registry
            .get(name)
            .ok_or_else(|| LayoutError::IncompleteLayout {
                what: format!("@{name}"),
            })?;
        if args.len() != decl.params as usize {
            return Err(ResolveError::Arity {
                name: name.to_string(),
                expected: decl.params,
                found: args.len(),
            });
        }
        let key = InstanceKey::new(decl.name.clone(), args);
        self.cache
            .get_or_build(&key, || self.instantiate(&decl, args))
    }

    /// Table of `shape` with `A<n>` bound to `args[n]`.
    pub fn resolve_shape(
        &self,
        shape: &Shape,
        args: &[Arc<ValueWitnessTable>],
    ) -> Result<Arc<ValueWitnessTable>, ResolveError> {
        ensure_sufficient_stack(|| match shape {
            Shape::Scalar(kind) => Ok(self.builder.scalar(*kind)),
            Shape::Param(n) => args
                .get(*n as usize)
                .cloned()
                .ok_or_else(|| unbound(shape)),
            Shape::Struct(fields) => {
                let fields = fields
                    .iter()
                    .map(|(name, s)| Ok((name.clone(), self.resolve_shape(s, args)?)))
                    .collect::<Result<Vec<_>, ResolveError>>()?;
                Ok(self.builder.structure(fields)?)
            }
            Shape::Enum(cases) => {
                let cases = cases
                    .iter()
                    .zip(0u32..)
                    .map(|((name, s), tag)| {
                        let payload = s
                            .as_ref()
                            .map(|s| self.resolve_shape(s, args))
                            .transpose()?;
                        Ok(CaseWitness::new(name.clone(), tag, payload))
                    })
                    .collect::<Result<Vec<_>, ResolveError>>()?;
                Ok(self.builder.enumeration(cases)?)
            }
            Shape::Named { name, args: inner } => {
                let inner = inner
                    .iter()
                    .map(|s| self.resolve_shape(s, args))
                    .collect::<Result<Vec<_>, ResolveError>>()?;
                self.resolve(name, &inner)
            }
        })
    }

    fn instantiate(
        &self,
        decl: &GenericDecl,
        args: &[Arc<ValueWitnessTable>],
    ) -> Result<Arc<ValueWitnessTable>, ResolveError> {
        let _span = tracing::debug_span!("instantiate", decl = %decl.name).entered();
        self.resolve_shape(&decl.body, args)
    }
}

fn unbound(shape: &Shape) -> ResolveError {
    LayoutError::IncompleteLayout {
        what: shape.to_string(),
    }
    .into()
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
