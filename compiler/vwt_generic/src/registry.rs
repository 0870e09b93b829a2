//! Generic declarations and the registry that holds them.
//!
//! The registry only ever holds an acyclic set of declarations: a
//! declaration that would make some declaration contain itself by value is
//! rejected when it is registered. Resolution therefore never has to detect
//! cycles while holding cache locks.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use vwt_layout::{ensure_sufficient_stack, Name, Shape};

use crate::error::ResolveError;

/// A named shape with `params` type parameters (`A0` .. `A{params-1}`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericDecl {
    pub name: Name,
    pub params: u32,
    pub body: Shape,
}

impl GenericDecl {
    pub fn new(name: impl Into<Name>, params: u32, body: Shape) -> Self {
        Self {
            name: name.into(),
            params,
            body,
        }
    }
}

impl fmt::Display for GenericDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} = {}", self.name, self.params, self.body)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    decls: RwLock<FxHashMap<Name, Arc<GenericDecl>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `decl`.
    ///
    /// Names it references need not be registered yet; resolution reports
    /// them as incomplete until they are. Parameters must all be declared.
    pub fn register(&self, decl: GenericDecl) -> Result<Arc<GenericDecl>, ResolveError> {
        if let Some(param) = decl.body.max_param().filter(|&p| p >= decl.params) {
            return Err(ResolveError::UnboundParam {
                name: decl.name.to_string(),
                param,
                params: decl.params,
            });
        }
        let mut decls = self.decls.write();
        if decls.contains_key(&decl.name) {
            return Err(ResolveError::Duplicate {
                name: decl.name.to_string(),
            });
        }
        let decl = Arc::new(decl);
        decls.insert(decl.name.clone(), Arc::clone(&decl));
        if let Some(cycle) = find_cycle(&decls, &decl.name) {
            decls.remove(&decl.name);
            return Err(ResolveError::Recursive {
                name: decl.name.to_string(),
                cycle,
            });
        }
        tracing::debug!(decl = %decl, "registered");
        Ok(decl)
    }

    pub fn get(&self, name: &str) -> Option<Arc<GenericDecl>> {
        self.decls.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.decls.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.read().is_empty()
    }
}

/// Path of a by-value cycle through `start`, if there is one.
fn find_cycle(decls: &FxHashMap<Name, Arc<GenericDecl>>, start: &Name) -> Option<String> {
    let mut path = vec![start.clone()];
    let mut done = FxHashSet::default();
    if walk(decls, &mut path, &mut done) {
        Some(path.iter().map(|n| &**n).collect::<Vec<_>>().join(" -> "))
    } else {
        None
    }
}

/// Depth-first search from the last name on `path`. Leaves the cycle on
/// `path` when it finds one back to `path[0]`.
fn walk(
    decls: &FxHashMap<Name, Arc<GenericDecl>>,
    path: &mut Vec<Name>,
    done: &mut FxHashSet<Name>,
) -> bool {
    let Some(current) = path.last().cloned() else {
        return false;
    };
    let Some(decl) = decls.get(&current) else {
        return false;
    };
    ensure_sufficient_stack(|| {
        for next in decl.body.named_refs() {
            if next == path[0] {
                path.push(next);
                return true;
            }
            if done.contains(&next) {
                continue;
            }
            path.push(next);
            if walk(decls, path, done) {
                return true;
            }
            if let Some(visited) = path.pop() {
                done.insert(visited);
            }
        }
        false
    })
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
