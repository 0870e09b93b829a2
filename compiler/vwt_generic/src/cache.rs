//! Single-flight instantiation cache.
//!
//! Each key owns a slot guarded by its own mutex. The first caller for a key
//! builds while holding the slot; racing callers block on the slot and then
//! read what was published. The map's shard locks are never held while a
//! build runs, so builds may recurse into the cache for other keys.
//!
//! A failed build removes its slot again. Callers that were waiting on the
//! removed slot start over with a fresh one.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use vwt_layout::{Name, TypeLayout};
use vwt_witness::ValueWitnessTable;

/// A declaration applied to concrete arguments, identified by the
/// arguments' full layouts.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub decl: Name,
    pub args: SmallVec<[ArgLayout; 4]>,
}

impl InstanceKey {
    pub fn new(decl: Name, args: &[Arc<ValueWitnessTable>]) -> Self {
        Self {
            decl,
            args: args.iter().map(|t| ArgLayout(Arc::clone(t.layout()))).collect(),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.decl)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                f.write_str(&arg.0.key)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// An argument's layout, compared in full.
///
/// The layout key alone leaves out enum case tags and the tag encoding a
/// layout was built with, so two arguments with one key can still behave
/// differently. Hashing uses the key; equal layouts have equal keys.
#[derive(Clone, Debug)]
pub struct ArgLayout(pub Arc<TypeLayout>);

impl PartialEq for ArgLayout {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

impl Eq for ArgLayout {}

impl Hash for ArgLayout {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

type Slot = Arc<Mutex<Option<Arc<ValueWitnessTable>>>>;

#[derive(Debug, Default)]
pub struct InstantiationCache {
    slots: DashMap<InstanceKey, Slot, FxBuildHasher>,
    builds: AtomicUsize,
}

impl InstantiationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Published table for `key`, building it with `build` if there is none.
    ///
    /// A failed build publishes nothing; the next caller builds again.
    pub fn get_or_build<E>(
        &self,
        key: &InstanceKey,
        build: impl FnOnce() -> Result<Arc<ValueWitnessTable>, E>,
    ) -> Result<Arc<ValueWitnessTable>, E> {
        loop {
            let slot = self.slot(key);
            let mut published = slot.lock();
            if let Some(table) = published.as_ref() {
                tracing::trace!(key = %key, "instantiation cache hit");
                return Ok(Arc::clone(table));
            }
            if !self.is_current(key, &slot) {
                // Removed by a failed build while this caller waited.
                continue;
            }
            return match build() {
                Ok(table) => {
                    self.builds.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %key, size = table.size(), "instantiated");
                    *published = Some(Arc::clone(&table));
                    Ok(table)
                }
                Err(err) => {
                    self.slots.remove_if(key, |_, s| Arc::ptr_eq(s, &slot));
                    Err(err)
                }
            };
        }
    }

    /// Published table for `key`. Blocks while another caller builds it.
    pub fn get(&self, key: &InstanceKey) -> Option<Arc<ValueWitnessTable>> {
        let slot = self.slots.get(key).map(|slot| Arc::clone(slot.value()))?;
        let published = slot.lock();
        published.clone()
    }

    /// Number of published instantiations.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.iter().map(|e| Arc::clone(e.value())).collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds that succeeded since the cache was created.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    fn is_current(&self, key: &InstanceKey, slot: &Slot) -> bool {
        self.slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current.value(), slot))
    }

    fn slot(&self, key: &InstanceKey) -> Slot {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.slots.entry(key.clone()).or_default().value())
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
