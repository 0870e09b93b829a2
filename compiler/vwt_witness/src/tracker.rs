//! In-process heap model for exercising witness tables.
//!
//! [`HeapTracker`] hands out fake object handles and counts retains and
//! releases per handle. It never frees anything: a handle whose count drops
//! to zero stays known as dead, so a second destroy is recorded as an
//! over-release instead of corrupting state.
//!
//! Handles are `0x1000 + 16 * n`: non-null, 8-byte aligned and below 2^56,
//! so they are valid reference words with every spare bit clear.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use vwt_layout::ReferenceKind;

use crate::runtime::RefCounting;

const FIRST_HANDLE: u64 = 0x1000;
const HANDLE_STRIDE: u64 = 16;

/// Reference counts of fake heap objects.
#[derive(Debug, Default)]
pub struct HeapTracker {
    counts: Mutex<FxHashMap<u64, u32>>,
    next: AtomicU64,
    over_releases: AtomicU64,
    unknown_handles: AtomicU64,
}

impl HeapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an object with count 1.
    pub fn alloc(&self) -> u64 {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let handle = FIRST_HANDLE + n * HANDLE_STRIDE;
        self.counts.lock().insert(handle, 1);
        tracing::trace!(handle, "alloc");
        handle
    }

    /// Current count of `handle`; 0 for dead or unknown handles.
    pub fn count(&self, handle: u64) -> u32 {
        self.counts.lock().get(&handle).copied().unwrap_or(0)
    }

    /// Handles whose count is above zero.
    pub fn live(&self) -> usize {
        self.counts.lock().values().filter(|&&c| c > 0).count()
    }

    /// Releases of handles already at zero.
    pub fn over_releases(&self) -> u64 {
        self.over_releases.load(Ordering::Relaxed)
    }

    /// Retains or releases of handles this tracker never allocated, or
    /// retains of dead handles.
    pub fn unknown_handles(&self) -> u64 {
        self.unknown_handles.load(Ordering::Relaxed)
    }

    /// True when nothing went wrong: no over-release, no unknown handle.
    pub fn is_consistent(&self) -> bool {
        self.over_releases() == 0 && self.unknown_handles() == 0
    }
}

/// What a release found.
enum Release {
    Live(u32),
    Dead,
    Unknown,
}

impl RefCounting for HeapTracker {
    fn retain(&self, kind: ReferenceKind, handle: u64) {
        if handle == 0 {
            return;
        }
        let retained = match self.counts.lock().get_mut(&handle) {
            Some(count) if *count > 0 => {
                *count += 1;
                true
            }
            _ => false,
        };
        if !retained {
            self.unknown_handles.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(%kind, handle, "retain of dead or unknown handle");
        }
    }

    fn release(&self, kind: ReferenceKind, handle: u64) {
        if handle == 0 {
            return;
        }
        let outcome = match self.counts.lock().get_mut(&handle) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Release::Live(*count)
            }
            Some(_) => Release::Dead,
            None => Release::Unknown,
        };
        match outcome {
            Release::Live(0) => {
                tracing::trace!(%kind, handle, "freed");
            }
            Release::Live(_) => {}
            Release::Dead => {
                self.over_releases.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%kind, handle, "release of dead handle");
            }
            Release::Unknown => {
                self.unknown_handles.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%kind, handle, "release of unknown handle");
            }
        }
    }
}
