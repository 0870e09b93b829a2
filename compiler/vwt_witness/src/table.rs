//! Value witness tables.
//!
//! A [`ValueWitnessTable`] pairs a [`TypeLayout`] with a precomputed plan
//! of where the value's owned handles live. Every operation works on raw
//! byte buffers of exactly `layout.size` bytes:
//!
//! - copy = `memcpy`, then retain every handle in the source
//! - take = `memcpy`; ownership moves with the bytes
//! - destroy = release every handle
//!
//! Enum values only own the handles of their active payload. The plan
//! dispatches on the case read from the value, and for tags stored in
//! spare bits walks a tag-stripped copy of the payload.
//!
//! Handles are collected before any runtime call, so an operation that
//! fails (bad buffer size, bytes that are not a valid value) has no effect.

use std::sync::Arc;

use smallvec::SmallVec;
use vwt_layout::bits::read_le;
use vwt_layout::{
    ensure_sufficient_stack, EnumLayout, LayoutKind, ReferenceKind, ScalarKind, TypeLayout,
};

use crate::error::WitnessError;
use crate::flags::WitnessFlags;
use crate::runtime::RefCounting;

/// Handles collected from one value.
type Handles = SmallVec<[(ReferenceKind, u64); 8]>;

/// Witness tables of a layout's direct children.
#[derive(Clone, Debug, Default)]
pub enum SubWitnesses {
    /// Scalars have no children.
    #[default]
    None,
    /// One table per struct field, in declaration order.
    Fields(Vec<Arc<ValueWitnessTable>>),
    /// One entry per enum case position; `None` for empty cases.
    Cases(Vec<Option<Arc<ValueWitnessTable>>>),
}

/// Where the owned handles of a value are.
#[derive(Debug)]
enum OwnershipPlan {
    /// No handles.
    Trivial,
    /// Reference words at fixed offsets.
    References(SmallVec<[(u32, ReferenceKind); 2]>),
    /// Non-trivial fields at their offsets.
    Fields(Vec<(u32, Arc<ValueWitnessTable>)>),
    /// Handles of the active payload only, indexed by case position.
    Enum(Vec<Option<Arc<ValueWitnessTable>>>),
}

/// Operations for manipulating values of one concrete type.
///
/// Immutable once built and shared behind `Arc`.
#[derive(Debug)]
pub struct ValueWitnessTable {
    layout: Arc<TypeLayout>,
    flags: WitnessFlags,
    plan: OwnershipPlan,
}

/// Build the witness table for `layout` from its children's tables.
///
/// Sub-tables must match the layout one to one: the right variant, the
/// right count, field tables of the field's size and alignment, and case
/// tables with the payload's layout key.
pub fn build_witness_table(
    layout: Arc<TypeLayout>,
    subs: SubWitnesses,
) -> Result<ValueWitnessTable, WitnessError> {
    let mismatch = |reason: String| WitnessError::SubWitnessMismatch {
        key: layout.key.to_string(),
        reason,
    };

    let mut flags = base_flags(&layout);
    let plan = match (&layout.kind, subs) {
        (LayoutKind::Scalar(_), SubWitnesses::None) => reference_plan(&layout, &mut flags),
        (LayoutKind::Struct, SubWitnesses::Fields(tables)) => {
            if tables.len() != layout.fields.len() {
                return Err(mismatch(format!(
                    "{} field tables for {} fields",
                    tables.len(),
                    layout.fields.len()
                )));
            }
            let mut owning = Vec::new();
            for (field, table) in layout.fields.iter().zip(tables) {
                if table.layout.size != field.size || table.layout.alignment != field.alignment {
                    return Err(mismatch(format!(
                        "field `{}` has table for {}",
                        field.name, table.layout.key
                    )));
                }
                flags |= table.flags & WitnessFlags::NON_BITWISE_TAKABLE;
                if !table.flags.is_pod() {
                    owning.push((field.offset, table));
                }
            }
            if owning.is_empty() {
                OwnershipPlan::Trivial
            } else {
                OwnershipPlan::Fields(owning)
            }
        }
        (LayoutKind::Enum(e), SubWitnesses::Cases(tables)) => {
            flags |= WitnessFlags::HAS_ENUM_WITNESSES;
            if tables.len() != e.cases.len() {
                return Err(mismatch(format!(
                    "{} case tables for {} cases",
                    tables.len(),
                    e.cases.len()
                )));
            }
            for (case, table) in e.cases.iter().zip(&tables) {
                match (&case.payload, table) {
                    (None, None) => {}
                    (Some(payload), Some(table)) if payload.key == table.layout.key => {
                        flags |= table.flags & WitnessFlags::NON_BITWISE_TAKABLE;
                    }
                    (Some(payload), Some(table)) => {
                        return Err(mismatch(format!(
                            "case `{}` expects {}, got table for {}",
                            case.name, payload.key, table.layout.key
                        )));
                    }
                    (Some(_), None) => {
                        return Err(mismatch(format!("case `{}` has no payload table", case.name)));
                    }
                    (None, Some(_)) => {
                        return Err(mismatch(format!("empty case `{}` has a payload table", case.name)));
                    }
                }
            }
            if tables.iter().flatten().all(|t| t.flags.is_pod()) {
                OwnershipPlan::Trivial
            } else {
                OwnershipPlan::Enum(tables)
            }
        }
        (kind, subs) => {
            return Err(mismatch(format!(
                "{} given for {} layout",
                match subs {
                    SubWitnesses::None => "no sub-witnesses",
                    SubWitnesses::Fields(_) => "field tables",
                    SubWitnesses::Cases(_) => "case tables",
                },
                match kind {
                    LayoutKind::Scalar(_) => "a scalar",
                    LayoutKind::Struct => "a struct",
                    LayoutKind::Enum(_) => "an enum",
                }
            )));
        }
    };

    tracing::debug!(key = %layout.key, ?flags, "built value witness table");
    Ok(ValueWitnessTable {
        layout,
        flags,
        plan,
    })
}

fn base_flags(layout: &TypeLayout) -> WitnessFlags {
    let mut flags = WitnessFlags::empty();
    if !layout.is_trivially_copyable() {
        flags |= WitnessFlags::NON_POD;
    }
    if !layout.spare_bits.is_zero() {
        flags |= WitnessFlags::HAS_SPARE_BITS;
    }
    flags
}

fn reference_plan(layout: &TypeLayout, flags: &mut WitnessFlags) -> OwnershipPlan {
    if layout
        .references
        .iter()
        .any(|&(_, kind)| !kind.is_bitwise_takable())
    {
        *flags |= WitnessFlags::NON_BITWISE_TAKABLE;
    }
    if layout.references.is_empty() {
        OwnershipPlan::Trivial
    } else {
        OwnershipPlan::References(layout.references.iter().copied().collect())
    }
}

impl ValueWitnessTable {
    /// Table for a leaf scalar.
    pub fn scalar(kind: ScalarKind) -> ValueWitnessTable {
        let layout = Arc::new(TypeLayout::scalar(kind));
        let mut flags = base_flags(&layout);
        let plan = reference_plan(&layout, &mut flags);
        ValueWitnessTable {
            layout,
            flags,
            plan,
        }
    }

    pub fn layout(&self) -> &Arc<TypeLayout> {
        &self.layout
    }

    pub fn flags(&self) -> WitnessFlags {
        self.flags
    }

    pub fn size(&self) -> u32 {
        self.layout.size
    }

    pub fn stride(&self) -> u32 {
        self.layout.stride
    }

    pub fn key(&self) -> &str {
        &self.layout.key
    }

    // ── Copy / take / destroy ───────────────────────────────────

    /// Initialize `dest` as a copy of `src`.
    pub fn initialize_with_copy(
        &self,
        rt: &dyn RefCounting,
        dest: &mut [u8],
        src: &[u8],
    ) -> Result<(), WitnessError> {
        self.check_len(dest.len())?;
        let handles = self.handles(src)?;
        dest.copy_from_slice(src);
        for (kind, handle) in handles {
            rt.retain(kind, handle);
        }
        Ok(())
    }

    /// Replace the value in `dest` with a copy of `src`.
    ///
    /// The new handles are retained before the old ones are released, so
    /// assigning a value that shares handles with `dest` is safe.
    pub fn assign_with_copy(
        &self,
        rt: &dyn RefCounting,
        dest: &mut [u8],
        src: &[u8],
    ) -> Result<(), WitnessError> {
        let old = self.handles(dest)?;
        let new = self.handles(src)?;
        for &(kind, handle) in &new {
            rt.retain(kind, handle);
        }
        for (kind, handle) in old {
            rt.release(kind, handle);
        }
        dest.copy_from_slice(src);
        Ok(())
    }

    /// Move `src` into uninitialized `dest`. `src` is left uninitialized.
    pub fn initialize_with_take(&self, dest: &mut [u8], src: &[u8]) -> Result<(), WitnessError> {
        self.check_len(dest.len())?;
        self.check_len(src.len())?;
        dest.copy_from_slice(src);
        Ok(())
    }

    /// Destroy the value in `dest`, then move `src` into it.
    pub fn assign_with_take(
        &self,
        rt: &dyn RefCounting,
        dest: &mut [u8],
        src: &[u8],
    ) -> Result<(), WitnessError> {
        self.check_len(src.len())?;
        let old = self.handles(dest)?;
        for (kind, handle) in old {
            rt.release(kind, handle);
        }
        dest.copy_from_slice(src);
        Ok(())
    }

    /// Release every handle the value owns. The bytes are left as they
    /// are but no longer form a value.
    pub fn destroy(&self, rt: &dyn RefCounting, value: &mut [u8]) -> Result<(), WitnessError> {
        for (kind, handle) in self.handles(value)? {
            rt.release(kind, handle);
        }
        Ok(())
    }

    // ── Enum witnesses ──────────────────────────────────────────

    /// Tag of the case `value` holds.
    pub fn get_enum_tag(&self, value: &[u8]) -> Result<u32, WitnessError> {
        let e = self.enum_layout()?;
        self.check_len(value.len())?;
        let position = self.read_case(e, value)?;
        Ok(e.cases[position].tag)
    }

    /// Make `dest` hold the case tagged `tag`.
    ///
    /// For an empty case the whole value is written. For a payload case
    /// only the tag is written; the payload must already be initialized in
    /// place.
    pub fn initialize_from_tag(&self, dest: &mut [u8], tag: u32) -> Result<(), WitnessError> {
        let e = self.enum_layout()?;
        self.check_len(dest.len())?;
        let position = e.case_of_tag(tag).ok_or_else(|| WitnessError::InvalidTag {
            key: self.key().to_string(),
            tag,
        })?;
        e.inject_case(dest, position);
        Ok(())
    }

    /// Strip tag bits from `value`, leaving its payload valid in place.
    ///
    /// Returns the case tag for payload cases and `None` for empty cases.
    /// Ownership of the payload's handles moves to the payload.
    pub fn destructive_project_payload(
        &self,
        value: &mut [u8],
    ) -> Result<Option<u32>, WitnessError> {
        let e = self.enum_layout()?;
        self.check_len(value.len())?;
        let position = self.read_case(e, value)?;
        let case = &e.cases[position];
        if case.payload.is_none() {
            return Ok(None);
        }
        e.strip_tag(value);
        Ok(Some(case.tag))
    }

    // ── Extra inhabitants ───────────────────────────────────────

    /// Index of the extra inhabitant `value` holds, or `None` for a valid
    /// value.
    pub fn extra_inhabitant_index(&self, value: &[u8]) -> Result<Option<u32>, WitnessError> {
        self.check_len(value.len())?;
        Ok(self.layout.extra_inhabitants.index_of(value))
    }

    /// Overwrite `dest` with extra inhabitant `index`.
    pub fn store_extra_inhabitant(&self, dest: &mut [u8], index: u32) -> Result<(), WitnessError> {
        self.check_len(dest.len())?;
        let ei = &self.layout.extra_inhabitants;
        if ei.store(dest, index) {
            Ok(())
        } else {
            Err(WitnessError::InhabitantIndex {
                key: self.key().to_string(),
                index,
                count: ei.count,
            })
        }
    }

    // ── Internals ───────────────────────────────────────────────

    fn check_len(&self, actual: usize) -> Result<(), WitnessError> {
        if actual == self.layout.size as usize {
            Ok(())
        } else {
            Err(WitnessError::BufferSize {
                key: self.key().to_string(),
                expected: self.layout.size,
                actual,
            })
        }
    }

    fn enum_layout(&self) -> Result<&EnumLayout, WitnessError> {
        self.layout
            .enum_layout()
            .map(|e| &**e)
            .ok_or_else(|| WitnessError::NotAnEnum {
                key: self.key().to_string(),
            })
    }

    fn read_case(&self, e: &EnumLayout, value: &[u8]) -> Result<usize, WitnessError> {
        e.read_case(value).ok_or_else(|| {
            let key = self.key().to_string();
            if e.cases.is_empty() {
                WitnessError::Uninhabited { key }
            } else {
                WitnessError::InvalidValue { key }
            }
        })
    }

    /// Owned handles of the value in `value`, null handles skipped.
    fn handles(&self, value: &[u8]) -> Result<Handles, WitnessError> {
        self.check_len(value.len())?;
        let mut out = Handles::new();
        self.collect_handles(value, &mut out)?;
        Ok(out)
    }

    fn collect_handles(&self, value: &[u8], out: &mut Handles) -> Result<(), WitnessError> {
        ensure_sufficient_stack(|| match &self.plan {
            OwnershipPlan::Trivial => Ok(()),
            OwnershipPlan::References(refs) => {
                for &(at, kind) in refs {
                    let at = at as usize;
                    let word = value.get(at..at + 8).ok_or_else(|| self.short(value))?;
                    let handle = read_le(word);
                    if handle != 0 {
                        out.push((kind, handle));
                    }
                }
                Ok(())
            }
            OwnershipPlan::Fields(fields) => {
                for (offset, table) in fields {
                    let start = *offset as usize;
                    let field = value
                        .get(start..start + table.layout.size as usize)
                        .ok_or_else(|| self.short(value))?;
                    table.collect_handles(field, out)?;
                }
                Ok(())
            }
            OwnershipPlan::Enum(tables) => {
                let Some(e) = self.layout.enum_layout() else {
                    return Ok(());
                };
                let position = self.read_case(e, value)?;
                let Some(table) = tables.get(position).and_then(Option::as_ref) else {
                    return Ok(());
                };
                let payload = e.payload_bytes(value);
                let payload = payload
                    .get(..table.layout.size as usize)
                    .ok_or_else(|| self.short(value))?;
                table.collect_handles(payload, out)
            }
        })
    }

    fn short(&self, value: &[u8]) -> WitnessError {
        WitnessError::BufferSize {
            key: self.key().to_string(),
            expected: self.layout.size,
            actual: value.len(),
        }
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
mod tests;
