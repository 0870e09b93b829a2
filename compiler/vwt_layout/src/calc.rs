//! Layout calculator for structs.
//!
//! Fields keep declaration order. Each field starts at the running offset
//! rounded up to its alignment; the aggregate's size is the final running
//! offset and its alignment the largest field alignment. Small fields that
//! fit before a more strictly aligned one pack tightly by construction, so
//! there is no separate flattening pass.

use std::sync::Arc;

use crate::bits::BitMask;
use crate::enums::EnumCaseDescriptor;
use crate::error::LayoutError;
use crate::layout::{
    Align, ExtraInhabitants, FieldDescriptor, LayoutKind, LayoutSlot, Name, Ownership, TypeLayout,
};
use crate::scalar::ScalarKind;

/// Space-optimization switches.
///
/// Both default to on. Turning them off gives the minimal encoding (every
/// enum with empty cases gets an explicit tag), which is always correct,
/// only less dense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutConfig {
    /// Encode empty enum cases in a payload's extra inhabitants.
    pub extra_inhabitants: bool,
    /// Store multi-payload enum tags in the payloads' common spare bits.
    pub spare_bit_tags: bool,
}

impl LayoutConfig {
    /// Never reuse spare bits or extra inhabitants.
    pub fn explicit_tags() -> Self {
        Self {
            extra_inhabitants: false,
            spare_bit_tags: false,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            extra_inhabitants: true,
            spare_bit_tags: true,
        }
    }
}

/// Computes struct and enum layouts under one [`LayoutConfig`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> LayoutConfig {
        self.config
    }

    pub fn scalar(&self, kind: ScalarKind) -> TypeLayout {
        TypeLayout::scalar(kind)
    }

    /// Lay out `fields` in declaration order.
    ///
    /// Fails with [`LayoutError::IncompleteLayout`] if any field is still
    /// pending; nothing is laid out until every field is known.
    pub fn compute_layout(&self, fields: &[(Name, LayoutSlot)]) -> Result<TypeLayout, LayoutError> {
        let resolved: Vec<&Arc<TypeLayout>> = fields
            .iter()
            .map(|(_, slot)| slot.ready())
            .collect::<Result<_, _>>()?;

        let mut offset = 0u32;
        let mut alignment = Align::ONE;
        let mut descriptors = Vec::with_capacity(fields.len());
        let mut key = String::from("{");

        for ((name, _), field) in fields.iter().zip(&resolved) {
            let field_offset = field
                .alignment
                .align_up(offset)
                .ok_or(LayoutError::SizeOverflow)?;
            descriptors.push(FieldDescriptor {
                name: name.clone(),
                offset: field_offset,
                size: field.size,
                alignment: field.alignment,
                trivially_copyable: field.is_trivially_copyable(),
                ownership: field_ownership(field),
            });
            offset = field_offset
                .checked_add(field.size)
                .ok_or(LayoutError::SizeOverflow)?;
            alignment = alignment.max(field.alignment);
            key.push_str(&field.key);
        }
        key.push('}');

        let size = offset;
        let stride = alignment
            .align_up(size)
            .ok_or(LayoutError::SizeOverflow)?;

        // Spare bits: every field's spare bits, at its offset. Padding is
        // never spare.
        let mut spare_bits = BitMask::zeros(size as usize);
        let mut references = Vec::new();
        // Extra inhabitants: the field with the most, first one on ties.
        let mut best: Option<(u32, &Arc<TypeLayout>)> = None;
        for (desc, field) in descriptors.iter().zip(&resolved) {
            spare_bits.or_at(&field.spare_bits, desc.offset as usize);
            references.extend(
                field
                    .references
                    .iter()
                    .map(|&(at, kind)| (desc.offset + at, kind)),
            );
            let more = best.map_or(field.extra_inhabitants.count > 0, |(_, b)| {
                field.extra_inhabitants.count > b.extra_inhabitants.count
            });
            if more {
                best = Some((desc.offset, field));
            }
        }
        let extra_inhabitants = match best {
            Some((at, field)) => ExtraInhabitants::new(
                field.extra_inhabitants.count,
                field.extra_inhabitants.encoding.placed(at, size),
            ),
            None => ExtraInhabitants::NONE,
        };

        let ownership = if descriptors.iter().all(|f| f.ownership.is_trivial()) {
            Ownership::Trivial
        } else {
            Ownership::NestedAggregate
        };

        let layout = TypeLayout {
            size,
            alignment,
            stride,
            fields: descriptors,
            spare_bits,
            extra_inhabitants,
            ownership,
            references,
            kind: LayoutKind::Struct,
            key: Arc::from(key),
        };
        layout.verify()?;

        tracing::debug!(
            key = %layout.key,
            size = layout.size,
            align = layout.alignment.bytes(),
            extra_inhabitants = layout.extra_inhabitants.count,
            "computed struct layout"
        );
        Ok(layout)
    }
}

fn field_ownership(field: &TypeLayout) -> Ownership {
    match (&field.kind, field.ownership) {
        (_, Ownership::Trivial) => Ownership::Trivial,
        (LayoutKind::Scalar(_), _) => Ownership::OwnedReference,
        _ => Ownership::NestedAggregate,
    }
}

/// [`LayoutEngine::compute_layout`] with the default configuration.
pub fn compute_layout(fields: &[(Name, LayoutSlot)]) -> Result<TypeLayout, LayoutError> {
    LayoutEngine::default().compute_layout(fields)
}

/// [`LayoutEngine::allocate_tags`] with the default configuration.
pub fn allocate_tags(cases: &[EnumCaseDescriptor]) -> Result<TypeLayout, LayoutError> {
    LayoutEngine::default().allocate_tags(cases)
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
mod tests;
