use pretty_assertions::assert_eq;

use super::*;
use crate::layout::InhabitantEncoding;
use crate::scalar::ReferenceKind;

fn field(name: &str, kind: ScalarKind) -> (Name, LayoutSlot) {
    (Name::from(name), LayoutSlot::from(TypeLayout::scalar(kind)))
}

fn offsets(layout: &TypeLayout) -> Vec<u32> {
    layout.fields.iter().map(|f| f.offset).collect()
}

// ── Placement ───────────────────────────────────────────────────

#[test]
fn small_fields_pack_before_aligned_reference() {
    let layout = compute_layout(&[
        field("a", ScalarKind::I8),
        field("b", ScalarKind::I16),
        field("c", ScalarKind::NativeStrong),
    ])
    .unwrap();
    assert_eq!(offsets(&layout), vec![0, 2, 8]);
    assert_eq!(layout.size, 16);
    assert_eq!(layout.alignment.bytes(), 8);
    assert_eq!(layout.stride, 16);
    assert_eq!(&*layout.key, "{csN}");
}

#[test]
fn empty_struct_is_zero_sized() {
    let layout = compute_layout(&[]).unwrap();
    assert_eq!(layout.size, 0);
    assert_eq!(layout.alignment, Align::ONE);
    assert_eq!(layout.stride, 0);
    assert!(layout.is_trivially_copyable());
    assert_eq!(&*layout.key, "{}");
}

#[test]
fn trailing_padding_only_affects_stride() {
    let layout = compute_layout(&[field("x", ScalarKind::I64), field("y", ScalarKind::I8)]).unwrap();
    assert_eq!(layout.size, 9);
    assert_eq!(layout.stride, 16);
    assert_eq!(layout.spare_bits.len(), 9);
}

#[test]
fn declaration_order_is_kept() {
    let layout = compute_layout(&[
        field("a", ScalarKind::I8),
        field("b", ScalarKind::I64),
        field("c", ScalarKind::I8),
    ])
    .unwrap();
    assert_eq!(offsets(&layout), vec![0, 8, 16]);
    assert_eq!(layout.size, 17);
    assert_eq!(layout.stride, 24);
}

#[test]
fn nested_struct_is_placed_by_its_alignment() {
    let inner = compute_layout(&[field("p", ScalarKind::NativeStrong), field("n", ScalarKind::I16)])
        .unwrap();
    let layout = compute_layout(&[
        field("tag", ScalarKind::I8),
        (Name::from("inner"), LayoutSlot::from(inner)),
    ])
    .unwrap();
    assert_eq!(offsets(&layout), vec![0, 8]);
    assert_eq!(layout.size, 18);
    assert_eq!(layout.references, vec![(8, ReferenceKind::Strong)]);
    assert_eq!(layout.fields[1].ownership, Ownership::NestedAggregate);
    assert_eq!(&*layout.key, "{c{Ns}}");
}

// ── Derived properties ──────────────────────────────────────────

#[test]
fn ownership_follows_fields() {
    let plain = compute_layout(&[field("a", ScalarKind::I32)]).unwrap();
    assert_eq!(plain.ownership, Ownership::Trivial);
    assert!(plain.fields[0].trivially_copyable);

    let owning = compute_layout(&[field("a", ScalarKind::I32), field("b", ScalarKind::ObjC)]).unwrap();
    assert_eq!(owning.ownership, Ownership::NestedAggregate);
    assert_eq!(owning.fields[1].ownership, Ownership::OwnedReference);
    assert!(!owning.fields[1].trivially_copyable);
}

#[test]
fn spare_bits_come_from_fields_not_padding() {
    let layout = compute_layout(&[field("a", ScalarKind::I8), field("p", ScalarKind::NativeStrong)])
        .unwrap();
    let bytes = layout.spare_bits.as_bytes();
    assert_eq!(&bytes[..8], &[0u8; 8]);
    assert_eq!(bytes[8], 0x07);
    assert_eq!(bytes[15], 0xFF);
}

#[test]
fn inhabitants_come_from_first_best_field() {
    let layout = compute_layout(&[
        field("n", ScalarKind::I64),
        field("p", ScalarKind::NativeStrong),
        field("q", ScalarKind::NativeStrong),
    ])
    .unwrap();
    assert_eq!(layout.extra_inhabitants.count, crate::bits::MAX_EXTRA_INHABITANTS);
    let InhabitantEncoding::SpareBits { mask } = &layout.extra_inhabitants.encoding else {
        panic!("expected spare-bit inhabitants");
    };
    assert_eq!(mask.len(), 24);
    assert!(mask.test(64));
    assert!(!mask.test(128));
}

#[test]
fn struct_inhabitants_round_trip_at_field_offset() {
    let layout = compute_layout(&[field("n", ScalarKind::I32), field("p", ScalarKind::NativeStrong)])
        .unwrap();
    let mut value = [0u8; 16];
    assert!(layout.extra_inhabitants.store(&mut value, 3));
    assert_eq!(&value[..8], &[0u8; 8]);
    assert_eq!(layout.extra_inhabitants.index_of(&value), Some(3));
}

#[test]
fn integer_struct_has_no_inhabitants() {
    let layout = compute_layout(&[field("a", ScalarKind::I32), field("b", ScalarKind::I32)]).unwrap();
    assert_eq!(layout.extra_inhabitants.count, 0);
    assert!(layout.spare_bits.is_zero());
}

// ── Errors ──────────────────────────────────────────────────────

#[test]
fn pending_field_is_incomplete() {
    let err = compute_layout(&[
        field("a", ScalarKind::I8),
        (Name::from("b"), LayoutSlot::Pending(Name::from("T"))),
    ])
    .unwrap_err();
    assert_eq!(
        err,
        LayoutError::IncompleteLayout {
            what: "T".to_string()
        }
    );
}

#[test]
fn engine_exposes_its_config() {
    let engine = LayoutEngine::new(LayoutConfig::explicit_tags());
    assert!(!engine.config().extra_inhabitants);
    assert!(!engine.config().spare_bit_tags);
    assert_eq!(LayoutEngine::default().config(), LayoutConfig::default());
}

mod proptest_calc {
    use super::super::compute_layout;
    use crate::layout::{LayoutSlot, Name, TypeLayout};
    use crate::scalar::ScalarKind;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn fields_are_aligned_and_disjoint(
            kinds in proptest::collection::vec(proptest::sample::select(ScalarKind::ALL.to_vec()), 0..10),
        ) {
            let fields: Vec<(Name, LayoutSlot)> = kinds
                .iter()
                .enumerate()
                .map(|(i, &k)| (Name::from(i.to_string()), LayoutSlot::from(TypeLayout::scalar(k))))
                .collect();
            let layout = compute_layout(&fields).unwrap();
            let mut end = 0;
            for f in &layout.fields {
                prop_assert!(f.alignment.is_aligned(f.offset));
                prop_assert!(f.offset >= end);
                end = f.end();
            }
            prop_assert_eq!(layout.size, end);
            prop_assert_eq!(layout.stride % layout.alignment.bytes(), 0);
        }
    }
}
