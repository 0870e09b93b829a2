use pretty_assertions::assert_eq;
use vwt_layout::{LayoutEngine, Name, Shape};

use super::*;
use crate::compose::WitnessBuilder;
use crate::tracker::HeapTracker;

fn table(src: &str) -> Arc<ValueWitnessTable> {
    let shape: Shape = src.parse().unwrap();
    WitnessBuilder::default().concrete(&shape).unwrap()
}

fn word(handle: u64) -> [u8; 8] {
    handle.to_le_bytes()
}

// ── Flags ───────────────────────────────────────────────────────

#[test]
fn integer_aggregates_are_pod() {
    let t = table("{cs[_,_]}");
    assert!(t.flags().is_pod());
    assert!(t.flags().is_bitwise_takable());
    assert!(!t.flags().contains(WitnessFlags::HAS_ENUM_WITNESSES));
}

#[test]
fn reference_flags() {
    assert_eq!(
        table("N").flags(),
        WitnessFlags::NON_POD | WitnessFlags::HAS_SPARE_BITS
    );
    assert!(table("W").flags().contains(WitnessFlags::NON_BITWISE_TAKABLE));
    assert!(table("{c[w,_]}")
        .flags()
        .contains(WitnessFlags::NON_BITWISE_TAKABLE));
    assert_eq!(
        table("[N,_]").flags(),
        WitnessFlags::NON_POD | WitnessFlags::HAS_ENUM_WITNESSES
    );
}

// ── Copy / destroy ──────────────────────────────────────────────

#[test]
fn reference_copy_retains_and_destroy_releases() {
    let heap = HeapTracker::new();
    let t = table("N");
    let h = heap.alloc();
    let src = word(h);
    let mut dest = [0u8; 8];

    t.initialize_with_copy(&heap, &mut dest, &src).unwrap();
    assert_eq!(dest, src);
    assert_eq!(heap.count(h), 2);

    t.destroy(&heap, &mut dest).unwrap();
    let mut src = src;
    t.destroy(&heap, &mut src).unwrap();
    assert_eq!(heap.count(h), 0);
    assert!(heap.is_consistent());
}

#[test]
fn null_reference_is_not_retained() {
    let heap = HeapTracker::new();
    let t = table("N");
    let mut dest = [0u8; 8];
    t.initialize_with_copy(&heap, &mut dest, &[0; 8]).unwrap();
    t.destroy(&heap, &mut dest).unwrap();
    assert!(heap.is_consistent());
}

#[test]
fn pod_copy_is_plain_bytes() {
    let heap = HeapTracker::new();
    let t = table("{csl}");
    let src: Vec<u8> = (0..8).collect();
    let mut dest = vec![0u8; 8];
    t.initialize_with_copy(&heap, &mut dest, &src).unwrap();
    assert_eq!(dest, src);
    assert_eq!(heap.live(), 0);
    assert!(heap.is_consistent());
}

#[test]
fn thick_function_owns_context_word_only() {
    let heap = HeapTracker::new();
    let t = table("f");
    let ctx = heap.alloc();
    let mut src = [0u8; 16];
    src[..8].copy_from_slice(&word(0xdead_beef));
    src[8..].copy_from_slice(&word(ctx));
    let mut dest = [0u8; 16];
    t.initialize_with_copy(&heap, &mut dest, &src).unwrap();
    assert_eq!(heap.count(ctx), 2);
    assert!(heap.is_consistent());
}

#[test]
fn struct_copy_retains_every_field() {
    let heap = HeapTracker::new();
    let t = table("{NcN}");
    let (a, b) = (heap.alloc(), heap.alloc());
    let mut src = vec![0u8; t.size() as usize];
    src[..8].copy_from_slice(&word(a));
    src[8] = 0x7F;
    src[16..24].copy_from_slice(&word(b));

    let mut dest = vec![0u8; src.len()];
    t.initialize_with_copy(&heap, &mut dest, &src).unwrap();
    assert_eq!(heap.count(a), 2);
    assert_eq!(heap.count(b), 2);

    t.destroy(&heap, &mut dest).unwrap();
    assert_eq!(heap.count(a), 1);
    assert_eq!(heap.count(b), 1);
    assert!(heap.is_consistent());
}

#[test]
fn assign_with_copy_swaps_ownership() {
    let heap = HeapTracker::new();
    let t = table("N");
    let (a, b) = (heap.alloc(), heap.alloc());
    let mut dest = word(a);
    t.assign_with_copy(&heap, &mut dest, &word(b)).unwrap();
    assert_eq!(dest, word(b));
    assert_eq!(heap.count(a), 0);
    assert_eq!(heap.count(b), 2);
    assert!(heap.is_consistent());
}

#[test]
fn assign_with_copy_of_same_handle_keeps_it_alive() {
    let heap = HeapTracker::new();
    let t = table("N");
    let a = heap.alloc();
    let mut dest = word(a);
    t.assign_with_copy(&heap, &mut dest, &word(a)).unwrap();
    assert_eq!(heap.count(a), 1);
    assert!(heap.is_consistent());
}

#[test]
fn takes_move_ownership_without_counting() {
    let heap = HeapTracker::new();
    let t = table("{NN}");
    let (a, b, c) = (heap.alloc(), heap.alloc(), heap.alloc());
    let mut src = [0u8; 16];
    src[..8].copy_from_slice(&word(a));
    src[8..].copy_from_slice(&word(b));

    let mut moved = [0u8; 16];
    t.initialize_with_take(&mut moved, &src).unwrap();
    assert_eq!((heap.count(a), heap.count(b)), (1, 1));

    let mut other = [0u8; 16];
    other[..8].copy_from_slice(&word(c));
    t.assign_with_take(&heap, &mut other, &moved).unwrap();
    assert_eq!(other, src);
    assert_eq!(heap.count(c), 0);
    assert_eq!((heap.count(a), heap.count(b)), (1, 1));
    assert!(heap.is_consistent());
}

#[test]
fn double_destroy_is_visible_to_tracker() {
    let heap = HeapTracker::new();
    let t = table("N");
    let mut value = word(heap.alloc());
    t.destroy(&heap, &mut value).unwrap();
    t.destroy(&heap, &mut value).unwrap();
    assert_eq!(heap.over_releases(), 1);
}

// ── Enums ───────────────────────────────────────────────────────

#[test]
fn optional_reference_copies_only_payload_case() {
    let heap = HeapTracker::new();
    let t = table("[N,_]");
    let h = heap.alloc();

    let mut some = word(h);
    t.initialize_from_tag(&mut some, 0).unwrap();
    assert_eq!(some, word(h));
    assert_eq!(t.get_enum_tag(&some).unwrap(), 0);

    let mut none = [0xFFu8; 8];
    t.initialize_from_tag(&mut none, 1).unwrap();
    assert_eq!(t.get_enum_tag(&none).unwrap(), 1);

    let mut copy = [0u8; 8];
    t.initialize_with_copy(&heap, &mut copy, &some).unwrap();
    assert_eq!(heap.count(h), 2);
    t.initialize_with_copy(&heap, &mut copy, &none).unwrap();
    t.destroy(&heap, &mut copy).unwrap();
    assert_eq!(heap.count(h), 2);
    assert!(heap.is_consistent());
}

#[test]
fn spare_bit_tag_is_stripped_before_retain() {
    let heap = HeapTracker::new();
    let t = table("[N,o]");
    let h = heap.alloc();

    let mut value = word(h);
    t.initialize_from_tag(&mut value, 1).unwrap();
    assert_eq!(u64::from_le_bytes(value), h | 1);
    assert_eq!(t.get_enum_tag(&value).unwrap(), 1);

    let mut copy = [0u8; 8];
    t.initialize_with_copy(&heap, &mut copy, &value).unwrap();
    assert_eq!(heap.count(h), 2);
    assert!(heap.is_consistent());

    assert_eq!(t.destructive_project_payload(&mut copy).unwrap(), Some(1));
    assert_eq!(copy, word(h));
}

#[test]
fn project_empty_case_is_none() {
    let t = table("[L,_]");
    let mut value = [0u8; 9];
    t.initialize_from_tag(&mut value, 1).unwrap();
    assert_eq!(t.destructive_project_payload(&mut value).unwrap(), None);
}

#[test]
fn declared_tags_are_reported() {
    let builder = WitnessBuilder::default();
    let t = builder
        .enumeration(vec![
            crate::compose::CaseWitness::new("red", 10, None),
            crate::compose::CaseWitness::new("green", 20, None),
        ])
        .unwrap();
    let mut value = [0u8; 1];
    t.initialize_from_tag(&mut value, 20).unwrap();
    assert_eq!(value, [1]);
    assert_eq!(t.get_enum_tag(&value).unwrap(), 20);
}

// ── Errors ──────────────────────────────────────────────────────

#[test]
fn enum_witness_on_struct_fails() {
    let err = table("{cc}").get_enum_tag(&[0, 0]).unwrap_err();
    assert_eq!(
        err,
        WitnessError::NotAnEnum {
            key: "{cc}".to_string()
        }
    );
}

#[test]
fn wrong_buffer_size_fails() {
    let heap = HeapTracker::new();
    let mut dest = [0u8; 4];
    let err = table("N")
        .initialize_with_copy(&heap, &mut dest, &[0; 4])
        .unwrap_err();
    assert!(matches!(
        err,
        WitnessError::BufferSize {
            expected: 8,
            actual: 4,
            ..
        }
    ));
}

#[test]
fn unknown_tag_fails() {
    let mut value = [0u8; 1];
    let err = table("C3").initialize_from_tag(&mut value, 3).unwrap_err();
    assert!(matches!(err, WitnessError::InvalidTag { tag: 3, .. }));
}

#[test]
fn uninhabited_enum_has_no_tag() {
    let err = table("[]").get_enum_tag(&[]).unwrap_err();
    assert!(matches!(err, WitnessError::Uninhabited { .. }));
}

#[test]
fn invalid_bytes_fail_without_side_effects() {
    let heap = HeapTracker::new();
    let t = table("[N,o,_]");
    let h = heap.alloc();
    let mut dest = word(h);
    // Tag value 3 is not allocated.
    let src = [3, 0, 0, 0, 0, 0, 0, 0];
    let err = t.assign_with_copy(&heap, &mut dest, &src).unwrap_err();
    assert!(matches!(err, WitnessError::InvalidValue { .. }));
    assert_eq!(dest, word(h));
    assert_eq!(heap.count(h), 1);
}

// ── Extra inhabitants ───────────────────────────────────────────

#[test]
fn extra_inhabitants_round_trip() {
    let t = table("{cN}");
    let mut value = [0u8; 16];
    t.store_extra_inhabitant(&mut value, 5).unwrap();
    assert_eq!(t.extra_inhabitant_index(&value).unwrap(), Some(5));

    let valid = [0u8; 16];
    assert_eq!(t.extra_inhabitant_index(&valid).unwrap(), None);
}

#[test]
fn inhabitant_index_out_of_range() {
    let t = table("C3");
    let mut value = [0u8];
    let err = t.store_extra_inhabitant(&mut value, 253).unwrap_err();
    assert_eq!(
        err,
        WitnessError::InhabitantIndex {
            key: "[_,_,_]".to_string(),
            index: 253,
            count: 253,
        }
    );
}

// ── Construction ────────────────────────────────────────────────

#[test]
fn field_table_count_must_match() {
    let layout = LayoutEngine::default()
        .compute_layout(&[
            (Name::from("a"), TypeLayout::scalar(ScalarKind::I8).into()),
            (Name::from("b"), TypeLayout::scalar(ScalarKind::NativeStrong).into()),
        ])
        .unwrap();
    let err = build_witness_table(
        Arc::new(layout),
        SubWitnesses::Fields(vec![Arc::new(ValueWitnessTable::scalar(ScalarKind::I8))]),
    )
    .unwrap_err();
    assert!(matches!(err, WitnessError::SubWitnessMismatch { .. }));
}

#[test]
fn case_tables_must_match_payloads() {
    let enum_table = table("[N,_]");
    let err = build_witness_table(
        Arc::clone(enum_table.layout()),
        SubWitnesses::Cases(vec![
            Some(Arc::new(ValueWitnessTable::scalar(ScalarKind::I64))),
            None,
        ]),
    )
    .unwrap_err();
    assert!(matches!(err, WitnessError::SubWitnessMismatch { .. }));
}

#[test]
fn scalar_rejects_children() {
    let err = build_witness_table(
        Arc::new(TypeLayout::scalar(ScalarKind::I8)),
        SubWitnesses::Fields(Vec::new()),
    )
    .unwrap_err();
    assert_eq!(
        err,
        WitnessError::SubWitnessMismatch {
            key: "c".to_string(),
            reason: "field tables given for a scalar layout".to_string(),
        }
    );
}
