//! Reference counts stay balanced across copy and destroy for aggregates
//! mixing handles, integers and enums.

#![expect(clippy::unwrap_used, reason = "tests use unwrap for concise assertions")]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use vwt_layout::{hex_words, Shape};
use vwt_witness::{HeapTracker, ValueWitnessTable, WitnessBuilder};

fn table(src: &str) -> Arc<ValueWitnessTable> {
    let shape: Shape = src.parse().unwrap();
    WitnessBuilder::default().concrete(&shape).unwrap()
}

fn put_handle(value: &mut [u8], offset: usize, handle: u64) {
    value[offset..offset + 8].copy_from_slice(&handle.to_le_bytes());
}

/// Copy `value`, destroy both copies, and check every handle went back to
/// zero without over-releases.
fn assert_balanced(heap: &HeapTracker, table: &ValueWitnessTable, mut value: Vec<u8>, handles: &[u64]) {
    let mut copy = vec![0u8; value.len()];
    table.initialize_with_copy(heap, &mut copy, &value).unwrap();
    for &h in handles {
        assert_eq!(heap.count(h), 2, "handle {h:#x} after copy");
    }
    table.destroy(heap, &mut copy).unwrap();
    table.destroy(heap, &mut value).unwrap();
    for &h in handles {
        assert_eq!(heap.count(h), 0, "handle {h:#x} after destroy");
    }
    assert_eq!(heap.live(), 0);
    assert!(heap.is_consistent());
}

#[test]
fn multi_reference_struct() {
    let heap = HeapTracker::new();
    let t = table("{NNN}");
    let handles = [heap.alloc(), heap.alloc(), heap.alloc()];
    let mut value = vec![0u8; 24];
    for (i, &h) in handles.iter().enumerate() {
        put_handle(&mut value, i * 8, h);
    }
    assert_balanced(&heap, &t, value, &handles);
}

#[test]
fn aligned_struct() {
    let heap = HeapTracker::new();
    let t = table("{csN}");
    let offsets: Vec<u32> = t.layout().fields.iter().map(|f| f.offset).collect();
    assert_eq!(offsets, vec![0, 2, 8]);
    assert_eq!((t.size(), t.layout().alignment.bytes()), (16, 8));

    let c = heap.alloc();
    let mut value = vec![0u8; 16];
    value[0] = 0xAA;
    value[2..4].copy_from_slice(&0xBBBBu16.to_le_bytes());
    put_handle(&mut value, 8, c);
    assert_eq!(
        hex_words(&value, &t.layout().references),
        "AA00BBBB00000000 POINTER"
    );
    assert_balanced(&heap, &t, value, &[c]);
}

#[test]
fn no_payload_enum_struct() {
    let heap = HeapTracker::new();
    let t = table("{C3N}");
    let cases = table("C3");
    let c = heap.alloc();
    let mut value = vec![0u8; t.size() as usize];
    cases.initialize_from_tag(&mut value[..1], 2).unwrap();
    put_handle(&mut value, 8, c);
    assert_eq!(cases.get_enum_tag(&value[..1]).unwrap(), 2);
    assert_balanced(&heap, &t, value, &[c]);
}

#[test]
fn single_payload_enum_struct() {
    let heap = HeapTracker::new();
    let t = table("{[N,_]N}");
    let field = table("[N,_]");

    let (payload, c) = (heap.alloc(), heap.alloc());
    let mut value = vec![0u8; t.size() as usize];
    put_handle(&mut value, 0, payload);
    field.initialize_from_tag(&mut value[..8], 0).unwrap();
    put_handle(&mut value, 8, c);
    assert_balanced(&heap, &t, value, &[payload, c]);

    let c = heap.alloc();
    let mut value = vec![0u8; t.size() as usize];
    field.initialize_from_tag(&mut value[..8], 1).unwrap();
    put_handle(&mut value, 8, c);
    assert_balanced(&heap, &t, value, &[c]);
}

#[test]
fn nested_enum_struct() {
    let heap = HeapTracker::new();
    let t = table("{[[N,_],_]N}");
    let outer = table("[[N,_],_]");
    let inner = table("[N,_]");
    assert_eq!(t.size(), 16);

    // .EnumPayload(.Payload(c))
    let (payload, c) = (heap.alloc(), heap.alloc());
    let mut value = vec![0u8; 16];
    put_handle(&mut value, 0, payload);
    inner.initialize_from_tag(&mut value[..8], 0).unwrap();
    outer.initialize_from_tag(&mut value[..8], 0).unwrap();
    put_handle(&mut value, 8, c);
    assert_eq!(outer.get_enum_tag(&value[..8]).unwrap(), 0);
    assert_eq!(inner.get_enum_tag(&value[..8]).unwrap(), 0);
    assert_balanced(&heap, &t, value, &[payload, c]);

    // .EnumPayload(.NoPayload)
    let c = heap.alloc();
    let mut value = vec![0u8; 16];
    inner.initialize_from_tag(&mut value[..8], 1).unwrap();
    outer.initialize_from_tag(&mut value[..8], 0).unwrap();
    put_handle(&mut value, 8, c);
    assert_eq!(outer.get_enum_tag(&value[..8]).unwrap(), 0);
    assert_eq!(inner.get_enum_tag(&value[..8]).unwrap(), 1);
    assert_balanced(&heap, &t, value, &[c]);

    // .NoEnumPayload
    let c = heap.alloc();
    let mut value = vec![0u8; 16];
    outer.initialize_from_tag(&mut value[..8], 1).unwrap();
    put_handle(&mut value, 8, c);
    assert_eq!(outer.get_enum_tag(&value[..8]).unwrap(), 1);
    assert_balanced(&heap, &t, value, &[c]);
}

#[test]
fn multi_payload_enum_in_struct() {
    let heap = HeapTracker::new();
    let t = table("{c[N,o,_]}");
    let field = table("[N,o,_]");
    assert_eq!(t.size(), 16);

    let h = heap.alloc();
    let mut value = vec![0u8; 16];
    put_handle(&mut value, 8, h);
    field.initialize_from_tag(&mut value[8..], 1).unwrap();
    assert_eq!(field.get_enum_tag(&value[8..]).unwrap(), 1);
    assert_balanced(&heap, &t, value, &[h]);

    let mut value = vec![0u8; 16];
    field.initialize_from_tag(&mut value[8..], 2).unwrap();
    assert_balanced(&heap, &t, value, &[]);
}

fn field_code() -> impl Strategy<Value = char> {
    prop::sample::select(vec!['c', 's', 'l', 'L', 'N', 'n', 'W', 'o', 'f'])
}

proptest! {
    #[test]
    fn struct_copies_balance(codes in prop::collection::vec(field_code(), 0..8)) {
        let src: String = std::iter::once('{').chain(codes).chain(std::iter::once('}')).collect();
        let heap = HeapTracker::new();
        let t = table(&src);
        let mut value = vec![0u8; t.size() as usize];
        let handles: Vec<u64> = t
            .layout()
            .references
            .iter()
            .map(|&(offset, _)| {
                let h = heap.alloc();
                put_handle(&mut value, offset as usize, h);
                h
            })
            .collect();

        // Assigning over a copy releases what the copy held.
        let mut copy = vec![0u8; value.len()];
        t.initialize_with_copy(&heap, &mut copy, &value).unwrap();
        t.assign_with_copy(&heap, &mut copy, &value).unwrap();
        for &h in &handles {
            prop_assert_eq!(heap.count(h), 2);
        }
        t.destroy(&heap, &mut copy).unwrap();
        for &h in &handles {
            prop_assert_eq!(heap.count(h), 1);
        }
        t.destroy(&heap, &mut value).unwrap();
        prop_assert_eq!(heap.live(), 0);
        prop_assert!(heap.is_consistent());
    }
}
