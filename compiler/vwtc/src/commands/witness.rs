//! The `witness` command: table flags plus a copy/destroy balance check.
//!
//! The check fills every always-present handle word with a fresh tracked
//! handle, copies the value, destroys both copies and reports whether every
//! count returned to zero.

use std::fmt::Write as _;

use vwt_layout::Shape;
use vwt_witness::{HeapTracker, WitnessFlags};

use super::{build_table, CommandError, Options};

pub fn check_witness(shape: &Shape, options: &Options) -> Result<String, CommandError> {
    let table = build_table(shape, options)?;
    let layout = table.layout();

    let mut out = String::new();
    let _ = writeln!(out, "{}", table.key());
    let _ = writeln!(out, "  flags {}", flag_names(table.flags()));
    let _ = writeln!(
        out,
        "  size {}  stride {}  extra inhabitants {}",
        table.size(),
        table.stride(),
        layout.extra_inhabitants.count
    );
    for (offset, kind) in &layout.references {
        let _ = writeln!(out, "  handle at {offset} ({kind})");
    }

    let heap = HeapTracker::new();
    let mut value = vec![0u8; table.size() as usize];
    let handles: Vec<u64> = layout
        .references
        .iter()
        .map(|&(offset, _)| {
            let handle = heap.alloc();
            let at = offset as usize;
            value[at..at + 8].copy_from_slice(&handle.to_le_bytes());
            handle
        })
        .collect();

    let mut copy = vec![0u8; value.len()];
    table.initialize_with_copy(&heap, &mut copy, &value)?;
    let retained = handles.iter().filter(|&&h| heap.count(h) == 2).count();
    table.destroy(&heap, &mut copy)?;
    table.destroy(&heap, &mut value)?;

    let balanced = heap.live() == 0 && heap.is_consistent();
    let _ = writeln!(
        out,
        "  copy retained {retained} of {} handles, destroy {}",
        handles.len(),
        if balanced { "balanced" } else { "unbalanced" }
    );
    Ok(out)
}

fn flag_names(flags: WitnessFlags) -> String {
    if flags.is_empty() {
        return "none".to_string();
    }
    flags
        .iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(" | ")
}
