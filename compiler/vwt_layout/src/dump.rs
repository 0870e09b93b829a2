//! Human-readable dumps of layouts and values.

use std::fmt::{self, Write as _};

use crate::layout::{LayoutKind, TypeLayout};
use crate::scalar::ReferenceKind;

/// Placeholder printed for words holding an owned handle; handle values
/// differ from run to run.
pub const POINTER_WORD: &str = "POINTER";

/// Display adapter printing a layout as a table.
///
/// ```text
/// {csN}
///   size 16  align 8  stride 16  extra inhabitants 2147483647
///   spare bits 0000000000000000 07000000000000FF
///   offset  width  ownership         name
///        0      1  trivial           0
///        2      2  trivial           1
///        8      8  owned-reference   2
/// ```
pub struct LayoutMap<'a>(pub &'a TypeLayout);

impl fmt::Display for LayoutMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = self.0;
        writeln!(f, "{}", layout.key)?;
        // A zero-sized value still advances arrays by one byte in dumps.
        writeln!(
            f,
            "  size {}  align {}  stride {}  extra inhabitants {}",
            layout.size,
            layout.alignment,
            layout.stride.max(1),
            layout.extra_inhabitants.count
        )?;
        if !layout.spare_bits.is_zero() {
            writeln!(
                f,
                "  spare bits {}",
                hex_words(layout.spare_bits.as_bytes(), &[])
            )?;
        }
        match &layout.kind {
            LayoutKind::Scalar(kind) => writeln!(f, "  scalar {kind}"),
            LayoutKind::Struct => {
                if layout.fields.is_empty() {
                    return Ok(());
                }
                writeln!(f, "  offset  width  ownership         name")?;
                for field in &layout.fields {
                    writeln!(
                        f,
                        "  {:>6}  {:>5}  {:<16}  {}",
                        field.offset,
                        field.size,
                        field.ownership.to_string(),
                        field.name
                    )?;
                }
                Ok(())
            }
            LayoutKind::Enum(e) => {
                writeln!(f, "  tag {}", e.encoding)?;
                if e.cases.is_empty() {
                    return Ok(());
                }
                writeln!(f, "  case  tag    payload           name")?;
                for (i, case) in e.cases.iter().enumerate() {
                    let payload = case.payload.as_ref().map_or("-", |p| &*p.key);
                    writeln!(f, "  {:>4}  {:>5}  {:<16}  {}", i, case.tag, payload, case.name)?;
                }
                Ok(())
            }
        }
    }
}

/// Value bytes as 8-byte uppercase hex words separated by spaces.
///
/// Words starting at one of `references`' offsets print as
/// [`POINTER_WORD`]. A trailing partial word prints only its bytes.
pub fn hex_words(bytes: &[u8], references: &[(u32, ReferenceKind)]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + bytes.len() / 8);
    for (i, word) in bytes.chunks(8).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let offset = i * 8;
        if references.iter().any(|&(at, _)| at as usize == offset) {
            out.push_str(POINTER_WORD);
            continue;
        }
        for byte in word {
            // Writing to a String cannot fail.
            let _ = write!(out, "{byte:02X}");
        }
    }
    out
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
