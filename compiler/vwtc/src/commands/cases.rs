//! The `cases` command: the bytes each enum case is stored as.
//!
//! Payload bytes are zero, so each row shows only what the tag adds.

use std::fmt::Write as _;

use vwt_layout::{hex_words, Shape};
use vwt_witness::WitnessError;

use super::{build_table, CommandError, Options};

pub fn show_cases(shape: &Shape, options: &Options) -> Result<String, CommandError> {
    let table = build_table(shape, options)?;
    let Some(e) = table.layout().enum_layout() else {
        return Err(WitnessError::NotAnEnum {
            key: table.key().to_string(),
        }
        .into());
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", table.key());
    let _ = writeln!(out, "  tag {}", e.encoding);
    let mut value = vec![0u8; table.size() as usize];
    for case in &e.cases {
        value.fill(0);
        table.initialize_from_tag(&mut value, case.tag)?;
        let read_back = table.get_enum_tag(&value)?;
        let bytes = if value.is_empty() {
            "(no bytes)".to_string()
        } else {
            hex_words(&value, &[])
        };
        let _ = write!(out, "  {:>5}  {:<6}  {}", case.tag, case.name, bytes);
        if read_back != case.tag {
            let _ = write!(out, "  reads back as {read_back}");
        }
        out.push('\n');
    }
    Ok(out)
}
