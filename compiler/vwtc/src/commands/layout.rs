//! The `layout` command: print a shape's layout map.

use vwt_layout::{LayoutMap, Shape};

use super::{build_table, CommandError, Options};

pub fn show_layout(shape: &Shape, options: &Options) -> Result<String, CommandError> {
    let table = build_table(shape, options)?;
    Ok(LayoutMap(table.layout()).to_string())
}
