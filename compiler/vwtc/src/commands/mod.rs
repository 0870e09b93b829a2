//! Command handlers for the `vwt` CLI.
//!
//! Each submodule renders one command's report as a string; `main` prints
//! it. Option parsing and table construction shared by all commands live
//! here.

use std::sync::Arc;

use thiserror::Error;
use vwt_generic::{GenericDecl, ResolveError, Resolver};
use vwt_layout::{LayoutConfig, LayoutEngine, Shape, ShapeParseError};
use vwt_witness::{ValueWitnessTable, WitnessError};

mod cases;
mod layout;
mod witness;

pub use cases::show_cases;
pub use layout::show_layout;
pub use witness::check_witness;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Parse(#[from] ShapeParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Witness(#[from] WitnessError),
}

/// Options shared by the shape commands.
#[derive(Clone, Debug, Default)]
pub struct Options {
    pub config: LayoutConfig,
    /// Declarations the shape may reference with `@Name<...>`.
    pub decls: Vec<GenericDecl>,
}

/// Split `args` (everything after the command name) into the shape and
/// its options.
///
/// Options: `--no-spare-bits`, `--no-extra-inhabitants`, and
/// `--decl NAME[/PARAMS]=SHAPE` (repeatable).
pub fn parse_options(args: &[String]) -> Result<(Shape, Options), CommandError> {
    let mut options = Options::default();
    let mut shape = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--no-spare-bits" => options.config.spare_bit_tags = false,
            "--no-extra-inhabitants" => options.config.extra_inhabitants = false,
            "--decl" => {
                let Some(decl) = args.get(i + 1) else {
                    return Err(CommandError::Usage(
                        "--decl needs NAME[/PARAMS]=SHAPE".to_string(),
                    ));
                };
                options.decls.push(parse_decl(decl)?);
                i += 1;
            }
            arg if arg.starts_with("--") => {
                return Err(CommandError::Usage(format!("unknown option `{arg}`")));
            }
            arg if shape.is_none() => shape = Some(arg.parse::<Shape>()?),
            arg => {
                return Err(CommandError::Usage(format!("unexpected argument `{arg}`")));
            }
        }
        i += 1;
    }
    let shape = shape.ok_or_else(|| CommandError::Usage("missing layout string".to_string()))?;
    Ok((shape, options))
}

fn parse_decl(src: &str) -> Result<GenericDecl, CommandError> {
    let Some((head, body)) = src.split_once('=') else {
        return Err(CommandError::Usage(format!(
            "`{src}`: expected NAME[/PARAMS]=SHAPE"
        )));
    };
    let (name, params) = match head.split_once('/') {
        Some((name, params)) => {
            let params = params.parse::<u32>().map_err(|_| {
                CommandError::Usage(format!("`{params}` is not a parameter count"))
            })?;
            (name, params)
        }
        None => (head, 0),
    };
    Ok(GenericDecl::new(name, params, body.parse::<Shape>()?))
}

/// Witness table for `shape` under `options`.
pub fn build_table(
    shape: &Shape,
    options: &Options,
) -> Result<Arc<ValueWitnessTable>, CommandError> {
    let resolver = Resolver::new(LayoutEngine::new(options.config));
    for decl in &options.decls {
        resolver.declare(decl.clone())?;
    }
    tracing::debug!(%shape, decls = options.decls.len(), "building table");
    Ok(resolver.resolve_shape(shape, &[])?)
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
mod tests;
