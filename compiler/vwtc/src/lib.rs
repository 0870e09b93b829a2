//! The `vwt` tool: inspect layouts and value witnesses of shapes given as
//! layout strings.

pub mod commands;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a subscriber once per process.
///
/// Nothing is installed unless `RUST_LOG` is set. `VWT_LOG_TREE` switches
/// from flat lines to an indented span tree.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let filter = EnvFilter::from_default_env();
        if std::env::var_os("VWT_LOG_TREE").is_some() {
            tracing_subscriber::registry()
                .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true))
                .with(filter)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
