//! Built-in tools.
//!
//! Each module exposes `descriptors()`; adding a tool means adding it there,
//! and adding a module means adding a row to [`MODULES`].

pub mod local_csv;
pub mod s3_csv;

use crate::registry::ToolModule;

/// Tool modules scanned by [`crate::registry::ToolRegistry::discover`].
pub const MODULES: &[ToolModule] = &[
    ("local_csv", local_csv::descriptors),
    ("s3_csv", s3_csv::descriptors),
];
