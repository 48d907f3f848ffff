//! Core types and services for tabular-mcp.
//!
//! This crate resolves data source references to byte streams (local files or
//! object-store keys), parses delimited text into bounded summaries, and exposes
//! control-plane operations that the tool handlers call into.

pub mod control;
pub mod reader;
pub mod source;
